/// The name of the evacuation binary, used in diagnostics and remediation hints.
pub const EVACUATOR: &str = "evacuator";

/// The namespace a Pod is assumed to live in when its metadata carries none.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Seconds a pod is given to terminate cleanly unless the operator asks otherwise.
pub const DEFAULT_GRACE_PERIOD_SECONDS: i64 = 30;

// Field selector keys binding a pod to the node hosting it. The key changed names across API versions.
pub const LEGACY_POD_HOST_FIELD: &str = "DesiredState.Host";
pub const V1BETA3_POD_HOST_FIELD: &str = "spec.host";
pub const POD_HOST_FIELD: &str = "spec.nodeName";

// Diagnostic banners written ahead of the pods printed for a node.
pub const MIGRATING_BANNER: &str = "Migrating these pods on node: ";
pub const LISTING_BANNER: &str = "Listing matched pods on node: ";

// Logging environment variables.
pub const TRACING_FILTER_DIRECTIVE_ENV_VAR: &str = "TRACING_FILTER_DIRECTIVE";
pub const LOGGING_FORMATTER_ENV_VAR: &str = "LOGGING_FORMATTER";
pub const LOGGING_ANSI_ENABLED_ENV_VAR: &str = "LOGGING_ANSI_ENABLED";
