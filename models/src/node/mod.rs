//! The safety gate run against a Node before any of its pods are touched.
mod error;

pub use self::error::Error as GateError;
use self::error::Result;

use crate::constants::{LEGACY_POD_HOST_FIELD, POD_HOST_FIELD, V1BETA3_POD_HOST_FIELD};

use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use snafu::ensure;

/// Returns whether or not the Node has been cordoned.
pub fn is_unschedulable(node: &Node) -> bool {
    node.spec
        .as_ref()
        .and_then(|spec| spec.unschedulable)
        .unwrap_or(false)
}

/// Ensures that the Node is already marked unschedulable. The Node is never cordoned on the caller's behalf.
pub fn check_schedulable(node: &Node) -> Result<()> {
    ensure!(
        is_unschedulable(node),
        error::NodeNotUnschedulableSnafu {
            node_name: node.name_any(),
        }
    );
    Ok(())
}

/// The field selector key which binds a Pod to its hosting Node for the given API version.
pub fn host_field_key(api_version: &str) -> &'static str {
    match api_version {
        "v1beta1" | "v1beta2" => LEGACY_POD_HOST_FIELD,
        "v1beta3" => V1BETA3_POD_HOST_FIELD,
        _ => POD_HOST_FIELD,
    }
}

/// The field selector matching every Pod hosted on the given Node.
pub fn host_field_selector(api_version: &str, node_name: &str) -> String {
    format!("{}={}", host_field_key(api_version), node_name)
}
