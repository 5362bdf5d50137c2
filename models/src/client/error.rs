use snafu::Snafu;

/// The client result type.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Error type representing issues using the Kubernetes API on behalf of an evacuation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ClientError {
    #[snafu(display(
        "Unable to list Pods matching labels '{}' and fields '{}': '{}'",
        label_selector,
        field_selector,
        source
    ))]
    ListPods {
        source: kube::Error,
        label_selector: String,
        field_selector: String,
    },

    #[snafu(display("Unable to list ReplicationControllers: '{}'", source))]
    ListReplicationControllers { source: kube::Error },

    #[snafu(display("Unable to delete Pod '{}/{}': '{}'", namespace, name, source))]
    DeletePod {
        source: kube::Error,
        namespace: String,
        name: String,
    },

    #[snafu(display(
        "Grace period of {}s for Pod '{}/{}' is out of range: '{}'",
        grace_period_seconds,
        namespace,
        name,
        source
    ))]
    GracePeriodOutOfRange {
        source: std::num::TryFromIntError,
        grace_period_seconds: i64,
        namespace: String,
        name: String,
    },
}
