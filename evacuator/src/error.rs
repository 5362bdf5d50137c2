use models::client::ClientError;
use models::node::GateError;
use models::selector::SelectorError;

use snafu::Snafu;

/// The result type used while evacuating a single Node.
pub type Result<T> = std::result::Result<T, EvacuationError>;

/// Errors collected while evacuating a Node.
///
/// None of these stop an evacuation batch. Node-level errors end processing of their own Node, Pod-level errors are
/// recorded and the remaining Pods are still processed.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum EvacuationError {
    #[snafu(display("{}", source))]
    Gate { source: GateError },

    #[snafu(display("Invalid pod selector for node '{}': '{}'", node_name, source))]
    InvalidSelector {
        source: SelectorError,
        node_name: String,
    },

    #[snafu(display("Unable to find Pods on node '{}': '{}'", node_name, source))]
    ListPods {
        source: ClientError,
        node_name: String,
    },

    #[snafu(display(
        "Unable to find ReplicationControllers while evacuating node '{}': '{}'",
        node_name,
        source
    ))]
    ListReplicationControllers {
        source: ClientError,
        node_name: String,
    },

    #[snafu(display(
        "Unable to delete Pod '{}/{}' on node '{}': '{}'",
        namespace,
        pod_name,
        node_name,
        source
    ))]
    DeletePod {
        source: ClientError,
        node_name: String,
        namespace: String,
        pod_name: String,
    },

    #[snafu(display(
        "Unable to evacuate {} pod(s) on node '{}' because they are not backed by replication controller.\n\
         Suggested options:\n\
         - You can list bare pods in json/yaml format using '--list-pods -o json|yaml'\n\
         - Force deletion of bare pods with the --force option\n\
         - Optionally recreate these bare pods by massaging the json/yaml output from the pod listing",
        count,
        node_name
    ))]
    UnsafePodsRemain { node_name: String, count: usize },
}

impl EvacuationError {
    /// The Node this error was collected for.
    pub fn node_name(&self) -> &str {
        match self {
            Self::Gate {
                source: GateError::NodeNotUnschedulable { node_name },
            }
            | Self::InvalidSelector { node_name, .. }
            | Self::ListPods { node_name, .. }
            | Self::ListReplicationControllers { node_name, .. }
            | Self::DeletePod { node_name, .. }
            | Self::UnsafePodsRemain { node_name, .. } => node_name,
        }
    }
}
