//! Resolution of the Nodes named on the command line.
use models::selector::LabelSelector;

use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, ListParams};
use snafu::{ensure, ResultExt};
use tracing::{event, instrument, Level};

/// The Nodes an invocation targets, either by name or by label selector.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NodeTarget {
    Names(Vec<String>),
    Selector(LabelSelector),
}

impl NodeTarget {
    /// Builds a target from positional Node names and an optional Node selector. Exactly one must be given.
    pub fn new(names: Vec<String>, selector: Option<String>) -> Result<Self> {
        match selector {
            Some(selector) => {
                ensure!(names.is_empty(), error::ConflictingTargetsSnafu);
                let selector =
                    LabelSelector::parse(&selector).context(error::InvalidNodeSelectorSnafu {
                        selector: &selector,
                    })?;
                Ok(NodeTarget::Selector(selector))
            }
            None => {
                ensure!(!names.is_empty(), error::MissingTargetSnafu);
                Ok(NodeTarget::Names(names))
            }
        }
    }

    /// Fetches the targeted Nodes. Named Nodes are returned in the order they were given.
    #[instrument(skip(k8s_client), err)]
    pub async fn resolve(&self, k8s_client: &kube::Client) -> Result<Vec<Node>> {
        let nodes: Api<Node> = Api::all(k8s_client.clone());

        let resolved = match self {
            NodeTarget::Names(names) => {
                let mut resolved = Vec::with_capacity(names.len());
                for name in names {
                    let node = nodes
                        .get(name)
                        .await
                        .context(error::GetNodeSnafu { node_name: name })?;
                    resolved.push(node);
                }
                resolved
            }
            NodeTarget::Selector(selector) => {
                let list_params = ListParams::default().labels(&selector.to_string());
                nodes
                    .list(&list_params)
                    .await
                    .context(error::ListNodesSnafu {
                        selector: selector.to_string(),
                    })?
                    .items
            }
        };

        ensure!(!resolved.is_empty(), error::NoNodesFoundSnafu);
        event!(Level::INFO, count = resolved.len(), "Resolved target nodes.");
        Ok(resolved)
    }
}

pub mod error {
    use models::selector::SelectorError;
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum NodeTargetError {
        #[snafu(display("Nodes may be named or selected with --selector, but not both"))]
        ConflictingTargets,

        #[snafu(display("At least one node name or a --selector must be given"))]
        MissingTarget,

        #[snafu(display("Invalid node selector '{}': '{}'", selector, source))]
        InvalidNodeSelector {
            source: SelectorError,
            selector: String,
        },

        #[snafu(display("Unable to get node '{}': '{}'", node_name, source))]
        GetNode {
            source: kube::Error,
            node_name: String,
        },

        #[snafu(display("Unable to list nodes matching '{}': '{}'", selector, source))]
        ListNodes {
            source: kube::Error,
            selector: String,
        },

        #[snafu(display("No nodes matched the given target"))]
        NoNodesFound,
    }
}

pub use error::NodeTargetError;
type Result<T> = std::result::Result<T, NodeTargetError>;
