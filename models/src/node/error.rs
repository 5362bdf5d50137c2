use crate::constants::EVACUATOR;

use snafu::Snafu;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display(
        "Node '{}' must be unschedulable to perform evacuation.\nYou can mark the node unschedulable with 'kubectl cordon {}' before running {}",
        node_name,
        node_name,
        EVACUATOR
    ))]
    NodeNotUnschedulable { node_name: String },
}
