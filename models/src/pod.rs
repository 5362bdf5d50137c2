//! Classification of the Pods targeted by an evacuation.
use crate::selector::LabelSelector;

use k8s_openapi::api::core::v1::{Pod, ReplicationController};
use kube::ResourceExt;

/// Whether a Pod would be recreated by a controller after being deleted.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PodBacking {
    /// At least one ReplicationController selects the Pod.
    ControllerBacked,
    /// No ReplicationController selects the Pod. Deleting it removes the workload for good.
    Standalone,
}

/// A Pod paired with its backing.
#[derive(Clone, Debug)]
pub struct ClassifiedPod {
    pub pod: Pod,
    pub backing: PodBacking,
}

impl ClassifiedPod {
    pub fn is_controller_backed(&self) -> bool {
        self.backing == PodBacking::ControllerBacked
    }
}

/// Returns whether or not any of the given controllers selects the Pod.
///
/// A controller selects a Pod when every key/value pair of its selector is present in the Pod's labels.
pub fn is_controller_backed(pod: &Pod, controllers: &[ReplicationController]) -> bool {
    let labels = pod.labels();
    controllers.iter().any(|rc| {
        let selector = rc
            .spec
            .as_ref()
            .and_then(|spec| spec.selector.as_ref())
            .map(LabelSelector::from_labels)
            .unwrap_or_default();
        selector.matches(labels)
    })
}

/// Classifies each Pod, preserving the order in which they were given.
pub fn classify(pods: Vec<Pod>, controllers: &[ReplicationController]) -> Vec<ClassifiedPod> {
    pods.into_iter()
        .map(|pod| {
            let backing = if is_controller_backed(&pod, controllers) {
                PodBacking::ControllerBacked
            } else {
                PodBacking::Standalone
            };
            ClassifiedPod { pod, backing }
        })
        .collect()
}

/// Splits Pods into `(controller-backed, standalone)`, preserving relative order within each group.
pub fn partition(
    pods: Vec<Pod>,
    controllers: &[ReplicationController],
) -> (Vec<Pod>, Vec<Pod>) {
    let (backed, standalone): (Vec<_>, Vec<_>) = classify(pods, controllers)
        .into_iter()
        .partition(ClassifiedPod::is_controller_backed);

    (
        backed.into_iter().map(|classified| classified.pod).collect(),
        standalone.into_iter().map(|classified| classified.pod).collect(),
    )
}
