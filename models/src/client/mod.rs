pub mod error;

pub use self::error::ClientError;
use self::error::Result;

use crate::selector::LabelSelector;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, ReplicationController};
use kube::api::{Api, DeleteParams, ListParams};
use snafu::ResultExt;
use tracing::{event, instrument, Level};

use std::convert::TryFrom;
use std::sync::Arc;

#[cfg(feature = "mockall")]
use mockall::mock;

/// Options applied when deleting a Pod.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DeleteOptions {
    /// Seconds the Pod is given to terminate cleanly before it is killed.
    pub grace_period_seconds: i64,
}

#[async_trait]
/// A trait providing the Kubernetes operations needed to evacuate a Node. This is provided as a trait
/// in order to allow mocks to be used for testing purposes.
pub trait EvacuationClient: Send + Sync {
    /// List Pods across all namespaces which match both the label selector and the field selector.
    async fn list_pods(
        &self,
        label_selector: &LabelSelector,
        field_selector: &str,
    ) -> Result<Vec<Pod>>;
    /// List ReplicationControllers across all namespaces.
    async fn list_replication_controllers(&self) -> Result<Vec<ReplicationController>>;
    /// Delete a single Pod.
    async fn delete_pod(&self, namespace: &str, name: &str, options: &DeleteOptions)
        -> Result<()>;
}

#[cfg(feature = "mockall")]
mock! {
    /// A Mock EvacuationClient for use in tests.
    pub EvacuationClient {}
    #[async_trait]
    impl EvacuationClient for EvacuationClient {
        async fn list_pods(
            &self,
            label_selector: &LabelSelector,
            field_selector: &str,
        ) -> Result<Vec<Pod>>;
        async fn list_replication_controllers(&self) -> Result<Vec<ReplicationController>>;
        async fn delete_pod(
            &self,
            namespace: &str,
            name: &str,
            options: &DeleteOptions,
        ) -> Result<()>;
    }
}

#[async_trait]
impl<T> EvacuationClient for Arc<T>
where
    T: EvacuationClient,
{
    async fn list_pods(
        &self,
        label_selector: &LabelSelector,
        field_selector: &str,
    ) -> Result<Vec<Pod>> {
        (**self).list_pods(label_selector, field_selector).await
    }

    async fn list_replication_controllers(&self) -> Result<Vec<ReplicationController>> {
        (**self).list_replication_controllers().await
    }

    async fn delete_pod(
        &self,
        namespace: &str,
        name: &str,
        options: &DeleteOptions,
    ) -> Result<()> {
        (**self).delete_pod(namespace, name, options).await
    }
}

#[derive(Clone)]
/// Concrete implementation of the `EvacuationClient` trait. This implementation will almost
/// certainly be used in any case that isn't a unit test.
pub struct K8SEvacuationClient {
    k8s_client: kube::client::Client,
}

impl K8SEvacuationClient {
    pub fn new(k8s_client: kube::client::Client) -> Self {
        K8SEvacuationClient { k8s_client }
    }
}

#[async_trait]
impl EvacuationClient for K8SEvacuationClient {
    #[instrument(skip(self), err)]
    async fn list_pods(
        &self,
        label_selector: &LabelSelector,
        field_selector: &str,
    ) -> Result<Vec<Pod>> {
        let pods: Api<Pod> = Api::all(self.k8s_client.clone());

        let mut list_params = ListParams::default().fields(field_selector);
        if !label_selector.is_everything() {
            list_params = list_params.labels(&label_selector.to_string());
        }

        let pod_list = pods
            .list(&list_params)
            .await
            .context(error::ListPodsSnafu {
                label_selector: label_selector.to_string(),
                field_selector,
            })?;

        Ok(pod_list.items)
    }

    #[instrument(skip(self), err)]
    async fn list_replication_controllers(&self) -> Result<Vec<ReplicationController>> {
        let rcs: Api<ReplicationController> = Api::all(self.k8s_client.clone());

        let rc_list = rcs
            .list(&ListParams::default())
            .await
            .context(error::ListReplicationControllersSnafu)?;

        Ok(rc_list.items)
    }

    #[instrument(skip(self), err)]
    async fn delete_pod(
        &self,
        namespace: &str,
        name: &str,
        options: &DeleteOptions,
    ) -> Result<()> {
        let grace_period_seconds = u32::try_from(options.grace_period_seconds).context(
            error::GracePeriodOutOfRangeSnafu {
                grace_period_seconds: options.grace_period_seconds,
                namespace,
                name,
            },
        )?;

        let pods: Api<Pod> = Api::namespaced(self.k8s_client.clone(), namespace);
        pods.delete(
            name,
            &DeleteParams {
                grace_period_seconds: Some(grace_period_seconds),
                ..Default::default()
            },
        )
        .await
        .context(error::DeletePodSnafu { namespace, name })?;

        event!(
            Level::INFO,
            grace_period_seconds,
            "Deleted Pod '{}/{}'",
            namespace,
            name
        );
        Ok(())
    }
}
