//! Evacuates Pods from cordoned Nodes.
//!
//! Evacuation is performed client side: the Pods hosted on a Node are listed, classified by whether a
//! ReplicationController would recreate them, and deleted. Pods without a controller are only deleted when forced,
//! as deleting them removes the workload from the cluster for good.
//!
//! Nodes, and the Pods on each Node, are handled one at a time. Nothing is rolled back: an interrupted evacuation
//! leaves already-deleted Pods deleted, and can simply be run again.
use crate::error::{self, EvacuationError, Result};
use crate::options::EvacuateOptions;
use crate::outcome::{EvacuationReport, NodeOutcome};
use crate::sink::Sinks;

use models::client::EvacuationClient;
use models::constants::{DEFAULT_NAMESPACE, LISTING_BANNER, MIGRATING_BANNER};
use models::node::{check_schedulable, host_field_selector};
use models::pod::{classify, partition};
use models::printer::{HeaderMode, PodPrinter};
use models::selector::LabelSelector;

use k8s_openapi::api::core::v1::{Node, Pod, ReplicationController};
use kube::ResourceExt;
use snafu::ResultExt;
use tracing::{event, instrument, Level};

use std::io::Write;

/// Evacuates Nodes using the given client, printing each Pod as it is handled.
pub struct Evacuator<C: EvacuationClient> {
    client: C,
    printer: Box<dyn PodPrinter + Send + Sync>,
    options: EvacuateOptions,
}

impl<C: EvacuationClient> Evacuator<C> {
    pub fn new(
        client: C,
        printer: Box<dyn PodPrinter + Send + Sync>,
        options: EvacuateOptions,
    ) -> Self {
        Evacuator {
            client,
            printer,
            options,
        }
    }

    pub fn options(&self) -> &EvacuateOptions {
        &self.options
    }

    /// Evacuates each Node in order.
    ///
    /// A Node which fails does not stop the remaining Nodes from being evacuated. Every error is collected into the
    /// returned report.
    pub async fn run<O: Write, D: Write>(
        &self,
        nodes: &[Node],
        sinks: &mut Sinks<O, D>,
    ) -> EvacuationReport {
        let mut report = EvacuationReport::default();
        for node in nodes {
            report.push(self.evacuate_node(node, sinks).await);
        }
        report
    }

    /// Prints the Pods targeted on each Node without deleting anything.
    ///
    /// Unlike an evacuation, a listing does not require the Node to be cordoned.
    pub async fn list_pods<O: Write, D: Write>(
        &self,
        nodes: &[Node],
        sinks: &mut Sinks<O, D>,
    ) -> EvacuationReport {
        let mut report = EvacuationReport::default();
        for node in nodes {
            let node_name = node.name_any();
            let mut outcome = NodeOutcome::new(&node_name);
            let outcome = match self.select_target_pods(node).await {
                Ok(pods) => {
                    self.print_listing(&node_name, &pods, sinks);
                    outcome.listed = pods.len();
                    outcome.finish()
                }
                Err(e) => outcome.abort(e),
            };
            report.push(outcome);
        }
        report
    }

    /// Evacuates a single Node.
    #[instrument(skip(self, node, sinks), fields(node = %node.name_any()))]
    pub async fn evacuate_node<O: Write, D: Write>(
        &self,
        node: &Node,
        sinks: &mut Sinks<O, D>,
    ) -> NodeOutcome {
        let node_name = node.name_any();
        let outcome = NodeOutcome::new(&node_name);

        if let Err(e) = check_schedulable(node).context(error::GateSnafu) {
            event!(Level::ERROR, "Refusing to evacuate a schedulable node.");
            return outcome.abort(e);
        }

        let (pods, controllers) = match self.list_targets(node).await {
            Ok(targets) => targets,
            Err(e) => {
                event!(Level::ERROR, error = %e, "Unable to list evacuation targets.");
                return outcome.abort(e);
            }
        };

        if self.options.dry_run {
            self.preview(&node_name, pods, &controllers, outcome, sinks)
        } else {
            self.execute(&node_name, pods, &controllers, outcome, sinks)
                .await
        }
    }

    /// Lists the Pods hosted on the Node which match the configured pod selector, in the order they were listed.
    pub async fn select_target_pods(&self, node: &Node) -> Result<Vec<Pod>> {
        let node_name = node.name_any();
        let selector = LabelSelector::parse(&self.options.pod_selector).context(
            error::InvalidSelectorSnafu {
                node_name: &node_name,
            },
        )?;
        let field_selector =
            host_field_selector(<Node as k8s_openapi::Resource>::API_VERSION, &node_name);

        let pods = self
            .client
            .list_pods(&selector, &field_selector)
            .await
            .context(error::ListPodsSnafu {
                node_name: &node_name,
            })?;

        Ok(pods
            .into_iter()
            .filter(|pod| selector.matches(pod.labels()) && is_hosted_on(pod, &node_name))
            .collect())
    }

    async fn list_targets(&self, node: &Node) -> Result<(Vec<Pod>, Vec<ReplicationController>)> {
        let pods = self.select_target_pods(node).await?;
        let controllers = self
            .client
            .list_replication_controllers()
            .await
            .context(error::ListReplicationControllersSnafu {
                node_name: node.name_any(),
            })?;
        Ok((pods, controllers))
    }

    fn preview<O: Write, D: Write>(
        &self,
        node_name: &str,
        pods: Vec<Pod>,
        controllers: &[ReplicationController],
        mut outcome: NodeOutcome,
        sinks: &mut Sinks<O, D>,
    ) -> NodeOutcome {
        self.print_listing(node_name, &pods, sinks);
        outcome.listed = pods.len();

        let (backed, standalone) = partition(pods, controllers);
        event!(
            Level::INFO,
            controller_backed = backed.len(),
            standalone = standalone.len(),
            force = self.options.force,
            "Dry run complete, no Pods were deleted."
        );
        outcome.finish()
    }

    async fn execute<O: Write, D: Write>(
        &self,
        node_name: &str,
        pods: Vec<Pod>,
        controllers: &[ReplicationController],
        mut outcome: NodeOutcome,
        sinks: &mut Sinks<O, D>,
    ) -> NodeOutcome {
        let delete_options = self.options.delete_options();

        for (index, classified) in classify(pods, controllers).into_iter().enumerate() {
            let headers = if index == 0 {
                write_banner(MIGRATING_BANNER, node_name, &mut sinks.diagnostic);
                HeaderMode::WithHeaders
            } else {
                HeaderMode::NoHeaders
            };
            self.print_pod(&classified.pod, headers, &mut sinks.output);

            let namespace = classified
                .pod
                .namespace()
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
            let pod_name = classified.pod.name_any();

            if !classified.is_controller_backed() && !self.options.force {
                event!(
                    Level::INFO,
                    "Not deleting Pod '{}/{}': Pod is not backed by a ReplicationController",
                    namespace,
                    pod_name
                );
                outcome.skipped_unsafe += 1;
                continue;
            }

            match self
                .client
                .delete_pod(&namespace, &pod_name, &delete_options)
                .await
            {
                Ok(()) => outcome.deleted += 1,
                Err(source) => {
                    event!(
                        Level::ERROR,
                        "Unable to delete Pod '{}/{}': '{}'",
                        namespace,
                        pod_name,
                        source
                    );
                    outcome.errors.push(EvacuationError::DeletePod {
                        source,
                        node_name: node_name.to_string(),
                        namespace,
                        pod_name,
                    });
                }
            }
        }

        if outcome.skipped_unsafe > 0 {
            outcome.errors.push(EvacuationError::UnsafePodsRemain {
                node_name: node_name.to_string(),
                count: outcome.skipped_unsafe,
            });
        }

        outcome.finish()
    }

    fn print_listing<O: Write, D: Write>(
        &self,
        node_name: &str,
        pods: &[Pod],
        sinks: &mut Sinks<O, D>,
    ) {
        write_banner(LISTING_BANNER, node_name, &mut sinks.diagnostic);
        for (index, pod) in pods.iter().enumerate() {
            let headers = if index == 0 {
                HeaderMode::WithHeaders
            } else {
                HeaderMode::NoHeaders
            };
            self.print_pod(pod, headers, &mut sinks.output);
        }
    }

    /// Printing failures are logged but never fail an evacuation.
    fn print_pod<O: Write>(&self, pod: &Pod, headers: HeaderMode, out: &mut O) {
        if let Err(e) = self.printer.print_pod(pod, headers, out) {
            event!(Level::WARN, "Unable to print Pod '{}': '{}'", pod.name_any(), e);
        }
    }
}

fn write_banner<D: Write>(banner: &str, node_name: &str, diagnostic: &mut D) {
    if let Err(e) = write!(diagnostic, "\n{}{}\n\n", banner, node_name) {
        event!(Level::WARN, "Unable to write to diagnostic output: '{}'", e);
    }
}

fn is_hosted_on(pod: &Pod, node_name: &str) -> bool {
    pod.spec
        .as_ref()
        .and_then(|spec| spec.node_name.as_deref())
        == Some(node_name)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::outcome::NodeState;

    use k8s_openapi::api::core::v1::{NodeSpec, PodSpec, ReplicationControllerSpec};
    use kube::api::ObjectMeta;
    use kube::error::ErrorResponse;
    use maplit::btreemap;
    use models::client::{ClientError, DeleteOptions, MockEvacuationClient};
    use models::printer::TablePrinter;

    use std::collections::BTreeMap;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn fake_node(name: &str, unschedulable: bool) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: Some(NodeSpec {
                unschedulable: Some(unschedulable),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn fake_pod(name: &str, node_name: &str, pod_labels: &[(&str, &str)]) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                labels: Some(labels(pod_labels)),
                ..Default::default()
            },
            spec: Some(PodSpec {
                node_name: Some(node_name.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn fake_rc(selector: BTreeMap<String, String>) -> ReplicationController {
        ReplicationController {
            spec: Some(ReplicationControllerSpec {
                selector: Some(selector),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn app_x_rc() -> ReplicationController {
        fake_rc(btreemap! { "app".to_string() => "x".to_string() })
    }

    fn delete_error(namespace: &str, name: &str) -> ClientError {
        ClientError::DeletePod {
            source: kube::Error::Api(ErrorResponse {
                status: "Failure".to_string(),
                message: "the server could not process the request".to_string(),
                reason: "InternalError".to_string(),
                code: 500,
            }),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    fn list_error() -> ClientError {
        ClientError::ListReplicationControllers {
            source: kube::Error::Api(ErrorResponse {
                status: "Failure".to_string(),
                message: "replicationcontrollers is forbidden".to_string(),
                reason: "Forbidden".to_string(),
                code: 403,
            }),
        }
    }

    /// Expects exactly one listing of Pods on the given Node and of ReplicationControllers.
    fn expect_listings(
        client: &mut MockEvacuationClient,
        node_name: &str,
        pods: Vec<Pod>,
        controllers: Vec<ReplicationController>,
    ) {
        let field_selector = format!("spec.nodeName={}", node_name);
        client
            .expect_list_pods()
            .withf(move |_, fields: &str| fields == field_selector)
            .times(1)
            .returning(move |_, _| Ok(pods.clone()));
        client
            .expect_list_replication_controllers()
            .times(1)
            .returning(move || Ok(controllers.clone()));
    }

    fn evacuator(
        client: MockEvacuationClient,
        options: EvacuateOptions,
    ) -> Evacuator<MockEvacuationClient> {
        Evacuator::new(client, Box::new(TablePrinter), options)
    }

    fn sinks() -> Sinks<Vec<u8>, Vec<u8>> {
        Sinks::new(Vec::new(), Vec::new())
    }

    fn printed(sink: &[u8]) -> String {
        String::from_utf8(sink.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_schedulable_node_is_never_evacuated() {
        for dry_run in [false, true] {
            // The mock has no expectations, so any call to the client fails the test.
            let evacuator = evacuator(
                MockEvacuationClient::new(),
                EvacuateOptions {
                    dry_run,
                    force: true,
                    ..Default::default()
                },
            );
            let mut sinks = sinks();

            let outcome = evacuator
                .evacuate_node(&fake_node("n1", false), &mut sinks)
                .await;

            assert_eq!(outcome.state, NodeState::Aborted);
            assert_eq!(outcome.deleted, 0);
            assert_eq!(outcome.errors.len(), 1);
            assert!(matches!(outcome.errors[0], EvacuationError::Gate { .. }));
            assert!(sinks.output.is_empty());
        }
    }

    #[tokio::test]
    async fn test_backed_pods_deleted_and_standalone_pods_reported() {
        let mut client = MockEvacuationClient::new();
        expect_listings(
            &mut client,
            "n1",
            vec![
                fake_pod("p1", "n1", &[("app", "x")]),
                fake_pod("p2", "n1", &[("app", "y")]),
            ],
            vec![app_x_rc()],
        );
        client
            .expect_delete_pod()
            .withf(|namespace: &str, name: &str, options: &DeleteOptions| {
                namespace == "default" && name == "p1" && options.grace_period_seconds == 30
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let evacuator = evacuator(client, EvacuateOptions::default());
        let mut sinks = sinks();
        let report = evacuator.run(&[fake_node("n1", true)], &mut sinks).await;

        let outcome = &report.outcomes()[0];
        assert_eq!(outcome.state, NodeState::PartialFailure);
        assert_eq!(outcome.deleted, 1);
        assert_eq!(outcome.skipped_unsafe, 1);

        let output = printed(&sinks.output);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("NAMESPACE"));
        assert!(lines[1].contains("p1"));
        assert!(lines[2].contains("p2"));

        let diagnostic = printed(&sinks.diagnostic);
        assert_eq!(diagnostic.matches("Migrating these pods on node: n1").count(), 1);

        let aggregate = report.into_result().unwrap_err();
        assert_eq!(aggregate.errors().len(), 1);
        assert!(aggregate
            .to_string()
            .contains("not backed by replication controller"));
    }

    #[tokio::test]
    async fn test_standalone_pods_produce_one_error() {
        let mut client = MockEvacuationClient::new();
        expect_listings(
            &mut client,
            "n1",
            vec![
                fake_pod("p1", "n1", &[("app", "y")]),
                fake_pod("p2", "n1", &[]),
                fake_pod("p3", "n1", &[("tier", "db")]),
            ],
            vec![app_x_rc()],
        );
        client.expect_delete_pod().times(0);

        let evacuator = evacuator(client, EvacuateOptions::default());
        let outcome = evacuator
            .evacuate_node(&fake_node("n1", true), &mut sinks())
            .await;

        assert_eq!(outcome.deleted, 0);
        assert_eq!(outcome.skipped_unsafe, 3);
        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(
            outcome.errors[0],
            EvacuationError::UnsafePodsRemain { count: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_force_deletes_every_pod() {
        let mut client = MockEvacuationClient::new();
        expect_listings(
            &mut client,
            "n1",
            vec![
                fake_pod("p1", "n1", &[("app", "x")]),
                fake_pod("p2", "n1", &[("app", "y")]),
            ],
            vec![app_x_rc()],
        );
        for name in ["p1", "p2"] {
            client
                .expect_delete_pod()
                .withf(move |_, pod_name: &str, options: &DeleteOptions| {
                    pod_name == name && options.grace_period_seconds == 5
                })
                .times(1)
                .returning(|_, _, _| Ok(()));
        }

        let evacuator = evacuator(
            client,
            EvacuateOptions {
                force: true,
                grace_period_seconds: 5,
                ..Default::default()
            },
        );
        let outcome = evacuator
            .evacuate_node(&fake_node("n1", true), &mut sinks())
            .await;

        assert_eq!(outcome.state, NodeState::Success);
        assert_eq!(outcome.deleted, 2);
        assert_eq!(outcome.skipped_unsafe, 0);
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_prints_targets_without_deleting() {
        let mut client = MockEvacuationClient::new();
        expect_listings(
            &mut client,
            "n1",
            vec![
                fake_pod("p1", "n1", &[("app", "x")]),
                fake_pod("p2", "n1", &[("app", "y")]),
            ],
            vec![app_x_rc()],
        );
        client.expect_delete_pod().times(0);

        let evacuator = evacuator(
            client,
            EvacuateOptions {
                dry_run: true,
                force: true,
                ..Default::default()
            },
        );
        let mut sinks = sinks();
        let report = evacuator.run(&[fake_node("n1", true)], &mut sinks).await;

        let outcome = &report.outcomes()[0];
        assert_eq!(outcome.state, NodeState::Success);
        assert_eq!(outcome.listed, 2);
        assert_eq!(outcome.deleted, 0);

        let output = printed(&sinks.output);
        assert!(output.contains("p1") && output.contains("p2"));
        assert_eq!(output.matches("NAMESPACE").count(), 1);
        assert!(printed(&sinks.diagnostic).contains("Listing matched pods on node: n1"));
        assert!(report.into_result().is_ok());
    }

    #[tokio::test]
    async fn test_delete_failure_does_not_stop_node() {
        let mut client = MockEvacuationClient::new();
        expect_listings(
            &mut client,
            "n1",
            vec![
                fake_pod("p1", "n1", &[("app", "x")]),
                fake_pod("p2", "n1", &[("app", "x")]),
                fake_pod("p3", "n1", &[("app", "x")]),
            ],
            vec![app_x_rc()],
        );
        client
            .expect_delete_pod()
            .times(3)
            .returning(|namespace, name, _| {
                if name == "p2" {
                    Err(delete_error(namespace, name))
                } else {
                    Ok(())
                }
            });

        let evacuator = evacuator(client, EvacuateOptions::default());
        let outcome = evacuator
            .evacuate_node(&fake_node("n1", true), &mut sinks())
            .await;

        assert_eq!(outcome.state, NodeState::PartialFailure);
        assert_eq!(outcome.deleted, 2);
        assert_eq!(outcome.errors.len(), 1);
        match &outcome.errors[0] {
            EvacuationError::DeletePod {
                node_name,
                pod_name,
                ..
            } => {
                assert_eq!(node_name, "n1");
                assert_eq!(pod_name, "p2");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_node_does_not_stop_batch() {
        let mut client = MockEvacuationClient::new();
        expect_listings(
            &mut client,
            "b",
            vec![fake_pod("p1", "b", &[("app", "x")])],
            vec![app_x_rc()],
        );
        client
            .expect_delete_pod()
            .withf(|_, name: &str, _| name == "p1")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let evacuator = evacuator(client, EvacuateOptions::default());
        let report = evacuator
            .run(&[fake_node("a", false), fake_node("b", true)], &mut sinks())
            .await;

        let states: Vec<NodeState> = report.outcomes().iter().map(|o| o.state).collect();
        assert_eq!(states, vec![NodeState::Aborted, NodeState::Success]);
        assert_eq!(report.deleted(), 1);

        let aggregate = report.into_result().unwrap_err();
        assert_eq!(aggregate.errors().len(), 1);
        assert_eq!(aggregate.errors()[0].node_name(), "a");
        assert!(aggregate.to_string().contains("Node 'a'"));
        assert!(!aggregate.to_string().contains("'b'"));
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_node() {
        let mut client = MockEvacuationClient::new();
        client
            .expect_list_pods()
            .times(1)
            .returning(|_, _| Ok(vec![]));
        client
            .expect_list_replication_controllers()
            .times(1)
            .returning(|| Err(list_error()));

        let evacuator = evacuator(client, EvacuateOptions::default());
        let outcome = evacuator
            .evacuate_node(&fake_node("n1", true), &mut sinks())
            .await;

        assert_eq!(outcome.state, NodeState::Aborted);
        assert!(matches!(
            outcome.errors[0],
            EvacuationError::ListReplicationControllers { .. }
        ));
    }

    #[tokio::test]
    async fn test_invalid_selector_aborts_before_listing() {
        let evacuator = evacuator(
            MockEvacuationClient::new(),
            EvacuateOptions {
                pod_selector: "app in (x".to_string(),
                ..Default::default()
            },
        );
        let outcome = evacuator
            .evacuate_node(&fake_node("n1", true), &mut sinks())
            .await;

        assert_eq!(outcome.state, NodeState::Aborted);
        assert!(matches!(
            outcome.errors[0],
            EvacuationError::InvalidSelector { .. }
        ));
    }

    #[tokio::test]
    async fn test_targets_are_selected_pods_on_the_node() {
        let mut client = MockEvacuationClient::new();
        client
            .expect_list_pods()
            .withf(|selector: &LabelSelector, fields: &str| {
                selector.to_string() == "app=x" && fields == "spec.nodeName=n1"
            })
            .times(1)
            .returning(|_, _| {
                Ok(vec![
                    fake_pod("p1", "n1", &[("app", "x")]),
                    fake_pod("elsewhere", "n2", &[("app", "x")]),
                    fake_pod("unselected", "n1", &[("app", "y")]),
                ])
            });

        let evacuator = evacuator(
            client,
            EvacuateOptions {
                pod_selector: "app=x".to_string(),
                ..Default::default()
            },
        );
        let pods = evacuator
            .select_target_pods(&fake_node("n1", true))
            .await
            .unwrap();

        let names: Vec<String> = pods.iter().map(|pod| pod.name_any()).collect();
        assert_eq!(names, vec!["p1"]);
    }

    #[tokio::test]
    async fn test_rerun_after_deletion_succeeds() {
        let mut client = MockEvacuationClient::new();
        let mut listings = 0;
        client
            .expect_list_pods()
            .times(2)
            .returning(move |_, _| {
                listings += 1;
                if listings == 1 {
                    Ok(vec![fake_pod("p1", "n1", &[("app", "x")])])
                } else {
                    Ok(vec![])
                }
            });
        client
            .expect_list_replication_controllers()
            .times(2)
            .returning(|| Ok(vec![app_x_rc()]));
        client
            .expect_delete_pod()
            .times(1)
            .returning(|_, _, _| Ok(()));

        let evacuator = evacuator(client, EvacuateOptions::default());
        let nodes = [fake_node("n1", true)];

        let first = evacuator.run(&nodes, &mut sinks()).await;
        assert_eq!(first.deleted(), 1);
        assert!(first.into_result().is_ok());

        let second = evacuator.run(&nodes, &mut sinks()).await;
        assert_eq!(second.deleted(), 0);
        assert!(second.into_result().is_ok());
    }

    #[tokio::test]
    async fn test_list_pods_does_not_require_cordon() {
        let mut client = MockEvacuationClient::new();
        client
            .expect_list_pods()
            .times(1)
            .returning(|_, _| Ok(vec![fake_pod("p1", "n1", &[]), fake_pod("p2", "n1", &[])]));

        let evacuator = evacuator(client, EvacuateOptions::default());
        let mut sinks = sinks();
        let report = evacuator
            .list_pods(&[fake_node("n1", false)], &mut sinks)
            .await;

        assert_eq!(report.outcomes()[0].listed, 2);
        assert!(report.is_success());
        let output = printed(&sinks.output);
        assert!(output.find("p1").unwrap() < output.find("p2").unwrap());
    }
}
