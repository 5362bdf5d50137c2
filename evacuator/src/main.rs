use evacuator::nodes::{NodeTarget, NodeTargetError};
use evacuator::options::{EvacuateOptions, OptionsError};
use evacuator::outcome::AggregateError;
use evacuator::sink::Sinks;
use evacuator::Evacuator;
use models::client::K8SEvacuationClient;
use models::constants::DEFAULT_GRACE_PERIOD_SECONDS;
use models::printer::{printer_for, OutputFormat};
use models::telemetry;

use argh::FromArgs;
use snafu::ResultExt;
use tracing::{event, Level};

use std::process;

/// The module-wide result type.
type Result<T> = std::result::Result<T, main_error::Error>;

#[derive(FromArgs, Debug)]
/// Delete the pods from cordoned nodes so that their replication controllers recreate them elsewhere.
struct Args {
    /// names of the nodes to evacuate
    #[argh(positional)]
    nodes: Vec<String>,

    /// label selector choosing the nodes to evacuate instead of naming them
    #[argh(option, short = 'l')]
    selector: Option<String>,

    /// label selector restricting which pods are evacuated
    #[argh(option, default = "String::new()")]
    pod_selector: String,

    /// seconds each pod is given to terminate cleanly
    #[argh(option, default = "DEFAULT_GRACE_PERIOD_SECONDS")]
    grace_period: i64,

    /// print the pods that would be evacuated without deleting them
    #[argh(switch)]
    dry_run: bool,

    /// also delete pods which are not backed by a replication controller
    #[argh(switch)]
    force: bool,

    /// print the pods matched on each node, cordoned or not, and exit
    #[argh(switch)]
    list_pods: bool,

    /// output format for printed pods: table, json or yaml
    #[argh(option, short = 'o', default = "OutputFormat::Table")]
    output: OutputFormat,
}

#[tokio::main]
async fn main() {
    let args: Args = argh::from_env();
    if let Err(e) = run(args).await {
        eprintln!("{}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    telemetry::init_telemetry_from_env().context(main_error::TelemetryInitSnafu)?;

    let options = EvacuateOptions {
        pod_selector: args.pod_selector,
        dry_run: args.dry_run,
        force: args.force,
        grace_period_seconds: args.grace_period,
    };
    options.validate().context(main_error::InvalidOptionsSnafu)?;

    let target = NodeTarget::new(args.nodes, args.selector).context(main_error::NodeTargetSnafu)?;

    let k8s_client = kube::Client::try_default()
        .await
        .context(main_error::ClientCreateSnafu)?;
    let nodes = target
        .resolve(&k8s_client)
        .await
        .context(main_error::NodeTargetSnafu)?;

    let evacuator = Evacuator::new(
        K8SEvacuationClient::new(k8s_client),
        printer_for(args.output),
        options,
    );
    let mut sinks = Sinks::stdio();

    let report = if args.list_pods {
        evacuator.list_pods(&nodes, &mut sinks).await
    } else {
        evacuator.run(&nodes, &mut sinks).await
    };

    event!(
        Level::INFO,
        nodes = report.outcomes().len(),
        deleted = report.deleted(),
        skipped_unsafe = report.skipped_unsafe(),
        "Evacuation finished."
    );
    report
        .into_result()
        .context(main_error::EvacuationSnafu)?;
    Ok(())
}

pub mod main_error {
    use super::{AggregateError, NodeTargetError, OptionsError};
    use models::telemetry;
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum Error {
        #[snafu(display("Error configuring telemetry: '{}'", source))]
        TelemetryInit {
            source: telemetry::TelemetryConfigError,
        },

        #[snafu(display("{}", source))]
        InvalidOptions { source: OptionsError },

        #[snafu(display("{}", source))]
        NodeTarget { source: NodeTargetError },

        #[snafu(display("Unable to create Kubernetes client: '{}'", source))]
        ClientCreate { source: kube::Error },

        #[snafu(display("{}", source))]
        Evacuation { source: AggregateError },
    }
}
