//! Human and machine readable representations of Pods, written as they are processed.
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::ResourceExt;
use serde::Deserialize;
use snafu::ResultExt;

use std::io::Write;
use std::str::FromStr;

const UNKNOWN: &str = "<unknown>";

/// Whether a printed Pod is preceded by column headers (or, for document formats, is the first document).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HeaderMode {
    WithHeaders,
    NoHeaders,
}

/// The format used to print Pods.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    /// Fixed-width columns, one line per Pod.
    Table,
    /// A pretty-printed JSON document per Pod.
    Json,
    /// A YAML document per Pod, separated by `---`.
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = serde_plain::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        serde_plain::from_str(s)
    }
}

/// Writes a representation of a Pod to an output stream.
pub trait PodPrinter {
    fn print_pod(&self, pod: &Pod, headers: HeaderMode, out: &mut dyn Write) -> Result<()>;
}

/// Returns the printer for the given output format.
pub fn printer_for(format: OutputFormat) -> Box<dyn PodPrinter + Send + Sync> {
    match format {
        OutputFormat::Table => Box::new(TablePrinter),
        OutputFormat::Json => Box::new(JsonPrinter),
        OutputFormat::Yaml => Box::new(YamlPrinter),
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct TablePrinter;

impl TablePrinter {
    fn write_row(out: &mut dyn Write, columns: [&str; 6]) -> Result<()> {
        writeln!(
            out,
            "{:<20} {:<40} {:<7} {:<12} {:<10} {}",
            columns[0], columns[1], columns[2], columns[3], columns[4], columns[5]
        )
        .context(error::WriteSnafu)
    }
}

impl PodPrinter for TablePrinter {
    fn print_pod(&self, pod: &Pod, headers: HeaderMode, out: &mut dyn Write) -> Result<()> {
        if headers == HeaderMode::WithHeaders {
            Self::write_row(
                out,
                ["NAMESPACE", "NAME", "READY", "STATUS", "RESTARTS", "AGE"],
            )?;
        }

        let namespace = pod.namespace().unwrap_or_default();
        let name = pod.name_any();
        let ready = ready_containers(pod);
        let status = pod_status(pod);
        let restarts = restart_count(pod).to_string();
        let age = short_human_duration(pod.metadata.creation_timestamp.as_ref(), Utc::now());

        Self::write_row(out, [&namespace, &name, &ready, &status, &restarts, &age])
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct JsonPrinter;

impl PodPrinter for JsonPrinter {
    fn print_pod(&self, pod: &Pod, _headers: HeaderMode, out: &mut dyn Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut *out, pod).context(error::SerializeJsonSnafu)?;
        writeln!(out).context(error::WriteSnafu)
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct YamlPrinter;

impl PodPrinter for YamlPrinter {
    fn print_pod(&self, pod: &Pod, headers: HeaderMode, out: &mut dyn Write) -> Result<()> {
        let document = serde_yaml::to_string(pod).context(error::SerializeYamlSnafu)?;
        if headers == HeaderMode::NoHeaders {
            writeln!(out, "---").context(error::WriteSnafu)?;
        }
        out.write_all(document.as_bytes())
            .context(error::WriteSnafu)
    }
}

/// `ready/total` containers, counting every container declared in the Pod spec.
fn ready_containers(pod: &Pod) -> String {
    let total = pod
        .spec
        .as_ref()
        .map_or(0, |spec| spec.containers.len());
    let ready = pod
        .status
        .as_ref()
        .and_then(|status| status.container_statuses.as_ref())
        .map_or(0, |statuses| statuses.iter().filter(|s| s.ready).count());
    format!("{}/{}", ready, total)
}

fn pod_status(pod: &Pod) -> String {
    if pod.metadata.deletion_timestamp.is_some() {
        return "Terminating".to_string();
    }
    pod.status
        .as_ref()
        .and_then(|status| status.reason.clone().or_else(|| status.phase.clone()))
        .unwrap_or_else(|| "Unknown".to_string())
}

fn restart_count(pod: &Pod) -> i32 {
    pod.status
        .as_ref()
        .and_then(|status| status.container_statuses.as_ref())
        .map_or(0, |statuses| statuses.iter().map(|s| s.restart_count).sum())
}

/// Formats the time elapsed since `since` the way `kubectl` does, e.g. `45s`, `12m`, `3d`.
fn short_human_duration(since: Option<&Time>, now: DateTime<Utc>) -> String {
    let since = match since {
        Some(Time(since)) => since,
        None => return UNKNOWN.to_string(),
    };

    let seconds = now.signed_duration_since(*since).num_seconds();
    if seconds < -1 {
        return "<invalid>".to_string();
    }

    let seconds = seconds.max(0);
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;
    if seconds < 60 {
        format!("{}s", seconds)
    } else if minutes < 60 {
        format!("{}m", minutes)
    } else if hours < 24 {
        format!("{}h", hours)
    } else if days < 365 {
        format!("{}d", days)
    } else {
        format!("{}y", days / 365)
    }
}

pub mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum PrintError {
        #[snafu(display("Unable to write Pod to output: '{}'", source))]
        Write { source: std::io::Error },

        #[snafu(display("Unable to serialize Pod as JSON: '{}'", source))]
        SerializeJson { source: serde_json::Error },

        #[snafu(display("Unable to serialize Pod as YAML: '{}'", source))]
        SerializeYaml { source: serde_yaml::Error },
    }
}

type Result<T> = std::result::Result<T, PrintError>;
pub use error::PrintError;

#[cfg(test)]
mod test {
    use super::*;
    use crate::pod::test::fake_pod;
    use chrono::Duration;
    use k8s_openapi::api::core::v1::{Container, ContainerStatus, PodSpec, PodStatus};

    fn print(printer: &dyn PodPrinter, pods: &[Pod]) -> String {
        let mut out = Vec::new();
        for (index, pod) in pods.iter().enumerate() {
            let headers = if index == 0 {
                HeaderMode::WithHeaders
            } else {
                HeaderMode::NoHeaders
            };
            printer.print_pod(pod, headers, &mut out).unwrap();
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_output_format_from_str() {
        let test_cases = vec![
            ("table", Some(OutputFormat::Table)),
            ("json", Some(OutputFormat::Json)),
            ("yaml", Some(OutputFormat::Yaml)),
            ("xml", None),
        ];
        for (input, expected) in test_cases {
            assert_eq!(OutputFormat::from_str(input).ok(), expected);
        }
    }

    #[test]
    fn test_table_headers_only_when_requested() {
        let output = print(
            &TablePrinter,
            &[fake_pod("p1", &[("app", "x")]), fake_pod("p2", &[])],
        );
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("NAMESPACE"));
        assert!(lines[1].starts_with("default") && lines[1].contains("p1"));
        assert!(lines[2].contains("p2"));
        assert_eq!(output.matches("NAMESPACE").count(), 1);
    }

    #[test]
    fn test_table_columns() {
        let mut pod = fake_pod("web-0", &[]);
        pod.spec = Some(PodSpec {
            containers: vec![Container::default(), Container::default()],
            ..Default::default()
        });
        pod.status = Some(PodStatus {
            phase: Some("Running".to_string()),
            container_statuses: Some(vec![
                ContainerStatus {
                    ready: true,
                    restart_count: 2,
                    ..Default::default()
                },
                ContainerStatus {
                    ready: false,
                    restart_count: 1,
                    ..Default::default()
                },
            ]),
            ..Default::default()
        });

        let output = print(&TablePrinter, &[pod]);
        let row: Vec<&str> = output.lines().nth(1).unwrap().split_whitespace().collect();
        assert_eq!(row, vec!["default", "web-0", "1/2", "Running", "3", UNKNOWN]);
    }

    #[test]
    fn test_short_human_duration() {
        let now = Utc::now();
        let test_cases = vec![
            (None, UNKNOWN),
            (Some(now), "0s"),
            (Some(now - Duration::seconds(45)), "45s"),
            (Some(now - Duration::minutes(12)), "12m"),
            (Some(now - Duration::hours(5)), "5h"),
            (Some(now - Duration::days(3)), "3d"),
            (Some(now - Duration::days(800)), "2y"),
            (Some(now + Duration::minutes(5)), "<invalid>"),
        ];

        for (since, expected) in test_cases {
            assert_eq!(short_human_duration(since.map(Time).as_ref(), now), expected);
        }
    }

    #[test]
    fn test_yaml_separates_documents() {
        let output = print(&YamlPrinter, &[fake_pod("p1", &[]), fake_pod("p2", &[])]);
        assert!(!output.starts_with("---"));
        assert_eq!(output.matches("---\n").count(), 1);
        assert!(output.find("name: p1").unwrap() < output.find("name: p2").unwrap());
    }

    #[test]
    fn test_json_prints_every_pod() {
        let output = print(&JsonPrinter, &[fake_pod("p1", &[]), fake_pod("p2", &[])]);
        assert!(output.contains(r#""name": "p1""#));
        assert!(output.contains(r#""name": "p2""#));
        assert!(output.contains(r#""kind": "Pod""#));
    }
}
