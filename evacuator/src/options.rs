use models::client::DeleteOptions;
use models::constants::DEFAULT_GRACE_PERIOD_SECONDS;

use snafu::ensure;

/// Settings for an evacuation, applied to every targeted Node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EvacuateOptions {
    /// Label selector restricting which Pods on a Node are targeted. Empty targets every Pod.
    pub pod_selector: String,
    /// Print the targeted Pods without deleting anything.
    pub dry_run: bool,
    /// Also delete Pods which no ReplicationController would recreate.
    pub force: bool,
    /// Seconds each deleted Pod is given to terminate cleanly.
    pub grace_period_seconds: i64,
}

impl Default for EvacuateOptions {
    fn default() -> Self {
        EvacuateOptions {
            pod_selector: String::new(),
            dry_run: false,
            force: false,
            grace_period_seconds: DEFAULT_GRACE_PERIOD_SECONDS,
        }
    }
}

impl EvacuateOptions {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (0..=i64::from(u32::MAX)).contains(&self.grace_period_seconds),
            error::GracePeriodSnafu {
                grace_period_seconds: self.grace_period_seconds,
            }
        );
        Ok(())
    }

    /// The options sent along with every Pod deletion.
    pub fn delete_options(&self) -> DeleteOptions {
        DeleteOptions {
            grace_period_seconds: self.grace_period_seconds,
        }
    }
}

pub mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum OptionsError {
        #[snafu(display(
            "Grace period must be between 0 and {} seconds, got {}",
            u32::MAX,
            grace_period_seconds
        ))]
        GracePeriod { grace_period_seconds: i64 },
    }
}

type Result<T> = std::result::Result<T, OptionsError>;
pub use error::OptionsError;
