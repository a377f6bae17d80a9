//! Deployment trigger with bounded retry
//!
//! State machine: Idle -> Deploying -> {Succeeded, Exhausted}. Each attempt
//! is preceded by a fixed delay; on exhaustion the last error decides between
//! a neutral "nothing to deploy" outcome and a hard failure. This stage never
//! errors past the orchestrator: it reports through the event sink and
//! returns an outcome.

use std::sync::Arc;
use std::time::Duration;

use crate::client::ControlPlane;
use crate::events::{EventSink, OrchestratorEvent};
use crate::models::DeploymentRecord;
use crate::poll::Sleeper;

/// Error-message substring the control plane uses when the committed design
/// has no differences to deploy
pub const NOTHING_TO_DEPLOY_MARKER: &str = "no deployment";

/// Default attempt bound
pub const DEFAULT_RETRIES: u32 = 6;

/// Default delay before each attempt
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Result of the trigger loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A deployment was accepted and is running
    Deployed(DeploymentRecord),
    /// All attempts failed with the nothing-to-deploy marker; not an error
    NothingToDeploy,
    /// All attempts failed with a genuine error
    Failed(String),
}

pub struct DeploymentTrigger {
    client: Arc<dyn ControlPlane>,
    sink: Arc<dyn EventSink>,
    sleeper: Arc<dyn Sleeper>,
    retries: u32,
    delay: Duration,
}

impl DeploymentTrigger {
    pub fn new(
        client: Arc<dyn ControlPlane>,
        sink: Arc<dyn EventSink>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            client,
            sink,
            sleeper,
            retries: DEFAULT_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run the bounded retry loop and report the outcome through the sink
    pub fn trigger(&self, environment: &str) -> TriggerOutcome {
        self.sink.on_event(OrchestratorEvent::StartingDeployment);
        let mut remaining = self.retries;
        let mut last_error = String::new();
        while remaining > 0 {
            self.sleeper.sleep(self.delay);
            match self.client.trigger_deployment(environment) {
                Ok(record) => {
                    self.sink
                        .on_event(OrchestratorEvent::DeploymentRunning { id: record.id });
                    return TriggerOutcome::Deployed(record);
                }
                Err(e) => {
                    last_error = e.to_string();
                    remaining -= 1;
                }
            }
        }
        if last_error.contains(NOTHING_TO_DEPLOY_MARKER) {
            self.sink.on_event(OrchestratorEvent::NoNeedToDeploy);
            TriggerOutcome::NothingToDeploy
        } else {
            self.sink.on_event(OrchestratorEvent::DeploymentFailed {
                error: last_error.clone(),
            });
            TriggerOutcome::Failed(last_error)
        }
    }
}
