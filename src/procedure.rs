//! Procedure executor
//!
//! Runs a named action against a platform/component (optionally on a subset
//! of instances at a rollout percentage) and polls the asynchronous run until
//! it leaves {active, pending}. `action == "list"` and an instance filter of
//! `"list"` short-circuit to enumeration without executing anything.

use std::sync::Arc;
use std::time::Duration;

use crate::client::ControlPlane;
use crate::error::{ConvoyError, ConvoyResult};
use crate::models::ProcedureStatus;
use crate::poll::{poll_status, Sleeper};

/// Fixed status poll interval
pub const PROCEDURE_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default rollout percentage
pub const DEFAULT_ROLLOUT_PERCENT: u32 = 100;

/// Terminal result of a procedure invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcedureOutcome {
    /// The run reached `complete`
    Completed,
    /// `action == "list"`: available actions, nothing executed
    ActionsListed(Vec<String>),
    /// Instance filter was `"list"`: instance names, nothing executed
    InstancesListed(Vec<String>),
    /// The run ended in any non-complete state
    NotComplete(ProcedureStatus),
    /// The action could not even be submitted
    SubmitFailed(String),
}

pub struct ProcedureExecutor {
    client: Arc<dyn ControlPlane>,
    sleeper: Arc<dyn Sleeper>,
    interval: Duration,
}

impl ProcedureExecutor {
    pub fn new(client: Arc<dyn ControlPlane>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            client,
            sleeper,
            interval: PROCEDURE_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run an action to a terminal outcome
    ///
    /// Fails with `ConvoyError::Validation` when the argument blob is not
    /// valid JSON; remote submit failures are an outcome, not an error.
    pub fn run(
        &self,
        platform: &str,
        component: &str,
        action: &str,
        args_json: &str,
        instance_filter: Option<&str>,
        rollout_percent: u32,
    ) -> ConvoyResult<ProcedureOutcome> {
        validate_args(args_json)?;

        if let Some(filter) = instance_filter {
            if filter.eq_ignore_ascii_case("list") {
                let instances = self.client.list_instances(platform, component)?;
                return Ok(ProcedureOutcome::InstancesListed(instances));
            }
        }
        if action.eq_ignore_ascii_case("list") {
            let actions = self.client.list_actions(platform, component)?;
            return Ok(ProcedureOutcome::ActionsListed(actions));
        }

        let instances: Option<Vec<String>> = instance_filter.map(|filter| {
            filter
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let procedure_id = match self.client.execute_procedure(
            platform,
            component,
            action,
            args_json,
            instances.as_deref(),
            rollout_percent,
        ) {
            Ok(id) => id,
            Err(ConvoyError::Validation(message)) => {
                return Err(ConvoyError::Validation(message))
            }
            Err(e) => return Ok(ProcedureOutcome::SubmitFailed(e.to_string())),
        };

        // A polling error abandons the wait; the last observed status stays
        // non-complete and maps to a failure outcome below.
        let status = poll_status(
            self.interval,
            None,
            &*self.sleeper,
            ProcedureStatus::Active,
            || self.client.procedure_status(procedure_id),
            |status| !status.is_running(),
        );

        if status == ProcedureStatus::Complete {
            Ok(ProcedureOutcome::Completed)
        } else {
            Ok(ProcedureOutcome::NotComplete(status))
        }
    }
}

fn validate_args(args_json: &str) -> ConvoyResult<()> {
    if args_json.trim().is_empty() {
        return Ok(());
    }
    serde_json::from_str::<serde_json::Value>(args_json)
        .map(|_| ())
        .map_err(|e| ConvoyError::Validation(format!("procedure arguments: {}", e)))
}
