//! Top-level provisioning orchestrator
//!
//! Sequences precondition checks, platform/variable reconciliation,
//! environment setup, scaling, and the deployment trigger into the end-to-end
//! create/update flow, reporting progress checkpoints through the event sink.
//! Progress is monotonically non-decreasing and reaches 100 on every exit
//! path, including errors.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::client::ControlPlane;
use crate::deploy::{DeploymentTrigger, TriggerOutcome};
use crate::error::ConvoyResult;
use crate::events::{EventSink, OrchestratorEvent};
use crate::models::{DeploymentRecord, DeploymentStatus, TopologySpec};
use crate::poll::Sleeper;
use crate::reconcile::{Reconciler, DEFAULT_DESCRIPTION};
use crate::scaling::ScalingStage;

/// Delay between environment update and the deployment guard check, giving
/// the control plane time to settle the committed design
pub const DEFAULT_SETTLING_DELAY: Duration = Duration::from_secs(1);

/// Assembly names are capped remotely; generated names must fit
pub const MAX_ASSEMBLY_NAME_LEN: usize = 32;

/// Caller-facing knobs for one orchestration run
#[derive(Debug, Clone, Default)]
pub struct OrchestratorOptions {
    /// Environment commit comment; blank falls back to the default description
    pub comment: Option<String>,
    /// Converge design and environment but skip the deployment trigger
    pub no_deploy: bool,
    /// Desired delivery-relay enablement, pushed best-effort
    pub enable_delivery_relay: bool,
}

/// Terminal outcome of one `process` run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// A deployment was triggered and is running
    Deployed(DeploymentRecord),
    /// The committed design had nothing to deploy; not a failure
    NothingToDeploy,
    /// The deployment trigger exhausted its retries with a genuine error
    DeploymentFailed(String),
    /// An existing deployment in this state blocked a new trigger
    Blocked(DeploymentStatus),
    /// Converged without deploying, as requested
    CreatedWithoutDeployment,
}

pub struct Orchestrator {
    client: Arc<dyn ControlPlane>,
    sink: Arc<dyn EventSink>,
    sleeper: Arc<dyn Sleeper>,
    options: OrchestratorOptions,
    settling_delay: Duration,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn ControlPlane>,
        sink: Arc<dyn EventSink>,
        sleeper: Arc<dyn Sleeper>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            client,
            sink,
            sleeper,
            options,
            settling_delay: DEFAULT_SETTLING_DELAY,
        }
    }

    pub fn with_settling_delay(mut self, delay: Duration) -> Self {
        self.settling_delay = delay;
        self
    }

    /// Run the full create/update sequence against the declared topology
    ///
    /// The topology is mutated in place: platforms are sorted into
    /// reconciliation order, auto-naming rewrites the assembly name, and
    /// attachment keys are stripped as they are consumed.
    pub fn process(
        &self,
        topology: &mut TopologySpec,
        is_update: bool,
    ) -> ConvoyResult<ProcessOutcome> {
        let progress = ProgressReporter::new(self.sink.clone());
        let result = self.run_sequence(topology, is_update, &progress);
        progress.emit(100);
        result
    }

    fn run_sequence(
        &self,
        topology: &mut TopologySpec,
        is_update: bool,
        progress: &ProgressReporter,
    ) -> ConvoyResult<ProcessOutcome> {
        progress.emit(1);
        topology.sort_platforms();
        if topology.auto_name && !is_update {
            topology.assembly = auto_assembly_name(&topology.assembly);
        }
        let description = topology
            .description
            .clone()
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());
        let environment = topology.environment.clone();

        let reconciler = Reconciler::new(self.client.clone(), self.sink.clone());
        let scaling = ScalingStage::new(self.client.clone(), self.sink.clone());

        reconciler.check_preconditions(topology, is_update)?;
        if !self.client.assembly_exists(&topology.assembly)? {
            self.client.create_assembly(&topology.assembly, &description)?;
        }
        progress.emit(5);

        reconciler.create_platforms(topology)?;
        progress.emit(15);

        if is_update {
            reconciler.update_platform_components(topology)?;
        }
        progress.emit(20);

        reconciler.update_platform_variables(topology)?;
        progress.emit(30);

        if !self.client.environment_exists(&environment)? {
            self.client.create_environment(&environment, &description)?;
        }
        if is_update {
            scaling.apply_redundancy(&environment, &topology.scales)?;
        }
        self.client.update_environment(&environment)?;
        progress.emit(40);

        self.sleeper.sleep(self.settling_delay);
        if is_update {
            if let Err(e) = self.client.pull_design(&topology.assembly) {
                self.sink.on_event(OrchestratorEvent::DesignPullFailed {
                    error: e.to_string(),
                });
            }
        }
        progress.emit(50);

        let status = self.client.environment_deployment_status(&environment)?;
        if matches!(status, DeploymentStatus::Active | DeploymentStatus::Failed) {
            self.sink
                .on_event(OrchestratorEvent::BlockedByExistingDeployment { status });
            return Ok(ProcessOutcome::Blocked(status));
        }

        scaling.apply_scaling(&environment, &topology.scales, self.options.comment.as_deref())?;
        progress.emit(70);

        if let Err(e) = self
            .client
            .set_delivery_relay(&environment, self.options.enable_delivery_relay)
        {
            self.sink.on_event(OrchestratorEvent::RelayUpdateFailed {
                error: e.to_string(),
            });
        }
        if is_update {
            let comment = match self.options.comment.as_deref() {
                Some(c) if !c.trim().is_empty() => c,
                _ => DEFAULT_DESCRIPTION,
            };
            self.client.commit_environment(&environment, comment)?;
        }

        if self.options.no_deploy {
            self.sink.on_event(OrchestratorEvent::CreatedWithoutDeployment);
            return Ok(ProcessOutcome::CreatedWithoutDeployment);
        }

        let trigger =
            DeploymentTrigger::new(self.client.clone(), self.sink.clone(), self.sleeper.clone());
        let outcome = match trigger.trigger(&environment) {
            TriggerOutcome::Deployed(record) => ProcessOutcome::Deployed(record),
            TriggerOutcome::NothingToDeploy => ProcessOutcome::NothingToDeploy,
            TriggerOutcome::Failed(message) => ProcessOutcome::DeploymentFailed(message),
        };
        Ok(outcome)
    }

    /// Current deployment status of the topology's environment
    pub fn status(&self, topology: &TopologySpec) -> ConvoyResult<DeploymentStatus> {
        self.client
            .environment_deployment_status(&topology.environment)
    }

    /// Look up a specific deployment by id
    pub fn deployment(
        &self,
        topology: &TopologySpec,
        deployment_id: u64,
    ) -> ConvoyResult<DeploymentRecord> {
        self.client
            .get_deployment(&topology.environment, deployment_id)
    }

    /// Tear down the assembly: every environment, then every platform, then
    /// the assembly itself. Returns false when the assembly does not exist
    /// (nothing to remove, not an error).
    pub fn remove(&self, topology: &TopologySpec) -> ConvoyResult<bool> {
        if !self.client.assembly_exists(&topology.assembly)? {
            return Ok(false);
        }
        for environment in self.client.list_environments()? {
            self.client.delete_environment(&environment)?;
        }
        for platform in self.client.list_platforms()? {
            self.client.delete_platform(&platform)?;
        }
        self.client.delete_assembly(&topology.assembly)?;
        Ok(true)
    }

    /// Re-trigger the environment's last failed deployment
    pub fn retry_deployment(&self, topology: &TopologySpec) -> ConvoyResult<DeploymentRecord> {
        self.client.retry_deployment(&topology.environment)
    }
}

/// Fresh assembly name for auto-naming: base plus a time-derived suffix,
/// capped at the remote name-length limit
pub fn auto_assembly_name(base: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let mut name = format!("{}-{:08x}", base, nanos);
    // The cap is in bytes; back off to a char boundary so multibyte base
    // names cannot split a character.
    let mut cut = MAX_ASSEMBLY_NAME_LEN.min(name.len());
    while !name.is_char_boundary(cut) {
        cut -= 1;
    }
    name.truncate(cut);
    name
}

/// Monotonic progress emitter; late checkpoints never regress earlier ones
struct ProgressReporter {
    sink: Arc<dyn EventSink>,
    last: AtomicU8,
}

impl ProgressReporter {
    fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            last: AtomicU8::new(0),
        }
    }

    fn emit(&self, pct: u8) {
        if pct >= self.last.load(Ordering::Relaxed) {
            self.last.store(pct, Ordering::Relaxed);
            self.sink.on_event(OrchestratorEvent::Progress(pct));
        }
    }
}
