//! Orchestration Event Port
//!
//! Provides an observable interface for the provisioning flow. Enables
//! progress reporting and keeps the orchestrator free of direct console IO.

use crate::models::DeploymentStatus;

/// Event emitted during orchestration
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    /// Progress checkpoint, 0-100, monotonically non-decreasing
    Progress(u8),

    /// Platform reconciliation started
    CreatingPlatform { name: String },

    /// Platform was created remotely
    PlatformCreated { name: String },

    /// Platform already existed remotely
    PlatformExists { name: String },

    /// Component attribute batch is being applied
    UpdatingComponent { platform: String, component: String },

    /// An attribute entry had an unrecognized shape and was skipped
    UnknownAttributeShape { platform: String, component: String, attribute: String },

    /// A pooled component update failed; the rest of the batch continues
    ComponentUpdateFailed {
        platform: String,
        unique_name: String,
        error: String,
    },

    /// Attachment reconciliation failed; the topology continues converging
    AttachmentSkipped {
        platform: String,
        component: String,
        error: String,
    },

    /// Redundancy config pushed for a platform/component
    ScalingApplied { platform: String, component: String },

    /// Best-effort design pull failed; non-fatal
    DesignPullFailed { error: String },

    /// Delivery-relay update failed; non-fatal
    RelayUpdateFailed { error: String },

    /// An existing deployment blocked a new trigger
    BlockedByExistingDeployment { status: DeploymentStatus },

    /// Deployment trigger loop started
    StartingDeployment,

    /// Deployment accepted by the control plane
    DeploymentRunning { id: u64 },

    /// Exhausted retries with the "nothing to deploy" marker; informational
    NoNeedToDeploy,

    /// Exhausted retries with a genuine failure
    DeploymentFailed { error: String },

    /// Environment created/updated without deploying, as requested
    CreatedWithoutDeployment,
}

/// Trait for receiving orchestration events
///
/// Implementations can be:
/// - ConsoleSink: human-readable progress in the terminal
/// - NoopSink: silent operation (library embedding, tests)
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: OrchestratorEvent);
}

/// No-op event sink for silent operation
pub struct NoopSink;

impl EventSink for NoopSink {
    fn on_event(&self, _event: OrchestratorEvent) {}
}

/// Console sink used by the CLI
pub struct ConsoleSink {
    /// Suppress informational output, keep failures
    pub quiet: bool,
}

impl EventSink for ConsoleSink {
    fn on_event(&self, event: OrchestratorEvent) {
        use OrchestratorEvent::*;
        match event {
            DeploymentFailed { error } => eprintln!("Deployment failed: {}", error),
            RelayUpdateFailed { .. } => eprintln!("Cannot update relay!"),
            _ if self.quiet => {}
            Progress(pct) => println!("[{:>3}%]", pct),
            CreatingPlatform { name } => println!("Creating platform {} ...", name),
            PlatformCreated { name } => println!("Platform {} created.", name),
            PlatformExists { name } => println!("Platform {} already exists.", name),
            UpdatingComponent { platform, component } => {
                println!("Updating component {} of platform {}.", component, platform)
            }
            UnknownAttributeShape { platform, component, attribute } => println!(
                "Skipping attribute {} of {}/{}: unknown shape.",
                attribute, platform, component
            ),
            ComponentUpdateFailed {
                platform,
                unique_name,
                error,
            } => println!(
                "Failed to update {} of platform {}: {}",
                unique_name, platform, error
            ),
            AttachmentSkipped {
                platform,
                component,
                error,
            } => println!(
                "Skipping attachments of {}/{}: {}",
                platform, component, error
            ),
            ScalingApplied { platform, component } => {
                println!("Updated scaling of {}/{}.", platform, component)
            }
            DesignPullFailed { error } => println!("Design pull skipped: {}", error),
            BlockedByExistingDeployment { status } => println!(
                "A deployment in state {:?} already exists; not deploying.",
                status
            ),
            StartingDeployment => println!("Starting deployment ..."),
            DeploymentRunning { id } => println!("Deployment {} is running.", id),
            NoNeedToDeploy => println!("No need to deploy."),
            CreatedWithoutDeployment => println!("Created without deployment."),
        }
    }
}
