//! Convoy - topology provisioning and deployment orchestrator
//!
//! Convoy reads a declarative topology (assembly, platforms, components,
//! variables, scaling) and converges a remote infrastructure control plane
//! toward it: creating what is missing, updating what drifted, deleting what
//! is no longer declared, then committing and triggering a deployment. It
//! also runs remote procedures, collects compute inventories, and drives an
//! external automation tool against them.

pub mod attrs;
pub mod cli;
pub mod client;
pub mod config;
pub mod deploy;
pub mod error;
pub mod events;
pub mod inventory;
pub mod models;
pub mod orchestrator;
pub mod poll;
pub mod pool;
pub mod procedure;
pub mod reconcile;
pub mod scaling;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
pub use client::{ControlPlane, HttpControlPlane};
pub use config::{load_topology, parse_topology};
pub use deploy::{DeploymentTrigger, TriggerOutcome};
pub use error::{ConvoyError, ConvoyResult};
pub use events::{ConsoleSink, EventSink, NoopSink, OrchestratorEvent};
pub use models::{
    AttrValue, ComponentSpec, DeploymentRecord, DeploymentStatus, PlatformSpec, ProcedureStatus,
    ScaleSpec, TopologySpec,
};
pub use orchestrator::{Orchestrator, OrchestratorOptions, ProcessOutcome};
pub use procedure::{ProcedureExecutor, ProcedureOutcome};
pub use reconcile::Reconciler;
pub use scaling::ScalingStage;
