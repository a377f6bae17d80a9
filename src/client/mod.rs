//! Remote Control-Plane Port
//!
//! Abstracts the infrastructure-as-code control plane behind a trait so the
//! orchestrator, reconciler, and executors never depend on a transport.
//! One method call corresponds to one remote request; any call may fail
//! transiently and surfaces as `ConvoyError::RemoteApi`.

mod http;

pub use http::HttpControlPlane;

use std::collections::BTreeMap;

use crate::error::ConvoyResult;
use crate::models::{
    AttrMap, ComputeNode, DeploymentRecord, DeploymentStatus, PlatformSpec, ProcedureStatus,
    RedundancyConfig, RemoteComponent, RemoteVariable,
};

/// Synchronous client for the remote control plane
///
/// Design-time operations mutate the assembly's design; run-time operations
/// act on the environment (commits, scaling, deployments, procedures).
/// The session/credentials behind an implementation are shared read-only
/// across worker threads, so the trait requires `Send + Sync`.
pub trait ControlPlane: Send + Sync {
    // -- assembly --

    fn assembly_exists(&self, assembly: &str) -> ConvoyResult<bool>;

    fn create_assembly(&self, assembly: &str, description: &str) -> ConvoyResult<()>;

    /// Delete the assembly itself; environments and platforms go first
    fn delete_assembly(&self, assembly: &str) -> ConvoyResult<()>;

    // -- design-time --

    /// Probe a platform; `Ok(false)` means it does not exist
    fn platform_exists(&self, platform: &str) -> ConvoyResult<bool>;

    fn create_platform(&self, platform: &PlatformSpec, description: &str) -> ConvoyResult<()>;

    /// All platform names in the assembly's design
    fn list_platforms(&self) -> ConvoyResult<Vec<String>>;

    fn delete_platform(&self, platform: &str) -> ConvoyResult<()>;

    /// Persist pending structural design changes
    fn commit_design(&self) -> ConvoyResult<()>;

    fn list_platform_components(&self, platform: &str) -> ConvoyResult<Vec<RemoteComponent>>;

    /// Current attributes of a component instance, `None` if it does not exist
    fn get_platform_component(
        &self,
        platform: &str,
        unique_name: &str,
    ) -> ConvoyResult<Option<AttrMap>>;

    fn add_platform_component(
        &self,
        platform: &str,
        component: &str,
        unique_name: &str,
        attributes: &AttrMap,
    ) -> ConvoyResult<()>;

    fn update_platform_component(
        &self,
        platform: &str,
        unique_name: &str,
        attributes: &AttrMap,
    ) -> ConvoyResult<()>;

    fn delete_platform_component(&self, platform: &str, component: &str) -> ConvoyResult<()>;

    fn list_platform_variables(&self, platform: &str) -> ConvoyResult<Vec<RemoteVariable>>;

    fn upsert_platform_variable(
        &self,
        platform: &str,
        name: &str,
        value: &str,
        secure: bool,
    ) -> ConvoyResult<()>;

    fn delete_platform_variable(&self, platform: &str, name: &str) -> ConvoyResult<()>;

    /// Batch replace of a platform's links (not incremental)
    fn update_platform_links(&self, platform: &str, links: &[String]) -> ConvoyResult<()>;

    fn attachment_exists(
        &self,
        platform: &str,
        component: &str,
        attachment: &str,
    ) -> ConvoyResult<bool>;

    fn add_attachment(
        &self,
        platform: &str,
        component: &str,
        attachment: &str,
        attributes: &AttrMap,
    ) -> ConvoyResult<()>;

    fn update_attachment(
        &self,
        platform: &str,
        component: &str,
        attachment: &str,
        attributes: &AttrMap,
    ) -> ConvoyResult<()>;

    /// Refresh the design from the latest pack; best-effort for callers
    fn pull_design(&self, assembly: &str) -> ConvoyResult<()>;

    // -- run-time --

    fn environment_exists(&self, environment: &str) -> ConvoyResult<bool>;

    fn create_environment(&self, environment: &str, description: &str) -> ConvoyResult<()>;

    /// All environment names under the assembly
    fn list_environments(&self) -> ConvoyResult<Vec<String>>;

    fn delete_environment(&self, environment: &str) -> ConvoyResult<()>;

    /// Re-attach/update the environment after design changes
    fn update_environment(&self, environment: &str) -> ConvoyResult<()>;

    fn commit_environment(&self, environment: &str, comment: &str) -> ConvoyResult<()>;

    fn update_redundancy(
        &self,
        environment: &str,
        platform: &str,
        component: &str,
        config: &RedundancyConfig,
    ) -> ConvoyResult<()>;

    fn set_delivery_relay(&self, environment: &str, enabled: bool) -> ConvoyResult<()>;

    fn trigger_deployment(&self, environment: &str) -> ConvoyResult<DeploymentRecord>;

    /// Status of the environment's current deployment, if any
    fn environment_deployment_status(&self, environment: &str) -> ConvoyResult<DeploymentStatus>;

    fn get_deployment(
        &self,
        environment: &str,
        deployment_id: u64,
    ) -> ConvoyResult<DeploymentRecord>;

    fn retry_deployment(&self, environment: &str) -> ConvoyResult<DeploymentRecord>;

    // -- procedures --

    fn execute_procedure(
        &self,
        platform: &str,
        component: &str,
        action: &str,
        args_json: &str,
        instances: Option<&[String]>,
        rollout_percent: u32,
    ) -> ConvoyResult<u64>;

    fn procedure_status(&self, procedure_id: u64) -> ConvoyResult<ProcedureStatus>;

    fn list_actions(&self, platform: &str, component: &str) -> ConvoyResult<Vec<String>>;

    fn list_instances(&self, platform: &str, component: &str) -> ConvoyResult<Vec<String>>;

    // -- inventory --

    fn list_compute_nodes(&self, platform: &str, component: &str)
        -> ConvoyResult<Vec<ComputeNode>>;
}

/// Convenience: single-attribute map for scalar updates
pub fn single_attribute(name: &str, value: &str) -> AttrMap {
    let mut map = BTreeMap::new();
    map.insert(name.to_string(), value.to_string());
    map
}
