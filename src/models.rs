//! Core data model for declared topologies and remote entities
//!
//! The declarative input is an already-parsed object graph (`TopologySpec`);
//! `config::load_topology` produces it from YAML. Attribute shapes are decided
//! once at load time by the `AttrValue` variant, never re-inspected ad hoc.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Flat attribute map: attribute name -> scalar value
pub type AttrMap = BTreeMap<String, String>;

/// A declared topology: the root assembly, its environment, and the ordered
/// set of platforms to reconcile against the control plane.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TopologySpec {
    /// Root assembly name
    pub assembly: String,
    /// Environment the design is instantiated into
    pub environment: String,
    /// Assembly/environment description pushed on create
    #[serde(default)]
    pub description: Option<String>,
    /// Generate a fresh suffixed assembly name on every create
    #[serde(default)]
    pub auto_name: bool,
    #[serde(default)]
    pub platforms: Vec<PlatformSpec>,
    #[serde(default)]
    pub scales: Vec<ScaleSpec>,
}

impl TopologySpec {
    /// Platforms in reconciliation order: stable sort by the declared
    /// ordering key, so dependents follow their dependencies.
    pub fn sort_platforms(&mut self) {
        self.platforms.sort_by_key(|p| p.deploy_order);
    }

    /// Unique compute-class component names across all declared platforms.
    ///
    /// A component is compute-class when it is named `compute` or carries a
    /// `compute-` prefix (the naming the platform packs use).
    pub fn compute_component_names(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut names = Vec::new();
        for platform in &self.platforms {
            for name in platform.components.keys() {
                if is_compute_component(name) && seen.insert(name.clone()) {
                    names.push(name.clone());
                }
            }
        }
        names
    }
}

/// Whether a component name denotes a compute-class component
pub fn is_compute_component(name: &str) -> bool {
    name == "compute" || name.starts_with("compute-")
}

/// A named tier/service within the assembly, backed by a pack and version
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlatformSpec {
    pub name: String,
    pub pack: String,
    pub pack_version: String,
    #[serde(default = "default_pack_source")]
    pub pack_source: String,
    /// Ordering key; lower values reconcile first
    #[serde(default)]
    pub deploy_order: u32,
    #[serde(default)]
    pub components: BTreeMap<String, ComponentSpec>,
    /// Links to other platforms, pushed as a batch replace
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub variables: AttrMap,
    #[serde(default)]
    pub secure_variables: AttrMap,
}

fn default_pack_source() -> String {
    "main".to_string()
}

impl PlatformSpec {
    /// Declared component unique-names: top-level keys plus the keys of every
    /// map-valued attribute entry (instance unique-names).
    pub fn declared_component_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for (component, spec) in &self.components {
            names.insert(component.clone());
            for value in spec.attributes.values() {
                if let AttrValue::Map(instances) = value {
                    names.extend(instances.keys().cloned());
                }
            }
        }
        names
    }

    /// Union of declared secure and plain variable names
    pub fn declared_variable_names(&self) -> BTreeSet<String> {
        self.secure_variables
            .keys()
            .chain(self.variables.keys())
            .cloned()
            .collect()
    }
}

/// A configurable unit within a platform
///
/// The attribute map is either flat (attribute -> scalar) or two-level
/// (unique instance name -> its attribute map); the shape is fixed per entry
/// at load time. `attachments` is consumed during reconciliation and stripped
/// from the in-memory spec afterward.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ComponentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<BTreeMap<String, AttrMap>>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, AttrValue>,
}

/// Shape of a single component attribute entry, decided once at config load
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Plain scalar attribute of the component itself
    Scalar(String),
    /// Per-instance attribute map keyed by unique name
    Map(BTreeMap<String, String>),
    /// Anything else; logged and skipped by the reconciler
    Other(serde_yaml_ng::Value),
}

/// Redundancy/scale policy for a (platform, component) pair
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScaleSpec {
    pub platform: String,
    pub component: String,
    pub current: u32,
    pub min: u32,
    pub max: u32,
    #[serde(default = "default_percent_deploy")]
    pub percent_deploy: u32,
}

fn default_percent_deploy() -> u32 {
    100
}

impl ScaleSpec {
    pub fn redundancy(&self) -> RedundancyConfig {
        RedundancyConfig {
            current: self.current,
            min: self.min,
            max: self.max,
            percent_deploy: self.percent_deploy,
        }
    }
}

/// Redundancy config pushed to the transition API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedundancyConfig {
    pub current: u32,
    pub min: u32,
    pub max: u32,
    pub percent_deploy: u32,
}

/// Observed state of a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Active,
    Pending,
    Complete,
    Failed,
    Other,
}

impl DeploymentStatus {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "active" => Self::Active,
            "pending" => Self::Pending,
            "complete" => Self::Complete,
            "failed" => Self::Failed,
            _ => Self::Other,
        }
    }

    /// Terminal states are never polled further
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// A triggered deployment; transitions are observed only through polling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub id: u64,
    pub status: DeploymentStatus,
}

/// Observed state of a remote procedure run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcedureStatus {
    Active,
    Pending,
    Complete,
    Other,
}

impl ProcedureStatus {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "active" => Self::Active,
            "pending" => Self::Pending,
            "complete" => Self::Complete,
            _ => Self::Other,
        }
    }

    /// Still running; keep polling
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Active | Self::Pending)
    }
}

/// A platform variable as the control plane reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteVariable {
    pub name: String,
    pub value: String,
    pub secure: bool,
}

/// A platform component as the control plane reports it
///
/// `user_customized` distinguishes user-created entries from pack defaults;
/// its semantics belong to the control plane, the reconciler only consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteComponent {
    pub name: String,
    pub user_customized: bool,
}

/// A deployed compute node with its private address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeNode {
    pub name: String,
    pub private_ip: String,
}

/// One line of a generated inventory; never persisted beyond the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryEntry {
    pub platform: String,
    pub component: String,
    pub ip: String,
}
