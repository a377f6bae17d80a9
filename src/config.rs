//! Topology file loading
//!
//! Convoy consumes an already-parsed `TopologySpec`; this module is the thin
//! YAML front door for the CLI. Attribute shapes (scalar vs per-instance map)
//! are fixed here by serde, not re-inspected during reconciliation.

use std::path::Path;

use crate::error::{ConvoyError, ConvoyResult};
use crate::models::TopologySpec;

/// Load and sort a topology from a YAML file
pub fn load_topology(path: &Path) -> ConvoyResult<TopologySpec> {
    if !path.exists() {
        return Err(ConvoyError::TopologyNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_topology(&content)
}

/// Parse a topology from YAML text
pub fn parse_topology(yaml: &str) -> ConvoyResult<TopologySpec> {
    let mut topology: TopologySpec = serde_yaml_ng::from_str(yaml)?;
    topology.sort_platforms();
    Ok(topology)
}
