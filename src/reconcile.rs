//! Topology reconciler
//!
//! Diffs the declared topology against remote state: creates missing
//! platforms, converges component attributes and variables, deletes
//! remote-only entities that are no longer declared, and pushes platform
//! links as a batch replace. Re-running against an unchanged topology issues
//! no mutations beyond no-op design commits.

use std::sync::Arc;

use crate::attrs::{apply_component_attributes, DEFAULT_POOL_CAPACITY};
use crate::client::ControlPlane;
use crate::error::{ConvoyError, ConvoyResult};
use crate::events::{EventSink, OrchestratorEvent};
use crate::models::{AttrMap, PlatformSpec, TopologySpec};

/// Default description for created entities and design commits
pub const DEFAULT_DESCRIPTION: &str = "managed by convoy";

pub struct Reconciler {
    client: Arc<dyn ControlPlane>,
    sink: Arc<dyn EventSink>,
    pool_capacity: usize,
}

impl Reconciler {
    pub fn new(client: Arc<dyn ControlPlane>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            client,
            sink,
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }

    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    /// Assembly precondition check
    ///
    /// Updates require the assembly to exist; fresh creates require it not
    /// to, unless auto-generated naming is on (every invocation then gets a
    /// fresh suffixed name and the check is moot).
    pub fn check_preconditions(
        &self,
        topology: &TopologySpec,
        is_update: bool,
    ) -> ConvoyResult<()> {
        let exists = self.client.assembly_exists(&topology.assembly)?;
        if is_update && !exists {
            return Err(ConvoyError::EntityNotFound {
                kind: "assembly",
                name: topology.assembly.clone(),
            });
        }
        if !is_update && !topology.auto_name && exists {
            return Err(ConvoyError::EntityAlreadyExists {
                kind: "assembly",
                name: topology.assembly.clone(),
            });
        }
        Ok(())
    }

    /// Create missing platforms and converge their components and links
    ///
    /// Platforms are visited in the caller's sort order. Attachment
    /// reconciliation is best-effort: a failure is reported through the sink
    /// and never blocks the rest of the topology; the `attachments` key is
    /// stripped from the in-memory spec either way.
    pub fn create_platforms(&self, topology: &mut TopologySpec) -> ConvoyResult<()> {
        let description = topology
            .description
            .clone()
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());
        for platform in &mut topology.platforms {
            self.sink.on_event(OrchestratorEvent::CreatingPlatform {
                name: platform.name.clone(),
            });
            self.create_platform_if_absent(platform, &description)?;

            let platform_name = platform.name.clone();
            for (component, spec) in &mut platform.components {
                if let Some(warning) =
                    reconcile_attachments(&*self.client, &platform_name, component, spec)
                {
                    self.sink.on_event(OrchestratorEvent::AttachmentSkipped {
                        platform: platform_name.clone(),
                        component: component.clone(),
                        error: warning,
                    });
                }
                apply_component_attributes(
                    &self.client,
                    &self.sink,
                    &platform_name,
                    component,
                    &spec.attributes,
                    self.pool_capacity,
                )?;
            }

            if !platform.links.is_empty() {
                self.client
                    .update_platform_links(&platform.name, &platform.links)?;
            }
        }
        Ok(())
    }

    /// Probe and create one platform; logs "created" or "already exists",
    /// never both. A probe failure is treated as "does not exist".
    fn create_platform_if_absent(
        &self,
        platform: &PlatformSpec,
        description: &str,
    ) -> ConvoyResult<()> {
        let exists = self
            .client
            .platform_exists(&platform.name)
            .unwrap_or(false);
        if exists {
            self.sink.on_event(OrchestratorEvent::PlatformExists {
                name: platform.name.clone(),
            });
            return Ok(());
        }
        self.client.create_platform(platform, description)?;
        self.client.commit_design()?;
        self.sink.on_event(OrchestratorEvent::PlatformCreated {
            name: platform.name.clone(),
        });
        Ok(())
    }

    /// Converge platform variables: secure first, then plain; delete remote
    /// variables absent from the declared union; one design commit at the end
    /// when at least one platform is declared.
    pub fn update_platform_variables(&self, topology: &TopologySpec) -> ConvoyResult<()> {
        for platform in &topology.platforms {
            let remote = self.client.list_platform_variables(&platform.name)?;

            for (name, value) in &platform.secure_variables {
                self.upsert_if_changed(&platform.name, &remote, name, value, true)?;
            }
            for (name, value) in &platform.variables {
                self.upsert_if_changed(&platform.name, &remote, name, value, false)?;
            }

            let declared = platform.declared_variable_names();
            for variable in &remote {
                if !declared.contains(&variable.name) {
                    self.client
                        .delete_platform_variable(&platform.name, &variable.name)?;
                }
            }
        }
        if !topology.platforms.is_empty() {
            self.client.commit_design()?;
        }
        Ok(())
    }

    fn upsert_if_changed(
        &self,
        platform: &str,
        remote: &[crate::models::RemoteVariable],
        name: &str,
        value: &str,
        secure: bool,
    ) -> ConvoyResult<()> {
        let unchanged = remote
            .iter()
            .any(|v| v.name == name && v.value == value && v.secure == secure);
        if unchanged {
            return Ok(());
        }
        self.client
            .upsert_platform_variable(platform, name, value, secure)
    }

    /// Deletion parity for components (update mode only)
    ///
    /// Deletes remote components that were user-customized and are no longer
    /// declared. Pack-default, non-customized components are preserved even
    /// when undeclared; the `user_customized` flag is supplied by the control
    /// plane, not inferred here.
    pub fn update_platform_components(&self, topology: &TopologySpec) -> ConvoyResult<()> {
        for platform in &topology.platforms {
            let declared = platform.declared_component_names();
            let remote = self.client.list_platform_components(&platform.name)?;
            for component in remote {
                if component.user_customized && !declared.contains(&component.name) {
                    self.client
                        .delete_platform_component(&platform.name, &component.name)?;
                }
            }
        }
        Ok(())
    }
}

/// Best-effort attachment reconciliation
///
/// Any failure is returned as a warning for the caller to log, never
/// propagated, so a broken attachment cannot block the topology from
/// converging. The `attachments` key is stripped from the in-memory spec on
/// every path.
fn reconcile_attachments(
    client: &dyn ControlPlane,
    platform: &str,
    component: &str,
    spec: &mut crate::models::ComponentSpec,
) -> Option<String> {
    let attachments = spec.attachments.take()?;
    reconcile_attachments_inner(client, platform, component, &attachments)
        .err()
        .map(|e| e.to_string())
}

fn reconcile_attachments_inner(
    client: &dyn ControlPlane,
    platform: &str,
    component: &str,
    attachments: &std::collections::BTreeMap<String, AttrMap>,
) -> ConvoyResult<()> {
    for (name, attributes) in attachments {
        if client.attachment_exists(platform, component, name)? {
            client.update_attachment(platform, component, name, attributes)?;
        } else {
            client.add_attachment(platform, component, name, attributes)?;
        }
    }
    Ok(())
}
