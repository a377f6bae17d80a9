//! Bounded-concurrency component attribute updater
//!
//! Authorization-key-bearing entries (per-user key provisioning) are the high
//! fan-out case and go through a fixed-size worker pool; everything else is
//! applied inline on the caller's thread. The call returns only after the
//! pool drains, so reconciliation can rely on attribute convergence before
//! scaling and commit.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::client::{single_attribute, ControlPlane};
use crate::error::ConvoyResult;
use crate::events::{EventSink, OrchestratorEvent};
use crate::models::{AttrMap, AttrValue};
use crate::pool::WorkerPool;

/// Marker attribute for authorization-key material
pub const AUTH_KEYS_ATTRIBUTE: &str = "authorized_keys";

/// Default worker pool capacity per component-attribute batch
pub const DEFAULT_POOL_CAPACITY: usize = 32;

/// How a batch of attribute entries was applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    /// Entries dispatched onto the worker pool
    pub pooled: usize,
    /// Entries applied inline on the caller's thread
    pub inline: usize,
    /// Entries with unrecognized shapes, logged and skipped
    pub skipped: usize,
}

/// Apply one component's attribute entries, returning once the pool drains
///
/// Map-valued entries carrying [`AUTH_KEYS_ATTRIBUTE`] are dispatched as
/// independent units of work; other map-valued entries are applied inline
/// under their unique name; scalar entries become single-attribute updates on
/// the component itself. Inline failures propagate; pooled failures are
/// reported through the sink and do not abort the batch.
pub fn apply_component_attributes(
    client: &Arc<dyn ControlPlane>,
    sink: &Arc<dyn EventSink>,
    platform: &str,
    component: &str,
    attributes: &BTreeMap<String, AttrValue>,
    pool_capacity: usize,
) -> ConvoyResult<ApplyStats> {
    sink.on_event(OrchestratorEvent::UpdatingComponent {
        platform: platform.to_string(),
        component: component.to_string(),
    });

    let pool = WorkerPool::new(pool_capacity);
    let mut stats = ApplyStats::default();

    for (name, value) in attributes {
        match value {
            AttrValue::Map(instance_attrs) if instance_attrs.contains_key(AUTH_KEYS_ATTRIBUTE) => {
                stats.pooled += 1;
                let client = Arc::clone(client);
                let sink = Arc::clone(sink);
                let platform = platform.to_string();
                let component = component.to_string();
                let unique_name = name.clone();
                let desired = instance_attrs.clone();
                pool.execute(move || {
                    if let Err(e) =
                        apply_unit(&*client, &platform, &component, &unique_name, &desired)
                    {
                        sink.on_event(OrchestratorEvent::ComponentUpdateFailed {
                            platform,
                            unique_name,
                            error: e.to_string(),
                        });
                    }
                });
            }
            AttrValue::Map(instance_attrs) => {
                stats.inline += 1;
                apply_unit(&**client, platform, component, name, instance_attrs)?;
            }
            AttrValue::Scalar(value) => {
                stats.inline += 1;
                let desired = single_attribute(name, value);
                apply_unit(&**client, platform, component, component, &desired)?;
            }
            AttrValue::Other(_) => {
                stats.skipped += 1;
                sink.on_event(OrchestratorEvent::UnknownAttributeShape {
                    platform: platform.to_string(),
                    component: component.to_string(),
                    attribute: name.clone(),
                });
            }
        }
    }

    pool.drain();
    Ok(stats)
}

/// One create-or-update unit for a component instance
///
/// Probes remote existence first; a probe failure defaults to create. Updates
/// are issued only when a declared attribute is missing or differs remotely.
fn apply_unit(
    client: &dyn ControlPlane,
    platform: &str,
    component: &str,
    unique_name: &str,
    desired: &AttrMap,
) -> ConvoyResult<()> {
    let existing = client
        .get_platform_component(platform, unique_name)
        .unwrap_or(None);
    match existing {
        Some(current) => {
            if needs_update(&current, desired) {
                client.update_platform_component(platform, unique_name, desired)?;
            }
            Ok(())
        }
        None => client.add_platform_component(platform, component, unique_name, desired),
    }
}

/// A declared attribute is missing or differs remotely
fn needs_update(current: &AttrMap, desired: &AttrMap) -> bool {
    desired
        .iter()
        .any(|(key, value)| current.get(key) != Some(value))
}
