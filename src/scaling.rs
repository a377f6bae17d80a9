//! Scaling & commit stage
//!
//! Pushes redundancy/scale settings per (platform, component), then commits
//! the environment. The commit always runs when this stage is reached through
//! the orchestration path, even with an empty scale list.

use std::sync::Arc;

use crate::client::ControlPlane;
use crate::error::ConvoyResult;
use crate::events::{EventSink, OrchestratorEvent};
use crate::models::ScaleSpec;
use crate::reconcile::DEFAULT_DESCRIPTION;

pub struct ScalingStage {
    client: Arc<dyn ControlPlane>,
    sink: Arc<dyn EventSink>,
}

impl ScalingStage {
    pub fn new(client: Arc<dyn ControlPlane>, sink: Arc<dyn EventSink>) -> Self {
        Self { client, sink }
    }

    /// Push redundancy configs only, no commit (mid-sequence update path)
    pub fn apply_redundancy(&self, environment: &str, scales: &[ScaleSpec]) -> ConvoyResult<()> {
        for scale in scales {
            self.client.update_redundancy(
                environment,
                &scale.platform,
                &scale.component,
                &scale.redundancy(),
            )?;
            self.sink.on_event(OrchestratorEvent::ScalingApplied {
                platform: scale.platform.clone(),
                component: scale.component.clone(),
            });
        }
        Ok(())
    }

    /// Push all scales, then commit the environment with the caller's comment
    /// (or the fixed default when blank). Returns false when no scales were
    /// declared; the commit runs regardless.
    pub fn apply_scaling(
        &self,
        environment: &str,
        scales: &[ScaleSpec],
        comment: Option<&str>,
    ) -> ConvoyResult<bool> {
        self.apply_redundancy(environment, scales)?;
        let comment = match comment {
            Some(c) if !c.trim().is_empty() => c,
            _ => DEFAULT_DESCRIPTION,
        };
        self.client.commit_environment(environment, comment)?;
        Ok(!scales.is_empty())
    }
}
