//! Blocking HTTP implementation of the control-plane port
//!
//! One trait call maps to one request against the control plane's REST
//! surface. The session (base URL, token, assembly scope) is immutable and
//! shared read-only across worker threads.

use std::collections::BTreeMap;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::ControlPlane;
use crate::error::{ConvoyError, ConvoyResult};
use crate::models::{
    AttrMap, ComputeNode, DeploymentRecord, DeploymentStatus, PlatformSpec, ProcedureStatus,
    RedundancyConfig, RemoteComponent, RemoteVariable,
};

/// Control-plane client over blocking HTTP
pub struct HttpControlPlane {
    client: Client,
    base_url: String,
    token: String,
    assembly: String,
}

impl HttpControlPlane {
    pub fn new(base_url: &str, token: &str, assembly: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            assembly: assembly.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/assemblies/{}{}", self.base_url, self.assembly, path)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("Authorization", format!("Bearer {}", self.token))
    }

    fn send(&self, builder: RequestBuilder) -> ConvoyResult<Response> {
        let response = self
            .authed(builder)
            .send()
            .map_err(|e| ConvoyError::RemoteApi(e.to_string()))?;
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            Err(ConvoyError::RemoteApi(format!("{}: {}", status, body)))
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> ConvoyResult<T> {
        self.send(self.client.get(self.url(path)))?
            .json()
            .map_err(|e| ConvoyError::RemoteApi(e.to_string()))
    }

    /// Existence probe: 404 means "does not exist", not an error
    fn probe(&self, path: &str) -> ConvoyResult<bool> {
        let response = self
            .authed(self.client.get(self.url(path)))
            .send()
            .map_err(|e| ConvoyError::RemoteApi(e.to_string()))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            s => Err(ConvoyError::RemoteApi(format!("{}", s))),
        }
    }

    fn put_json(&self, path: &str, body: serde_json::Value) -> ConvoyResult<()> {
        self.send(self.client.put(self.url(path)).json(&body))?;
        Ok(())
    }

    fn post_json(&self, path: &str, body: serde_json::Value) -> ConvoyResult<()> {
        self.send(self.client.post(self.url(path)).json(&body))?;
        Ok(())
    }

    fn delete(&self, path: &str) -> ConvoyResult<()> {
        self.send(self.client.delete(self.url(path)))?;
        Ok(())
    }
}

impl ControlPlane for HttpControlPlane {
    fn assembly_exists(&self, assembly: &str) -> ConvoyResult<bool> {
        let response = self
            .authed(
                self.client
                    .get(format!("{}/assemblies/{}", self.base_url, assembly)),
            )
            .send()
            .map_err(|e| ConvoyError::RemoteApi(e.to_string()))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            s => Err(ConvoyError::RemoteApi(format!("{}", s))),
        }
    }

    fn create_assembly(&self, assembly: &str, description: &str) -> ConvoyResult<()> {
        self.send(
            self.client
                .put(format!("{}/assemblies/{}", self.base_url, assembly))
                .json(&json!({ "description": description })),
        )?;
        Ok(())
    }

    fn delete_assembly(&self, assembly: &str) -> ConvoyResult<()> {
        self.send(
            self.client
                .delete(format!("{}/assemblies/{}", self.base_url, assembly)),
        )?;
        Ok(())
    }

    fn platform_exists(&self, platform: &str) -> ConvoyResult<bool> {
        self.probe(&format!("/design/platforms/{}", platform))
    }

    fn list_platforms(&self) -> ConvoyResult<Vec<String>> {
        self.get_json("/design/platforms")
    }

    fn delete_platform(&self, platform: &str) -> ConvoyResult<()> {
        self.delete(&format!("/design/platforms/{}", platform))
    }

    fn create_platform(&self, platform: &PlatformSpec, description: &str) -> ConvoyResult<()> {
        self.put_json(
            &format!("/design/platforms/{}", platform.name),
            json!({
                "pack": platform.pack,
                "version": platform.pack_version,
                "source": platform.pack_source,
                "description": description,
            }),
        )
    }

    fn commit_design(&self) -> ConvoyResult<()> {
        self.post_json("/design/commit", json!({}))
    }

    fn list_platform_components(&self, platform: &str) -> ConvoyResult<Vec<RemoteComponent>> {
        self.get_json(&format!("/design/platforms/{}/components", platform))
    }

    fn get_platform_component(
        &self,
        platform: &str,
        unique_name: &str,
    ) -> ConvoyResult<Option<AttrMap>> {
        let path = format!("/design/platforms/{}/components/{}", platform, unique_name);
        if !self.probe(&path)? {
            return Ok(None);
        }
        self.get_json(&path).map(Some)
    }

    fn add_platform_component(
        &self,
        platform: &str,
        component: &str,
        unique_name: &str,
        attributes: &AttrMap,
    ) -> ConvoyResult<()> {
        self.post_json(
            &format!("/design/platforms/{}/components", platform),
            json!({
                "component": component,
                "name": unique_name,
                "attributes": attributes,
            }),
        )
    }

    fn update_platform_component(
        &self,
        platform: &str,
        unique_name: &str,
        attributes: &AttrMap,
    ) -> ConvoyResult<()> {
        self.put_json(
            &format!("/design/platforms/{}/components/{}", platform, unique_name),
            json!({ "attributes": attributes }),
        )
    }

    fn delete_platform_component(&self, platform: &str, component: &str) -> ConvoyResult<()> {
        self.delete(&format!(
            "/design/platforms/{}/components/{}",
            platform, component
        ))
    }

    fn list_platform_variables(&self, platform: &str) -> ConvoyResult<Vec<RemoteVariable>> {
        self.get_json(&format!("/design/platforms/{}/variables", platform))
    }

    fn upsert_platform_variable(
        &self,
        platform: &str,
        name: &str,
        value: &str,
        secure: bool,
    ) -> ConvoyResult<()> {
        self.put_json(
            &format!("/design/platforms/{}/variables/{}", platform, name),
            json!({ "value": value, "secure": secure }),
        )
    }

    fn delete_platform_variable(&self, platform: &str, name: &str) -> ConvoyResult<()> {
        self.delete(&format!("/design/platforms/{}/variables/{}", platform, name))
    }

    fn update_platform_links(&self, platform: &str, links: &[String]) -> ConvoyResult<()> {
        self.put_json(
            &format!("/design/platforms/{}/links", platform),
            json!({ "links": links }),
        )
    }

    fn attachment_exists(
        &self,
        platform: &str,
        component: &str,
        attachment: &str,
    ) -> ConvoyResult<bool> {
        self.probe(&format!(
            "/design/platforms/{}/components/{}/attachments/{}",
            platform, component, attachment
        ))
    }

    fn add_attachment(
        &self,
        platform: &str,
        component: &str,
        attachment: &str,
        attributes: &AttrMap,
    ) -> ConvoyResult<()> {
        self.post_json(
            &format!(
                "/design/platforms/{}/components/{}/attachments",
                platform, component
            ),
            json!({ "name": attachment, "attributes": attributes }),
        )
    }

    fn update_attachment(
        &self,
        platform: &str,
        component: &str,
        attachment: &str,
        attributes: &AttrMap,
    ) -> ConvoyResult<()> {
        self.put_json(
            &format!(
                "/design/platforms/{}/components/{}/attachments/{}",
                platform, component, attachment
            ),
            json!({ "attributes": attributes }),
        )
    }

    fn pull_design(&self, assembly: &str) -> ConvoyResult<()> {
        self.send(
            self.client
                .post(format!("{}/assemblies/{}/design/pull", self.base_url, assembly))
                .json(&json!({})),
        )?;
        Ok(())
    }

    fn environment_exists(&self, environment: &str) -> ConvoyResult<bool> {
        self.probe(&format!("/environments/{}", environment))
    }

    fn create_environment(&self, environment: &str, description: &str) -> ConvoyResult<()> {
        self.put_json(
            &format!("/environments/{}", environment),
            json!({ "description": description }),
        )
    }

    fn list_environments(&self) -> ConvoyResult<Vec<String>> {
        self.get_json("/environments")
    }

    fn delete_environment(&self, environment: &str) -> ConvoyResult<()> {
        self.delete(&format!("/environments/{}", environment))
    }

    fn update_environment(&self, environment: &str) -> ConvoyResult<()> {
        self.post_json(&format!("/environments/{}/pull", environment), json!({}))
    }

    fn commit_environment(&self, environment: &str, comment: &str) -> ConvoyResult<()> {
        self.post_json(
            &format!("/environments/{}/commit", environment),
            json!({ "comment": comment }),
        )
    }

    fn update_redundancy(
        &self,
        environment: &str,
        platform: &str,
        component: &str,
        config: &RedundancyConfig,
    ) -> ConvoyResult<()> {
        self.put_json(
            &format!(
                "/environments/{}/platforms/{}/components/{}/redundancy",
                environment, platform, component
            ),
            serde_json::to_value(config).map_err(|e| ConvoyError::RemoteApi(e.to_string()))?,
        )
    }

    fn set_delivery_relay(&self, environment: &str, enabled: bool) -> ConvoyResult<()> {
        self.put_json(
            &format!("/environments/{}/relays/default", environment),
            json!({ "enabled": enabled }),
        )
    }

    fn trigger_deployment(&self, environment: &str) -> ConvoyResult<DeploymentRecord> {
        self.send(
            self.client
                .post(self.url(&format!("/environments/{}/deployments", environment)))
                .json(&json!({})),
        )?
        .json()
        .map_err(|e| ConvoyError::RemoteApi(e.to_string()))
    }

    fn environment_deployment_status(&self, environment: &str) -> ConvoyResult<DeploymentStatus> {
        let body: serde_json::Value =
            self.get_json(&format!("/environments/{}/deployments/latest", environment))?;
        Ok(DeploymentStatus::parse(
            body.get("status").and_then(|s| s.as_str()).unwrap_or(""),
        ))
    }

    fn get_deployment(
        &self,
        environment: &str,
        deployment_id: u64,
    ) -> ConvoyResult<DeploymentRecord> {
        self.get_json(&format!(
            "/environments/{}/deployments/{}",
            environment, deployment_id
        ))
    }

    fn retry_deployment(&self, environment: &str) -> ConvoyResult<DeploymentRecord> {
        self.send(
            self.client
                .post(self.url(&format!("/environments/{}/deployments/retry", environment)))
                .json(&json!({})),
        )?
        .json()
        .map_err(|e| ConvoyError::RemoteApi(e.to_string()))
    }

    fn execute_procedure(
        &self,
        platform: &str,
        component: &str,
        action: &str,
        args_json: &str,
        instances: Option<&[String]>,
        rollout_percent: u32,
    ) -> ConvoyResult<u64> {
        let args: serde_json::Value = if args_json.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(args_json)
                .map_err(|e| ConvoyError::Validation(format!("procedure arguments: {}", e)))?
        };
        let body: serde_json::Value = self
            .send(
                self.client
                    .post(self.url(&format!(
                        "/platforms/{}/components/{}/procedures",
                        platform, component
                    )))
                    .json(&json!({
                        "action": action,
                        "arguments": args,
                        "instances": instances,
                        "rollout_percent": rollout_percent,
                    })),
            )?
            .json()
            .map_err(|e| ConvoyError::RemoteApi(e.to_string()))?;
        body.get("id")
            .and_then(|id| id.as_u64())
            .ok_or_else(|| ConvoyError::RemoteApi("procedure response missing id".to_string()))
    }

    fn procedure_status(&self, procedure_id: u64) -> ConvoyResult<ProcedureStatus> {
        let body: serde_json::Value = self.get_json(&format!("/procedures/{}", procedure_id))?;
        Ok(ProcedureStatus::parse(
            body.get("status").and_then(|s| s.as_str()).unwrap_or(""),
        ))
    }

    fn list_actions(&self, platform: &str, component: &str) -> ConvoyResult<Vec<String>> {
        self.get_json(&format!(
            "/platforms/{}/components/{}/actions",
            platform, component
        ))
    }

    fn list_instances(&self, platform: &str, component: &str) -> ConvoyResult<Vec<String>> {
        self.get_json(&format!(
            "/platforms/{}/components/{}/instances",
            platform, component
        ))
    }

    fn list_compute_nodes(
        &self,
        platform: &str,
        component: &str,
    ) -> ConvoyResult<Vec<ComputeNode>> {
        let nodes: Vec<BTreeMap<String, serde_json::Value>> = self.get_json(&format!(
            "/platforms/{}/components/{}/nodes",
            platform, component
        ))?;
        Ok(nodes
            .into_iter()
            .map(|node| ComputeNode {
                name: node
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                private_ip: node
                    .get("private_ip")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect())
    }
}
