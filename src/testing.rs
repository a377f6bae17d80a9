//! In-memory control plane and topology fixtures shared across unit tests

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};

use crate::client::ControlPlane;
use crate::error::{ConvoyError, ConvoyResult};
use crate::events::{EventSink, OrchestratorEvent};
use crate::models::{
    AttrMap, AttrValue, ComponentSpec, ComputeNode, DeploymentRecord, DeploymentStatus,
    PlatformSpec, ProcedureStatus, RedundancyConfig, RemoteComponent, RemoteVariable, ScaleSpec,
    TopologySpec,
};

/// Stateful fake of the remote control plane
///
/// Records every call as a space-joined line and keeps enough state for
/// probes and lists to reflect earlier mutations, so idempotence and
/// deletion-parity behavior can be asserted against it.
pub struct MockControlPlane {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    calls: Vec<String>,
    assemblies: BTreeSet<String>,
    platforms: BTreeSet<String>,
    environments: BTreeSet<String>,
    // platform -> unique_name -> attributes
    components: BTreeMap<String, BTreeMap<String, AttrMap>>,
    remote_components: BTreeMap<String, Vec<RemoteComponent>>,
    variables: BTreeMap<String, Vec<RemoteVariable>>,
    attachments: BTreeMap<(String, String, String), AttrMap>,
    actions: BTreeMap<(String, String), Vec<String>>,
    instances: BTreeMap<(String, String), Vec<String>>,
    compute_ips: BTreeMap<(String, String), Vec<String>>,
    procedure_script: VecDeque<ProcedureStatus>,
    // None means "last deployment finished", the non-blocking default
    deployment_status: Option<DeploymentStatus>,
    deployment_failures: u32,
    deployment_failure_message: String,
    next_deployment_id: u64,
    next_procedure_id: u64,
    fail_attachments: bool,
    fail_component_probes: bool,
    fail_procedure_submit: Option<String>,
    fail_design_pull: Option<String>,
    fail_relay: Option<String>,
}

impl MockControlPlane {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_deployment_id: 100,
                next_procedure_id: 500,
                ..State::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Count recorded calls by method-name prefix
    pub fn count_calls(&self, name: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(name))
            .count()
    }

    /// Count state-changing calls: creates, adds, updates, deletes, upserts.
    /// Commits, probes, and lists do not count.
    pub fn mutation_count(&self) -> usize {
        const PREFIXES: &[&str] = &["create_", "add_", "update_", "delete_", "upsert_"];
        self.lock()
            .calls
            .iter()
            .filter(|c| PREFIXES.iter().any(|p| c.starts_with(p)))
            .count()
    }

    // -- seeding --

    pub fn seed_assembly(&self, name: &str) {
        self.lock().assemblies.insert(name.to_string());
    }

    pub fn seed_component(&self, platform: &str, unique_name: &str, attributes: AttrMap) {
        self.lock()
            .components
            .entry(platform.to_string())
            .or_default()
            .insert(unique_name.to_string(), attributes);
    }

    pub fn seed_remote_component(&self, platform: &str, name: &str, user_customized: bool) {
        self.lock()
            .remote_components
            .entry(platform.to_string())
            .or_default()
            .push(RemoteComponent {
                name: name.to_string(),
                user_customized,
            });
    }

    pub fn seed_variable(&self, platform: &str, name: &str, value: &str, secure: bool) {
        self.lock()
            .variables
            .entry(platform.to_string())
            .or_default()
            .push(RemoteVariable {
                name: name.to_string(),
                value: value.to_string(),
                secure,
            });
    }

    pub fn seed_actions(&self, platform: &str, component: &str, actions: &[&str]) {
        self.lock().actions.insert(
            (platform.to_string(), component.to_string()),
            actions.iter().map(|s| s.to_string()).collect(),
        );
    }

    pub fn seed_instances(&self, platform: &str, component: &str, instances: &[&str]) {
        self.lock().instances.insert(
            (platform.to_string(), component.to_string()),
            instances.iter().map(|s| s.to_string()).collect(),
        );
    }

    pub fn seed_compute_ips(&self, platform: &str, component: &str, ips: &[&str]) {
        self.lock().compute_ips.insert(
            (platform.to_string(), component.to_string()),
            ips.iter().map(|s| s.to_string()).collect(),
        );
    }

    // -- scripted behavior --

    /// Successive `procedure_status` results; an exhausted script errors
    pub fn script_procedure(&self, statuses: &[ProcedureStatus]) {
        self.lock().procedure_script = statuses.iter().copied().collect();
    }

    pub fn set_deployment_status(&self, status: DeploymentStatus) {
        self.lock().deployment_status = Some(status);
    }

    /// Fail the first `count` deployment triggers with `message`, then succeed
    pub fn fail_deployments(&self, count: u32, message: &str) {
        let mut state = self.lock();
        state.deployment_failures = count;
        state.deployment_failure_message = message.to_string();
    }

    pub fn fail_procedure_submit(&self, message: &str) {
        self.lock().fail_procedure_submit = Some(message.to_string());
    }

    pub fn fail_attachments(&self) {
        self.lock().fail_attachments = true;
    }

    pub fn fail_component_probes(&self) {
        self.lock().fail_component_probes = true;
    }

    pub fn fail_design_pull(&self, message: &str) {
        self.lock().fail_design_pull = Some(message.to_string());
    }

    pub fn fail_relay(&self, message: &str) {
        self.lock().fail_relay = Some(message.to_string());
    }
}

impl Default for MockControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

/// Event sink that records everything it sees
pub struct RecordingSink {
    events: Arc<Mutex<Vec<OrchestratorEvent>>>,
}

impl RecordingSink {
    pub fn new() -> (Self, Arc<Mutex<Vec<OrchestratorEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                events: events.clone(),
            },
            events,
        )
    }
}

impl EventSink for RecordingSink {
    fn on_event(&self, event: OrchestratorEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn remote(message: &str) -> ConvoyError {
    ConvoyError::RemoteApi(message.to_string())
}

impl ControlPlane for MockControlPlane {
    fn assembly_exists(&self, assembly: &str) -> ConvoyResult<bool> {
        let mut state = self.lock();
        state.calls.push(format!("assembly_exists {}", assembly));
        Ok(state.assemblies.contains(assembly))
    }

    fn create_assembly(&self, assembly: &str, _description: &str) -> ConvoyResult<()> {
        let mut state = self.lock();
        state.calls.push(format!("create_assembly {}", assembly));
        state.assemblies.insert(assembly.to_string());
        Ok(())
    }

    fn delete_assembly(&self, assembly: &str) -> ConvoyResult<()> {
        let mut state = self.lock();
        state.calls.push(format!("delete_assembly {}", assembly));
        state.assemblies.remove(assembly);
        Ok(())
    }

    fn platform_exists(&self, platform: &str) -> ConvoyResult<bool> {
        let mut state = self.lock();
        state.calls.push(format!("platform_exists {}", platform));
        Ok(state.platforms.contains(platform))
    }

    fn list_platforms(&self) -> ConvoyResult<Vec<String>> {
        let mut state = self.lock();
        state.calls.push("list_platforms".to_string());
        Ok(state.platforms.iter().cloned().collect())
    }

    fn delete_platform(&self, platform: &str) -> ConvoyResult<()> {
        let mut state = self.lock();
        state.calls.push(format!("delete_platform {}", platform));
        state.platforms.remove(platform);
        state.components.remove(platform);
        state.remote_components.remove(platform);
        state.variables.remove(platform);
        Ok(())
    }

    fn create_platform(&self, platform: &PlatformSpec, _description: &str) -> ConvoyResult<()> {
        let mut state = self.lock();
        state.calls.push(format!("create_platform {}", platform.name));
        state.platforms.insert(platform.name.clone());
        Ok(())
    }

    fn commit_design(&self) -> ConvoyResult<()> {
        self.lock().calls.push("commit_design".to_string());
        Ok(())
    }

    fn list_platform_components(&self, platform: &str) -> ConvoyResult<Vec<RemoteComponent>> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("list_platform_components {}", platform));
        Ok(state
            .remote_components
            .get(platform)
            .cloned()
            .unwrap_or_default())
    }

    fn get_platform_component(
        &self,
        platform: &str,
        unique_name: &str,
    ) -> ConvoyResult<Option<AttrMap>> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("get_platform_component {} {}", platform, unique_name));
        if state.fail_component_probes {
            return Err(remote("probe refused"));
        }
        Ok(state
            .components
            .get(platform)
            .and_then(|c| c.get(unique_name))
            .cloned())
    }

    fn add_platform_component(
        &self,
        platform: &str,
        component: &str,
        unique_name: &str,
        attributes: &AttrMap,
    ) -> ConvoyResult<()> {
        let mut state = self.lock();
        state.calls.push(format!(
            "add_platform_component {} {} {}",
            platform, component, unique_name
        ));
        state
            .components
            .entry(platform.to_string())
            .or_default()
            .insert(unique_name.to_string(), attributes.clone());
        Ok(())
    }

    fn update_platform_component(
        &self,
        platform: &str,
        unique_name: &str,
        attributes: &AttrMap,
    ) -> ConvoyResult<()> {
        let mut state = self.lock();
        state.calls.push(format!(
            "update_platform_component {} {}",
            platform, unique_name
        ));
        if let Some(existing) = state
            .components
            .entry(platform.to_string())
            .or_default()
            .get_mut(unique_name)
        {
            existing.extend(attributes.clone());
        }
        Ok(())
    }

    fn delete_platform_component(&self, platform: &str, component: &str) -> ConvoyResult<()> {
        let mut state = self.lock();
        state.calls.push(format!(
            "delete_platform_component {} {}",
            platform, component
        ));
        if let Some(list) = state.remote_components.get_mut(platform) {
            list.retain(|c| c.name != component);
        }
        if let Some(map) = state.components.get_mut(platform) {
            map.remove(component);
        }
        Ok(())
    }

    fn list_platform_variables(&self, platform: &str) -> ConvoyResult<Vec<RemoteVariable>> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("list_platform_variables {}", platform));
        Ok(state.variables.get(platform).cloned().unwrap_or_default())
    }

    fn upsert_platform_variable(
        &self,
        platform: &str,
        name: &str,
        value: &str,
        secure: bool,
    ) -> ConvoyResult<()> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("upsert_platform_variable {} {}", platform, name));
        let list = state.variables.entry(platform.to_string()).or_default();
        if let Some(existing) = list.iter_mut().find(|v| v.name == name) {
            existing.value = value.to_string();
            existing.secure = secure;
        } else {
            list.push(RemoteVariable {
                name: name.to_string(),
                value: value.to_string(),
                secure,
            });
        }
        Ok(())
    }

    fn delete_platform_variable(&self, platform: &str, name: &str) -> ConvoyResult<()> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("delete_platform_variable {} {}", platform, name));
        if let Some(list) = state.variables.get_mut(platform) {
            list.retain(|v| v.name != name);
        }
        Ok(())
    }

    fn update_platform_links(&self, platform: &str, links: &[String]) -> ConvoyResult<()> {
        let mut state = self.lock();
        state.calls.push(format!(
            "update_platform_links {} {}",
            platform,
            links.join(",")
        ));
        Ok(())
    }

    fn attachment_exists(
        &self,
        platform: &str,
        component: &str,
        attachment: &str,
    ) -> ConvoyResult<bool> {
        let mut state = self.lock();
        state.calls.push(format!(
            "attachment_exists {} {} {}",
            platform, component, attachment
        ));
        if state.fail_attachments {
            return Err(remote("attachment backend unavailable"));
        }
        Ok(state.attachments.contains_key(&(
            platform.to_string(),
            component.to_string(),
            attachment.to_string(),
        )))
    }

    fn add_attachment(
        &self,
        platform: &str,
        component: &str,
        attachment: &str,
        attributes: &AttrMap,
    ) -> ConvoyResult<()> {
        let mut state = self.lock();
        state.calls.push(format!(
            "add_attachment {} {} {}",
            platform, component, attachment
        ));
        state.attachments.insert(
            (
                platform.to_string(),
                component.to_string(),
                attachment.to_string(),
            ),
            attributes.clone(),
        );
        Ok(())
    }

    fn update_attachment(
        &self,
        platform: &str,
        component: &str,
        attachment: &str,
        attributes: &AttrMap,
    ) -> ConvoyResult<()> {
        let mut state = self.lock();
        state.calls.push(format!(
            "update_attachment {} {} {}",
            platform, component, attachment
        ));
        state.attachments.insert(
            (
                platform.to_string(),
                component.to_string(),
                attachment.to_string(),
            ),
            attributes.clone(),
        );
        Ok(())
    }

    fn pull_design(&self, assembly: &str) -> ConvoyResult<()> {
        let mut state = self.lock();
        state.calls.push(format!("pull_design {}", assembly));
        match &state.fail_design_pull {
            Some(message) => Err(remote(message)),
            None => Ok(()),
        }
    }

    fn environment_exists(&self, environment: &str) -> ConvoyResult<bool> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("environment_exists {}", environment));
        Ok(state.environments.contains(environment))
    }

    fn create_environment(&self, environment: &str, _description: &str) -> ConvoyResult<()> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("create_environment {}", environment));
        state.environments.insert(environment.to_string());
        Ok(())
    }

    fn list_environments(&self) -> ConvoyResult<Vec<String>> {
        let mut state = self.lock();
        state.calls.push("list_environments".to_string());
        Ok(state.environments.iter().cloned().collect())
    }

    fn delete_environment(&self, environment: &str) -> ConvoyResult<()> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("delete_environment {}", environment));
        state.environments.remove(environment);
        Ok(())
    }

    fn update_environment(&self, environment: &str) -> ConvoyResult<()> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("update_environment {}", environment));
        Ok(())
    }

    fn commit_environment(&self, environment: &str, comment: &str) -> ConvoyResult<()> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("commit_environment {} {}", environment, comment));
        Ok(())
    }

    fn update_redundancy(
        &self,
        environment: &str,
        platform: &str,
        component: &str,
        _config: &RedundancyConfig,
    ) -> ConvoyResult<()> {
        let mut state = self.lock();
        state.calls.push(format!(
            "update_redundancy {} {} {}",
            environment, platform, component
        ));
        Ok(())
    }

    fn set_delivery_relay(&self, environment: &str, enabled: bool) -> ConvoyResult<()> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("set_delivery_relay {} {}", environment, enabled));
        match &state.fail_relay {
            Some(message) => Err(remote(message)),
            None => Ok(()),
        }
    }

    fn trigger_deployment(&self, environment: &str) -> ConvoyResult<DeploymentRecord> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("trigger_deployment {}", environment));
        if state.deployment_failures > 0 {
            state.deployment_failures -= 1;
            let message = state.deployment_failure_message.clone();
            return Err(remote(&message));
        }
        state.next_deployment_id += 1;
        Ok(DeploymentRecord {
            id: state.next_deployment_id,
            status: DeploymentStatus::Active,
        })
    }

    fn environment_deployment_status(&self, environment: &str) -> ConvoyResult<DeploymentStatus> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("environment_deployment_status {}", environment));
        Ok(state.deployment_status.unwrap_or(DeploymentStatus::Complete))
    }

    fn get_deployment(
        &self,
        environment: &str,
        deployment_id: u64,
    ) -> ConvoyResult<DeploymentRecord> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("get_deployment {} {}", environment, deployment_id));
        Ok(DeploymentRecord {
            id: deployment_id,
            status: state.deployment_status.unwrap_or(DeploymentStatus::Complete),
        })
    }

    fn retry_deployment(&self, environment: &str) -> ConvoyResult<DeploymentRecord> {
        let mut state = self.lock();
        state.calls.push(format!("retry_deployment {}", environment));
        state.next_deployment_id += 1;
        Ok(DeploymentRecord {
            id: state.next_deployment_id,
            status: DeploymentStatus::Active,
        })
    }

    fn execute_procedure(
        &self,
        platform: &str,
        component: &str,
        action: &str,
        _args_json: &str,
        instances: Option<&[String]>,
        rollout_percent: u32,
    ) -> ConvoyResult<u64> {
        let mut state = self.lock();
        state.calls.push(format!(
            "execute_procedure {} {} {} [{}] {}",
            platform,
            component,
            action,
            instances.map(|i| i.join(",")).unwrap_or_default(),
            rollout_percent
        ));
        if let Some(message) = state.fail_procedure_submit.clone() {
            return Err(remote(&message));
        }
        state.next_procedure_id += 1;
        Ok(state.next_procedure_id)
    }

    fn procedure_status(&self, procedure_id: u64) -> ConvoyResult<ProcedureStatus> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("procedure_status {}", procedure_id));
        state
            .procedure_script
            .pop_front()
            .ok_or_else(|| remote("status script exhausted"))
    }

    fn list_actions(&self, platform: &str, component: &str) -> ConvoyResult<Vec<String>> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("list_actions {} {}", platform, component));
        Ok(state
            .actions
            .get(&(platform.to_string(), component.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn list_instances(&self, platform: &str, component: &str) -> ConvoyResult<Vec<String>> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("list_instances {} {}", platform, component));
        Ok(state
            .instances
            .get(&(platform.to_string(), component.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn list_compute_nodes(
        &self,
        platform: &str,
        component: &str,
    ) -> ConvoyResult<Vec<ComputeNode>> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("list_compute_nodes {} {}", platform, component));
        let ips = state
            .compute_ips
            .get(&(platform.to_string(), component.to_string()))
            .cloned()
            .unwrap_or_default();
        Ok(ips
            .into_iter()
            .enumerate()
            .map(|(i, private_ip)| ComputeNode {
                name: format!("{}-{}", component, i + 1),
                private_ip,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_mock_reports_a_finished_deployment() {
        let mock = MockControlPlane::new();
        assert_eq!(
            mock.environment_deployment_status("prod").unwrap(),
            DeploymentStatus::Complete
        );

        mock.set_deployment_status(DeploymentStatus::Active);
        assert_eq!(
            mock.environment_deployment_status("prod").unwrap(),
            DeploymentStatus::Active
        );
    }
}

/// Two-platform fixture: a `web` platform with a compute component carrying
/// scalar, per-user, and attachment entries, a `db` platform behind it, and
/// one declared scale.
pub fn sample_topology() -> TopologySpec {
    let mut web_attrs = BTreeMap::new();
    web_attrs.insert("size".to_string(), AttrValue::Scalar("M".to_string()));
    let mut alice = BTreeMap::new();
    alice.insert(
        "authorized_keys".to_string(),
        "ssh-rsa AAAB3 alice".to_string(),
    );
    web_attrs.insert("user-alice".to_string(), AttrValue::Map(alice));

    let mut keystore = AttrMap::new();
    keystore.insert("path".to_string(), "/opt/keystore".to_string());
    let mut web_attachments = BTreeMap::new();
    web_attachments.insert("keystore".to_string(), keystore);

    let mut web_components = BTreeMap::new();
    web_components.insert(
        "compute".to_string(),
        ComponentSpec {
            attachments: Some(web_attachments),
            attributes: web_attrs,
        },
    );

    let mut web_variables = AttrMap::new();
    web_variables.insert("app_version".to_string(), "1.2.3".to_string());
    let mut web_secure = AttrMap::new();
    web_secure.insert("db_password".to_string(), "hunter2".to_string());

    let mut db_attrs = BTreeMap::new();
    db_attrs.insert("size".to_string(), AttrValue::Scalar("L".to_string()));
    let mut db_components = BTreeMap::new();
    db_components.insert(
        "compute".to_string(),
        ComponentSpec {
            attachments: None,
            attributes: db_attrs,
        },
    );

    TopologySpec {
        assembly: "web-stack".to_string(),
        environment: "prod".to_string(),
        description: Some("sample stack".to_string()),
        auto_name: false,
        platforms: vec![
            PlatformSpec {
                name: "web".to_string(),
                pack: "tomcat".to_string(),
                pack_version: "1".to_string(),
                pack_source: "main".to_string(),
                deploy_order: 1,
                components: web_components,
                links: vec![],
                variables: web_variables,
                secure_variables: web_secure,
            },
            PlatformSpec {
                name: "db".to_string(),
                pack: "postgresql".to_string(),
                pack_version: "9".to_string(),
                pack_source: "main".to_string(),
                deploy_order: 2,
                components: db_components,
                links: vec![],
                variables: AttrMap::new(),
                secure_variables: AttrMap::new(),
            },
        ],
        scales: vec![ScaleSpec {
            platform: "web".to_string(),
            component: "compute".to_string(),
            current: 2,
            min: 2,
            max: 4,
            percent_deploy: 100,
        }],
    }
}
