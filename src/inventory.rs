//! Inventory & automation runner
//!
//! Collects compute-node private IPs for the declared topology, materializes
//! them into a host inventory file, and drives an external automation tool
//! against it. Auto-created inventory files are removed on every exit path;
//! caller-specified paths are never deleted.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::channel;

use tempfile::NamedTempFile;

use crate::client::ControlPlane;
use crate::error::{ConvoyError, ConvoyResult};
use crate::models::{InventoryEntry, TopologySpec};

/// Default automation tool
pub const DEFAULT_AUTOMATION_TOOL: &str = "ansible-playbook";

/// Private IPs of all compute nodes under (platform, component), in
/// remote-returned order
pub fn list_private_ips(
    client: &dyn ControlPlane,
    platform: &str,
    component: &str,
) -> ConvoyResult<Vec<String>> {
    let nodes = client.list_compute_nodes(platform, component)?;
    Ok(nodes.into_iter().map(|node| node.private_ip).collect())
}

/// Newline-joined display form of an IP list, with a trailing newline
pub fn format_ips(ips: &[String]) -> String {
    let mut out = String::new();
    for ip in ips {
        out.push_str(ip);
        out.push('\n');
    }
    out
}

/// Enumerate (platform, compute-component) pairs in declaration order and
/// collect their IPs, honoring the optional filters (unfiltered = all)
pub fn build_inventory(
    client: &dyn ControlPlane,
    topology: &TopologySpec,
    platform_filter: Option<&str>,
    component_filter: Option<&str>,
) -> ConvoyResult<Vec<InventoryEntry>> {
    let computes = topology.compute_component_names();
    let mut entries = Vec::new();
    for platform in &topology.platforms {
        if platform_filter.is_some_and(|f| f != platform.name) {
            continue;
        }
        for component in &computes {
            if component_filter.is_some_and(|f| f != component) {
                continue;
            }
            for ip in list_private_ips(client, &platform.name, component)? {
                entries.push(InventoryEntry {
                    platform: platform.name.clone(),
                    component: component.clone(),
                    ip,
                });
            }
        }
    }
    Ok(entries)
}

/// Runs the external automation tool against a generated inventory
pub struct AutomationRunner {
    tool: String,
}

impl AutomationRunner {
    pub fn new() -> Self {
        Self {
            tool: DEFAULT_AUTOMATION_TOOL.to_string(),
        }
    }

    pub fn with_tool(tool: &str) -> Self {
        Self {
            tool: tool.to_string(),
        }
    }

    /// Write the inventory and invoke `<tool> -i <inventory> <script>`,
    /// streaming merged stdout+stderr to `on_line` until the tool exits.
    /// An empty inventory is still written and the tool still invoked.
    pub fn run(
        &self,
        script_path: &Path,
        inventory_path: Option<&Path>,
        entries: &[InventoryEntry],
        mut on_line: impl FnMut(&str),
    ) -> ConvoyResult<String> {
        if std::fs::File::open(script_path).is_err() {
            return Err(ConvoyError::Automation(format!(
                "the path [{}] is not a readable file",
                script_path.display()
            )));
        }

        // The temp file handle owns cleanup: dropping it on any exit path
        // below removes the auto-created inventory. Caller paths are plain
        // files and survive.
        let (inventory, _temp): (PathBuf, Option<NamedTempFile>) = match inventory_path {
            Some(path) => {
                write_inventory_to(path, entries)?;
                (path.to_path_buf(), None)
            }
            None => {
                let mut temp = NamedTempFile::with_prefix("convoy-inventory-")
                    .map_err(|e| ConvoyError::Automation(e.to_string()))?;
                write_entries(temp.as_file_mut(), entries)
                    .map_err(|e| ConvoyError::Automation(e.to_string()))?;
                (temp.path().to_path_buf(), Some(temp))
            }
        };

        let mut child = Command::new(&self.tool)
            .arg("-i")
            .arg(&inventory)
            .arg(script_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ConvoyError::Automation(format!("{}: {}", self.tool, e)))?;

        // Merge the error stream into the output stream: both pipes feed one
        // channel, the caller sees a single line sequence.
        let (tx, rx) = channel::<String>();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            let tx = tx.clone();
            readers.push(std::thread::spawn(move || {
                for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                    if tx.send(line).is_err() {
                        return;
                    }
                }
            }));
        }
        if let Some(stderr) = child.stderr.take() {
            let tx = tx.clone();
            readers.push(std::thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    if tx.send(line).is_err() {
                        return;
                    }
                }
            }));
        }
        drop(tx);

        let mut output = String::new();
        for line in rx {
            on_line(&line);
            output.push_str(&line);
            output.push('\n');
        }
        for reader in readers {
            let _ = reader.join();
        }

        let status = child
            .wait()
            .map_err(|e| ConvoyError::Automation(e.to_string()))?;
        if !status.success() {
            return Err(ConvoyError::Automation(format!(
                "{} exited with {:?}",
                self.tool,
                status.code()
            )));
        }
        Ok(output)
    }
}

impl Default for AutomationRunner {
    fn default() -> Self {
        Self::new()
    }
}

fn write_inventory_to(path: &Path, entries: &[InventoryEntry]) -> ConvoyResult<()> {
    let mut file = std::fs::File::create(path)
        .map_err(|e| ConvoyError::Automation(format!("inventory {}: {}", path.display(), e)))?;
    write_entries(&mut file, entries).map_err(|e| ConvoyError::Automation(e.to_string()))
}

fn write_entries(writer: &mut dyn Write, entries: &[InventoryEntry]) -> std::io::Result<()> {
    for entry in entries {
        writeln!(writer, "{}", entry.ip)?;
    }
    writer.flush()
}
