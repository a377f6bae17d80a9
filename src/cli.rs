//! Command-line surface for convoy
//!
//! Parsing only; dispatch lives in `main.rs`. The numeric exit codes are part
//! of the CLI's contract and are mapped here from errors and outcomes.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::ConvoyError;
use crate::orchestrator::ProcessOutcome;
use crate::procedure::ProcedureOutcome;

pub const EXIT_NORMAL: u8 = 0;
pub const EXIT_UNKNOWN: u8 = 1;
pub const EXIT_WRONG_PARAMETER: u8 = 2;
pub const EXIT_ENTITY_NOT_FOUND: u8 = 3;
pub const EXIT_REMOTE_CLIENT: u8 = 4;
pub const EXIT_NOT_COMPLETE: u8 = 5;

/// Convoy - topology provisioning and deployment orchestrator
#[derive(Parser, Debug)]
#[command(name = "convoy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the topology file
    #[arg(short = 'f', long, global = true, default_value = "convoy.yml")]
    pub file: PathBuf,

    /// Control-plane endpoint
    #[arg(long, global = true, env = "CONVOY_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Control-plane API token
    #[arg(long, global = true, env = "CONVOY_TOKEN")]
    pub token: Option<String>,

    /// Suppress informational output, keep failures
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the assembly and deploy the declared topology
    Create {
        /// Environment commit comment
        #[arg(short, long)]
        message: Option<String>,

        /// Converge the design but skip the deployment trigger
        #[arg(long)]
        no_deploy: bool,

        /// Leave the delivery relay disabled
        #[arg(long)]
        disable_relay: bool,
    },

    /// Reconcile an existing assembly against the declared topology
    Update {
        /// Environment commit comment
        #[arg(short, long)]
        message: Option<String>,

        /// Converge the design but skip the deployment trigger
        #[arg(long)]
        no_deploy: bool,

        /// Leave the delivery relay disabled
        #[arg(long)]
        disable_relay: bool,
    },

    /// Show the environment's current deployment status, or one deployment
    /// by id
    Status {
        /// Deployment id to look up instead of the environment status
        id: Option<u64>,
    },

    /// Delete the assembly with every environment and platform under it
    Remove {
        /// Confirm the deletion; without this flag nothing is removed
        #[arg(short, long)]
        yes: bool,
    },

    /// Re-trigger the environment's last failed deployment
    Retry,

    /// Execute a procedure action and wait for it to finish
    Procedure {
        /// Platform name
        platform: String,

        /// Component name
        component: String,

        /// Action name, or "list" to enumerate available actions
        action: String,

        /// JSON argument blob passed to the action
        #[arg(default_value = "")]
        args: String,

        /// Comma-separated instance names, or "list" to enumerate them
        #[arg(short, long)]
        instances: Option<String>,

        /// Rollout percentage
        #[arg(short, long, default_value_t = 100)]
        rollout: u32,
    },

    /// Print private IPs of compute nodes under a platform/component
    Ips {
        /// Platform name
        platform: String,

        /// Component name
        component: String,
    },

    /// Build an inventory and run the automation tool against it
    Automation {
        /// Path to the automation script
        script: PathBuf,

        /// Write the inventory here instead of a temporary file
        #[arg(short = 'i', long)]
        inventory: Option<PathBuf>,

        /// Restrict to one platform
        #[arg(short, long)]
        platform: Option<String>,

        /// Restrict to one component
        #[arg(short, long)]
        component: Option<String>,

        /// Automation tool to invoke
        #[arg(long, default_value = "ansible-playbook")]
        tool: String,
    },
}

/// Exit code for a failed library call
pub fn exit_for_error(error: &ConvoyError) -> u8 {
    match error {
        ConvoyError::EntityNotFound { .. } | ConvoyError::EntityAlreadyExists { .. } => {
            EXIT_ENTITY_NOT_FOUND
        }
        ConvoyError::RemoteApi(_) => EXIT_REMOTE_CLIENT,
        ConvoyError::Validation(_) | ConvoyError::TopologyNotFound { .. } => EXIT_WRONG_PARAMETER,
        ConvoyError::Automation(_) | ConvoyError::Io(_) | ConvoyError::Yaml(_) => EXIT_UNKNOWN,
    }
}

/// Exit code for a completed orchestration run
pub fn exit_for_process(outcome: &ProcessOutcome) -> u8 {
    match outcome {
        ProcessOutcome::Deployed(_)
        | ProcessOutcome::NothingToDeploy
        | ProcessOutcome::Blocked(_)
        | ProcessOutcome::CreatedWithoutDeployment => EXIT_NORMAL,
        ProcessOutcome::DeploymentFailed(_) => EXIT_REMOTE_CLIENT,
    }
}

/// Exit code for a completed procedure run
pub fn exit_for_procedure(outcome: &ProcedureOutcome) -> u8 {
    match outcome {
        ProcedureOutcome::Completed
        | ProcedureOutcome::ActionsListed(_)
        | ProcedureOutcome::InstancesListed(_) => EXIT_NORMAL,
        ProcedureOutcome::NotComplete(_) => EXIT_NOT_COMPLETE,
        ProcedureOutcome::SubmitFailed(_) => EXIT_REMOTE_CLIENT,
    }
}
