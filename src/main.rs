//! Convoy CLI - topology provisioning and deployment orchestrator
//!
//! Usage: convoy <COMMAND>
//!
//! Commands:
//!   create      Create the assembly and deploy the declared topology
//!   update      Reconcile an existing assembly against the topology
//!   status      Show the deployment status (environment or one deployment)
//!   remove      Delete the assembly and everything under it
//!   retry       Re-trigger the last failed deployment
//!   procedure   Execute a procedure action and wait for it
//!   ips         Print compute-node private IPs
//!   automation  Run the automation tool against a generated inventory

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use convoy::cli::{exit_for_error, exit_for_procedure, exit_for_process, Cli, Commands};
use convoy::client::{ControlPlane, HttpControlPlane};
use convoy::config::load_topology;
use convoy::error::{ConvoyError, ConvoyResult};
use convoy::events::{ConsoleSink, EventSink};
use convoy::inventory::{build_inventory, format_ips, list_private_ips, AutomationRunner};
use convoy::models::TopologySpec;
use convoy::orchestrator::{Orchestrator, OrchestratorOptions};
use convoy::poll::RealSleeper;
use convoy::procedure::{ProcedureExecutor, ProcedureOutcome};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(exit_for_error(&e))
        }
    }
}

fn run(cli: Cli) -> ConvoyResult<u8> {
    let mut topology = load_topology(&cli.file)?;
    let client: Arc<dyn ControlPlane> = control_plane(&cli, &topology)?;
    let sink: Arc<dyn EventSink> = Arc::new(ConsoleSink { quiet: cli.quiet });

    match cli.command {
        Commands::Create {
            message,
            no_deploy,
            disable_relay,
        } => cmd_process(
            client,
            sink,
            &mut topology,
            false,
            message,
            no_deploy,
            disable_relay,
        ),
        Commands::Update {
            message,
            no_deploy,
            disable_relay,
        } => cmd_process(
            client,
            sink,
            &mut topology,
            true,
            message,
            no_deploy,
            disable_relay,
        ),
        Commands::Status { id } => cmd_status(client, sink, &topology, id),
        Commands::Remove { yes } => cmd_remove(client, sink, &topology, yes),
        Commands::Retry => cmd_retry(client, sink, &topology),
        Commands::Procedure {
            platform,
            component,
            action,
            args,
            instances,
            rollout,
        } => cmd_procedure(client, &platform, &component, &action, &args, instances, rollout),
        Commands::Ips {
            platform,
            component,
        } => cmd_ips(client, &platform, &component),
        Commands::Automation {
            script,
            inventory,
            platform,
            component,
            tool,
        } => cmd_automation(
            client,
            &topology,
            &script,
            inventory.as_deref(),
            platform.as_deref(),
            component.as_deref(),
            &tool,
        ),
    }
}

fn control_plane(cli: &Cli, topology: &TopologySpec) -> ConvoyResult<Arc<dyn ControlPlane>> {
    let endpoint = cli
        .endpoint
        .as_deref()
        .ok_or_else(|| ConvoyError::Validation("--endpoint (or CONVOY_ENDPOINT) is required".to_string()))?;
    let token = cli
        .token
        .as_deref()
        .ok_or_else(|| ConvoyError::Validation("--token (or CONVOY_TOKEN) is required".to_string()))?;
    Ok(Arc::new(HttpControlPlane::new(
        endpoint,
        token,
        &topology.assembly,
    )))
}

#[allow(clippy::too_many_arguments)]
fn cmd_process(
    client: Arc<dyn ControlPlane>,
    sink: Arc<dyn EventSink>,
    topology: &mut TopologySpec,
    is_update: bool,
    message: Option<String>,
    no_deploy: bool,
    disable_relay: bool,
) -> ConvoyResult<u8> {
    let options = OrchestratorOptions {
        comment: message,
        no_deploy,
        enable_delivery_relay: !disable_relay,
    };
    let orchestrator = Orchestrator::new(client, sink, Arc::new(RealSleeper), options);
    let outcome = orchestrator.process(topology, is_update)?;
    Ok(exit_for_process(&outcome))
}

fn cmd_status(
    client: Arc<dyn ControlPlane>,
    sink: Arc<dyn EventSink>,
    topology: &TopologySpec,
    id: Option<u64>,
) -> ConvoyResult<u8> {
    let orchestrator = Orchestrator::new(
        client,
        sink,
        Arc::new(RealSleeper),
        OrchestratorOptions::default(),
    );
    match id {
        Some(id) => {
            let record = orchestrator.deployment(topology, id)?;
            println!("Deployment {}: {:?}", record.id, record.status);
        }
        None => {
            let status = orchestrator.status(topology)?;
            println!("{}: {:?}", topology.environment, status);
        }
    }
    Ok(convoy::cli::EXIT_NORMAL)
}

fn cmd_remove(
    client: Arc<dyn ControlPlane>,
    sink: Arc<dyn EventSink>,
    topology: &TopologySpec,
    yes: bool,
) -> ConvoyResult<u8> {
    if !yes {
        eprintln!(
            "Refusing to remove assembly '{}' without --yes.",
            topology.assembly
        );
        return Ok(convoy::cli::EXIT_WRONG_PARAMETER);
    }
    let orchestrator = Orchestrator::new(
        client,
        sink,
        Arc::new(RealSleeper),
        OrchestratorOptions::default(),
    );
    if orchestrator.remove(topology)? {
        println!("Removed assembly '{}'.", topology.assembly);
    } else {
        println!("There is no assembly '{}' to remove.", topology.assembly);
    }
    Ok(convoy::cli::EXIT_NORMAL)
}

fn cmd_retry(
    client: Arc<dyn ControlPlane>,
    sink: Arc<dyn EventSink>,
    topology: &TopologySpec,
) -> ConvoyResult<u8> {
    let orchestrator = Orchestrator::new(
        client,
        sink,
        Arc::new(RealSleeper),
        OrchestratorOptions::default(),
    );
    let record = orchestrator.retry_deployment(topology)?;
    println!("Deployment {} is running.", record.id);
    Ok(convoy::cli::EXIT_NORMAL)
}

fn cmd_procedure(
    client: Arc<dyn ControlPlane>,
    platform: &str,
    component: &str,
    action: &str,
    args: &str,
    instances: Option<String>,
    rollout: u32,
) -> ConvoyResult<u8> {
    let executor = ProcedureExecutor::new(client, Arc::new(RealSleeper));
    let outcome = executor.run(platform, component, action, args, instances.as_deref(), rollout)?;
    match &outcome {
        ProcedureOutcome::Completed => println!("Procedure completed."),
        ProcedureOutcome::ActionsListed(actions) => {
            for action in actions {
                println!("{}", action);
            }
        }
        ProcedureOutcome::InstancesListed(instances) => {
            for instance in instances {
                println!("{}", instance);
            }
        }
        ProcedureOutcome::NotComplete(status) => {
            eprintln!("Procedure did not complete (last status: {:?}).", status)
        }
        ProcedureOutcome::SubmitFailed(message) => {
            eprintln!("Could not submit procedure: {}", message)
        }
    }
    Ok(exit_for_procedure(&outcome))
}

fn cmd_ips(client: Arc<dyn ControlPlane>, platform: &str, component: &str) -> ConvoyResult<u8> {
    let ips = list_private_ips(&*client, platform, component)?;
    print!("{}", format_ips(&ips));
    Ok(convoy::cli::EXIT_NORMAL)
}

fn cmd_automation(
    client: Arc<dyn ControlPlane>,
    topology: &TopologySpec,
    script: &std::path::Path,
    inventory: Option<&std::path::Path>,
    platform: Option<&str>,
    component: Option<&str>,
    tool: &str,
) -> ConvoyResult<u8> {
    let entries = build_inventory(&*client, topology, platform, component)?;
    let runner = AutomationRunner::with_tool(tool);
    runner.run(script, inventory, &entries, |line| println!("{}", line))?;
    Ok(convoy::cli::EXIT_NORMAL)
}
