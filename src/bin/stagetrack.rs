use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use stagetrack::config::loader::load_project_config;
use stagetrack::nodes::builtin::EchoNode;
use stagetrack::{Node, ParameterSet, StageId, Tracker};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project config (YAML)
    #[arg(long, short, global = true, default_value = "stagetrack.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a parameter set for a node type and print its stage
    Configure {
        node_type: String,

        /// Parameters (key=value)
        #[arg(long = "param", short = 'p', value_parser = parse_key_val)]
        params: Vec<(String, Value)>,
    },

    /// Execute a configured stage (called by the pipeline executor)
    Run {
        node_type: String,

        #[arg(long)]
        id: StageId,
    },

    /// Print the stored parameters of a stage
    Show { node_type: String, id: StageId },

    /// List stages whose parameters match every key=value filter
    Query {
        node_type: String,

        #[arg(long = "param", short = 'p', value_parser = parse_key_val)]
        filter: Vec<(String, Value)>,
    },

    /// Print the file set of a stage
    Files { node_type: String, id: StageId },

    /// Print the pipeline-file entry of a stage
    Stage { node_type: String, id: StageId },
}

fn parse_key_val(s: &str) -> Result<(String, Value), String> {
    let pos = s.find('=').ok_or_else(|| format!("invalid KEY=value: no `=` found in `{}`", s))?;
    let key = s[..pos].to_string();
    let val_str = &s[pos + 1..];
    // Try parsing as JSON, otherwise treat as string
    let val = serde_json::from_str(val_str).unwrap_or_else(|_| Value::String(val_str.to_string()));
    Ok((key, val))
}

fn register_standard_nodes(tracker: &mut Tracker) {
    tracker.register_node(Arc::new(EchoNode));
}

fn describe(node: &Node) -> Result<Value> {
    Ok(json!({
        "node_type": node.type_name(),
        "id": node.id(),
        "stage": node.stage_name(),
        "parameters": node.parameters(),
        "files": node.files()?,
    }))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let project = load_project_config(&cli.config)?;
    let mut tracker = Tracker::new(project);
    register_standard_nodes(&mut tracker);

    match cli.command {
        Commands::Configure { node_type, params } => {
            let parameters: ParameterSet = params.into_iter().collect();
            let node = tracker
                .configure(&node_type, &parameters)
                .with_context(|| format!("Failed to configure {}", node_type))?;
            info!("Configured stage: {}", node.stage_name().unwrap_or_default());
            print_json(&describe(&node)?)?;
        }
        Commands::Run { node_type, id } => {
            let node = tracker.run_stage(&node_type, id)?;
            info!("Stage {} is {:?}", node.stage_name().unwrap_or_default(), node.state());
        }
        Commands::Show { node_type, id } => {
            let node = tracker.get_by_id(&node_type, id)?;
            print_json(&Value::Object(node.parameters().clone()))?;
        }
        Commands::Query { node_type, filter } => {
            let filter: ParameterSet = filter.into_iter().collect();
            let nodes = tracker.query(&node_type, &filter)?;
            let listed = nodes.iter().map(describe).collect::<Result<Vec<_>>>()?;
            print_json(&Value::Array(listed))?;
        }
        Commands::Files { node_type, id } => {
            let node = tracker.get_by_id(&node_type, id)?;
            print_json(&serde_json::to_value(node.files()?)?)?;
        }
        Commands::Stage { node_type, id } => {
            let node = tracker.get_by_id(&node_type, id)?;
            match tracker.pipeline_stage(&node)? {
                Some(stage) => print!("{}", serde_yaml::to_string(&stage)?),
                None => info!("No pipeline entry for {}", node.stage_name().unwrap_or_default()),
            }
        }
    }

    Ok(())
}
