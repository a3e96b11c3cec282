//! Graph command implementation

use anyhow::{Context, Result};
use kiln_core::ModelDag;

use crate::cli::{GlobalArgs, GraphArgs, GraphOutput};
use crate::commands::common::load_project;

/// Execute the graph command
pub async fn execute(args: &GraphArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let graph = ModelDag::from_registry(&project.registry)
        .context("Failed to build dependency graph")?;

    match args.output {
        GraphOutput::Json => {
            let elements = graph.to_visual_elements().to_cytoscape();
            println!(
                "{}",
                serde_json::to_string_pretty(&elements).context("Failed to serialize graph")?
            );
        }
        GraphOutput::Order => {
            let order = graph
                .topological_order()
                .context("Failed to order models")?;
            // The root is the head of the order; no need to sort twice
            let root = order.first();
            for name in &order {
                if Some(name) == root {
                    println!("{} (root)", name);
                } else {
                    println!("{}", name);
                }
            }
        }
    }
    Ok(())
}
