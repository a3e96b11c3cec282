//! List command implementation

use anyhow::{Context, Result};
use kiln_core::ModelDag;
use serde::Serialize;

use crate::cli::{GlobalArgs, LsArgs, LsOutput};
use crate::commands::common::{format_table, load_project};

/// One row of `kiln ls` output
#[derive(Debug, Serialize)]
struct ModelInfo {
    name: String,
    materialized: Option<String>,
    depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

/// Execute the ls command
pub async fn execute(args: &LsArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let graph = ModelDag::from_registry(&project.registry)
        .context("Failed to build dependency graph")?;
    let order = graph
        .topological_order()
        .context("Failed to order models")?;

    // Dependencies that are not models themselves have no kind
    let models: Vec<ModelInfo> = order
        .iter()
        .map(|name| {
            let descriptor = project.registry.get(name);
            ModelInfo {
                name: name.to_string(),
                materialized: descriptor.map(|m| m.materialization_kind().to_string()),
                depends_on: graph
                    .dependencies(name)
                    .iter()
                    .map(|d| d.to_string())
                    .collect(),
                description: descriptor.and_then(|m| m.description().map(String::from)),
            }
        })
        .collect();

    match args.output {
        LsOutput::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&models).context("Failed to serialize models")?
            );
        }
        LsOutput::Table => {
            let rows: Vec<Vec<String>> = models
                .iter()
                .map(|m| {
                    vec![
                        m.name.clone(),
                        m.materialized.clone().unwrap_or_else(|| "-".to_string()),
                        m.depends_on.join(", "),
                    ]
                })
                .collect();
            println!("{}", format_table(&["NAME", "MATERIALIZED", "DEPENDS_ON"], &rows));
            println!("\n{} models", project.registry.len());
        }
    }
    Ok(())
}
