//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Kiln - compile SQL models and materialize them in dependency order
#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: String,

    /// Override config file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render model templates to the compiled directory
    Compile(CompileArgs),

    /// Materialize models against the warehouse
    Run(RunArgs),

    /// List models in dependency order
    Ls(LsArgs),

    /// Export the model dependency graph
    Graph(GraphArgs),
}

/// Arguments for the compile command
#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Override output directory
    #[arg(short, long)]
    pub output_dir: Option<String>,
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Number of concurrent workers (defaults to `threads` in kiln.yml)
    #[arg(short = 'j', long, env = "KILN_THREADS")]
    pub threads: Option<usize>,

    /// Milliseconds an idle worker waits for work before exiting
    #[arg(long)]
    pub idle_timeout_ms: Option<u64>,

    /// Use existing compiled artifacts instead of compiling first
    #[arg(long)]
    pub no_compile: bool,

    /// Suppress the progress bar and per-model lines
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the ls command
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: LsOutput,
}

/// List output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LsOutput {
    /// Table format
    Table,
    /// JSON output
    Json,
}

/// Arguments for the graph command
#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub output: GraphOutput,
}

/// Graph output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphOutput {
    /// Cytoscape element JSON
    Json,
    /// Topological order, one model per line
    Order,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
