//! kiln-core - Core library for Kiln
//!
//! Shared types used across the workspace: project configuration, model
//! descriptors and their registry, materialization tasks, and the model
//! dependency graph.

pub mod config;
pub mod dag;
pub mod error;
pub mod model;
pub mod model_name;
pub mod project;
pub mod registry;
pub mod task;

pub use config::{Config, Materialization};
pub use dag::{ModelDag, VisualEdge, VisualElements, VisualNode};
pub use error::{CoreError, CoreResult};
pub use model::{Model, ModelConfig, ModelDescriptor};
pub use model_name::ModelName;
pub use project::Project;
pub use registry::ModelRegistry;
pub use task::{discover_tasks, tasks_by_name, Task};
