//! Wire shape of the planner's LLM response, and the execution plan
//! derived from its dependency graph.

use orch_core::Specialty;
use serde::{Deserialize, Serialize};

/// One task as the model describes it, before it is stamped with a
/// project id and turned into an [`orch_core::Task`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlannedTask {
    pub id: String,
    pub title: String,
    pub description: String,
    pub specialty: Specialty,
    pub estimated_hours: f64,
    #[serde(default)]
    pub files_to_create: Vec<String>,
    #[serde(default)]
    pub files_to_modify: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// The model's full decomposition response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlanResponse {
    pub project_name: String,
    pub description: String,
    pub estimated_total_hours: f64,
    pub tasks: Vec<PlannedTask>,
}

/// Derived schedule over a validated plan's dependency graph.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionPlan {
    pub levels: Vec<Vec<String>>,
    pub level_hours: Vec<f64>,
    pub critical_path: Vec<String>,
    pub critical_path_hours: f64,
    pub sequential_hours: f64,
    pub parallel_hours: f64,
    pub speedup_factor: f64,
}
