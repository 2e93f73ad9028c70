//! Turns a natural-language requirements blob into a validated,
//! dependency-ordered task plan.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use orch_core::{Graph, Task, TaskNode};
use orch_llm::LlmClient;
use serde_json::json;
use tracing::info;

use crate::error::{Error, Result};
use crate::types::{ExecutionPlan, PlanResponse};

const SYSTEM_PROMPT: &str = "You are a technical project planner. Decompose the given \
requirements into a dependency-ordered list of implementation tasks, each assigned to \
exactly one specialty.";

pub struct Planner {
    llm: Arc<dyn LlmClient>,
}

impl Planner {
    #[must_use]
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Ask the model to decompose `requirements` into a task plan.
    pub async fn decompose(&self, requirements: &str, project_context: Option<&str>) -> Result<PlanResponse> {
        let prompt = build_prompt(requirements, project_context);
        let value = self
            .llm
            .invoke_with_json_schema(&prompt, &plan_schema(), Some(SYSTEM_PROMPT))
            .await?;

        let plan: PlanResponse = serde_json::from_value(value).map_err(|e| {
            Error::Graph(orch_core::Error::PlanValidation(format!("malformed plan response: {e}")))
        })?;

        info!(project = plan.project_name, tasks = plan.tasks.len(), "decomposed plan");
        Ok(plan)
    }

    /// Validate a plan's structural integrity and build its dependency
    /// graph: unique task ids, dependencies that refer to real tasks, and
    /// an acyclic dependency structure.
    pub fn validate(&self, plan: &PlanResponse) -> Result<Graph> {
        let mut seen = HashSet::new();
        for task in &plan.tasks {
            if !seen.insert(task.id.as_str()) {
                return Err(Error::Graph(orch_core::Error::PlanValidation(format!(
                    "duplicate task id: {}",
                    task.id
                ))));
            }
        }

        for task in &plan.tasks {
            for dep in &task.dependencies {
                if !seen.contains(dep.as_str()) {
                    return Err(Error::Graph(orch_core::Error::PlanValidation(format!(
                        "task {} depends on unknown task {dep}",
                        task.id
                    ))));
                }
            }
        }

        let mut graph = Graph::new();
        for task in &plan.tasks {
            graph.add_node(TaskNode::new(
                task.id.clone(),
                task.specialty,
                task.estimated_hours,
                task.dependencies.clone(),
            ));
        }

        let (acyclic, cycle) = graph.validate_acyclic();
        if !acyclic {
            let path = cycle.unwrap_or_default().join(" -> ");
            return Err(Error::Graph(orch_core::Error::PlanValidation(format!(
                "dependency cycle: {path}"
            ))));
        }

        Ok(graph)
    }

    /// Emit the execution plan: topological levels, per-level hours, the
    /// critical path, and the parallel speedup over sequential execution.
    pub fn build_execution_plan(&self, graph: &Graph) -> Result<ExecutionPlan> {
        let levels = graph.execution_order().map_err(Error::Graph)?;
        let level_hours = levels
            .iter()
            .map(|level| {
                level
                    .iter()
                    .filter_map(|id| graph.get(id))
                    .map(|n| n.estimated_hours)
                    .fold(0.0_f64, f64::max)
            })
            .collect();

        let (critical_path, critical_path_hours) = graph.critical_path().map_err(Error::Graph)?;
        let sequential_hours = graph.total_estimated_hours();
        let parallel_hours = graph.parallel_estimated_hours().map_err(Error::Graph)?;
        let speedup_factor = if parallel_hours > 0.0 {
            sequential_hours / parallel_hours
        } else {
            1.0
        };

        Ok(ExecutionPlan {
            levels,
            level_hours,
            critical_path,
            critical_path_hours,
            sequential_hours,
            parallel_hours,
            speedup_factor,
        })
    }

    /// Tasks with no remaining prerequisites: the initial dequeue-ready set.
    #[must_use]
    pub fn get_initial_tasks(graph: &Graph) -> Vec<String> {
        graph.get_ready_tasks().iter().map(|n| n.task_id.clone()).collect()
    }

    /// Convert a validated plan into [`Task`] descriptors ready for
    /// enqueueing, stamped with `project_id` and the current time.
    #[must_use]
    pub fn into_tasks(plan: &PlanResponse, project_id: &str) -> Vec<Task> {
        let now = Utc::now();
        plan.tasks
            .iter()
            .map(|t| Task {
                id: t.id.clone(),
                title: t.title.clone(),
                description: t.description.clone(),
                specialty: t.specialty,
                files_to_create: t.files_to_create.clone(),
                files_to_modify: t.files_to_modify.clone(),
                dependencies: t.dependencies.clone(),
                estimated_hours: t.estimated_hours,
                project_id: project_id.to_string(),
                created_at: now,
            })
            .collect()
    }
}

fn build_prompt(requirements: &str, project_context: Option<&str>) -> String {
    let mut prompt = format!(
        "Decompose the following requirements into an ordered list of implementation tasks.\n\n\
         Requirements:\n{requirements}\n"
    );
    if let Some(context) = project_context {
        prompt.push_str(&format!("\nProject context:\n{context}\n"));
    }
    prompt.push_str(
        "\nEach task must specify: id, title, description, specialty (one of frontend, \
         backend, testing, docs, infra, integration), estimated_hours, files_to_create, \
         files_to_modify, and dependencies (ids of tasks that must complete first).\n",
    );
    prompt
}

fn plan_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["project_name", "description", "estimated_total_hours", "tasks"],
        "properties": {
            "project_name": { "type": "string" },
            "description": { "type": "string" },
            "estimated_total_hours": { "type": "number" },
            "tasks": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id", "title", "description", "specialty", "estimated_hours"],
                    "properties": {
                        "id": { "type": "string" },
                        "title": { "type": "string" },
                        "description": { "type": "string" },
                        "specialty": {
                            "type": "string",
                            "enum": ["frontend", "backend", "testing", "docs", "infra", "integration"]
                        },
                        "estimated_hours": { "type": "number" },
                        "files_to_create": { "type": "array", "items": { "type": "string" } },
                        "files_to_modify": { "type": "array", "items": { "type": "string" } },
                        "dependencies": { "type": "array", "items": { "type": "string" } }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_llm::FakeLlmClient;

    fn sample_plan_json() -> &'static str {
        r#"{
            "project_name": "demo",
            "description": "a tiny project",
            "estimated_total_hours": 6.0,
            "tasks": [
                {"id": "t1", "title": "schema", "description": "design schema", "specialty": "backend", "estimated_hours": 2.0, "dependencies": []},
                {"id": "t2", "title": "api", "description": "build api", "specialty": "backend", "estimated_hours": 3.0, "dependencies": ["t1"]},
                {"id": "t3", "title": "ui", "description": "build ui", "specialty": "frontend", "estimated_hours": 1.0, "dependencies": ["t1"]}
            ]
        }"#
    }

    #[tokio::test]
    async fn decomposes_and_validates_a_clean_plan() {
        let llm = Arc::new(FakeLlmClient::with_json(vec![sample_plan_json()]));
        let planner = Planner::new(llm);

        let plan = planner.decompose("build a demo app", None).await.unwrap();
        assert_eq!(plan.tasks.len(), 3);

        let graph = planner.validate(&plan).unwrap();
        let initial = Planner::get_initial_tasks(&graph);
        assert_eq!(initial, vec!["t1".to_string()]);

        let exec_plan = planner.build_execution_plan(&graph).unwrap();
        assert_eq!(exec_plan.levels.len(), 2);
        assert!((exec_plan.sequential_hours - 6.0).abs() < f64::EPSILON);
        assert!((exec_plan.parallel_hours - 5.0).abs() < f64::EPSILON); // t1 + max(t2, t3)
        assert!(exec_plan.speedup_factor > 1.0);
    }

    #[tokio::test]
    async fn rejects_plan_with_unknown_dependency() {
        let bad_plan = r#"{
            "project_name": "demo",
            "description": "broken",
            "estimated_total_hours": 1.0,
            "tasks": [
                {"id": "t1", "title": "x", "description": "x", "specialty": "backend", "estimated_hours": 1.0, "dependencies": ["ghost"]}
            ]
        }"#;
        let llm = Arc::new(FakeLlmClient::with_json(vec![bad_plan]));
        let planner = Planner::new(llm);

        let plan = planner.decompose("anything", None).await.unwrap();
        let err = planner.validate(&plan).unwrap_err();
        assert!(matches!(err, Error::Graph(orch_core::Error::PlanValidation(_))));
    }

    #[tokio::test]
    async fn rejects_plan_with_dependency_cycle() {
        let cyclic_plan = r#"{
            "project_name": "demo",
            "description": "cyclic",
            "estimated_total_hours": 2.0,
            "tasks": [
                {"id": "t1", "title": "a", "description": "a", "specialty": "backend", "estimated_hours": 1.0, "dependencies": ["t2"]},
                {"id": "t2", "title": "b", "description": "b", "specialty": "backend", "estimated_hours": 1.0, "dependencies": ["t1"]}
            ]
        }"#;
        let llm = Arc::new(FakeLlmClient::with_json(vec![cyclic_plan]));
        let planner = Planner::new(llm);

        let plan = planner.decompose("anything", None).await.unwrap();
        assert!(planner.validate(&plan).is_err());
    }

    #[tokio::test]
    async fn into_tasks_stamps_project_id() {
        let llm = Arc::new(FakeLlmClient::with_json(vec![sample_plan_json()]));
        let planner = Planner::new(llm);
        let plan = planner.decompose("build a demo app", None).await.unwrap();

        let tasks = Planner::into_tasks(&plan, "proj-1");
        assert_eq!(tasks.len(), 3);
        assert!(tasks.iter().all(|t| t.project_id == "proj-1"));
    }
}
