//! Property tests for [`orch_core::Graph`]: whatever shape of acyclic
//! dependencies we throw at it, leveling and hour totals must stay
//! internally consistent.

use std::collections::{HashMap, HashSet};

use orch_core::{Graph, Specialty, TaskNode};
use proptest::prelude::*;

/// A DAG built by letting each task depend on a subset of the tasks that
/// came before it — acyclic by construction.
fn dag_strategy() -> impl Strategy<Value = Vec<(String, f64, Vec<usize>)>> {
    (2_usize..20).prop_flat_map(|n| {
        let hours = prop::collection::vec(0.1_f64..10.0, n);
        let edges = (0..n)
            .map(|i| prop::collection::vec(0..i.max(1), 0..=i.min(3)).prop_map(move |mut deps| {
                deps.retain(|&d| d < i);
                deps.sort_unstable();
                deps.dedup();
                deps
            }))
            .collect::<Vec<_>>();

        (hours, edges).prop_map(move |(hours, edges)| {
            (0..n)
                .map(|i| (format!("t{i}"), hours[i], edges[i].clone()))
                .collect::<Vec<_>>()
        })
    })
}

fn build_graph(spec: &[(String, f64, Vec<usize>)]) -> Graph {
    let mut graph = Graph::new();
    for (id, hours, deps) in spec {
        let dep_ids = deps.iter().map(|&d| spec[d].0.clone());
        graph.add_node(TaskNode::new(id.clone(), Specialty::Backend, *hours, dep_ids));
    }
    graph
}

proptest! {
    #[test]
    fn backward_only_dependencies_are_always_acyclic(spec in dag_strategy()) {
        let graph = build_graph(&spec);
        let (acyclic, cycle) = graph.validate_acyclic();
        prop_assert!(acyclic, "unexpected cycle: {cycle:?}");
    }

    #[test]
    fn parallel_hours_never_exceeds_sequential_hours(spec in dag_strategy()) {
        let graph = build_graph(&spec);
        let sequential = graph.total_estimated_hours();
        let parallel = graph.parallel_estimated_hours().unwrap();
        prop_assert!(parallel <= sequential + f64::EPSILON);
    }

    #[test]
    fn levels_partition_every_task_exactly_once_and_respect_dependencies(spec in dag_strategy()) {
        let graph = build_graph(&spec);
        let levels = graph.execution_order().unwrap();

        let mut seen = HashSet::new();
        let mut level_of = HashMap::new();
        for (level_idx, level) in levels.iter().enumerate() {
            for id in level {
                prop_assert!(seen.insert(id.clone()), "task {id} appeared in more than one level");
                level_of.insert(id.clone(), level_idx);
            }
        }
        prop_assert_eq!(seen.len(), spec.len());

        for (id, _, deps) in &spec {
            for &dep_idx in deps {
                let dep_id = &spec[dep_idx].0;
                prop_assert!(
                    level_of[dep_id] < level_of[id],
                    "{id} does not come strictly after its dependency {dep_id}"
                );
            }
        }
    }

    #[test]
    fn each_levels_max_hours_is_at_least_every_tasks_hours_in_it(spec in dag_strategy()) {
        let graph = build_graph(&spec);
        let levels = graph.execution_order().unwrap();
        let parallel = graph.parallel_estimated_hours().unwrap();

        let level_maxima: f64 = levels
            .iter()
            .map(|level| {
                level
                    .iter()
                    .map(|id| graph.get(id).unwrap().estimated_hours)
                    .fold(0.0_f64, f64::max)
            })
            .sum();

        prop_assert!((level_maxima - parallel).abs() < 1e-9);
    }
}
