// src/config/validate.rs

use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graphmap::DiGraphMap;
use tracing::warn;

use crate::config::model::{Definition, RawDefinition, TaskDefinition};
use crate::errors::{Result, TaskGraphError};
use crate::export::condition_gate_id;
use crate::types::UnknownReferencePolicy;

impl TryFrom<RawDefinition> for Definition {
    type Error = TaskGraphError;

    fn try_from(mut raw: RawDefinition) -> std::result::Result<Self, Self::Error> {
        ensure_has_tasks(&raw)?;
        resolve_unknown_references(&mut raw.dag, raw.config.unknown_references)?;
        ensure_unique_names(&raw.dag)?;
        validate_fallbacks(&raw.dag)?;
        warn_on_dependency_cycles(&raw.dag);
        Ok(Definition::new_unchecked(raw.config, raw.dag))
    }
}

fn ensure_has_tasks(raw: &RawDefinition) -> Result<()> {
    if raw.dag.is_empty() {
        return Err(TaskGraphError::DefinitionError(
            "definition must contain at least one [dag.<task-id>] section".to_string(),
        ));
    }
    Ok(())
}

fn resolve_unknown_references(
    dag: &mut BTreeMap<String, TaskDefinition>,
    policy: UnknownReferencePolicy,
) -> Result<()> {
    let known: HashSet<String> = dag.keys().cloned().collect();

    for (id, task) in dag.iter_mut() {
        let mut kept = Vec::with_capacity(task.after.len());
        for dep in task.after.drain(..) {
            if known.contains(&dep) {
                kept.push(dep);
                continue;
            }
            match policy {
                UnknownReferencePolicy::Error => {
                    return Err(TaskGraphError::UnknownReference {
                        task: id.clone(),
                        field: "after",
                        reference: dep,
                    });
                }
                UnknownReferencePolicy::Drop => {
                    warn!(task = %id, dep = %dep, "dropping unknown dependency");
                }
            }
        }
        task.after = kept;

        if let Some(fallback) = task.fallback.take() {
            if known.contains(&fallback) {
                task.fallback = Some(fallback);
            } else {
                match policy {
                    UnknownReferencePolicy::Error => {
                        return Err(TaskGraphError::UnknownReference {
                            task: id.clone(),
                            field: "fallback",
                            reference: fallback,
                        });
                    }
                    UnknownReferencePolicy::Drop => {
                        warn!(task = %id, fallback = %fallback, "dropping unknown fallback");
                    }
                }
            }
        }
    }

    Ok(())
}

/// Display names double as export node ids, so they must be unique and must
/// not collide with the `<name>_cond` gate of a conditioned task.
fn ensure_unique_names(dag: &BTreeMap<String, TaskDefinition>) -> Result<()> {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for (id, task) in dag.iter() {
        if let Some(first) = seen.insert(task.name.as_str(), id.as_str()) {
            return Err(TaskGraphError::DuplicateName {
                name: task.name.clone(),
                first: first.to_string(),
                second: id.clone(),
            });
        }
    }

    for (id, task) in dag.iter().filter(|(_, t)| t.condition.is_some()) {
        let gate = condition_gate_id(&task.name);
        if let Some(taken_by) = seen.get(gate.as_str()) {
            return Err(TaskGraphError::GateIdTaken {
                name: gate,
                task: taken_by.to_string(),
                gated: id.clone(),
            });
        }
    }
    Ok(())
}

fn validate_fallbacks(dag: &BTreeMap<String, TaskDefinition>) -> Result<()> {
    // Edge direction: task -> its fallback.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for id in dag.keys() {
        graph.add_node(id.as_str());
    }
    for (id, task) in dag.iter() {
        if let Some(fallback) = task.fallback.as_deref() {
            if fallback == id {
                return Err(TaskGraphError::FallbackCycle(vec![id.clone(), id.clone()]));
            }
            graph.add_edge(id.as_str(), fallback, ());
        }
    }

    match toposort(&graph, None) {
        Ok(_) => Ok(()),
        Err(cycle) => Err(TaskGraphError::FallbackCycle(fallback_cycle_from(
            dag,
            cycle.node_id(),
        ))),
    }
}

/// Follow the fallback chain from `start` until it repeats and return the
/// repeating loop, closed with its first element.
fn fallback_cycle_from(dag: &BTreeMap<String, TaskDefinition>, start: &str) -> Vec<String> {
    let mut order: Vec<&str> = Vec::new();
    let mut current = start;

    loop {
        if let Some(pos) = order.iter().position(|id| *id == current) {
            let mut cycle: Vec<String> = order[pos..].iter().map(|s| s.to_string()).collect();
            cycle.push(current.to_string());
            return cycle;
        }
        order.push(current);
        match dag.get(current).and_then(|t| t.fallback.as_deref()) {
            Some(next) => current = next,
            // toposort reported a node whose chain ends; nothing better to show.
            None => return order.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn warn_on_dependency_cycles(dag: &BTreeMap<String, TaskDefinition>) {
    // Edge direction: dep -> task.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for id in dag.keys() {
        graph.add_node(id.as_str());
    }
    for (id, task) in dag.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), id.as_str(), ());
        }
    }

    if is_cyclic_directed(&graph) {
        warn!("definition contains a dependency cycle; affected tasks will deadlock when scheduled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::ConfigSection;

    fn task(name: &str) -> TaskDefinition {
        TaskDefinition::new(name)
    }

    fn raw(tasks: Vec<(&str, TaskDefinition)>) -> RawDefinition {
        RawDefinition {
            config: ConfigSection::default(),
            dag: tasks
                .into_iter()
                .map(|(id, t)| (id.to_string(), t))
                .collect(),
        }
    }

    #[test]
    fn rejects_empty_definition() {
        let err = Definition::try_from(RawDefinition::default()).unwrap_err();
        assert!(matches!(err, TaskGraphError::DefinitionError(_)));
    }

    #[test]
    fn drop_policy_discards_unknown_references() {
        let mut b = task("B");
        b.after = vec!["a".into(), "ghost".into()];
        b.fallback = Some("missing".into());

        let mut def = raw(vec![("a", task("A")), ("b", b)]);
        def.config.unknown_references = UnknownReferencePolicy::Drop;

        let def = Definition::try_from(def).unwrap();
        assert_eq!(def.dag["b"].after, vec!["a".to_string()]);
        assert!(def.dag["b"].fallback.is_none());
    }

    #[test]
    fn error_policy_names_the_field() {
        let mut b = task("B");
        b.fallback = Some("missing".into());

        let err = Definition::try_from(raw(vec![("b", b)])).unwrap_err();
        match err {
            TaskGraphError::UnknownReference {
                task,
                field,
                reference,
            } => {
                assert_eq!(task, "b");
                assert_eq!(field, "fallback");
                assert_eq!(reference, "missing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Definition::try_from(raw(vec![("a", task("Same")), ("b", task("Same"))]))
            .unwrap_err();
        assert!(matches!(err, TaskGraphError::DuplicateName { .. }));
    }

    #[test]
    fn rejects_name_taken_by_condition_gate() {
        let mut a = task("A");
        a.condition = Some("always".into());

        let err = Definition::try_from(raw(vec![("a", a), ("b", task("A_cond"))])).unwrap_err();
        match err {
            TaskGraphError::GateIdTaken { name, task, gated } => {
                assert_eq!(name, "A_cond");
                assert_eq!(task, "b");
                assert_eq!(gated, "a");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn gate_suffix_is_fine_without_condition() {
        let def = Definition::try_from(raw(vec![("a", task("A")), ("b", task("A_cond"))]));
        assert!(def.is_ok());
    }

    #[test]
    fn rejects_self_fallback() {
        let mut a = task("A");
        a.fallback = Some("a".into());
        let err = Definition::try_from(raw(vec![("a", a)])).unwrap_err();
        match err {
            TaskGraphError::FallbackCycle(chain) => assert_eq!(chain, vec!["a", "a"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn reports_fallback_chain_cycle() {
        let mut a = task("A");
        a.fallback = Some("b".into());
        let mut b = task("B");
        b.fallback = Some("c".into());
        let mut c = task("C");
        c.fallback = Some("a".into());

        let err = Definition::try_from(raw(vec![("a", a), ("b", b), ("c", c)])).unwrap_err();
        match err {
            TaskGraphError::FallbackCycle(chain) => {
                assert_eq!(chain.len(), 4);
                assert_eq!(chain.first(), chain.last());
                for id in ["a", "b", "c"] {
                    assert!(chain.iter().any(|c| c == id));
                }
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn accepts_dependency_cycle() {
        let mut a = task("A");
        a.after = vec!["b".into()];
        let mut b = task("B");
        b.after = vec!["a".into()];
        assert!(Definition::try_from(raw(vec![("a", a), ("b", b)])).is_ok());
    }
}
