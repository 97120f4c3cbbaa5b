use crate::core::error::{SimError, SimResult};
use crate::core::types::ComponentId;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// Evaluation order of a system graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionOrder {
    /// Components in the order they are evaluated within one tick
    pub sequence: Vec<ComponentId>,
    /// Producer -> consumer edges demoted to cross-tick feedback
    pub feedback_edges: BTreeSet<(ComponentId, ComponentId)>,
}

/// Computes the per-tick evaluation order from the dependency edges
pub struct ExecutionOrderBuilder;

impl ExecutionOrderBuilder {
    /// Priority ids first, then everything else topologically sorted
    pub fn build(
        component_ids: &[ComponentId],
        edges: &BTreeSet<(ComponentId, ComponentId)>,
        priority: &[ComponentId],
    ) -> SimResult<ExecutionOrder> {
        Self::validate_priority(component_ids, priority)?;

        let (stages, feedback_edges) = Self::build_stages(component_ids, edges);
        let pinned: BTreeSet<&ComponentId> = priority.iter().collect();

        let mut sequence = priority.to_vec();
        sequence.extend(
            stages
                .into_iter()
                .flatten()
                .filter(|id| !pinned.contains(id)),
        );

        if !feedback_edges.is_empty() {
            debug!(
                "Cycle detected, {} edge(s) evaluated as feedback: {:?}",
                feedback_edges.len(),
                feedback_edges
            );
        }

        Ok(ExecutionOrder {
            sequence,
            feedback_edges,
        })
    }

    /// Priority may only name known components, each at most once
    pub fn validate_priority(component_ids: &[ComponentId], priority: &[ComponentId]) -> SimResult<()> {
        let known: BTreeSet<&ComponentId> = component_ids.iter().collect();
        let mut seen = BTreeSet::new();
        for id in priority {
            if !known.contains(id) {
                return Err(SimError::InvalidPriority(format!(
                    "unknown component '{}'",
                    id
                )));
            }
            if !seen.insert(id) {
                return Err(SimError::InvalidPriority(format!(
                    "component '{}' listed more than once",
                    id
                )));
            }
        }
        Ok(())
    }

    /// Kahn stages over producer -> consumer edges. Each stage is sorted by
    /// id. When a cycle leaves no component with zero in-degree, the
    /// lowest-id remaining component is released on its own and its
    /// remaining incoming edges are reported as feedback.
    pub fn build_stages(
        component_ids: &[ComponentId],
        edges: &BTreeSet<(ComponentId, ComponentId)>,
    ) -> (Vec<Vec<ComponentId>>, BTreeSet<(ComponentId, ComponentId)>) {
        let mut adj_list: BTreeMap<&ComponentId, Vec<&ComponentId>> = BTreeMap::new();
        let mut in_degree: BTreeMap<&ComponentId, usize> = BTreeMap::new();

        for id in component_ids {
            adj_list.insert(id, Vec::new());
            in_degree.insert(id, 0);
        }

        for (producer, consumer) in edges {
            // Self loops only ever read the previous tick
            if producer == consumer {
                continue;
            }
            let Some(degree) = in_degree.get_mut(consumer) else { continue };
            let Some(targets) = adj_list.get_mut(producer) else { continue };
            targets.push(consumer);
            *degree += 1;
        }

        let mut stages = Vec::new();
        let mut feedback = BTreeSet::new();

        while !in_degree.is_empty() {
            let mut current: Vec<&ComponentId> = in_degree
                .iter()
                .filter(|(_, &degree)| degree == 0)
                .map(|(id, _)| *id)
                .collect();

            if current.is_empty() {
                // BTreeMap keys are ordered, so the first one is the lowest id
                let Some(&breaker) = in_degree.keys().next() else { break };
                for (producer, targets) in &adj_list {
                    if in_degree.contains_key(producer) && targets.contains(&breaker) {
                        feedback.insert(((*producer).clone(), breaker.clone()));
                    }
                }
                current.push(breaker);
            }

            for id in &current {
                in_degree.remove(id);
            }
            for id in &current {
                if let Some(targets) = adj_list.get(id) {
                    for target in targets {
                        if let Some(degree) = in_degree.get_mut(target) {
                            *degree = degree.saturating_sub(1);
                        }
                    }
                }
            }

            stages.push(current.into_iter().cloned().collect());
        }

        (stages, feedback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<ComponentId> {
        names.iter().map(|n| ComponentId::new(*n)).collect()
    }

    fn edges(pairs: &[(&str, &str)]) -> BTreeSet<(ComponentId, ComponentId)> {
        pairs
            .iter()
            .map(|(a, b)| (ComponentId::new(*a), ComponentId::new(*b)))
            .collect()
    }

    #[test]
    fn test_linear_chain() {
        let order = ExecutionOrderBuilder::build(
            &ids(&["c", "b", "a"]),
            &edges(&[("a", "b"), ("b", "c")]),
            &[],
        )
        .unwrap();
        assert_eq!(order.sequence, ids(&["a", "b", "c"]));
        assert!(order.feedback_edges.is_empty());
    }

    #[test]
    fn test_independent_components_sorted_by_id() {
        let (stages, _) = ExecutionOrderBuilder::build_stages(&ids(&["z", "m", "a"]), &BTreeSet::new());
        assert_eq!(stages, vec![ids(&["a", "m", "z"])]);
    }

    #[test]
    fn test_cycle_broken_at_lowest_id() {
        // plant -> llc -> plant, plus an observer fed by the plant
        let order = ExecutionOrderBuilder::build(
            &ids(&["plant", "llc", "observer"]),
            &edges(&[("plant", "llc"), ("llc", "plant"), ("plant", "observer")]),
            &[],
        )
        .unwrap();
        assert_eq!(order.sequence, ids(&["llc", "plant", "observer"]));
        assert_eq!(order.feedback_edges, edges(&[("plant", "llc")]));
    }

    #[test]
    fn test_self_loop_is_not_a_cycle() {
        let order = ExecutionOrderBuilder::build(&ids(&["a"]), &edges(&[("a", "a")]), &[]).unwrap();
        assert_eq!(order.sequence, ids(&["a"]));
        assert!(order.feedback_edges.is_empty());
    }

    #[test]
    fn test_priority_comes_first() {
        let order = ExecutionOrderBuilder::build(
            &ids(&["a", "b", "c"]),
            &edges(&[("a", "b"), ("b", "c")]),
            &ids(&["c"]),
        )
        .unwrap();
        assert_eq!(order.sequence, ids(&["c", "a", "b"]));
    }

    #[test]
    fn test_invalid_priority() {
        let all = ids(&["a", "b"]);
        assert!(matches!(
            ExecutionOrderBuilder::build(&all, &BTreeSet::new(), &ids(&["x"])),
            Err(SimError::InvalidPriority(_))
        ));
        assert!(matches!(
            ExecutionOrderBuilder::build(&all, &BTreeSet::new(), &ids(&["a", "a"])),
            Err(SimError::InvalidPriority(_))
        ));
    }
}
