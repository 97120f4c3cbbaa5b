use crate::core::types::ComponentId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One evaluation of one component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub time: f64,
    pub outputs: BTreeMap<String, Value>,
    /// State after the update of this evaluation
    pub state: Value,
}

/// Per-component trajectories recorded by the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    entries: BTreeMap<ComponentId, Vec<TraceEntry>>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: &ComponentId, entry: TraceEntry) {
        self.entries.entry(id.clone()).or_default().push(entry);
    }

    pub fn of(&self, id: &ComponentId) -> &[TraceEntry] {
        self.entries.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `(time, value)` pairs of a single output port
    pub fn output_series(&self, id: &ComponentId, port: &str) -> Vec<(f64, Value)> {
        self.of(id)
            .iter()
            .filter_map(|e| e.outputs.get(port).map(|v| (e.time, v.clone())))
            .collect()
    }

    pub fn components(&self) -> impl Iterator<Item = &ComponentId> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_and_query() {
        let id = ComponentId::new("plant");
        let mut trace = Trace::new();
        for (i, t) in [0.0, 0.1].iter().enumerate() {
            let mut outputs = BTreeMap::new();
            outputs.insert("outputs".to_string(), json!([i]));
            trace.record(
                &id,
                TraceEntry {
                    time: *t,
                    outputs,
                    state: json!([i + 1]),
                },
            );
        }

        assert_eq!(trace.len(), 2);
        assert_eq!(trace.of(&id)[1].state, json!([2]));
        assert_eq!(
            trace.output_series(&id, "outputs"),
            vec![(0.0, json!([0])), (0.1, json!([1]))]
        );
        assert!(trace.of(&ComponentId::new("other")).is_empty());

        trace.clear();
        assert!(trace.is_empty());
    }
}
