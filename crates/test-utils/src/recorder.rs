use std::sync::{Arc, Mutex};

use tokenflow::engine::{ProcessEvent, ProcessListener};

/// Collects every [`ProcessEvent`]; clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<ProcessEvent>>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProcessEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Nodes entered, in order.
    pub fn entered_nodes(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                ProcessEvent::EnterNode { node, .. } => Some(node.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.name() == name)
            .count()
    }
}

impl ProcessListener for RecordingListener {
    fn notify(&mut self, event: &ProcessEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
