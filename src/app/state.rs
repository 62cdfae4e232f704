use super::{ComponentState, GestureRemoteOrchestrator};
use std::collections::HashMap;
use tracing::debug;

impl GestureRemoteOrchestrator {
    pub async fn set_component_state(&self, component: &str, state: ComponentState) {
        let previous = self
            .component_states
            .lock()
            .await
            .insert(component.to_string(), state.clone());

        match previous {
            Some(previous) => debug!("{}: {:?} -> {:?}", component, previous, state),
            None => debug!("{}: registered as {:?}", component, state),
        }
    }

    pub async fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        self.component_states.lock().await.get(component).cloned()
    }

    pub async fn get_all_component_states(&self) -> HashMap<String, ComponentState> {
        self.component_states.lock().await.clone()
    }

    /// `name=State` pairs sorted by name, for log lines
    pub async fn component_summary(&self) -> String {
        let states = self.component_states.lock().await;
        let mut entries: Vec<String> = states
            .iter()
            .map(|(name, state)| format!("{}={:?}", name, state))
            .collect();
        entries.sort();
        entries.join(", ")
    }
}
