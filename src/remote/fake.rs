//! In-memory backend used by sync tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use super::{CustomExerciseRemote, RemoteError, RemoteExercise};

#[derive(Default)]
struct FakeState {
    records: BTreeMap<String, String>,
    next_id: u64,
    failing_names: HashSet<String>,
    fail_list: bool,
    calls: Vec<String>,
}

pub(crate) struct FakeRemote {
    state: Mutex<FakeState>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                next_id: 1,
                ..FakeState::default()
            }),
        }
    }

    pub fn with_record(self, id: &str, name: &str) -> Self {
        self.set_name(id, name);
        self
    }

    /// Identifier handed out by the next `create`, as `srv-<n>`.
    pub fn with_next_id(self, next_id: u64) -> Self {
        self.state.lock().unwrap().next_id = next_id;
        self
    }

    /// Any create, update, or delete touching `name` fails.
    pub fn fail_on(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_names
            .insert(name.to_string());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.failing_names.clear();
        state.fail_list = false;
    }

    pub fn fail_list(&self) {
        self.state.lock().unwrap().fail_list = true;
    }

    pub fn set_name(&self, id: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .records
            .insert(id.to_string(), name.to_string());
    }

    pub fn records(&self) -> Vec<RemoteExercise> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .map(|(id, name)| RemoteExercise::new(id.clone(), name.clone()))
            .collect()
    }

    /// Mutating calls made so far, e.g. `create:My Curl`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn unavailable() -> RemoteError {
        RemoteError::Status {
            status: 503,
            body: "unavailable".to_string(),
        }
    }
}

impl CustomExerciseRemote for FakeRemote {
    async fn list(&self) -> Result<Vec<RemoteExercise>, RemoteError> {
        if self.state.lock().unwrap().fail_list {
            return Err(Self::unavailable());
        }
        Ok(self.records())
    }

    async fn create(&self, name: &str) -> Result<RemoteExercise, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create:{}", name));
        if state.failing_names.contains(name) {
            return Err(Self::unavailable());
        }
        let id = format!("srv-{}", state.next_id);
        state.next_id += 1;
        state.records.insert(id.clone(), name.to_string());
        Ok(RemoteExercise::new(id, name))
    }

    async fn update(&self, id: &str, name: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("update:{}:{}", id, name));
        if state.failing_names.contains(name) {
            return Err(Self::unavailable());
        }
        match state.records.get_mut(id) {
            Some(entry) => {
                *entry = name.to_string();
                Ok(())
            }
            None => Err(RemoteError::Status {
                status: 404,
                body: "not found".to_string(),
            }),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete:{}", id));
        let failing = state
            .records
            .get(id)
            .map(|name| state.failing_names.contains(name))
            .unwrap_or(false);
        if failing {
            return Err(Self::unavailable());
        }
        state.records.remove(id);
        Ok(())
    }
}
