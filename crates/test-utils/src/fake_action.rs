use std::sync::{Arc, Mutex};

use taskgraph::action::{Action, ActionError};

/// Shared record of which actions ran, in order.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == name).count()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.calls.lock().unwrap().iter().position(|c| c == name)
    }

    /// An action that records `name` and succeeds.
    pub fn succeeding(&self, name: &str) -> Arc<dyn Action> {
        Arc::new(FakeAction {
            name: name.to_string(),
            fail: false,
            log: self.clone(),
        })
    }

    /// An action that records `name` and fails.
    pub fn failing(&self, name: &str) -> Arc<dyn Action> {
        Arc::new(FakeAction {
            name: name.to_string(),
            fail: true,
            log: self.clone(),
        })
    }
}

/// A fake action that:
/// - records its name in a [`CallLog`] whenever it is called
/// - then succeeds or fails as configured.
pub struct FakeAction {
    name: String,
    fail: bool,
    log: CallLog,
}

impl Action for FakeAction {
    fn call(&self) -> Result<(), ActionError> {
        self.log.calls.lock().unwrap().push(self.name.clone());
        if self.fail {
            Err(ActionError::failed(format!("{} failed on purpose", self.name)))
        } else {
            Ok(())
        }
    }
}
