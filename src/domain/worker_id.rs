use std::fmt;

use uuid::Uuid;

/// Identity of the worker holding a claim. Unique per process and pool slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn for_slot(slot: usize) -> Self {
        let instance = Uuid::new_v4().simple().to_string();
        Self(format!("worker-{}-{}", slot, &instance[..8]))
    }

    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
