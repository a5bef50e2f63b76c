use dashmap::DashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RunKey {
    Scan,
    Backup(String),
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunKey::Scan => write!(f, "scan"),
            RunKey::Backup(scan_id) => write!(f, "backup of scan {}", scan_id),
        }
    }
}

/// Set of runs in flight. At most one holder per key.
#[derive(Debug, Default)]
pub struct RunLocks {
    active: DashSet<RunKey>,
}

impl RunLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` if a run with the same key is already in flight.
    pub fn try_acquire(&self, key: RunKey) -> Option<RunGuard<'_>> {
        if self.active.insert(key.clone()) {
            Some(RunGuard { locks: self, key })
        } else {
            None
        }
    }

    pub fn is_running(&self, key: &RunKey) -> bool {
        self.active.contains(key)
    }
}

/// Releases its key on drop.
#[derive(Debug)]
pub struct RunGuard<'a> {
    locks: &'a RunLocks,
    key: RunKey,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.locks.active.remove(&self.key);
    }
}
