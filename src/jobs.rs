//! Named reentrancy locks for scheduled jobs.
//!
//! A job that fires while its previous run is still going is skipped, not
//! queued. Different job names never block each other.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Default)]
pub struct JobLocks {
    running: Arc<Mutex<HashSet<String>>>,
}

impl JobLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `name`. `None` if a run of the same job is still in progress.
    pub fn try_acquire(&self, name: &str) -> Option<JobGuard> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if !running.insert(name.to_string()) {
            return None;
        }
        Some(JobGuard {
            name: name.to_string(),
            running: Arc::clone(&self.running),
        })
    }
}

/// Releases its job name when dropped, including on early return or panic.
#[derive(Debug)]
pub struct JobGuard {
    name: String,
    running: Arc<Mutex<HashSet<String>>>,
}

impl JobGuard {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_job_is_skipped_while_running() {
        let locks = JobLocks::new();
        let guard = locks.try_acquire("daily-digest").unwrap();
        assert_eq!(guard.name(), "daily-digest");
        assert!(locks.try_acquire("daily-digest").is_none());

        drop(guard);
        assert!(locks.try_acquire("daily-digest").is_some());
    }

    #[test]
    fn test_different_jobs_run_concurrently() {
        let locks = JobLocks::new();
        let _digest = locks.try_acquire("daily-digest").unwrap();
        assert!(locks.try_acquire("monthly-followers").is_some());
    }

    #[test]
    fn test_released_on_panic() {
        let locks = JobLocks::new();
        let cloned = locks.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = cloned.try_acquire("daily-digest").unwrap();
            panic!("job failed");
        });
        assert!(result.is_err());
        assert!(locks.try_acquire("daily-digest").is_some());
    }
}
