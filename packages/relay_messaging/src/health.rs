use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

/// Broker connectivity as seen by one broker client.
///
/// `initialized` flips once, after the client resolved its queues. `healthy` follows the latest receive attempt.
#[derive(Debug, Default)]
pub struct HealthStatus {
    initialized: AtomicBool,
    healthy: AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub initialized: bool,
    pub healthy: bool,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
        self.healthy.store(true, Ordering::Release);
    }

    pub fn mark_healthy(&self) {
        self.healthy.store(true, Ordering::Release);
    }

    pub fn mark_unhealthy(&self) {
        self.healthy.store(false, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            initialized: self.is_ready(),
            healthy: self.is_healthy(),
        }
    }
}
