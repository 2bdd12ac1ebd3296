//! Pool failover and recovery detection
//!
//! Tracks which pool is serving traffic. A record from the initial pool while
//! another pool is serving is always a recovery; a record from any other new
//! pool is a failover. State changes happen even when the matching cooldown
//! holds back the alert.

use crate::alerts::{AlertKind, CooldownGate};
use crate::events::Timestamp;
use log::info;

/// Which pool serves traffic and how often that changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolState {
    /// Pool currently serving traffic
    pub current_pool: String,
    /// Primary pool traffic is expected to return to
    pub initial_pool: String,
    /// Number of detected pool changes, alerted or not
    pub failover_count: u64,
}

/// Pool transition that passed its cooldown and should be alerted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    /// Traffic returned to the initial pool
    Recovered { previous: String, current: String },
    /// Traffic moved to a different pool
    FailedOver { previous: String, current: String },
}

impl PoolEvent {
    pub fn kind(&self) -> AlertKind {
        match self {
            PoolEvent::Recovered { .. } => AlertKind::PoolRecovery,
            PoolEvent::FailedOver { .. } => AlertKind::Failover,
        }
    }
}

/// Owner of [`PoolState`]
#[derive(Debug, Clone)]
pub struct FailoverDetector {
    state: PoolState,
}

impl FailoverDetector {
    /// Create a detector assuming traffic starts on `initial_pool`
    pub fn new(initial_pool: impl Into<String>) -> Self {
        let initial_pool = initial_pool.into();
        Self {
            state: PoolState {
                current_pool: initial_pool.clone(),
                initial_pool,
                failover_count: 0,
            },
        }
    }

    /// Feed the pool label of one record
    ///
    /// # Arguments
    ///
    /// * `pool` - Pool label from the record; empty labels are ignored
    /// * `gate` - Cooldowns consulted, never stamped, by the detector
    /// * `now` - Time used for the cooldown check
    ///
    /// # Returns
    ///
    /// The transition if one happened and its cooldown allows an alert
    pub fn observe(&mut self, pool: &str, gate: &CooldownGate, now: Timestamp) -> Option<PoolEvent> {
        if pool.is_empty() {
            return None;
        }

        let returning = pool == self.state.initial_pool
            && self.state.current_pool != self.state.initial_pool;

        if !returning && pool == self.state.current_pool {
            return None;
        }

        let previous = std::mem::replace(&mut self.state.current_pool, pool.to_string());
        let current = pool.to_string();
        self.state.failover_count += 1;

        let (kind, label) = if returning {
            (AlertKind::PoolRecovery, "Recovery")
        } else {
            (AlertKind::Failover, "Failover")
        };

        if let Some(key) = kind.cooldown_key() {
            if !gate.allowed_at(key, now) {
                info!(
                    "{} detected ({} -> {}) but cooldown active",
                    label, previous, current
                );
                return None;
            }
        }

        Some(if returning {
            PoolEvent::Recovered { previous, current }
        } else {
            PoolEvent::FailedOver { previous, current }
        })
    }

    pub fn state(&self) -> &PoolState {
        &self.state
    }

    pub fn current_pool(&self) -> &str {
        &self.state.current_pool
    }

    pub fn failover_count(&self) -> u64 {
        self.state.failover_count
    }
}
