use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Largest cooldown, in seconds, that a `chrono::Duration` can represent
pub const MAX_COOLDOWN_SECONDS: u64 = (i64::MAX / 1000) as u64;

/// Timer slots used to throttle alerts
///
/// Pool recovery and error-rate recovery deliberately share `Recovery`: firing
/// either one holds back the other until the cooldown has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CooldownKey {
    Failover,
    Recovery,
    ErrorRate,
}

/// Per-kind cooldown tracker for alert emission
///
/// Remembers when each kind of alert last fired. A kind that never fired is
/// always allowed. Checking and stamping are separate steps so that a
/// suppressed event never resets its own timer.
#[derive(Debug)]
pub struct CooldownGate {
    /// Minimum time between two alerts of the same kind
    cooldown: Duration,
    /// Last time each kind fired, created lazily
    last_fired: HashMap<CooldownKey, DateTime<Utc>>,
}

impl CooldownGate {
    /// Create a new gate
    ///
    /// # Arguments
    ///
    /// * `cooldown_seconds` - Minimum number of seconds between alerts of the same kind;
    ///   values above [`MAX_COOLDOWN_SECONDS`] saturate
    pub fn new(cooldown_seconds: u64) -> Self {
        let cooldown = i64::try_from(cooldown_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self {
            cooldown,
            last_fired: HashMap::new(),
        }
    }

    /// Check whether an alert of this kind may fire at the given time
    ///
    /// # Returns
    ///
    /// `true` if the kind never fired or at least the cooldown has elapsed since it last did
    pub fn allowed_at(&self, key: CooldownKey, now: DateTime<Utc>) -> bool {
        match self.last_fired.get(&key) {
            Some(&last) => now.signed_duration_since(last) >= self.cooldown,
            None => true,
        }
    }

    /// Record that an alert of this kind fired at a specific time
    ///
    /// This is primarily used for testing with controlled timestamps.
    pub fn stamp_at(&mut self, key: CooldownKey, at: DateTime<Utc>) {
        self.last_fired.insert(key, at);
    }

    /// When this kind last fired
    pub fn last_fired(&self, key: CooldownKey) -> Option<DateTime<Utc>> {
        self.last_fired.get(&key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_fired_is_allowed() {
        let gate = CooldownGate::new(300);
        let now = Utc::now();
        assert!(gate.allowed_at(CooldownKey::Failover, now));
        assert!(gate.allowed_at(CooldownKey::Recovery, now));
        assert!(gate.allowed_at(CooldownKey::ErrorRate, now));
        assert_eq!(gate.last_fired(CooldownKey::Failover), None);
    }

    #[test]
    fn test_stamp_blocks_until_cooldown_elapses() {
        let mut gate = CooldownGate::new(300);
        let now = Utc::now();
        gate.stamp_at(CooldownKey::Failover, now);

        assert!(!gate.allowed_at(CooldownKey::Failover, now));
        assert!(!gate.allowed_at(CooldownKey::Failover, now + Duration::seconds(299)));
        assert!(gate.allowed_at(CooldownKey::Failover, now + Duration::seconds(300)));
        assert!(gate.allowed_at(CooldownKey::Failover, now + Duration::seconds(301)));
    }

    #[test]
    fn test_keys_are_independent() {
        let mut gate = CooldownGate::new(60);
        let now = Utc::now();
        gate.stamp_at(CooldownKey::Failover, now);

        assert!(!gate.allowed_at(CooldownKey::Failover, now));
        assert!(gate.allowed_at(CooldownKey::Recovery, now));
        assert!(gate.allowed_at(CooldownKey::ErrorRate, now));
    }

    #[test]
    fn test_zero_cooldown_always_allows() {
        let mut gate = CooldownGate::new(0);
        let now = Utc::now();
        gate.stamp_at(CooldownKey::ErrorRate, now);
        assert!(gate.allowed_at(CooldownKey::ErrorRate, now));
    }

    #[test]
    fn test_checking_does_not_stamp() {
        let gate = CooldownGate::new(60);
        let now = Utc::now();
        assert!(gate.allowed_at(CooldownKey::Recovery, now));
        assert!(gate.allowed_at(CooldownKey::Recovery, now));
        assert_eq!(gate.last_fired(CooldownKey::Recovery), None);
    }

    #[test]
    fn test_oversized_cooldown_saturates() {
        let mut gate = CooldownGate::new(10_000_000_000_000_000);
        let now = Utc::now();
        gate.stamp_at(CooldownKey::Failover, now);
        assert!(!gate.allowed_at(CooldownKey::Failover, now + Duration::days(365 * 100)));

        let gate = CooldownGate::new(u64::MAX);
        assert!(gate.allowed_at(CooldownKey::Recovery, now));
    }

    #[test]
    fn test_largest_representable_cooldown() {
        let mut gate = CooldownGate::new(MAX_COOLDOWN_SECONDS);
        let now = Utc::now();
        gate.stamp_at(CooldownKey::ErrorRate, now);
        assert!(!gate.allowed_at(CooldownKey::ErrorRate, now + Duration::days(1)));
    }
}
