use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Read model for a single identifier
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockoutInfo {
    pub identifier: String,
    pub attempts: u32,
    pub remaining_attempts: u32,
    pub is_locked: bool,
    pub locked_until: Option<DateTime<Utc>>,
}

impl LockoutInfo {
    pub(crate) fn unlocked(identifier: &str, attempts: u32, max_attempts: u32) -> Self {
        Self {
            identifier: identifier.to_owned(),
            attempts,
            remaining_attempts: max_attempts.saturating_sub(attempts),
            is_locked: false,
            locked_until: None,
        }
    }

    pub(crate) fn locked(identifier: &str, attempts: u32, until: DateTime<Utc>) -> Self {
        Self {
            identifier: identifier.to_owned(),
            attempts,
            remaining_attempts: 0,
            is_locked: true,
            locked_until: Some(until),
        }
    }

    /// Time until the lock lifts, zero when unlocked
    pub fn retry_after(&self, now: DateTime<Utc>) -> Duration {
        self.locked_until
            .and_then(|until| (until - now).to_std().ok())
            .unwrap_or_default()
    }

    /// Whole seconds for `Retry-After`, rounded up so clients never retry early.
    /// The lock still holds at exactly `locked_until`, so that instant waits one second.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        match self.locked_until {
            Some(until) if until >= now => {
                let wait = self.retry_after(now);
                (wait.as_secs() + u64::from(wait.subsec_nanos() > 0)).max(1)
            }
            _ => 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockoutDecision {
    pub allowed: bool,
    pub info: LockoutInfo,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    /// No shared store configured
    Local,
    Distributed,
    /// Shared store configured but failing; calls are served locally
    Degraded,
}

/// Statistics from a fallback cleanup pass
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupStats {
    pub expired_entries_removed: u64,
    pub empty_windows_removed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_rounds_up() {
        let now = Utc::now();
        let info = LockoutInfo::locked("ip", 5, now + chrono::Duration::milliseconds(1500));
        assert_eq!(info.retry_after_secs(now), 2);
        assert_eq!(info.retry_after(now), Duration::from_millis(1500));
    }

    #[test]
    fn test_retry_after_is_zero_when_unlocked_or_elapsed() {
        let now = Utc::now();
        assert_eq!(LockoutInfo::unlocked("ip", 1, 5).retry_after_secs(now), 0);
        let past = LockoutInfo::locked("ip", 5, now - chrono::Duration::seconds(3));
        assert_eq!(past.retry_after_secs(now), 0);
    }

    #[test]
    fn test_retry_after_at_the_unlock_instant() {
        let now = Utc::now();
        assert_eq!(LockoutInfo::locked("ip", 5, now).retry_after_secs(now), 1);
    }

    #[test]
    fn test_serializes_camel_case() {
        let info = LockoutInfo::unlocked("10.0.0.1", 2, 5);
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["remainingAttempts"], 3);
        assert_eq!(json["isLocked"], false);
        assert!(json["lockedUntil"].is_null());
    }
}
