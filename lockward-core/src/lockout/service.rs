use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lockward_common::helpers::time::{duration_millis, from_millis, SystemTimeSource, TimeSource};
use lockward_common::LockoutConfig;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::store::{AttemptStore, MemoryAttemptStore, StoreError};
use super::{BackendStatus, CleanupStats, LockoutDecision, LockoutInfo};

/// Tracks failed attempts per identifier and decides when to lock it out.
///
/// State lives in the shared store when one is configured. Any store call
/// that fails or exceeds `store_timeout` is served by a local in-memory
/// store instead, so decisions degrade to per-instance rather than failing.
pub struct LockoutService {
    config: LockoutConfig,
    store: Option<Arc<dyn AttemptStore>>,
    fallback: MemoryAttemptStore,
    fallback_guard: Mutex<()>,
    degraded: AtomicBool,
    time: Arc<dyn TimeSource>,
}

impl LockoutService {
    pub fn new(config: LockoutConfig, store: Option<Arc<dyn AttemptStore>>) -> Self {
        Self::with_time_source(config, store, Arc::new(SystemTimeSource))
    }

    pub fn with_time_source(
        config: LockoutConfig,
        store: Option<Arc<dyn AttemptStore>>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            fallback: MemoryAttemptStore::with_time_source(time.clone()),
            fallback_guard: Mutex::new(()),
            degraded: AtomicBool::new(false),
            config,
            store,
            time,
        }
    }

    /// Check if lockout tracking is enabled
    pub fn is_enabled(&self) -> bool {
        self.config.enable
    }

    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// Current time as seen by the lockout state machine
    pub fn now(&self) -> DateTime<Utc> {
        self.time.now()
    }

    pub fn backend_status(&self) -> BackendStatus {
        match self.store {
            None => BackendStatus::Local,
            Some(_) if self.degraded.load(Ordering::Relaxed) => BackendStatus::Degraded,
            Some(_) => BackendStatus::Distributed,
        }
    }

    fn attempts_key(&self, identifier: &str) -> String {
        format!("{}attempts:{identifier}", self.config.key_prefix)
    }

    fn lock_key(&self, identifier: &str) -> String {
        format!("{}lockout:{identifier}", self.config.key_prefix)
    }

    fn mark_available(&self) {
        if self.degraded.swap(false, Ordering::Relaxed) {
            info!("Lockout store recovered, resuming shared lockout state");
        }
    }

    fn mark_degraded(&self, error: &StoreError) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            warn!(%error, "Lockout store unavailable, falling back to local lockout state");
        } else {
            debug!(%error, "Lockout store still unavailable");
        }
    }

    /// Runs `op` against the shared store, or against the local store when
    /// there is none or it fails.
    async fn with_store<'s, T, F, Fut>(&'s self, op: F) -> Result<T, StoreError>
    where
        F: Fn(&'s dyn AttemptStore) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        if let Some(store) = self.store.as_deref() {
            match tokio::time::timeout(self.config.store_timeout, op(store)).await {
                Ok(Ok(value)) => {
                    self.mark_available();
                    return Ok(value);
                }
                Ok(Err(error)) => self.mark_degraded(&error),
                Err(_) => self.mark_degraded(&StoreError::Timeout),
            }
        }
        let _guard = self.fallback_guard.lock().await;
        op(&self.fallback).await
    }

    async fn active_lock(
        &self,
        store: &dyn AttemptStore,
        identifier: &str,
        now: i64,
    ) -> Result<Option<i64>, StoreError> {
        let key = self.lock_key(identifier);
        let Some(value) = store.get(&key).await? else {
            return Ok(None);
        };
        let until: i64 = value
            .parse()
            .map_err(|_| StoreError::InvalidValue { key, value })?;
        // the lock holds through `until` itself
        Ok((until >= now).then_some(until))
    }

    async fn count_in(
        &self,
        store: &dyn AttemptStore,
        identifier: &str,
        now: i64,
    ) -> Result<u32, StoreError> {
        let key = self.attempts_key(identifier);
        let cutoff = now.saturating_sub(duration_millis(self.config.window));
        store.remove_scored_range(&key, i64::MIN, cutoff).await?;
        let count = store.cardinality(&key).await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    fn locked_info(&self, identifier: &str, attempts: u32, until: i64) -> LockoutInfo {
        match from_millis(until) {
            Some(until) => LockoutInfo::locked(identifier, attempts, until),
            None => LockoutInfo::unlocked(identifier, attempts, self.config.max_attempts),
        }
    }

    async fn record_in(
        &self,
        store: &dyn AttemptStore,
        identifier: &str,
        now: i64,
    ) -> Result<LockoutDecision, StoreError> {
        if let Some(until) = self.active_lock(store, identifier, now).await? {
            let attempts = self.count_in(store, identifier, now).await?;
            debug!(identifier = %identifier, "Attempt from locked identifier ignored");
            return Ok(LockoutDecision {
                allowed: false,
                info: self.locked_info(identifier, attempts, until),
            });
        }

        let attempts_key = self.attempts_key(identifier);
        let member = format!("{now}-{}", Uuid::new_v4());
        let count = store
            .push_window(&attempts_key, &member, now, self.config.window)
            .await?;
        let attempts = u32::try_from(count).unwrap_or(u32::MAX);

        if attempts >= self.config.max_attempts {
            let duration = calculate_lockout_duration(attempts, &self.config);
            let until = now.saturating_add(duration_millis(duration));
            // markers must outlive the `until` instant, which is still locked
            let ttl = duration + Duration::from_millis(1);
            store
                .set_expiring(&self.lock_key(identifier), &until.to_string(), ttl)
                .await?;
            // history goes with the lock so the next window starts empty
            store.expire(&attempts_key, ttl).await?;

            let info = self.locked_info(identifier, attempts, until);
            warn!(
                identifier = %identifier,
                attempts,
                locked_until = ?info.locked_until,
                "Identifier locked out after too many failed attempts"
            );
            return Ok(LockoutDecision {
                allowed: false,
                info,
            });
        }

        let info = LockoutInfo::unlocked(identifier, attempts, self.config.max_attempts);
        if self.config.log_attempts {
            info!(
                identifier = %identifier,
                attempts,
                remaining_attempts = info.remaining_attempts,
                "Failed attempt recorded"
            );
        }
        Ok(LockoutDecision {
            allowed: true,
            info,
        })
    }

    async fn info_in(
        &self,
        store: &dyn AttemptStore,
        identifier: &str,
        now: i64,
    ) -> Result<LockoutInfo, StoreError> {
        let attempts = self.count_in(store, identifier, now).await?;
        Ok(match self.active_lock(store, identifier, now).await? {
            Some(until) => self.locked_info(identifier, attempts, until),
            None => LockoutInfo::unlocked(identifier, attempts, self.config.max_attempts),
        })
    }

    async fn reset_in(&self, store: &dyn AttemptStore, identifier: &str) -> Result<(), StoreError> {
        store.delete(&self.attempts_key(identifier)).await?;
        store.delete(&self.lock_key(identifier)).await
    }

    /// Records a failed attempt and returns whether the identifier may keep trying
    pub async fn record_failed_attempt(&self, identifier: &str) -> LockoutDecision {
        if !self.config.enable {
            return LockoutDecision {
                allowed: true,
                info: LockoutInfo::unlocked(identifier, 0, self.config.max_attempts),
            };
        }
        let now = self.time.now_millis();
        self.with_store(|store| self.record_in(store, identifier, now))
            .await
            .unwrap_or_else(|error| {
                error!(identifier = %identifier, %error, "Could not record failed attempt");
                LockoutDecision {
                    allowed: true,
                    info: LockoutInfo::unlocked(identifier, 0, self.config.max_attempts),
                }
            })
    }

    /// Current state; prunes attempts that left the window
    pub async fn lockout_info(&self, identifier: &str) -> LockoutInfo {
        if !self.config.enable {
            return LockoutInfo::unlocked(identifier, 0, self.config.max_attempts);
        }
        let now = self.time.now_millis();
        self.with_store(|store| self.info_in(store, identifier, now))
            .await
            .unwrap_or_else(|error| {
                error!(identifier = %identifier, %error, "Could not read lockout state");
                LockoutInfo::unlocked(identifier, 0, self.config.max_attempts)
            })
    }

    pub async fn is_locked(&self, identifier: &str) -> bool {
        self.lockout_info(identifier).await.is_locked
    }

    /// Clears attempts and any lock, in the shared store and locally
    pub async fn reset(&self, identifier: &str) {
        if let Some(store) = self.store.as_deref() {
            match tokio::time::timeout(self.config.store_timeout, self.reset_in(store, identifier))
                .await
            {
                Ok(Ok(())) => self.mark_available(),
                Ok(Err(error)) => self.mark_degraded(&error),
                Err(_) => self.mark_degraded(&StoreError::Timeout),
            }
        }
        {
            let _guard = self.fallback_guard.lock().await;
            if let Err(error) = self.reset_in(&self.fallback, identifier).await {
                error!(identifier = %identifier, %error, "Could not clear local lockout state");
            }
        }
        info!(identifier = %identifier, "Lockout state cleared");
    }

    pub async fn record_successful_auth(&self, identifier: &str) {
        self.reset(identifier).await
    }

    /// Drops expired locks and stale attempt windows from the local store
    pub async fn cleanup_expired(&self) -> CleanupStats {
        let stats = {
            let _guard = self.fallback_guard.lock().await;
            self.fallback.vacuum().await
        };
        if stats != CleanupStats::default() {
            info!(
                expired_entries = stats.expired_entries_removed,
                empty_windows = stats.empty_windows_removed,
                "Cleaned up local lockout state"
            );
        }
        stats
    }
}

/// Lock length once an identifier reaches `attempts` failures.
/// Escalation belongs here; `progressive_lockout` does not change the result yet.
pub fn calculate_lockout_duration(_attempts: u32, config: &LockoutConfig) -> Duration {
    config.lockout_duration
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use lockward_common::helpers::time::ManualTimeSource;

    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    fn config() -> LockoutConfig {
        LockoutConfig::default()
    }

    fn service_with(
        config: LockoutConfig,
        store: Option<Arc<dyn AttemptStore>>,
    ) -> (LockoutService, Arc<ManualTimeSource>) {
        let time = Arc::new(ManualTimeSource::new(Utc::now()));
        (
            LockoutService::with_time_source(config, store, time.clone()),
            time,
        )
    }

    fn broken() -> StoreError {
        StoreError::Redis(::redis::RedisError::from((
            ::redis::ErrorKind::IoError,
            "connection refused",
        )))
    }

    struct FailingStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AttemptStore for FailingStore {
        async fn add_scored(&self, _: &str, _: &str, _: i64) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(broken())
        }
        async fn remove_scored_range(&self, _: &str, _: i64, _: i64) -> Result<u64, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(broken())
        }
        async fn cardinality(&self, _: &str) -> Result<u64, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(broken())
        }
        async fn set_expiring(&self, _: &str, _: &str, _: Duration) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(broken())
        }
        async fn expire(&self, _: &str, _: Duration) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(broken())
        }
        async fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(broken())
        }
        async fn delete(&self, _: &str) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(broken())
        }
    }

    /// Delegates to an inner store until switched off
    struct FlakyStore {
        inner: MemoryAttemptStore,
        down: AtomicBool,
    }

    impl FlakyStore {
        fn check(&self) -> Result<(), StoreError> {
            if self.down.load(Ordering::SeqCst) {
                Err(broken())
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl AttemptStore for FlakyStore {
        async fn add_scored(&self, key: &str, member: &str, score: i64) -> Result<(), StoreError> {
            self.check()?;
            self.inner.add_scored(key, member, score).await
        }
        async fn remove_scored_range(
            &self,
            key: &str,
            min: i64,
            max: i64,
        ) -> Result<u64, StoreError> {
            self.check()?;
            self.inner.remove_scored_range(key, min, max).await
        }
        async fn cardinality(&self, key: &str) -> Result<u64, StoreError> {
            self.check()?;
            self.inner.cardinality(key).await
        }
        async fn set_expiring(
            &self,
            key: &str,
            value: &str,
            ttl: Duration,
        ) -> Result<(), StoreError> {
            self.check()?;
            self.inner.set_expiring(key, value, ttl).await
        }
        async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
            self.check()?;
            self.inner.expire(key, ttl).await
        }
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.check()?;
            self.inner.get(key).await
        }
        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.check()?;
            self.inner.delete(key).await
        }
    }

    /// Never answers within any sane timeout
    struct SlowStore;

    #[async_trait]
    impl AttemptStore for SlowStore {
        async fn add_scored(&self, _: &str, _: &str, _: i64) -> Result<(), StoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
        async fn remove_scored_range(&self, _: &str, _: i64, _: i64) -> Result<u64, StoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(0)
        }
        async fn cardinality(&self, _: &str) -> Result<u64, StoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(0)
        }
        async fn set_expiring(&self, _: &str, _: &str, _: Duration) -> Result<(), StoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
        async fn expire(&self, _: &str, _: Duration) -> Result<(), StoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
        async fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }
        async fn delete(&self, _: &str) -> Result<(), StoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_locks_after_max_attempts() {
        let (service, time) = service_with(config(), None);
        let start = time.now();

        for expected_remaining in [4, 3, 2, 1] {
            let decision = service.record_failed_attempt("1.2.3.4").await;
            assert!(decision.allowed);
            assert_eq!(decision.info.remaining_attempts, expected_remaining);
            assert!(!decision.info.is_locked);
        }

        let decision = service.record_failed_attempt("1.2.3.4").await;
        assert!(!decision.allowed);
        assert!(decision.info.is_locked);
        assert_eq!(decision.info.attempts, 5);
        assert_eq!(decision.info.remaining_attempts, 0);
        assert_eq!(
            decision.info.locked_until,
            Some(start + chrono::Duration::minutes(15))
        );
    }

    #[tokio::test]
    async fn test_locked_identifier_is_not_extended() {
        let (service, time) = service_with(config(), None);
        for _ in 0..5 {
            service.record_failed_attempt("1.2.3.4").await;
        }
        let locked_until = service.lockout_info("1.2.3.4").await.locked_until;

        time.advance(MINUTE);
        let decision = service.record_failed_attempt("1.2.3.4").await;
        assert!(!decision.allowed);
        assert_eq!(decision.info.locked_until, locked_until);
        assert_eq!(decision.info.attempts, 5);
        assert_eq!(service.lockout_info("1.2.3.4").await.attempts, 5);
    }

    #[tokio::test]
    async fn test_unseen_identifier() {
        let (service, _) = service_with(config(), None);
        let info = service.lockout_info("unseen-id").await;
        assert_eq!(
            info,
            LockoutInfo {
                identifier: "unseen-id".into(),
                attempts: 0,
                remaining_attempts: 5,
                is_locked: false,
                locked_until: None,
            }
        );
        assert!(!service.is_locked("unseen-id").await);
    }

    #[tokio::test]
    async fn test_lock_expiry_starts_fresh_window() {
        let (service, time) = service_with(
            LockoutConfig {
                window: MINUTE * 30,
                ..config()
            },
            None,
        );
        for _ in 0..5 {
            service.record_failed_attempt("user@example.com").await;
        }
        assert!(service.is_locked("user@example.com").await);

        time.advance(MINUTE * 15 - Duration::from_millis(1));
        assert!(service.is_locked("user@example.com").await);

        // exactly at `locked_until`
        time.advance(Duration::from_millis(1));
        let info = service.lockout_info("user@example.com").await;
        assert!(info.is_locked);
        assert_eq!(info.locked_until, Some(service.now()));

        time.advance(Duration::from_millis(1));
        assert!(!service.is_locked("user@example.com").await);

        let decision = service.record_failed_attempt("user@example.com").await;
        assert!(decision.allowed);
        assert_eq!(decision.info.attempts, 1);
    }

    #[tokio::test]
    async fn test_attempts_leave_the_window() {
        let (service, time) = service_with(config(), None);
        service.record_failed_attempt("ip").await;
        time.advance(MINUTE * 10);
        service.record_failed_attempt("ip").await;
        assert_eq!(service.lockout_info("ip").await.attempts, 2);

        time.advance(MINUTE * 5);
        assert_eq!(service.lockout_info("ip").await.attempts, 1);

        time.advance(MINUTE * 10);
        assert_eq!(service.lockout_info("ip").await.attempts, 0);
    }

    #[tokio::test]
    async fn test_reset_clears_lock_and_attempts() {
        let (service, _) = service_with(config(), None);
        for _ in 0..5 {
            service.record_failed_attempt("ip").await;
        }
        assert!(service.is_locked("ip").await);

        service.reset("ip").await;
        let info = service.lockout_info("ip").await;
        assert!(!info.is_locked);
        assert_eq!(info.attempts, 0);

        service.record_failed_attempt("ip").await;
        service.record_successful_auth("ip").await;
        assert_eq!(service.lockout_info("ip").await.attempts, 0);
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let (service, _) = service_with(config(), None);
        for _ in 0..5 {
            service.record_failed_attempt("a").await;
        }
        assert!(service.is_locked("a").await);
        assert!(!service.is_locked("b").await);
        assert!(service.record_failed_attempt("b").await.allowed);
    }

    #[tokio::test]
    async fn test_failing_store_falls_back_to_memory() {
        let store = Arc::new(FailingStore {
            calls: AtomicUsize::new(0),
        });
        let (service, _) = service_with(config(), Some(store.clone()));

        for _ in 0..4 {
            assert!(service.record_failed_attempt("ip").await.allowed);
        }
        let decision = service.record_failed_attempt("ip").await;
        assert!(!decision.allowed);
        assert!(service.is_locked("ip").await);
        assert_eq!(service.backend_status(), BackendStatus::Degraded);
        assert!(store.calls.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn test_instances_share_state_through_store() {
        let shared = Arc::new(MemoryAttemptStore::new());
        let a = LockoutService::new(config(), Some(shared.clone()));
        let b = LockoutService::new(config(), Some(shared));

        for _ in 0..3 {
            a.record_failed_attempt("ip").await;
        }
        for _ in 0..2 {
            b.record_failed_attempt("ip").await;
        }
        assert!(a.is_locked("ip").await);
        assert!(b.is_locked("ip").await);
        assert_eq!(a.backend_status(), BackendStatus::Distributed);

        b.reset("ip").await;
        assert!(!a.is_locked("ip").await);
    }

    #[tokio::test]
    async fn test_store_outage_mid_run() {
        let time = Arc::new(ManualTimeSource::new(Utc::now()));
        let store = Arc::new(FlakyStore {
            inner: MemoryAttemptStore::with_time_source(time.clone()),
            down: AtomicBool::new(false),
        });
        let service = LockoutService::with_time_source(config(), Some(store.clone()), time);

        service.record_failed_attempt("ip").await;
        service.record_failed_attempt("ip").await;
        assert_eq!(service.backend_status(), BackendStatus::Distributed);

        store.down.store(true, Ordering::SeqCst);
        for _ in 0..4 {
            assert!(service.record_failed_attempt("ip").await.allowed);
        }
        assert_eq!(service.backend_status(), BackendStatus::Degraded);
        assert!(!service.record_failed_attempt("ip").await.allowed);
        assert!(service.is_locked("ip").await);

        store.down.store(false, Ordering::SeqCst);
        assert_eq!(service.lockout_info("ip").await.attempts, 2);
        assert_eq!(service.backend_status(), BackendStatus::Distributed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_times_out_to_fallback() {
        let (service, _) = service_with(config(), Some(Arc::new(SlowStore)));
        let decision = service.record_failed_attempt("ip").await;
        assert!(decision.allowed);
        assert_eq!(decision.info.attempts, 1);
        assert_eq!(service.backend_status(), BackendStatus::Degraded);
    }

    #[tokio::test]
    async fn test_disabled_always_allows() {
        let (service, _) = service_with(
            LockoutConfig {
                enable: false,
                ..config()
            },
            None,
        );
        for _ in 0..10 {
            assert!(service.record_failed_attempt("ip").await.allowed);
        }
        assert!(!service.is_locked("ip").await);
        assert!(!service.is_enabled());
    }

    #[tokio::test]
    async fn test_progressive_flag_keeps_fixed_duration() {
        let config = LockoutConfig {
            progressive_lockout: true,
            lockout_duration: MINUTE * 7,
            ..config()
        };
        assert_eq!(calculate_lockout_duration(5, &config), MINUTE * 7);
        assert_eq!(calculate_lockout_duration(50, &config), MINUTE * 7);

        let (service, time) = service_with(config, None);
        for _ in 0..5 {
            service.record_failed_attempt("ip").await;
        }
        assert_eq!(
            service.lockout_info("ip").await.locked_until,
            Some(time.now() + chrono::Duration::minutes(7))
        );
    }

    #[tokio::test]
    async fn test_cleanup_removes_expired_local_state() {
        let (service, time) = service_with(config(), None);
        for _ in 0..5 {
            service.record_failed_attempt("ip").await;
        }
        service.record_failed_attempt("other").await;

        time.advance(MINUTE * 16);
        let stats = service.cleanup_expired().await;
        assert_eq!(stats.expired_entries_removed, 3);
        assert_eq!(service.cleanup_expired().await, CleanupStats::default());
    }

    #[tokio::test]
    async fn test_backend_status_without_store() {
        let (service, _) = service_with(config(), None);
        assert_eq!(service.backend_status(), BackendStatus::Local);
    }
}
