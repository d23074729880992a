use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::CacheSigningService;

/// Owns the background rotation task. Stopping is idempotent; dropping the handle stops it too.
#[derive(Debug)]
pub struct RotationHandle {
    task: Option<JoinHandle<()>>,
}

impl RotationHandle {
    pub(super) fn spawn(service: Weak<CacheSigningService>, period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(service) = service.upgrade() else {
                    debug!("Signing service dropped, stopping key rotation");
                    break;
                };
                service.rotate_keys();
            }
        });
        Self { task: Some(task) }
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for RotationHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lockward_common::CacheSigningConfig;

    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn service() -> Arc<CacheSigningService> {
        Arc::new(CacheSigningService::new(CacheSigningConfig {
            key_rotation_interval: HOUR,
            max_key_age: HOUR * 4,
            ..Default::default()
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotates_on_interval() {
        let service = service();
        let _handle = service.start_rotation();

        tokio::time::sleep(HOUR * 3 + Duration::from_secs(1)).await;
        assert_eq!(service.key_info().active_keys, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let service = service();
        let mut handle = service.start_rotation();
        assert!(handle.is_running());

        handle.stop();
        handle.stop();
        assert!(!handle.is_running());

        tokio::time::sleep(HOUR * 2 + Duration::from_secs(1)).await;
        assert_eq!(service.key_info().active_keys, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_exits_when_service_dropped() {
        let service = service();
        let handle = service.start_rotation();
        drop(service);

        tokio::time::sleep(HOUR + Duration::from_secs(1)).await;
        assert!(!handle.is_running());
    }
}
