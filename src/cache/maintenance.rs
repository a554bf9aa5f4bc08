//! Background sweep and compaction timers owned by a cache instance.

use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::store::{Cache, CacheState};

/// Handle to a running maintenance task.
pub struct MaintenanceHandle {
  shutdown: watch::Sender<bool>,
  task: JoinHandle<()>,
}

impl MaintenanceHandle {
  pub(crate) fn new(shutdown: watch::Sender<bool>, task: JoinHandle<()>) -> Self {
    Self { shutdown, task }
  }

  /// Signal the task and wait for it to finish.
  pub async fn stop(self) {
    let _ = self.shutdown.send(true);
    let _ = self.task.await;
  }

  pub(crate) fn abort(self) {
    let _ = self.shutdown.send(true);
    self.task.abort();
  }
}

impl<T: Send + 'static> Cache<T> {
  /// Start the expiry sweep and the compaction timer.
  ///
  /// Must be called from within a tokio runtime. Calling it twice is a no-op.
  pub fn start_maintenance(&self) {
    let mut slot = self
      .maintenance
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
      return;
    }

    let cleanup = Duration::from_secs(self.options().cleanup_interval_secs.max(1));
    let rebuild = Duration::from_secs(self.options().rebuild_interval_secs.max(1));
    *slot = Some(spawn_maintenance(
      Arc::clone(&self.state),
      cleanup,
      rebuild,
    ));
  }

  /// Stop the timers started by `start_maintenance`.
  pub async fn stop_maintenance(&self) {
    let handle = self
      .maintenance
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take();
    if let Some(handle) = handle {
      handle.stop().await;
    }
  }

  pub fn maintenance_running(&self) -> bool {
    self
      .maintenance
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .is_some()
  }
}

pub(crate) fn spawn_maintenance<T: Send + 'static>(
  state: Arc<Mutex<CacheState<T>>>,
  cleanup_every: Duration,
  rebuild_every: Duration,
) -> MaintenanceHandle {
  let (shutdown, mut shutdown_rx) = watch::channel(false);

  let task = tokio::spawn(async move {
    let mut cleanup = interval_at(Instant::now() + cleanup_every, cleanup_every);
    cleanup.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut rebuild = interval_at(Instant::now() + rebuild_every, rebuild_every);
    rebuild.set_missed_tick_behavior(MissedTickBehavior::Skip);

    debug!(
      cleanup_secs = cleanup_every.as_secs(),
      rebuild_secs = rebuild_every.as_secs(),
      "cache maintenance started"
    );

    loop {
      tokio::select! {
        changed = shutdown_rx.changed() => {
          if changed.is_err() || *shutdown_rx.borrow() {
            break;
          }
        }
        _ = cleanup.tick() => {
          let purged = state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .purge_expired(Utc::now());
          if purged > 0 {
            debug!(purged, "purged expired cache entries");
          }
        }
        _ = rebuild.tick() => {
          state.lock().unwrap_or_else(PoisonError::into_inner).compact();
          debug!("compacted cache storage");
        }
      }
    }

    info!("cache maintenance stopped");
  });

  MaintenanceHandle { shutdown, task }
}

#[cfg(test)]
mod tests {
  use crate::cache::{Cache, CacheOptions, SetOptions};
  use std::time::Duration;

  #[tokio::test(start_paused = true)]
  async fn test_sweep_purges_expired_entries() {
    let mut options = CacheOptions::default().with_ttl_ms(Some(10));
    options.cleanup_interval_secs = 1;
    let cache: Cache<u32> = Cache::new(options);
    cache.set("a", 1, SetOptions::default()).unwrap();

    cache.start_maintenance();
    assert!(cache.maintenance_running());

    // Entry expiry uses wall-clock time, the timer uses tokio time.
    std::thread::sleep(Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(1100)).await;
    tokio::task::yield_now().await;

    assert_eq!(cache.lock().entries.len(), 0);

    cache.stop_maintenance().await;
    assert!(!cache.maintenance_running());
  }

  #[tokio::test]
  async fn test_stop_without_start_is_noop() {
    let cache: Cache<u32> = Cache::new(CacheOptions::default());
    cache.stop_maintenance().await;
    assert!(!cache.maintenance_running());
  }
}
