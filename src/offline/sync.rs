//! Catalog sync and the online/offline state machine.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::OfflineCalculator;
use crate::cache::MaintenanceHandle;

/// Connectivity signal from the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
  Online,
  Offline,
}

impl OfflineCalculator {
  /// Start the result cache's timers, and the sync timer when already online.
  pub fn start(self: &Arc<Self>) {
    self.cache.start_maintenance();
    if self.is_online() && self.config.sync_enabled {
      self.start_sync_timer();
    }
  }

  /// Sync with the catalog source if online and sync is enabled.
  ///
  /// Returns `false` when skipped, already in flight, or failed.
  pub async fn sync(&self) -> bool {
    if !self.is_online() || !self.config.sync_enabled {
      debug!(online = self.is_online(), "sync skipped");
      return false;
    }
    self.run_sync().await
  }

  /// Sync regardless of connectivity state.
  pub async fn force_sync(&self) -> bool {
    self.run_sync().await
  }

  async fn run_sync(&self) -> bool {
    if self
      .syncing
      .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
      .is_err()
    {
      debug!("sync already in progress");
      return false;
    }

    let outcome = match self.source.fetch_all().await {
      Ok(relics) => {
        let count = relics.len();
        self.write_replica().replace(relics, Utc::now());
        self.cache.clear();
        info!(relics = count, "offline replica synced");
        true
      }
      Err(e) => {
        warn!(error = %e, "offline sync failed");
        false
      }
    };
    self.syncing.store(false, Ordering::SeqCst);

    if outcome {
      if let Err(e) = self.persist().await {
        warn!(error = %e, "failed to persist offline replica");
      }
    }
    outcome
  }

  /// Apply a connectivity transition.
  ///
  /// Going online syncs immediately and starts the periodic retry; going
  /// offline stops it. Repeating the current state does nothing.
  pub async fn set_online(self: &Arc<Self>, online: bool) {
    let previous = self.online.swap(online, Ordering::SeqCst);
    if previous == online {
      return;
    }
    info!(online, "connectivity changed");

    if online {
      if self.config.sync_enabled {
        self.start_sync_timer();
      }
      self.sync().await;
    } else {
      self.stop_sync_timer().await;
    }
  }

  /// Apply connectivity signals from `rx` in order until the sender closes.
  pub fn spawn_connectivity_listener(
    self: &Arc<Self>,
    mut rx: mpsc::UnboundedReceiver<Connectivity>,
  ) -> JoinHandle<()> {
    let calculator = Arc::clone(self);
    tokio::spawn(async move {
      while let Some(signal) = rx.recv().await {
        calculator.set_online(signal == Connectivity::Online).await;
      }
      debug!("connectivity feed closed");
    })
  }

  pub fn sync_timer_running(&self) -> bool {
    self
      .sync_timer
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .is_some()
  }

  fn start_sync_timer(self: &Arc<Self>) {
    let mut slot = self.sync_timer.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
      return;
    }
    let period = Duration::from_secs(self.config.sync_interval_secs.max(1));
    *slot = Some(spawn_sync_timer(Arc::downgrade(self), period));
  }

  pub(crate) async fn stop_sync_timer(&self) {
    let timer = self
      .sync_timer
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take();
    if let Some(timer) = timer {
      timer.stop().await;
    }
  }
}

fn spawn_sync_timer(calculator: Weak<OfflineCalculator>, period: Duration) -> MaintenanceHandle {
  let (shutdown, mut shutdown_rx) = watch::channel(false);

  let task = tokio::spawn(async move {
    let mut ticks = interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!(period_secs = period.as_secs(), "sync timer started");

    loop {
      tokio::select! {
        changed = shutdown_rx.changed() => {
          if changed.is_err() || *shutdown_rx.borrow() {
            break;
          }
        }
        _ = ticks.tick() => {
          let Some(calculator) = calculator.upgrade() else {
            break;
          };
          calculator.sync().await;
        }
      }
    }

    debug!("sync timer stopped");
  });

  MaintenanceHandle::new(shutdown, task)
}
