//! # Idempotency Sweeper
//!
//! Background task that purges expired idempotency records.
//!
//! Expired records are already invisible to checkout; the sweep only keeps
//! the table small.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use emporia_db::Database;

use crate::effects::EffectError;

/// Periodically deletes expired idempotency records.
pub struct IdempotencySweeper {
    db: Database,
    interval: Duration,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for stopping the sweeper.
#[derive(Clone)]
pub struct IdempotencySweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl IdempotencySweeperHandle {
    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> Result<(), EffectError> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| EffectError::ChannelClosed)
    }
}

impl IdempotencySweeper {
    pub fn new(db: Database, interval: Duration) -> (Self, IdempotencySweeperHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let sweeper = IdempotencySweeper {
            db,
            interval,
            shutdown_rx,
        };
        (sweeper, IdempotencySweeperHandle { shutdown_tx })
    }

    /// Runs the sweep loop. The first sweep happens immediately.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "Idempotency sweeper starting");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.db.idempotency().purge_expired(Utc::now()).await {
                        Ok(removed) => debug!(removed, "Idempotency sweep complete"),
                        Err(e) => error!(?e, "Idempotency sweep failed"),
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Idempotency sweeper shutting down");
                    break;
                }
            }
        }

        info!("Idempotency sweeper stopped");
    }
}
