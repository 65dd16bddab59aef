use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::booking::BookingService;
use crate::clock::Clock;
use crate::model::*;
use crate::observability;
use crate::store::Repository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationConfig {
    /// How long a booking may sit unassigned before it is flagged.
    pub threshold: Ms,
    /// Pause between the end of one pass and the start of the next.
    pub interval: Duration,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            threshold: 2 * HOUR_MS,
            interval: Duration::from_millis(300_000),
        }
    }
}

/// Outcome of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub selected: usize,
    pub escalated: usize,
    /// Rows that stopped qualifying before their write, or failed.
    pub skipped: usize,
}

/// Flags stale unassigned bookings. Passes never overlap.
pub struct EscalationScheduler {
    service: Arc<BookingService>,
    repo: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
    config: EscalationConfig,
    pass_lock: Mutex<()>,
}

impl EscalationScheduler {
    pub fn new(
        service: Arc<BookingService>,
        repo: Arc<dyn Repository>,
        clock: Arc<dyn Clock>,
        config: EscalationConfig,
    ) -> Self {
        Self {
            service,
            repo,
            clock,
            config,
            pass_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> EscalationConfig {
        self.config
    }

    /// Run a pass now unless one is already in flight. `None` means skipped.
    pub async fn run_now(&self) -> Option<PassReport> {
        let Ok(_pass) = self.pass_lock.try_lock() else {
            metrics::counter!(observability::ESCALATION_PASSES_SKIPPED_TOTAL).increment(1);
            debug!("escalation pass already running, skipping");
            return None;
        };
        Some(self.run_pass(self.clock.now_ms()).await)
    }

    /// Select every stale booking as of `now` and escalate each one on its
    /// own. Errors are logged; the pass carries on.
    async fn run_pass(&self, now: Ms) -> PassReport {
        let started = Instant::now();
        let cutoff = now - self.config.threshold;
        let stale = match self
            .repo
            .find_stale_unescalated(BookingStatus::Requested, cutoff)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                error!("escalation selection failed: {e}");
                return PassReport::default();
            }
        };

        let mut report = PassReport {
            selected: stale.len(),
            ..PassReport::default()
        };
        for booking in stale {
            match self.service.escalate(&booking.tenant, booking.id, now).await {
                Ok(Some(escalated)) => {
                    report.escalated += 1;
                    metrics::counter!(observability::ESCALATIONS_TOTAL).increment(1);
                    warn!(
                        tenant = %escalated.tenant,
                        booking = %escalated.id,
                        hours = (now - escalated.created_at) / HOUR_MS,
                        "booking unassigned past threshold, escalated"
                    );
                }
                Ok(None) => {
                    report.skipped += 1;
                    debug!(booking = %booking.id, "no longer eligible for escalation");
                }
                Err(e) => {
                    report.skipped += 1;
                    error!(booking = %booking.id, "escalation failed: {e}");
                }
            }
        }

        metrics::histogram!(observability::ESCALATION_PASS_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        if report.selected > 0 {
            info!(
                selected = report.selected,
                escalated = report.escalated,
                skipped = report.skipped,
                "escalation pass done"
            );
        }
        report
    }

    /// One pass immediately, then one per `interval` measured from the end of
    /// the previous pass. Returns when `shutdown` flips to true.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            threshold_ms = self.config.threshold,
            interval_ms = self.config.interval.as_millis() as u64,
            "escalation scheduler started"
        );
        loop {
            if *shutdown.borrow() {
                break;
            }
            self.run_now().await;
            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("escalation scheduler stopped");
    }
}
