//! Delivery Scheduler
//!
//! Owns the running/stopped lifecycle and the periodic batch pass.
//!
//! Architecture:
//! - Lifecycle state lives behind one async mutex that is only held for
//!   reads and transitions, never across store or network calls.
//! - `start` spawns a single loop task driven by a `tokio::time::Interval`;
//!   the first tick fires immediately.
//! - `stop` cancels the loop's token. An in-flight pass runs to completion,
//!   no new pass starts once the cancellation is observed.
//! - Every pass is sequential and bounded by `batch_size`. Per-message
//!   failures are logged and skipped; nothing is retried within a pass.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::types::{
    DeliveryCache, MessageStore, PassReport, SchedulerConfig, SchedulerError, SchedulerSnapshot,
    StoreError, Transport,
};
use crate::db::Message;

/// One page of sent messages.
#[derive(Debug, Clone)]
pub struct SentPage {
    pub messages: Vec<Message>,
    pub total: i64,
    pub pages: i64,
}

/// Number of pages needed for `total` items at `limit` per page.
pub const fn page_count(total: i64, limit: i64) -> i64 {
    if limit <= 0 || total <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

/// Handle to a running loop.
struct RunHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Lifecycle record; `run` is present iff the scheduler is running.
#[derive(Default)]
struct SchedulerState {
    run: Option<RunHandle>,
    /// Loops cancelled by `stop` that may still be finishing a pass.
    stopping: Vec<JoinHandle<()>>,
    last_run_at: Option<DateTime<Utc>>,
}

/// Store, transport and cache wiring shared with the loop task.
struct Pipeline {
    store: Arc<dyn MessageStore>,
    transport: Arc<dyn Transport>,
    cache: Option<Arc<dyn DeliveryCache>>,
    config: SchedulerConfig,
    /// Serializes passes so a restart cannot overlap a pass still in flight.
    pass_lock: Mutex<()>,
}

/// Periodic delivery scheduler.
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    state: Arc<Mutex<SchedulerState>>,
    /// Parent of every run token; cancelled when the scheduler is dropped.
    root: CancellationToken,
}

impl Scheduler {
    /// Create a stopped scheduler. `cache` is `None` when caching is disabled.
    pub fn new(
        store: Arc<dyn MessageStore>,
        transport: Arc<dyn Transport>,
        cache: Option<Arc<dyn DeliveryCache>>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                store,
                transport,
                cache,
                config,
                pass_lock: Mutex::new(()),
            }),
            state: Arc::new(Mutex::new(SchedulerState::default())),
            root: CancellationToken::new(),
        }
    }

    /// Start periodic delivery. Returns once the loop is spawned.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        let mut state = self.state.lock().await;
        if state.run.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let config = self.pipeline.config;
        info!(
            batch_size = config.batch_size,
            interval_secs = config.interval.as_secs(),
            "Starting message service"
        );

        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let cancel = self.root.child_token();

        let task = tokio::spawn(run_loop(
            Arc::clone(&self.pipeline),
            Arc::clone(&self.state),
            ticker,
            cancel.clone(),
        ));

        state.run = Some(RunHandle { cancel, task });
        Ok(())
    }

    /// Stop periodic delivery without waiting for an in-flight pass.
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        let mut state = self.state.lock().await;
        let run = state.run.take().ok_or(SchedulerError::NotRunning)?;

        info!("Stopping message service");
        run.cancel.cancel();
        state.stopping.retain(|task| !task.is_finished());
        state.stopping.push(run.task);
        Ok(())
    }

    /// Stop if running and wait for every loop task, including ones already
    /// stopped but still finishing a pass, to exit.
    pub async fn shutdown(&self) {
        let tasks = {
            let mut state = self.state.lock().await;
            let mut tasks = std::mem::take(&mut state.stopping);
            if let Some(run) = state.run.take() {
                run.cancel.cancel();
                tasks.push(run.task);
            }
            tasks
        };

        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Message service task failed during shutdown");
            }
        }
    }

    /// Whether the scheduler is running.
    pub async fn status(&self) -> bool {
        self.state.lock().await.run.is_some()
    }

    /// Running flag plus the completion time of the latest pass.
    pub async fn snapshot(&self) -> SchedulerSnapshot {
        let state = self.state.lock().await;
        SchedulerSnapshot {
            running: state.run.is_some(),
            last_run_at: state.last_run_at,
        }
    }

    /// Run one processing pass now, independent of the timer.
    pub async fn process_batch(&self) -> PassReport {
        run_pass(&self.pipeline, &self.state).await
    }

    /// Sent messages, one page at a time. Inputs are trusted as normalized.
    pub async fn sent_messages(&self, page: i64, limit: i64) -> Result<SentPage, StoreError> {
        let (messages, total) = self.pipeline.store.fetch_sent_page(page, limit).await?;
        Ok(SentPage {
            messages,
            total,
            pages: page_count(total, limit),
        })
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

async fn run_loop(
    pipeline: Arc<Pipeline>,
    state: Arc<Mutex<SchedulerState>>,
    mut ticker: Interval,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                run_pass(&pipeline, &state).await;
            }
        }
    }
    info!("Message service stopped");
}

async fn run_pass(pipeline: &Pipeline, state: &Mutex<SchedulerState>) -> PassReport {
    let report = pipeline.process_batch().await;
    state.lock().await.last_run_at = Some(Utc::now());
    report
}

impl Pipeline {
    #[instrument(skip(self), fields(batch_size = self.config.batch_size))]
    async fn process_batch(&self) -> PassReport {
        let _pass = self.pass_lock.lock().await;
        let mut report = PassReport::default();

        let messages = match self.store.fetch_unsent(self.config.batch_size).await {
            Ok(messages) => messages,
            Err(e) => {
                error!(error = %e, "Failed to fetch unsent messages");
                return report;
            }
        };

        if messages.is_empty() {
            debug!("No unsent messages found");
            return report;
        }
        report.fetched = messages.len();

        for message in &messages {
            self.deliver(message, &mut report).await;
        }

        info!(
            fetched = report.fetched,
            sent = report.sent,
            skipped_too_long = report.skipped_too_long,
            transport_failures = report.transport_failures,
            mark_failures = report.mark_failures,
            cache_failures = report.cache_failures,
            "Processed message batch"
        );
        report
    }

    async fn deliver(&self, message: &Message, report: &mut PassReport) {
        let length = message.content.len();
        if length > self.config.max_content_length {
            warn!(
                message_id = message.id,
                length,
                max_length = self.config.max_content_length,
                "Message content exceeds maximum length, skipping"
            );
            report.skipped_too_long += 1;
            return;
        }

        let delivery_id = match self.transport.send(message).await {
            Ok(id) => id,
            Err(e) => {
                warn!(message_id = message.id, error = %e, "Failed to send message");
                report.transport_failures += 1;
                return;
            }
        };

        // A failed update leaves the row unsent, so a later pass may send it again
        match self.store.mark_sent(message.id, &delivery_id).await {
            Ok(()) => {
                report.sent += 1;
                info!(
                    message_id = message.id,
                    recipient = %message.recipient,
                    delivery_id = %delivery_id,
                    "Message sent"
                );
            }
            Err(e) => {
                error!(
                    message_id = message.id,
                    delivery_id = %delivery_id,
                    error = %e,
                    "Failed to mark message as sent"
                );
                report.mark_failures += 1;
            }
        }

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(&delivery_id, Utc::now()).await {
                warn!(delivery_id = %delivery_id, error = %e, "Failed to cache delivery id");
                report.cache_failures += 1;
            }
        }
    }
}
