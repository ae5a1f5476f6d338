//! Tailing broadcaster: the append-only log as a live per-run feed.
//!
//! The store has no change notification, so the feed is a poll-and-relay
//! cycle: on subscription the subscriber gets one **snapshot** of the full
//! history, establishing its cursor at the highest `seq` seen; thereafter a
//! timer-driven loop reads everything past the cursor and relays one
//! **incremental** message per event, in order. An idle tick produces no
//! message, or an optional **heartbeat** so the transport can detect
//! liveness.
//!
//! Subscribers are independent: each holds its own cursor and its own poll
//! task, so a slow subscriber cannot stall another. A subscriber
//! disconnecting (dropping its receiver) deterministically stops its poll
//! task — no orphaned pollers survive.
//!
//! The poll step is a plain method ([`RunTailer::poll`]) and the cadence is
//! injected via [`TailConfig`], so tests drive ticks manually instead of
//! sleeping.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use runway_core::RunId;

use crate::error::Result;
use crate::event::RunEvent;
use crate::metrics;
use crate::store::Store;

/// Buffered messages per subscriber before the poll task awaits the
/// subscriber catching up.
const FEED_CHANNEL_CAPACITY: usize = 64;

/// One message on a subscriber's feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedMessage {
    /// Full history at subscription time, ascending `seq` order.
    Snapshot {
        /// All events known for the run so far.
        events: Vec<RunEvent>,
    },
    /// One newly observed event.
    Event(RunEvent),
    /// Liveness signal on an idle tick (only when enabled).
    Heartbeat,
}

impl FeedMessage {
    /// Returns the message kind label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Snapshot { .. } => "snapshot",
            Self::Event(_) => "event",
            Self::Heartbeat => "heartbeat",
        }
    }
}

/// Configuration for the tail poll loop.
#[derive(Debug, Clone)]
pub struct TailConfig {
    /// Interval between poll ticks.
    pub poll_interval: Duration,
    /// Whether idle ticks emit a heartbeat message.
    pub heartbeat: bool,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            heartbeat: false,
        }
    }
}

/// Cursor-based tail reader for one subscriber.
///
/// Holds the subscriber's cursor: the highest `seq` already observed.
/// The tailer never holds a lock between ticks and tolerates the run
/// disappearing or never having events (empty reads, not errors).
pub struct RunTailer {
    store: Arc<dyn Store>,
    run_id: RunId,
    cursor: u64,
}

impl RunTailer {
    /// Creates a tailer positioned before the first event.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, run_id: RunId) -> Self {
        Self {
            store,
            run_id,
            cursor: 0,
        }
    }

    /// Returns the current cursor.
    #[must_use]
    pub const fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Reads the full history and positions the cursor after it.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn snapshot(&mut self) -> Result<FeedMessage> {
        let events = self.store.list_events(&self.run_id).await?;
        self.cursor = events.last().map_or(self.cursor, |event| event.seq);
        Ok(FeedMessage::Snapshot { events })
    }

    /// Performs one poll tick: reads everything past the cursor and returns
    /// one incremental message per event, advancing the cursor per event.
    ///
    /// An empty result means "no progress since last check".
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn poll(&mut self) -> Result<Vec<FeedMessage>> {
        let events = self.store.events_since(&self.run_id, self.cursor).await?;
        let mut messages = Vec::with_capacity(events.len());
        for event in events {
            self.cursor = event.seq;
            messages.push(FeedMessage::Event(event));
        }
        Ok(messages)
    }
}

/// Subscribes to a run's live feed.
///
/// Spawns a per-subscriber poll task that sends the snapshot first, then
/// incremental messages as events land. The task stops when the returned
/// receiver is dropped; the join handle is mostly useful for tests that
/// want to await the teardown.
///
/// The feed has no end-of-run signal: the task keeps polling a terminal
/// run's (now static) log until the subscriber disconnects. Subscribers
/// inspect relayed titles or the run status themselves to know the run is
/// done.
#[must_use]
pub fn subscribe(
    store: Arc<dyn Store>,
    run_id: RunId,
    config: TailConfig,
) -> (mpsc::Receiver<FeedMessage>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);

    let handle = tokio::spawn(async move {
        let mut tailer = RunTailer::new(store, run_id);

        match tailer.snapshot().await {
            Ok(snapshot) => {
                metrics::record_feed_message(snapshot.kind());
                if tx.send(snapshot).await.is_err() {
                    return;
                }
            }
            Err(err) => {
                tracing::warn!(run_id = %run_id, error = %err, "tail snapshot failed");
                return;
            }
        }

        let mut interval = tokio::time::interval(config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; consume it so polling starts
        // one full interval after the snapshot.
        interval.tick().await;

        'poll: loop {
            interval.tick().await;
            if tx.is_closed() {
                break;
            }

            match tailer.poll().await {
                Ok(messages) if messages.is_empty() => {
                    if config.heartbeat {
                        metrics::record_feed_message("heartbeat");
                        if tx.send(FeedMessage::Heartbeat).await.is_err() {
                            break;
                        }
                    }
                }
                Ok(messages) => {
                    for message in messages {
                        metrics::record_feed_message(message.kind());
                        if tx.send(message).await.is_err() {
                            break 'poll;
                        }
                    }
                }
                Err(err) => {
                    // Transient storage trouble; keep the cursor and retry
                    // on the next tick.
                    tracing::warn!(run_id = %run_id, error = %err, "tail poll failed");
                }
            }
        }

        tracing::debug!(run_id = %run_id, "subscriber gone; tail stopped");
    });

    (rx, handle)
}
