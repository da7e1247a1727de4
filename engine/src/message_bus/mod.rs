//! Message bus for informational notices between workers
//!
//! `publish` appends to an ordered log, invokes the handler registered for
//! the recipient (synchronously, with no bus lock held) and forwards a copy
//! to channel subscribers. Phase transitions are driven by direct calls in
//! the conductor; nothing here ever gates one.
//!
//! The log is bounded: once it holds `capacity` messages the oldest are
//! dropped. Message ids keep counting across evictions.

use crate::conductor::WorkflowState;
use chrono::{DateTime, Utc};
use sdk::Clock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Channel buffer size for bounded channels
const CHANNEL_BUFFER_SIZE: usize = 100;

/// Messages kept by [`MessageBus::new`]
pub const DEFAULT_LOG_CAPACITY: usize = 10_000;

/// Recipient name that matches every message when subscribing
pub const ANY_RECIPIENT: &str = "*";

/// Typed notice bodies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    ItineraryDrafted {
        project_id: String,
        version: u32,
        days: usize,
    },
    BudgetAnalyzed {
        project_id: String,
        estimated_total: f64,
        savings_identified: f64,
        shortfalls: Vec<String>,
    },
    FactsChecked {
        project_id: String,
        issues: usize,
        confidence: f64,
    },
    PhaseChanged {
        project_id: String,
        state: WorkflowState,
    },
}

impl Notice {
    pub fn project_id(&self) -> &str {
        match self {
            Notice::ItineraryDrafted { project_id, .. }
            | Notice::BudgetAnalyzed { project_id, .. }
            | Notice::FactsChecked { project_id, .. }
            | Notice::PhaseChanged { project_id, .. } => project_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    /// Position in the bus log, starting at 1
    pub id: u64,
    pub from: String,
    pub to: String,
    pub body: Notice,
    pub timestamp: DateTime<Utc>,
}

/// Callback invoked synchronously for messages addressed to one recipient
pub type Handler = Arc<dyn Fn(&BusMessage) + Send + Sync>;

#[derive(Default)]
struct BusLog {
    entries: VecDeque<BusMessage>,
    published: u64,
}

pub struct MessageBus {
    clock: Arc<dyn Clock>,
    capacity: usize,
    log: Mutex<BusLog>,
    handlers: Mutex<HashMap<String, Handler>>,
    channels: Mutex<HashMap<String, Vec<mpsc::Sender<BusMessage>>>>,
}

impl MessageBus {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_capacity(clock, DEFAULT_LOG_CAPACITY)
    }

    /// A bus whose log keeps at most `capacity` messages.
    pub fn with_capacity(clock: Arc<dyn Clock>, capacity: usize) -> Self {
        Self {
            clock,
            capacity: capacity.max(1),
            log: Mutex::new(BusLog::default()),
            handlers: Mutex::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Registers the handler for `recipient`, replacing any previous one.
    pub async fn register_handler(&self, recipient: impl Into<String>, handler: Handler) {
        self.handlers.lock().await.insert(recipient.into(), handler);
    }

    /// Subscribe to messages for `recipient`, or [`ANY_RECIPIENT`] for all.
    ///
    /// The channel is bounded; messages for a full or closed subscriber are
    /// dropped rather than waited on.
    pub async fn subscribe(&self, recipient: impl Into<String>) -> mpsc::Receiver<BusMessage> {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        self.channels
            .lock()
            .await
            .entry(recipient.into())
            .or_default()
            .push(tx);
        rx
    }

    /// Publish a notice and return the logged message
    pub async fn publish(
        &self,
        from: impl Into<String>,
        to: impl Into<String>,
        body: Notice,
    ) -> BusMessage {
        let message = {
            let mut log = self.log.lock().await;
            log.published += 1;
            let message = BusMessage {
                id: log.published,
                from: from.into(),
                to: to.into(),
                body,
                timestamp: self.clock.now(),
            };
            if log.entries.len() == self.capacity {
                log.entries.pop_front();
            }
            log.entries.push_back(message.clone());
            message
        };

        let handler = self.handlers.lock().await.get(&message.to).map(Arc::clone);
        if let Some(handler) = handler {
            handler(&message);
        }

        let mut channels = self.channels.lock().await;
        let broadcast = message.to == ANY_RECIPIENT;
        let keys = if broadcast {
            vec![ANY_RECIPIENT]
        } else {
            vec![message.to.as_str(), ANY_RECIPIENT]
        };
        for key in keys {
            if let Some(subscribers) = channels.get_mut(key) {
                subscribers.retain(|tx| !tx.is_closed());
                for tx in subscribers.iter() {
                    if tx.try_send(message.clone()).is_err() {
                        tracing::debug!(to = %message.to, "Dropping bus message for slow subscriber");
                    }
                }
            }
        }

        message
    }

    /// Snapshot of the retained log in publish order
    pub async fn history(&self) -> Vec<BusMessage> {
        self.log.lock().await.entries.iter().cloned().collect()
    }

    /// Messages that belong to one project, in publish order
    pub async fn history_for(&self, project_id: &str) -> Vec<BusMessage> {
        self.log
            .lock()
            .await
            .entries
            .iter()
            .filter(|m| m.body.project_id() == project_id)
            .cloned()
            .collect()
    }

    /// Messages currently retained
    pub async fn len(&self) -> usize {
        self.log.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.log.lock().await.entries.is_empty()
    }

    /// Messages published since the bus was created, evicted ones included
    pub async fn published(&self) -> u64 {
        self.log.lock().await.published
    }
}
