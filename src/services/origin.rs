//! Same-origin messaging primitives shared by every tab of one origin.
//!
//! An [`Origin`] stands in for what a browser runtime hands to all contexts
//! of one origin: an optional registry of named broadcast channels and a
//! shared key-value storage area that fires change events in every context
//! except the writer. Tabs are [`BrowsingContext`]s opened on an origin.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use uuid::Uuid;

use crate::types::errors::BroadcastError;

const CHANNEL_CAPACITY: usize = 256;
const STORAGE_EVENT_CAPACITY: usize = 256;

/// A message posted on a named channel.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    /// Handle that posted the message; it never receives its own posts.
    pub source: Uuid,
    pub data: Value,
}

/// Registry of named broadcast channels.
pub struct ChannelRegistry {
    channels: Mutex<HashMap<String, broadcast::Sender<ChannelMessage>>>,
}

impl ChannelRegistry {
    fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Opens a new handle on the channel `name`, creating the channel on first use.
    pub fn open(&self, name: &str) -> ChannelHandle {
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let sender = channels
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone();
        let receiver = sender.subscribe();
        ChannelHandle {
            id: Uuid::new_v4(),
            name: name.to_string(),
            sender,
            receiver,
        }
    }
}

/// Why a channel or storage receive returned without a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvFailure {
    /// Nothing is queued right now.
    Empty,
    /// The receiver fell behind and this many messages were dropped.
    Lagged(u64),
    /// No more messages will arrive.
    Closed,
}

/// One open handle on a named channel. Dropping the handle closes it.
pub struct ChannelHandle {
    id: Uuid,
    name: String,
    sender: broadcast::Sender<ChannelMessage>,
    receiver: broadcast::Receiver<ChannelMessage>,
}

impl ChannelHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Posts `data` to every other open handle on this channel.
    ///
    /// Returns how many handles will see it. Zero listeners is not an error.
    pub fn post(&self, data: Value) -> usize {
        let message = ChannelMessage {
            source: self.id,
            data,
        };
        // The handle's own receiver counts as a subscriber.
        self.sender
            .send(message)
            .map(|n| n.saturating_sub(1))
            .unwrap_or(0)
    }

    /// Waits for the next message posted by another handle.
    pub async fn recv(&mut self) -> Result<ChannelMessage, RecvFailure> {
        loop {
            match self.receiver.recv().await {
                Ok(message) if message.source == self.id => continue,
                Ok(message) => return Ok(message),
                Err(RecvError::Lagged(n)) => return Err(RecvFailure::Lagged(n)),
                Err(RecvError::Closed) => return Err(RecvFailure::Closed),
            }
        }
    }

    /// Returns the next queued message posted by another handle without waiting.
    pub fn try_recv(&mut self) -> Result<ChannelMessage, RecvFailure> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) if message.source == self.id => continue,
                Ok(message) => return Ok(message),
                Err(TryRecvError::Empty) => return Err(RecvFailure::Empty),
                Err(TryRecvError::Lagged(n)) => return Err(RecvFailure::Lagged(n)),
                Err(TryRecvError::Closed) => return Err(RecvFailure::Closed),
            }
        }
    }

    /// Dropping the handle unsubscribes it.
    pub fn close(self) {}
}

/// Change event fired by [`SharedStorage`] writes and removals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub old_value: Option<String>,
    /// `None` when the key was removed.
    pub new_value: Option<String>,
    /// Context that performed the write.
    pub source: String,
}

/// Key-value storage shared by all contexts of an origin.
pub struct SharedStorage {
    entries: Mutex<HashMap<String, String>>,
    events: broadcast::Sender<StorageEvent>,
    quota_bytes: Option<usize>,
    available: AtomicBool,
}

impl SharedStorage {
    fn new(quota_bytes: Option<usize>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            events: broadcast::channel(STORAGE_EVENT_CAPACITY).0,
            quota_bytes,
            available: AtomicBool::new(true),
        }
    }

    /// Marks the storage area usable or not, as private browsing modes do.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    /// Stores `value` under `key` and notifies the other contexts.
    ///
    /// Writing the value already stored fires no event.
    pub fn set_item(&self, source: &str, key: &str, value: &str) -> Result<(), BroadcastError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(BroadcastError::StorageUnavailable);
        }
        let size = key.len() + value.len();
        if let Some(quota) = self.quota_bytes {
            if size > quota {
                return Err(BroadcastError::QuotaExceeded {
                    key: key.to_string(),
                    size,
                });
            }
        }
        let old_value = {
            let mut entries = self
                .entries
                .lock()
                .map_err(|_| BroadcastError::StorageUnavailable)?;
            entries.insert(key.to_string(), value.to_string())
        };
        if old_value.as_deref() == Some(value) {
            return Ok(());
        }
        let _ = self.events.send(StorageEvent {
            key: key.to_string(),
            old_value,
            new_value: Some(value.to_string()),
            source: source.to_string(),
        });
        Ok(())
    }

    /// Removes `key` and notifies the other contexts if it was present.
    pub fn remove_item(&self, source: &str, key: &str) -> Result<(), BroadcastError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(BroadcastError::StorageUnavailable);
        }
        let old_value = {
            let mut entries = self
                .entries
                .lock()
                .map_err(|_| BroadcastError::StorageUnavailable)?;
            entries.remove(key)
        };
        if old_value.is_some() {
            let _ = self.events.send(StorageEvent {
                key: key.to_string(),
                old_value,
                new_value: None,
                source: source.to_string(),
            });
        }
        Ok(())
    }

    /// Subscribes `context` to change events made by other contexts.
    pub fn subscribe(&self, context: &str) -> StorageEventStream {
        StorageEventStream {
            context: context.to_string(),
            receiver: self.events.subscribe(),
        }
    }
}

/// Storage change events as seen by one context (its own writes excluded).
pub struct StorageEventStream {
    context: String,
    receiver: broadcast::Receiver<StorageEvent>,
}

impl StorageEventStream {
    pub async fn recv(&mut self) -> Result<StorageEvent, RecvFailure> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.source == self.context => continue,
                Ok(event) => return Ok(event),
                Err(RecvError::Lagged(n)) => return Err(RecvFailure::Lagged(n)),
                Err(RecvError::Closed) => return Err(RecvFailure::Closed),
            }
        }
    }

    pub fn try_recv(&mut self) -> Result<StorageEvent, RecvFailure> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if event.source == self.context => continue,
                Ok(event) => return Ok(event),
                Err(TryRecvError::Empty) => return Err(RecvFailure::Empty),
                Err(TryRecvError::Lagged(n)) => return Err(RecvFailure::Lagged(n)),
                Err(TryRecvError::Closed) => return Err(RecvFailure::Closed),
            }
        }
    }
}

/// Messaging facilities available to every context of one origin.
pub struct Origin {
    channels: Option<ChannelRegistry>,
    storage: SharedStorage,
}

impl Origin {
    /// An origin whose runtime supports named broadcast channels.
    pub fn new() -> Arc<Self> {
        Self::build(true, None)
    }

    /// An origin without broadcast channel support; tabs fall back to storage events.
    pub fn without_broadcast_channel() -> Arc<Self> {
        Self::build(false, None)
    }

    pub fn build(broadcast_channel: bool, storage_quota_bytes: Option<usize>) -> Arc<Self> {
        Arc::new(Self {
            channels: broadcast_channel.then(ChannelRegistry::new),
            storage: SharedStorage::new(storage_quota_bytes),
        })
    }

    pub fn channels(&self) -> Option<&ChannelRegistry> {
        self.channels.as_ref()
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    /// Opens a new browsing context (tab) on this origin.
    pub fn open_context(self: &Arc<Self>) -> BrowsingContext {
        BrowsingContext {
            id: Uuid::new_v4().to_string(),
            origin: Arc::clone(self),
        }
    }
}

/// One tab or window of an origin.
#[derive(Clone)]
pub struct BrowsingContext {
    id: String,
    origin: Arc<Origin>,
}

impl BrowsingContext {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn origin(&self) -> &Arc<Origin> {
        &self.origin
    }
}
