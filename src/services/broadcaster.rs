//! Cross-tab broadcaster.
//!
//! Sends [`BroadcastEvent`]s to the other tabs of an origin. The named
//! broadcast channel is preferred; when the origin has none, each event is
//! written to shared storage under the channel key and removed right away so
//! other tabs see it through their storage-change events.
//!
//! Sending is fire-and-forget. Receivers drop anything they cannot decode.

use std::sync::atomic::{AtomicI64, Ordering};

use tracing::{debug, warn};

use crate::services::origin::{BrowsingContext, ChannelHandle, RecvFailure, StorageEventStream};
use crate::types::broadcast::{BroadcastEvent, StorageEnvelope};
use crate::types::errors::BroadcastError;
use crate::types::now_millis;

/// Mechanism used to reach the other tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Channel,
    Storage,
}

/// Broadcast handle owned by one tab's sync component.
pub struct TabBroadcaster {
    context: BrowsingContext,
    channel_name: String,
    last_stamp: AtomicI64,
}

impl TabBroadcaster {
    pub fn new(context: BrowsingContext, channel_name: impl Into<String>) -> Self {
        Self {
            context,
            channel_name: channel_name.into(),
            last_stamp: AtomicI64::new(0),
        }
    }

    pub fn context(&self) -> &BrowsingContext {
        &self.context
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    pub fn transport(&self) -> Transport {
        if self.context.origin().channels().is_some() {
            Transport::Channel
        } else {
            Transport::Storage
        }
    }

    /// Whether this tab's own listener receives what this tab sends.
    ///
    /// Channel posts reach every other handle, including the tab's own
    /// listener; storage events never fire in the writing context.
    pub fn echoes_to_self(&self) -> bool {
        self.transport() == Transport::Channel
    }

    /// Sends `event`, logging and discarding any failure.
    pub fn send(&self, event: &BroadcastEvent) {
        if let Err(e) = self.try_send(event) {
            warn!(kind = event.kind(), error = %e, "cross-tab broadcast dropped");
        }
    }

    /// Sends `event` and reports failures to the caller.
    pub fn try_send(&self, event: &BroadcastEvent) -> Result<(), BroadcastError> {
        match self.context.origin().channels() {
            Some(registry) => {
                let data = serde_json::to_value(event)
                    .map_err(|e| BroadcastError::SerializationError(e.to_string()))?;
                // Open, post, close: no sending handle outlives the call.
                let handle = registry.open(&self.channel_name);
                let receivers = handle.post(data);
                handle.close();
                debug!(kind = event.kind(), receivers, "posted on broadcast channel");
                Ok(())
            }
            None => {
                let envelope = StorageEnvelope {
                    v: self.next_stamp(),
                    payload: event.clone(),
                };
                let value = serde_json::to_string(&envelope)
                    .map_err(|e| BroadcastError::SerializationError(e.to_string()))?;
                let storage = self.context.origin().storage();
                let source = self.context.id();
                storage.set_item(source, &self.channel_name, &value)?;
                storage.remove_item(source, &self.channel_name)?;
                debug!(kind = event.kind(), "posted through shared storage");
                Ok(())
            }
        }
    }

    /// Strictly increasing millisecond stamp for storage envelopes.
    fn next_stamp(&self) -> i64 {
        let now = now_millis();
        let mut last = self.last_stamp.load(Ordering::SeqCst);
        loop {
            let next = now.max(last + 1);
            match self
                .last_stamp
                .compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }

    /// Opens the persistent listener for this tab.
    pub fn listen(&self) -> BroadcastListener {
        let inbox = match self.context.origin().channels() {
            Some(registry) => Inbox::Channel(registry.open(&self.channel_name)),
            None => Inbox::Storage(self.context.origin().storage().subscribe(self.context.id())),
        };
        BroadcastListener {
            channel_name: self.channel_name.clone(),
            inbox,
        }
    }
}

enum Inbox {
    Channel(ChannelHandle),
    Storage(StorageEventStream),
}

/// Long-lived receiving side of a tab's broadcast handle.
pub struct BroadcastListener {
    channel_name: String,
    inbox: Inbox,
}

impl BroadcastListener {
    /// Waits for the next decodable event. Returns `None` once the source closes.
    ///
    /// Messages lost to a slow receiver come back as a single `Refetch`.
    pub async fn recv(&mut self) -> Option<BroadcastEvent> {
        loop {
            let decoded = match &mut self.inbox {
                Inbox::Channel(handle) => match handle.recv().await {
                    Ok(message) => decode_message(message.data),
                    Err(failure) => return failure_event(failure),
                },
                Inbox::Storage(stream) => match stream.recv().await {
                    Ok(event) => decode_storage(&self.channel_name, &event.key, event.new_value.as_deref()),
                    Err(failure) => return failure_event(failure),
                },
            };
            if let Some(event) = decoded {
                return Some(event);
            }
        }
    }

    /// Returns the next queued decodable event without waiting.
    pub fn try_recv(&mut self) -> Option<BroadcastEvent> {
        loop {
            let decoded = match &mut self.inbox {
                Inbox::Channel(handle) => match handle.try_recv() {
                    Ok(message) => decode_message(message.data),
                    Err(failure) => return failure_event(failure),
                },
                Inbox::Storage(stream) => match stream.try_recv() {
                    Ok(event) => decode_storage(&self.channel_name, &event.key, event.new_value.as_deref()),
                    Err(failure) => return failure_event(failure),
                },
            };
            if let Some(event) = decoded {
                return Some(event);
            }
        }
    }

    /// Dropping the listener unsubscribes it.
    pub fn close(self) {}
}

fn failure_event(failure: RecvFailure) -> Option<BroadcastEvent> {
    match failure {
        RecvFailure::Lagged(missed) => {
            warn!(missed, "broadcast listener lagged, requesting refetch");
            Some(BroadcastEvent::Refetch)
        }
        RecvFailure::Empty | RecvFailure::Closed => None,
    }
}

fn decode_message(data: serde_json::Value) -> Option<BroadcastEvent> {
    match serde_json::from_value(data) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!(error = %e, "dropping malformed channel message");
            None
        }
    }
}

/// Decodes a storage change under `channel_name`. Removals carry no value and
/// are skipped.
fn decode_storage(channel_name: &str, key: &str, new_value: Option<&str>) -> Option<BroadcastEvent> {
    if key != channel_name {
        return None;
    }
    let raw = new_value?;
    match serde_json::from_str::<StorageEnvelope>(raw) {
        Ok(envelope) => Some(envelope.payload),
        Err(e) => {
            debug!(error = %e, "dropping malformed storage payload");
            None
        }
    }
}
