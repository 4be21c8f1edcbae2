//! Rich presence broadcast.
//!
//! The client connects through a [`PresenceConnector`], publishes a default
//! "browsing" activity once connected, and when a send fails treats the
//! connection as lost: it drops the transport and retries every
//! [`RECONNECT_DELAY`] until it is connected again or explicitly disconnected.
//! An initial connect failure is only logged; nothing retries it.
//! Every exchange with the chat client is bounded by [`EXCHANGE_TIMEOUT`], so
//! a peer that accepts the connection and then stays silent counts as a
//! failure instead of stalling the caller.

pub mod ipc;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::{Result, WorkspaceError};

pub use ipc::DiscordIpcConnector;

/// Wait between reconnect attempts after the connection drops
pub const RECONNECT_DELAY: Duration = Duration::from_secs(15);

/// Upper bound on connecting (including the handshake) or publishing once
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

const LOGO_KEY: &str = "disdian-logo";

/// Activity as sent by the presentation layer; unset fields get defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub state: Option<String>,
    pub details: Option<String>,
    /// Epoch milliseconds
    pub start_timestamp: Option<i64>,
    pub large_image_key: Option<String>,
    pub large_image_text: Option<String>,
    pub small_image_key: Option<String>,
    pub small_image_text: Option<String>,
}

impl Activity {
    /// Shown right after connecting and while browsing the workspace
    pub fn browsing() -> Self {
        Self {
            state: Some("Browsing notes".into()),
            details: Some("Organizing the workspace".into()),
            start_timestamp: Some(chrono::Utc::now().timestamp_millis()),
            large_image_key: Some(LOGO_KEY.into()),
            large_image_text: Some("Disdian".into()),
            small_image_key: Some("browsing".into()),
            small_image_text: Some("Browsing".into()),
        }
    }

    pub fn editing(note_title: &str, word_count: usize) -> Self {
        Self {
            state: Some(format!("Editing: {}", note_title)),
            details: Some(format!("{} words", word_count)),
            start_timestamp: Some(chrono::Utc::now().timestamp_millis()),
            large_image_key: Some(LOGO_KEY.into()),
            large_image_text: Some("Disdian".into()),
            small_image_key: Some("writing".into()),
            small_image_text: Some("Writing a note".into()),
        }
    }

    /// Fill the gaps and convert to the wire shape
    pub fn to_payload(&self) -> ActivityPayload {
        let or = |value: &Option<String>, fallback: &str| {
            value.clone().unwrap_or_else(|| fallback.to_string())
        };
        ActivityPayload {
            state: or(&self.state, "Working on notes"),
            details: or(&self.details, "Disdian"),
            timestamps: Timestamps {
                start: self
                    .start_timestamp
                    .unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
            },
            assets: Assets {
                large_image: or(&self.large_image_key, LOGO_KEY),
                large_text: or(&self.large_image_text, "Disdian Note Taking"),
                small_image: or(&self.small_image_key, "writing"),
                small_text: or(&self.small_image_text, "Writing"),
            },
            instance: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Timestamps {
    pub start: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assets {
    pub large_image: String,
    pub large_text: String,
    pub small_image: String,
    pub small_text: String,
}

/// Activity in the shape the chat client expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityPayload {
    pub state: String,
    pub details: String,
    pub timestamps: Timestamps,
    pub assets: Assets,
    pub instance: bool,
}

/// An open connection to the chat client
#[async_trait]
pub trait PresenceTransport: Send {
    async fn set_activity(&mut self, activity: &ActivityPayload) -> Result<()>;
    async fn close(&mut self);
}

/// Opens transports for a given client id
#[async_trait]
pub trait PresenceConnector: Send + Sync {
    async fn connect(&self, client_id: &str) -> Result<Box<dyn PresenceTransport>>;
}

struct Inner {
    client_id: String,
    connector: Arc<dyn PresenceConnector>,
    reconnect_delay: Duration,
    exchange_timeout: Duration,
    transport: Mutex<Option<Box<dyn PresenceTransport>>>,
    reconnect: StdMutex<Option<JoinHandle<()>>>,
    /// Set by an explicit disconnect; stops reconnect attempts
    closed: AtomicBool,
}

async fn bounded<T>(
    limit: Duration,
    what: &str,
    exchange: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, exchange)
        .await
        .map_err(|_| WorkspaceError::Presence(format!("{} timed out after {:?}", what, limit)))?
}

impl Inner {
    async fn publish(&self, transport: &mut dyn PresenceTransport, activity: &Activity) -> Result<()> {
        bounded(
            self.exchange_timeout,
            "Activity update",
            transport.set_activity(&activity.to_payload()),
        )
        .await
    }

    /// Open a transport and publish the default activity.
    async fn try_connect(&self) -> bool {
        let connecting = bounded(
            self.exchange_timeout,
            "Connect",
            self.connector.connect(&self.client_id),
        );
        let mut transport = match connecting.await {
            Ok(transport) => transport,
            Err(e) => {
                log::error!("[presence] Failed to connect: {}", e);
                return false;
            }
        };

        if let Err(e) = self.publish(transport.as_mut(), &Activity::browsing()).await {
            log::warn!("[presence] Connected but initial activity failed: {}", e);
            transport.close().await;
            return false;
        }

        if self.closed.load(Ordering::SeqCst) {
            transport.close().await;
            return false;
        }

        *self.transport.lock().await = Some(transport);
        log::info!("[presence] Connected with client id {}", self.client_id);
        true
    }

    fn schedule_reconnect(self: &Arc<Self>) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }

        let mut slot = self.reconnect.lock().unwrap_or_else(|p| p.into_inner());
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let inner = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(inner.reconnect_delay).await;
                if inner.closed.load(Ordering::SeqCst) {
                    break;
                }
                log::info!("[presence] Attempting to reconnect...");
                if inner.try_connect().await {
                    break;
                }
            }
        }));
    }

    fn cancel_reconnect(&self) {
        let pending = self.reconnect.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(handle) = pending {
            handle.abort();
        }
    }
}

/// Connection manager for one client id.
#[derive(Clone)]
pub struct PresenceClient {
    inner: Arc<Inner>,
}

impl PresenceClient {
    pub fn new(client_id: impl Into<String>, connector: Arc<dyn PresenceConnector>) -> Self {
        Self::with_timings(client_id, connector, RECONNECT_DELAY, EXCHANGE_TIMEOUT)
    }

    pub fn with_reconnect_delay(
        client_id: impl Into<String>,
        connector: Arc<dyn PresenceConnector>,
        reconnect_delay: Duration,
    ) -> Self {
        Self::with_timings(client_id, connector, reconnect_delay, EXCHANGE_TIMEOUT)
    }

    pub fn with_timings(
        client_id: impl Into<String>,
        connector: Arc<dyn PresenceConnector>,
        reconnect_delay: Duration,
        exchange_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                client_id: client_id.into(),
                connector,
                reconnect_delay,
                exchange_timeout,
                transport: Mutex::new(None),
                reconnect: StdMutex::new(None),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.transport.lock().await.is_some()
    }

    /// Connect unless already connected. A blank client id is a no-op.
    pub async fn connect(&self) {
        if self.is_connected().await {
            return;
        }
        if self.inner.client_id.trim().is_empty() {
            log::warn!("[presence] Client id not set, skipping");
            return;
        }
        self.inner.closed.store(false, Ordering::SeqCst);
        self.inner.try_connect().await;
    }

    /// Publish `activity`. When not connected this only logs.
    pub async fn update(&self, activity: &Activity) {
        let mut guard = self.inner.transport.lock().await;
        let Some(transport) = guard.as_mut() else {
            log::debug!("[presence] Cannot update presence, not connected");
            return;
        };

        match self.inner.publish(transport.as_mut(), activity).await {
            Ok(()) => log::debug!("[presence] Activity updated"),
            Err(e) => {
                log::warn!("[presence] Connection lost: {}", e);
                if let Some(mut lost) = guard.take() {
                    lost.close().await;
                }
                drop(guard);
                self.inner.schedule_reconnect();
            }
        }
    }

    /// Stop reconnecting and close the transport.
    pub async fn disconnect(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.cancel_reconnect();
        if let Some(mut transport) = self.inner.transport.lock().await.take() {
            transport.close().await;
            log::info!("[presence] Disconnected");
        }
    }
}
