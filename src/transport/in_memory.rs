//! Loopback connector used to drive the channel manager without a network.
//!
//! Every successful `connect` hands the test a matching [`InMemoryPeer`] that
//! plays the server side of that one connection.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use url::Url;

use crate::transport::{Connector, Transport};

struct Shared {
    accepted_tx: mpsc::UnboundedSender<InMemoryPeer>,
    accepted_rx: Mutex<mpsc::UnboundedReceiver<InMemoryPeer>>,
    attempts: AtomicUsize,
    live: AtomicUsize,
    max_live: AtomicUsize,
    refusing: AtomicBool,
}

#[derive(Clone)]
pub struct InMemoryConnector {
    shared: Arc<Shared>,
}

impl Default for InMemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryConnector {
    pub fn new() -> Self {
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                accepted_tx,
                accepted_rx: Mutex::new(accepted_rx),
                attempts: AtomicUsize::new(0),
                live: AtomicUsize::new(0),
                max_live: AtomicUsize::new(0),
                refusing: AtomicBool::new(false),
            }),
        }
    }

    /// Wait for the next accepted connection.
    pub async fn accept(&self) -> Option<InMemoryPeer> {
        self.shared.accepted_rx.lock().await.recv().await
    }

    /// Make subsequent `connect` calls fail until switched back.
    pub fn refuse_connections(&self, refuse: bool) {
        self.shared.refusing.store(refuse, Ordering::SeqCst);
    }

    /// Connection attempts so far, refused ones included.
    pub fn attempts(&self) -> usize {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Transports currently alive on the client side.
    pub fn live_connections(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously alive transports ever observed.
    pub fn max_live_connections(&self) -> usize {
        self.shared.max_live.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Connector for InMemoryConnector {
    async fn connect(&self, url: &Url) -> anyhow::Result<Box<dyn Transport>> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        if self.shared.refusing.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("Connection refused by {}", url));
        }

        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let live = self.shared.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.max_live.fetch_max(live, Ordering::SeqCst);

        let peer = InMemoryPeer {
            url: url.clone(),
            frames: frames_tx,
        };
        self.shared
            .accepted_tx
            .send(peer)
            .map_err(|_| anyhow::anyhow!("Connector dropped"))?;

        Ok(Box::new(InMemoryTransport {
            frames: frames_rx,
            shared: Arc::clone(&self.shared),
        }))
    }
}

/// Server side of one in-memory connection.
pub struct InMemoryPeer {
    pub url: Url,
    frames: mpsc::UnboundedSender<String>,
}

impl InMemoryPeer {
    /// Push a raw text frame. Returns false once the client side is gone.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.frames.send(text.into()).is_ok()
    }

    /// Whether the client has closed or dropped its end.
    pub fn is_closed(&self) -> bool {
        self.frames.is_closed()
    }

    /// Close from the server side.
    pub fn close(self) {}
}

pub struct InMemoryTransport {
    frames: mpsc::UnboundedReceiver<String>,
    shared: Arc<Shared>,
}

impl Drop for InMemoryTransport {
    fn drop(&mut self) {
        self.shared.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Transport for InMemoryTransport {
    async fn recv(&mut self) -> anyhow::Result<Option<String>> {
        Ok(self.frames.recv().await)
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.frames.close();
        Ok(())
    }
}
