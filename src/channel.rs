//! Live-update channel: one push connection per game session, reopened after a
//! fixed delay whenever it drops.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::domain::Session;
use crate::protocol::{Notification, PushMessage};
use crate::transport::{Connector, Transport};

/// How long teardown waits for the reader task to close its socket before
/// aborting it.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
}

type MessageHandler = Arc<dyn Fn(&Notification) + Send + Sync>;
type OpenHandler = Arc<dyn Fn(&Session) + Send + Sync>;

#[derive(Default)]
struct Handlers {
    message: Vec<MessageHandler>,
    open: Vec<OpenHandler>,
}

struct ActiveChannel {
    session: Session,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub struct ChannelManager<C: Connector> {
    connector: Arc<C>,
    config: ClientConfig,
    handlers: Arc<RwLock<Handlers>>,
    state: Arc<watch::Sender<ConnectionState>>,
    active: Option<ActiveChannel>,
}

impl<C: Connector> ChannelManager<C> {
    pub fn new(connector: C, config: ClientConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            connector: Arc::new(connector),
            config,
            handlers: Arc::new(RwLock::new(Handlers::default())),
            state: Arc::new(state),
            active: None,
        }
    }

    /// Register a callback for every well-formed inbound notification.
    pub fn on_message(&mut self, handler: impl Fn(&Notification) + Send + Sync + 'static) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .message
            .push(Arc::new(handler));
    }

    /// Register a callback for every time a connection reaches `Open`,
    /// reconnects included.
    pub fn on_open(&mut self, handler: impl Fn(&Session) + Send + Sync + 'static) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .open
            .push(Arc::new(handler));
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn session(&self) -> Option<&Session> {
        self.active.as_ref().map(|a| &a.session)
    }

    /// Bind the channel to `session`. A no-op when already open for the same
    /// game; otherwise any previous connection is fully closed first.
    pub async fn attach(&mut self, session: &Session) {
        if let Some(active) = &self.active {
            if active.session.same_game(session) && self.state() == ConnectionState::Open {
                debug!(game_id = %session.game_id, "channel already open, attach is a no-op");
                return;
            }
        }
        self.teardown().await;

        let url = self.config.socket_url(&session.game_id);
        info!(game_id = %session.game_id, %url, "attaching live channel");
        let (shutdown, shutdown_rx) = oneshot::channel();
        let link = Link {
            connector: Arc::clone(&self.connector),
            session: session.clone(),
            url,
            reconnect_delay: self.config.reconnect_delay,
            connect_timeout: self.config.connect_timeout,
            handlers: Arc::clone(&self.handlers),
            state: Arc::clone(&self.state),
        };
        let task = tokio::spawn(link.run(shutdown_rx));
        self.active = Some(ActiveChannel {
            session: session.clone(),
            shutdown,
            task,
        });
    }

    /// Close the connection and stop reconnecting. Returns once the socket is
    /// gone, so a following `attach` never overlaps with it.
    pub async fn teardown(&mut self) {
        if let Some(ActiveChannel {
            session,
            shutdown,
            mut task,
        }) = self.active.take()
        {
            let _ = shutdown.send(());
            if timeout(CLOSE_GRACE, &mut task).await.is_err() {
                warn!(game_id = %session.game_id, "channel did not close in time, aborting");
                task.abort();
                let _ = task.await;
            }
            info!(game_id = %session.game_id, "live channel closed");
        }
        self.state.send_replace(ConnectionState::Idle);
    }
}

impl<C: Connector> Drop for ChannelManager<C> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
        }
    }
}

enum LinkEnd {
    PeerClosed,
    Failed(anyhow::Error),
    Shutdown,
}

/// Everything the background task needs to keep one session connected.
struct Link<C: Connector> {
    connector: Arc<C>,
    session: Session,
    url: Url,
    reconnect_delay: Duration,
    connect_timeout: Duration,
    handlers: Arc<RwLock<Handlers>>,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl<C: Connector> Link<C> {
    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let game_id = self.session.game_id.as_str();
        loop {
            self.state.send_replace(ConnectionState::Connecting);
            debug!(game_id, url = %self.url, "connecting");
            let attempt = tokio::select! {
                _ = &mut shutdown => return,
                res = timeout(self.connect_timeout, self.connector.connect(&self.url)) => res,
            };

            match attempt {
                Ok(Ok(mut transport)) => {
                    self.state.send_replace(ConnectionState::Open);
                    info!(game_id, "live channel open");
                    self.notify_open();
                    match self.pump(transport.as_mut(), &mut shutdown).await {
                        LinkEnd::Shutdown => {
                            if let Err(e) = transport.close().await {
                                debug!(game_id, error = %e, "close after shutdown failed");
                            }
                            return;
                        }
                        LinkEnd::PeerClosed => info!(game_id, "live channel closed by server"),
                        LinkEnd::Failed(e) => warn!(game_id, error = %e, "live channel failed"),
                    }
                }
                Ok(Err(e)) => warn!(game_id, error = %e, "connect failed"),
                Err(_) => warn!(game_id, timeout = ?self.connect_timeout, "connect timed out"),
            }

            self.state.send_replace(ConnectionState::Closed);
            debug!(game_id, delay = ?self.reconnect_delay, "scheduling reconnect");
            tokio::select! {
                _ = &mut shutdown => return,
                _ = sleep(self.reconnect_delay) => {}
            }
        }
    }

    async fn pump(
        &self,
        transport: &mut dyn Transport,
        shutdown: &mut oneshot::Receiver<()>,
    ) -> LinkEnd {
        loop {
            let frame = tokio::select! {
                _ = &mut *shutdown => return LinkEnd::Shutdown,
                frame = transport.recv() => frame,
            };
            match frame {
                Ok(Some(text)) => match PushMessage::parse(&text) {
                    Ok(message) => self.dispatch(Notification {
                        game_id: self.session.game_id.clone(),
                        message,
                    }),
                    Err(e) => warn!(
                        game_id = %self.session.game_id,
                        error = %e,
                        "dropping malformed push payload"
                    ),
                },
                Ok(None) => return LinkEnd::PeerClosed,
                Err(e) => return LinkEnd::Failed(e),
            }
        }
    }

    fn dispatch(&self, notification: Notification) {
        debug!(
            game_id = %notification.game_id,
            kind = notification.message.kind.as_str(),
            "push received"
        );
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .message
            .clone();
        for handler in handlers {
            handler(&notification);
        }
    }

    fn notify_open(&self) {
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .open
            .clone();
        for handler in handlers {
            handler(&self.session);
        }
    }
}
