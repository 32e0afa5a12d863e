use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Delay between a channel closing and the next connection attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Upper bound on a single WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on a single API round-trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("server url must use http or https, got `{0}`")]
    UnsupportedScheme(String),
}

/// How the reconciler refreshes the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Fetch a JSON snapshot and derive the view locally.
    #[default]
    Snapshot,
    /// Fetch a server-rendered fragment and swap it in.
    Fragment,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: Url,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub render_mode: RenderMode,
    pub session_cookie: Option<String>,
    pub resync_on_open: bool,
}

impl ClientConfig {
    pub fn new(server: &str) -> Result<Self, ConfigError> {
        let server = Url::parse(server)?;
        match server.scheme() {
            "http" | "https" => {}
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
        Ok(Self {
            server,
            reconnect_delay: RECONNECT_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            render_mode: RenderMode::default(),
            session_cookie: None,
            resync_on_open: true,
        })
    }

    pub fn with_render_mode(mut self, mode: RenderMode) -> Self {
        self.render_mode = mode;
        self
    }

    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    /// `ws(s)://<host>/ws/game/{game_id}`
    pub fn socket_url(&self, game_id: &str) -> Url {
        let mut url = self.endpoint(&["ws", "game", game_id]);
        let scheme = if self.server.scheme() == "https" { "wss" } else { "ws" };
        // http -> ws and https -> wss are both special-scheme swaps, which Url allows.
        let _ = url.set_scheme(scheme);
        url
    }

    /// `/api/games/{game_id}`
    pub fn game_url(&self, game_id: &str) -> Url {
        self.endpoint(&["api", "games", game_id])
    }

    /// `/api/games/{game_id}/move`
    pub fn move_url(&self, game_id: &str) -> Url {
        self.endpoint(&["api", "games", game_id, "move"])
    }

    /// `/api/games/{game_id}/join`
    pub fn join_url(&self, game_id: &str) -> Url {
        self.endpoint(&["api", "games", game_id, "join"])
    }

    /// `/api/games/{game_id}/start`
    pub fn start_url(&self, game_id: &str) -> Url {
        self.endpoint(&["api", "games", game_id, "start"])
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.server.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}
