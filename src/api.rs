//! The game server's HTTP API, as seen from the client.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;

use crate::config::ClientConfig;
use crate::domain::{GameSnapshot, JoinedGame, MoveRequest};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Http { status: StatusCode, body: String },
    #[error("malformed snapshot: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid session cookie")]
    InvalidCookie,
}

#[async_trait::async_trait]
pub trait GameApi: Send + Sync {
    /// `GET /api/games/{id}` negotiated as JSON.
    async fn fetch_snapshot(&self, game_id: &str) -> Result<GameSnapshot, ApiError>;

    /// `GET /api/games/{id}` negotiated as a rendered HTML fragment.
    async fn fetch_fragment(&self, game_id: &str) -> Result<String, ApiError>;

    /// `POST /api/games/{id}/move`
    async fn submit_move(&self, game_id: &str, request: &MoveRequest) -> Result<(), ApiError>;

    /// `POST /api/games/{id}/join` with a `player_name` form field.
    async fn join_game(&self, game_id: &str, player_name: &str) -> Result<JoinedGame, ApiError>;

    /// `POST /api/games/{id}/start`. The server only lets the creator start.
    async fn start_game(&self, game_id: &str, player_id: &str) -> Result<(), ApiError>;
}

#[async_trait::async_trait]
impl<T: GameApi + ?Sized> GameApi for Arc<T> {
    async fn fetch_snapshot(&self, game_id: &str) -> Result<GameSnapshot, ApiError> {
        (**self).fetch_snapshot(game_id).await
    }

    async fn fetch_fragment(&self, game_id: &str) -> Result<String, ApiError> {
        (**self).fetch_fragment(game_id).await
    }

    async fn submit_move(&self, game_id: &str, request: &MoveRequest) -> Result<(), ApiError> {
        (**self).submit_move(game_id, request).await
    }

    async fn join_game(&self, game_id: &str, player_name: &str) -> Result<JoinedGame, ApiError> {
        (**self).join_game(game_id, player_name).await
    }

    async fn start_game(&self, game_id: &str, player_id: &str) -> Result<(), ApiError> {
        (**self).start_game(game_id, player_id).await
    }
}

/// [`GameApi`] over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpGameApi {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpGameApi {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &config.session_cookie {
            let value = HeaderValue::from_str(cookie).map_err(|_| ApiError::InvalidCookie)?;
            headers.insert(COOKIE, value);
        }
        // the server seats players through its session cookie
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self { http, config })
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Http { status, body })
}

#[async_trait::async_trait]
impl GameApi for HttpGameApi {
    async fn fetch_snapshot(&self, game_id: &str) -> Result<GameSnapshot, ApiError> {
        let url = self.config.game_url(game_id);
        debug!(%url, "fetching snapshot");
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let body = ensure_success(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn fetch_fragment(&self, game_id: &str) -> Result<String, ApiError> {
        let url = self.config.game_url(game_id);
        debug!(%url, "fetching fragment");
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "text/html")
            .header("HX-Request", "true")
            .send()
            .await?;
        Ok(ensure_success(response).await?.text().await?)
    }

    async fn submit_move(&self, game_id: &str, request: &MoveRequest) -> Result<(), ApiError> {
        let url = self.config.move_url(game_id);
        debug!(%url, row = request.row, col = request.col, "submitting move");
        let response = self.http.post(url).form(request).send().await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn join_game(&self, game_id: &str, player_name: &str) -> Result<JoinedGame, ApiError> {
        let url = self.config.join_url(game_id);
        debug!(%url, player_name, "joining game");
        // a partial request gets the seat back as JSON instead of a redirect
        let response = self
            .http
            .post(url)
            .header(ACCEPT, "application/json")
            .header("HX-Request", "true")
            .form(&[("player_name", player_name)])
            .send()
            .await?;
        let body = ensure_success(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn start_game(&self, game_id: &str, player_id: &str) -> Result<(), ApiError> {
        let url = self.config.start_url(game_id);
        debug!(%url, player_id, "starting game");
        let response = self
            .http
            .post(url)
            .header("HX-Request", "true")
            .form(&[("player_id", player_id)])
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}
