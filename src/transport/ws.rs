use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, COOKIE};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

use crate::transport::{Connector, Transport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects to the game server's push endpoint over WebSocket.
#[derive(Debug, Clone, Default)]
pub struct WsConnector {
    session_cookie: Option<String>,
}

impl WsConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send a `Cookie` header with every handshake.
    pub fn with_session_cookie(mut self, cookie: Option<String>) -> Self {
        self.session_cookie = cookie;
        self
    }
}

#[async_trait::async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> anyhow::Result<Box<dyn Transport>> {
        let mut request = url.as_str().into_client_request()?;
        if let Some(cookie) = &self.session_cookie {
            request
                .headers_mut()
                .insert(COOKIE, HeaderValue::from_str(cookie)?);
        }
        let (stream, response) = connect_async(request)
            .await
            .map_err(|e| anyhow::anyhow!("WebSocket handshake with {} failed: {}", url, e))?;
        debug!(status = %response.status(), %url, "websocket handshake complete");
        Ok(Box::new(WsTransport { stream }))
    }
}

pub struct WsTransport {
    stream: WsStream,
}

#[async_trait::async_trait]
impl Transport for WsTransport {
    async fn recv(&mut self) -> anyhow::Result<Option<String>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) => return Ok(Some(text)),
                    Err(_) => warn!("dropping non-UTF-8 binary frame"),
                },
                // tungstenite queues the pong itself
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "peer closed websocket");
                    return Ok(None);
                }
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    return Ok(None)
                }
                Some(Err(e)) => return Err(anyhow::anyhow!("WebSocket read error: {}", e)),
            }
        }
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        match self.stream.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(anyhow::anyhow!("WebSocket close failed: {}", e)),
        }
    }
}
