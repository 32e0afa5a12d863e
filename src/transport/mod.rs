use url::Url;

/// One live socket. Yields inbound text frames until the peer goes away.
#[async_trait::async_trait]
pub trait Transport: Send {
    /// Next text frame, or `None` once the peer has closed the connection.
    async fn recv(&mut self) -> anyhow::Result<Option<String>>;
    async fn close(&mut self) -> anyhow::Result<()>;
}

/// Opens transports. The channel manager calls this once per attempt.
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &Url) -> anyhow::Result<Box<dyn Transport>>;
}

pub mod in_memory;
pub mod ws;
