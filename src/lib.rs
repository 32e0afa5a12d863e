pub mod api;
pub mod channel;
pub mod client;
pub mod config;
pub mod domain;
mod logging;
pub mod protocol;
pub mod reconciler;
pub mod transport;
pub mod ui;
pub mod view;

pub use api::{ApiError, GameApi, HttpGameApi};
pub use channel::{ChannelManager, ConnectionState};
pub use client::{Command, LiveGame};
pub use config::*;
pub use domain::*;
pub use logging::init_logging;
pub use protocol::{MessageKind, Notification, ProtocolError, PushMessage};
pub use reconciler::{ReconcileError, Reconciled, StateReconciler};
pub use transport::in_memory::InMemoryConnector;
pub use transport::ws::WsConnector;
pub use transport::{Connector, Transport};
pub use ui::TerminalView;
pub use view::{derive_view, CellView, GameContainer, StatusStyle, ViewState};
