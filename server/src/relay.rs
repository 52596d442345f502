//! The relay server: accept, upgrade, and the per-connection echo loop.

use std::net::SocketAddr;
use std::sync::Arc;

use edit_relay_protocol::EditEvent;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

use crate::connection::Connection;
use crate::error::{ReceiveError, ServerError};

/// Decides what the relay does with each decoded event.
///
/// The relay itself has no notion of shared state or multiple peers: the
/// default [`EchoHandler`] just hands the event back. A future fan-out
/// protocol replaces the handler without touching [`Connection`] or the
/// codec.
pub trait EventHandler: Send + Sync + 'static {
    /// Return the event to send back to the peer, or `None` to stay
    /// silent.
    fn handle(&self, event: EditEvent) -> Option<EditEvent>;
}

/// The current protocol: loop every event back to its sender.
pub struct EchoHandler;

impl EventHandler for EchoHandler {
    fn handle(&self, event: EditEvent) -> Option<EditEvent> {
        Some(event)
    }
}

/// Which HTTP origins may upgrade to a WebSocket session.
///
/// The policy is injected into the upgrade path instead of being a
/// hard-coded accept-all check.
#[derive(Debug, Clone, Default)]
pub enum OriginPolicy {
    /// Accept any origin, including requests without an `Origin` header.
    #[default]
    AllowAny,
    /// Accept only the listed origins. Requests without an `Origin`
    /// header are still accepted (non-browser clients don't send one).
    AllowList(Vec<String>),
}

impl OriginPolicy {
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match self {
            OriginPolicy::AllowAny => true,
            OriginPolicy::AllowList(allowed) => match origin {
                Some(origin) => allowed.iter().any(|a| a == origin),
                None => true,
            },
        }
    }
}

/// Accepts inbound sessions and runs one echo loop per connection.
pub struct RelayServer {
    listener: TcpListener,
    handler: Arc<dyn EventHandler>,
    origin_policy: Arc<OriginPolicy>,
}

impl RelayServer {
    /// Bind the listen address with the default echo protocol.
    pub async fn bind(addr: &str) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            handler: Arc::new(EchoHandler),
            origin_policy: Arc::new(OriginPolicy::AllowAny),
        })
    }

    /// Replace the default echo protocol.
    pub fn with_handler(mut self, handler: impl EventHandler) -> Self {
        self.handler = Arc::new(handler);
        self
    }

    pub fn with_origin_policy(mut self, policy: OriginPolicy) -> Self {
        self.origin_policy = Arc::new(policy);
        self
    }

    /// The bound address, useful when binding port 0 in tests.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the listener fails.
    ///
    /// Each accepted socket gets its own task; a failed upgrade or a
    /// broken connection never affects the others.
    pub async fn run(self) -> Result<(), ServerError> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let handler = Arc::clone(&self.handler);
            let policy = Arc::clone(&self.origin_policy);

            tokio::spawn(async move {
                serve_connection(stream, peer, handler, policy).await;
            });
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    handler: Arc<dyn EventHandler>,
    policy: Arc<OriginPolicy>,
) {
    let check_origin = |req: &Request, response: Response| {
        let origin = req
            .headers()
            .get("origin")
            .and_then(|value| value.to_str().ok());
        if policy.allows(origin) {
            Ok(response)
        } else {
            tracing::warn!(%peer, ?origin, "rejected upgrade: origin not allowed");
            let mut rejection = ErrorResponse::new(Some("origin not allowed".to_string()));
            *rejection.status_mut() = StatusCode::FORBIDDEN;
            Err(rejection)
        }
    };

    let ws = match accept_hdr_async(stream, check_origin).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!(%peer, error = %e, "WebSocket handshake failed");
            return;
        }
    };

    tracing::debug!(%peer, "connection open");
    let connection = Arc::new(Connection::new(ws));

    loop {
        match connection.receive().await {
            Ok(Message::Text(text)) => match EditEvent::decode(text.as_str()) {
                Ok(event) => {
                    let Some(reply) = handler.handle(event) else {
                        continue;
                    };
                    if let Err(e) = connection.send(Message::Text(reply.encode().into())).await {
                        tracing::warn!(%peer, error = %e, "failed to send reply");
                        break;
                    }
                }
                // Keep the connection alive on malformed input; the peer
                // gets no error frame.
                Err(e) => tracing::warn!(%peer, error = %e, "dropping undecodable frame"),
            },
            Ok(_) => {
                tracing::debug!(%peer, "ignoring non-text frame");
            }
            Err(ReceiveError::Closed) => {
                tracing::debug!(%peer, "connection closed");
                break;
            }
            Err(e) => {
                tracing::warn!(%peer, error = %e, "read failed");
                break;
            }
        }
    }

    connection.close().await;
}
