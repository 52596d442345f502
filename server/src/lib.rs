//! WebSocket relay for edit events.
//!
//! Accepts upgrade requests, decodes each inbound text frame as an
//! [`EditEvent`](edit_relay_protocol::EditEvent), and sends the handler's
//! reply back on the same connection. The shipped handler echoes.

pub mod connection;
pub mod error;
pub mod relay;

pub use connection::{Connection, ConnectionState};
pub use error::{ReceiveError, SendError, ServerError};
pub use relay::{EchoHandler, EventHandler, OriginPolicy, RelayServer};
