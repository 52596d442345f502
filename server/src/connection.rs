//! One accepted WebSocket session.
//!
//! The write half sits behind a mutex so any number of tasks can send on
//! the same connection without interleaving partial frames. The read half
//! has its own mutex but is meant for a single reader: the connection's
//! receive loop.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::error::{ReceiveError, SendError};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

/// Lifecycle of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closing,
    Closed,
}

const STATE_OPEN: u8 = 0;
const STATE_CLOSING: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// A bidirectional message channel to one peer.
pub struct Connection {
    write: Mutex<WsSink>,
    read: Mutex<WsSource>,
    state: AtomicU8,
}

impl Connection {
    /// Wrap a freshly upgraded socket. The connection starts out
    /// [`ConnectionState::Open`].
    pub fn new(stream: WebSocketStream<TcpStream>) -> Self {
        let (write, read) = stream.split();
        Self {
            write: Mutex::new(write),
            read: Mutex::new(read),
            state: AtomicU8::new(STATE_OPEN),
        }
    }

    pub fn state(&self) -> ConnectionState {
        match self.state.load(Ordering::Acquire) {
            STATE_OPEN => ConnectionState::Open,
            STATE_CLOSING => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }

    /// Write one complete frame.
    ///
    /// Concurrent callers are serialized by the write lock; a frame is
    /// never split or merged. No ordering is promised beyond lock
    /// acquisition order, so callers that need strict sequencing must
    /// coordinate themselves.
    pub async fn send(&self, message: Message) -> Result<(), SendError> {
        if self.state() != ConnectionState::Open {
            return Err(SendError::Closed);
        }
        let mut write = self.write.lock().await;
        write.send(message).await.map_err(|e| {
            self.state.store(STATE_CLOSED, Ordering::Release);
            SendError::Transport(e.to_string())
        })
    }

    /// Read the next data frame.
    ///
    /// Pings are answered inline and control frames are skipped, so the
    /// caller only ever sees text or binary frames. Only the owning read
    /// loop should call this.
    pub async fn receive(&self) -> Result<Message, ReceiveError> {
        if self.state() == ConnectionState::Closed {
            return Err(ReceiveError::Closed);
        }
        let mut read = self.read.lock().await;

        loop {
            match read.next().await {
                Some(Ok(msg @ Message::Text(_))) | Some(Ok(msg @ Message::Binary(_))) => {
                    return Ok(msg);
                }
                Some(Ok(Message::Ping(payload))) => {
                    if self.send(Message::Pong(payload)).await.is_err() {
                        return Err(ReceiveError::Closed);
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    self.state.store(STATE_CLOSED, Ordering::Release);
                    return Err(ReceiveError::Closed);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.state.store(STATE_CLOSED, Ordering::Release);
                    return Err(ReceiveError::Transport(e.to_string()));
                }
            }
        }
    }

    /// [`receive`] with a bounded wait. Expiry yields
    /// [`ReceiveError::Timeout`] and leaves the connection usable.
    ///
    /// [`receive`]: Connection::receive
    pub async fn receive_timeout(&self, limit: Duration) -> Result<Message, ReceiveError> {
        match tokio::time::timeout(limit, self.receive()).await {
            Ok(result) => result,
            Err(_) => Err(ReceiveError::Timeout),
        }
    }

    /// Close the session. Idempotent and safe to call from any task;
    /// later `send`/`receive` calls fail with the closed error.
    pub async fn close(&self) {
        let previous = self.state.compare_exchange(
            STATE_OPEN,
            STATE_CLOSING,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if previous.is_err() {
            // Another task already closed or is closing.
            return;
        }

        let mut write = self.write.lock().await;
        let _ = write.send(Message::Close(None)).await;
        let _ = write.close().await;
        self.state.store(STATE_CLOSED, Ordering::Release);
    }
}
