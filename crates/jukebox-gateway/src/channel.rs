use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{COOKIE, HeaderValue, InvalidHeaderValue};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use jukebox_types::events::{InboundFrame, content_to_raw_incoming_message};

use crate::dispatcher::Dispatcher;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection state constants, mirrored by [`ChannelState`].
const STATE_OPEN: u8 = 1;
const STATE_CLOSING: u8 = 2;
const STATE_CLOSED: u8 = 3;

/// How long `disconnect` waits for the close handshake before aborting.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// `connect` holds `&mut self` through the handshake, so there is no
/// observable connecting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Open,
    Closing,
    Closed,
}

impl ChannelState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            STATE_OPEN => Self::Open,
            STATE_CLOSING => Self::Closing,
            _ => Self::Closed,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("invalid channel url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid cookie header: {0}")]
    InvalidCookie(#[from] InvalidHeaderValue),

    #[error("websocket connect failed: {0}")]
    Connect(#[from] tungstenite::Error),
}

/// Extra handshake parameters.
#[derive(Debug, Clone, Default)]
pub struct ChannelOptions {
    /// Appended URL-encoded as `?token=...`.
    pub token: Option<String>,
    /// Sent verbatim as the `Cookie` header of the upgrade request.
    pub cookie: Option<String>,
}

/// One live WebSocket connection at most. Connecting again replaces the
/// previous connection together with its callback.
pub struct RealtimeChannel {
    options: ChannelOptions,
    dispatcher: Dispatcher,
    connection: Option<Connection>,
}

struct Connection {
    outbound: mpsc::UnboundedSender<Message>,
    state: Arc<AtomicU8>,
    task: JoinHandle<()>,
}

impl Connection {
    fn state(&self) -> ChannelState {
        ChannelState::from_u8(self.state.load(Ordering::Acquire))
    }
}

impl RealtimeChannel {
    pub fn new() -> Self {
        Self::with_options(ChannelOptions::default())
    }

    pub fn with_options(options: ChannelOptions) -> Self {
        Self {
            options,
            dispatcher: Dispatcher::new(),
            connection: None,
        }
    }

    /// Takes effect on the next `connect`.
    pub fn set_options(&mut self, options: ChannelOptions) {
        self.options = options;
    }

    /// Every inbound frame of every future connection, independent of the
    /// callback slot.
    pub fn subscribe(&self) -> broadcast::Receiver<InboundFrame> {
        self.dispatcher.subscribe()
    }

    pub fn state(&self) -> ChannelState {
        self.connection.as_ref().map_or(ChannelState::Closed, Connection::state)
    }

    pub fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    /// Open a connection to `url`, closing any previous one first. `on_message`
    /// is called for each inbound frame until this connection ends.
    pub async fn connect<F>(&mut self, url: &str, on_message: F) -> Result<(), ChannelError>
    where
        F: FnMut(InboundFrame) + Send + 'static,
    {
        self.disconnect().await;

        let url = self.handshake_url(url)?;
        let mut request = url.as_str().into_client_request()?;
        if let Some(cookie) = &self.options.cookie {
            request.headers_mut().insert(COOKIE, HeaderValue::from_str(cookie)?);
        }

        let (ws, _) = connect_async(request).await.map_err(|e| {
            error!("WebSocket error: {}", e);
            ChannelError::Connect(e)
        })?;
        info!("WebSocket connected to {}", url.path());

        let state = Arc::new(AtomicU8::new(STATE_OPEN));
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_connection(
            ws,
            outbound_rx,
            on_message,
            state.clone(),
            self.dispatcher.clone(),
        ));

        self.connection = Some(Connection { outbound, state, task });
        Ok(())
    }

    /// Serialize `message` to JSON and send it. Dropped with a warning unless
    /// the channel is open; returns whether it was queued.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> bool {
        match serde_json::to_string(message) {
            Ok(text) => self.send_text(text),
            Err(e) => {
                error!("Failed to serialize outbound message: {}", e);
                false
            }
        }
    }

    /// Send plain chat text wrapped as a raw incoming message.
    pub fn send_content(&self, content: &str) -> bool {
        self.send_text(content_to_raw_incoming_message(content))
    }

    fn send_text(&self, text: String) -> bool {
        let Some(connection) = self.connection.as_ref().filter(|c| c.state() == ChannelState::Open) else {
            warn!("WebSocket is not connected, dropping message");
            return false;
        };
        trace!("-> {}", text);
        connection.outbound.send(Message::Text(text.into())).is_ok()
    }

    /// Close the connection, if any, and wait briefly for it to wind down.
    pub async fn disconnect(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        connection.state.store(STATE_CLOSING, Ordering::Release);

        // the connection task closes the socket once its queue is dropped
        drop(connection.outbound);
        let abort = connection.task.abort_handle();
        if tokio::time::timeout(CLOSE_TIMEOUT, connection.task).await.is_err() {
            warn!("WebSocket close timed out, aborting");
            abort.abort();
        }
        connection.state.store(STATE_CLOSED, Ordering::Release);
    }

    fn handshake_url(&self, url: &str) -> Result<Url, ChannelError> {
        let mut url = Url::parse(url)?;
        if let Some(token) = &self.options.token {
            url.query_pairs_mut().append_pair("token", token);
        }
        Ok(url)
    }
}

impl Default for RealtimeChannel {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_connection<F>(
    ws: WsStream,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    mut on_message: F,
    state: Arc<AtomicU8>,
    dispatcher: Dispatcher,
) where
    F: FnMut(InboundFrame) + Send + 'static,
{
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            queued = outbound.recv() => match queued {
                Some(message) => {
                    if let Err(e) = sink.send(message).await {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => match InboundFrame::parse(text.as_str()) {
                    Ok(frame) => {
                        trace!("<- {}", text.as_str());
                        if dispatcher.has_subscribers() {
                            dispatcher.broadcast(frame.clone());
                        }
                        on_message(frame);
                    }
                    Err(e) => warn!("Dropping unparseable frame: {}", e),
                },
                Some(Ok(Message::Close(frame))) => {
                    debug!("Server closed the channel: {:?}", frame);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
                None => break,
            },
        }
    }

    state.store(STATE_CLOSED, Ordering::Release);
    info!("WebSocket disconnected");
}
