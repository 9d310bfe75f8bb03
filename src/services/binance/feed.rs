//! Binance ticker feed over WebSocket

use crate::config::DEFAULT_BINANCE_WS_URL;
use crate::errors::{PipelineError, Result};
use crate::services::binance::messages::parse_ticker;
use crate::services::feed::{FeedSubscription, PriceFeedHandler};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::{sleep, Duration};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Stopped,
    Disconnected,
}

/// Pushes `(symbol, last price)` for each subscribed symbol to a handler.
///
/// The connection is re-established after a fixed delay until a stop is
/// requested.
#[derive(Debug, Clone)]
pub struct BinanceFeed {
    base_url: String,
    symbols: Vec<String>,
    reconnect_delay: Duration,
}

impl BinanceFeed {
    pub fn new(symbols: Vec<String>) -> Self {
        Self::with_base_url(DEFAULT_BINANCE_WS_URL, symbols)
    }

    pub fn with_base_url(base_url: &str, symbols: Vec<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            symbols,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Combined-stream URL, e.g. `/stream?streams=btcusdt@ticker/ethusdt@ticker`
    pub fn stream_url(&self) -> Result<Url> {
        if self.symbols.is_empty() {
            return Err(PipelineError::Config("no symbols to subscribe to".into()));
        }
        let streams = self
            .symbols
            .iter()
            .map(|s| format!("{}@ticker", s.to_lowercase()))
            .collect::<Vec<_>>()
            .join("/");
        let raw = format!("{}/stream?streams={}", self.base_url, streams);
        Url::parse(&raw).map_err(|e| PipelineError::Config(format!("invalid feed url {}: {}", raw, e)))
    }

    /// Start streaming into `handler` on a background task
    pub fn subscribe(&self, handler: Arc<dyn PriceFeedHandler>) -> Result<FeedSubscription> {
        let url = self.stream_url()?;
        let (stop_tx, stop_rx) = oneshot::channel();
        let done = tokio::spawn(run_feed(url, handler, stop_rx, self.reconnect_delay));
        Ok(FeedSubscription::new(stop_tx, done))
    }
}

async fn run_feed(
    url: Url,
    handler: Arc<dyn PriceFeedHandler>,
    mut stop: oneshot::Receiver<()>,
    reconnect_delay: Duration,
) {
    loop {
        let connected = tokio::select! {
            _ = &mut stop => break,
            result = connect_async(url.as_str()) => result,
        };

        match connected {
            Ok((socket, _)) => {
                info!(url = %url, "Binance feed connected");
                if stream_session(socket, handler.as_ref(), &mut stop).await == SessionEnd::Stopped {
                    break;
                }
                warn!("Binance feed disconnected");
            }
            Err(e) => handler.on_error(&e.into()).await,
        }

        tokio::select! {
            _ = &mut stop => break,
            _ = sleep(reconnect_delay) => debug!("Binance feed reconnecting"),
        }
    }

    info!("Binance feed stopped");
}

async fn stream_session(
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    handler: &dyn PriceFeedHandler,
    stop: &mut oneshot::Receiver<()>,
) -> SessionEnd {
    let (mut write, mut read) = socket.split();

    loop {
        tokio::select! {
            _ = &mut *stop => {
                let _ = write.send(Message::Close(None)).await;
                return SessionEnd::Stopped;
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => match parse_ticker(&text) {
                    Ok(Some(event)) => handler.on_price(event).await,
                    Ok(None) => debug!(frame = %text, "Ignoring non-ticker frame"),
                    Err(e) => handler.on_error(&e).await,
                },
                Some(Ok(Message::Ping(payload))) => {
                    let _ = write.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | None => return SessionEnd::Disconnected,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    handler.on_error(&e.into()).await;
                    return SessionEnd::Disconnected;
                }
            },
        }
    }
}
