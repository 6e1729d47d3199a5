//! WebSocket transport over tokio-tungstenite

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};

use super::{Connector, TransportError, TransportEvent, TransportLink};

/// Connector for `ws://` and `wss://` endpoints
///
/// Each link is bridged by two tasks: the writer drains the outbound channel
/// into the socket and closes the socket once the sender is dropped; the
/// reader forwards text frames and reports the close.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl TungsteniteConnector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<TransportLink, TransportError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(map_connect_error)?;

        let (mut sink, mut source) = stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();

        // Writer
        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    tracing::debug!(error = %e, "Failed to write frame");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // Reader
        tokio::spawn(async move {
            let mut reason = None;
            while let Some(frame) = source.next().await {
                let event = match frame {
                    Ok(Message::Text(text)) => TransportEvent::Text(text),
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                        Ok(text) => TransportEvent::Text(text),
                        Err(_) => TransportEvent::Error("non UTF-8 binary frame".to_string()),
                    },
                    Ok(Message::Close(frame)) => {
                        reason = frame.map(|f| format!("{} {}", u16::from(f.code), f.reason));
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = inbound_tx.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                };
                if inbound_tx.send(event).is_err() {
                    return;
                }
            }
            let _ = inbound_tx.send(TransportEvent::Closed(reason));
        });

        Ok(TransportLink { outbound, inbound })
    }
}

fn map_connect_error(err: tungstenite::Error) -> TransportError {
    match err {
        tungstenite::Error::Http(response) => TransportError::Rejected(response.status().as_u16()),
        tungstenite::Error::Io(e) => TransportError::Refused(e.to_string()),
        other => TransportError::Io(other.to_string()),
    }
}
