use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::TransportError;

/// An open session as a pair of text-frame channels. The session is over
/// when `inbound` yields `None`; dropping `outbound` closes it.
pub struct Connection {
    pub inbound: mpsc::UnboundedReceiver<String>,
    pub outbound: mpsc::UnboundedSender<String>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str, token: &str) -> Result<Connection, TransportError>;
}

/// WebSocket connector. The bearer token goes in the `Authorization`
/// header and, for servers that only read the handshake URL, in the
/// `token` query parameter.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

/// `url` with the token appended as a form-encoded `token` query pair.
pub(crate) fn handshake_url(url: &str, token: &str) -> Result<Url, TransportError> {
    let mut target = Url::parse(url)
        .map_err(|e| TransportError::Connect(format!("invalid feed url: {}", e)))?;
    target.query_pairs_mut().append_pair("token", token);
    Ok(target)
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str, token: &str) -> Result<Connection, TransportError> {
        let target = handshake_url(url, token)?;

        let mut request = target
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        if let Ok(hv) = format!("Bearer {}", token).parse() {
            request.headers_mut().insert("Authorization", hv);
        }

        // Never log `target`, it carries the token.
        debug!("Opening websocket to {}", url);
        let (ws_stream, response) = connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        info!("WebSocket connected (status: {})", response.status());

        let (mut write, mut read) = ws_stream.split();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if let Err(e) = write.send(Message::Text(text)).await {
                    debug!("WebSocket write failed: {}", e);
                    break;
                }
            }
            let _ = write.send(Message::Close(None)).await;
        });

        tokio::spawn(async move {
            while let Some(message) = read.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if in_tx.send(text).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        debug!("WebSocket closed by server: {:?}", frame);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("WebSocket read error: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Connection {
            inbound: in_rx,
            outbound: out_tx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_encoded_into_query() {
        let target = handshake_url("ws://localhost:8080/ws/signals", "a+b/c=&d e").unwrap();
        assert_eq!(target.query(), Some("token=a%2Bb%2Fc%3D%26d+e"));
        let pairs: Vec<(String, String)> = target.query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("token".to_string(), "a+b/c=&d e".to_string())]);
    }

    #[test]
    fn existing_query_is_kept() {
        let target = handshake_url("wss://feed.example.com/ws?v=2", "abc").unwrap();
        assert_eq!(target.as_str(), "wss://feed.example.com/ws?v=2&token=abc");
    }

    #[test]
    fn bad_url_is_a_connect_error() {
        assert!(matches!(
            handshake_url("not a url", "abc"),
            Err(TransportError::Connect(_))
        ));
    }
}
