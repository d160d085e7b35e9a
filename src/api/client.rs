use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::guard::SubmissionGuard;
use crate::api::{NewSignal, RemoteStats, SignalFeed, SignalQuery};
use crate::error::ApiError;
use crate::models::Signal;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// The listing endpoint answers either with a bare array or wrapped.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignalsResponse {
    Wrapped { signals: Vec<Signal> },
    Bare(Vec<Signal>),
}

impl SignalsResponse {
    fn into_signals(self) -> Vec<Signal> {
        match self {
            SignalsResponse::Wrapped { signals } => signals,
            SignalsResponse::Bare(signals) => signals,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SubmitResponse {
    Wrapped { signal: Signal },
    Bare(Signal),
}

pub struct SignalApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    guard: Mutex<SubmissionGuard>,
}

impl SignalApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            guard: Mutex::new(SubmissionGuard::default()),
        }
    }

    pub fn with_guard(mut self, guard: SubmissionGuard) -> Self {
        self.guard = Mutex::new(guard);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.header("Authorization", format!("Bearer {}", token)),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, ApiError> {
        let resp = self.authorized(req).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("Signal API error {}: {}", status, body);
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        Ok(self.send(req).await?.json::<T>().await?)
    }

    /// Submit unless an identical signal went out within the guard's TTL.
    /// The check happens before any request is made.
    pub async fn submit_guarded(&self, signal: &NewSignal) -> Result<Signal, ApiError> {
        self.submit_guarded_at(signal, Utc::now()).await
    }

    pub async fn submit_guarded_at(
        &self,
        signal: &NewSignal,
        at: DateTime<Utc>,
    ) -> Result<Signal, ApiError> {
        let fp = signal.fingerprint(at);
        self.guard
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .check(&fp)?;

        match self.submit_signal(signal).await {
            Ok(created) => Ok(created),
            Err(e) => {
                self.guard
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .release(&fp);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl SignalFeed for SignalApiClient {
    async fn fetch_signals(&self, query: &SignalQuery) -> Result<Vec<Signal>, ApiError> {
        let req = self
            .client
            .get(self.url("/api/signals"))
            .query(&query.to_pairs());
        let resp: SignalsResponse = self.send_json(req).await?;
        let signals = resp.into_signals();
        debug!("Fetched {} signals", signals.len());
        Ok(signals)
    }

    async fn mark_delivered(&self, id: &str) -> Result<(), ApiError> {
        let req = self
            .client
            .post(self.url(&format!("/api/signals/{}/delivered", id)));
        self.send(req).await?;
        Ok(())
    }

    async fn fetch_stats(&self) -> Result<RemoteStats, ApiError> {
        let req = self.client.get(self.url("/api/signals/stats"));
        self.send_json(req).await
    }

    async fn submit_signal(&self, signal: &NewSignal) -> Result<Signal, ApiError> {
        let req = self
            .client
            .post(self.url("/api/admin/signals"))
            .json(signal);
        let created = match self.send_json::<SubmitResponse>(req).await? {
            SubmitResponse::Wrapped { signal } => signal,
            SubmitResponse::Bare(signal) => signal,
        };
        info!("Submitted signal {} ({} {})", created.id, created.symbol, created.side);
        Ok(created)
    }

    async fn archive_signal(&self, id: &str) -> Result<(), ApiError> {
        let req = self
            .client
            .post(self.url(&format!("/api/admin/signals/{}/archive", id)));
        self.send(req).await?;
        info!("Archived signal {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let c = SignalApiClient::new("https://signals.example.com/", None);
        assert_eq!(c.base_url(), "https://signals.example.com");
        assert_eq!(c.url("/api/signals"), "https://signals.example.com/api/signals");
        assert_eq!(c.url("api/signals"), "https://signals.example.com/api/signals");
    }

    #[test]
    fn empty_token_is_treated_as_none() {
        let c = SignalApiClient::new("http://localhost", Some(String::new()));
        assert!(c.token.is_none());
    }

    #[test]
    fn listing_accepts_both_shapes() {
        let bare = r#"[{"id":"a","symbol":"EURUSD","side":"sell","entry_price":1.1,"stop_loss":1.2,"take_profit":1.0}]"#;
        let wrapped = format!(r#"{{"signals":{}}}"#, bare);
        let a: SignalsResponse = serde_json::from_str(bare).unwrap();
        let b: SignalsResponse = serde_json::from_str(&wrapped).unwrap();
        assert_eq!(a.into_signals()[0].id, "a");
        assert_eq!(b.into_signals()[0].id, "a");
    }

    #[tokio::test]
    async fn guarded_submit_refuses_duplicate_before_network() {
        // Unroutable base URL: only the first call reaches the network.
        let c = SignalApiClient::new("http://127.0.0.1:9", None);
        let ns = NewSignal {
            symbol: "ETHUSD".to_string(),
            side: crate::models::Side::Sell,
            entry_price: 3000.0,
            stop_loss: 3100.0,
            take_profit: crate::models::TakeProfit::Single(2800.0),
            risk_tier: None,
            timeframe: Some("1h".to_string()),
            analysis: None,
            confidence: None,
        };
        let at = Utc::now();
        c.guard.lock().unwrap().check(&ns.fingerprint(at)).unwrap();

        let err = c.submit_guarded_at(&ns, at).await.unwrap_err();
        assert!(matches!(err, ApiError::DuplicateSubmission(_)));
    }
}
