//! `reqwest`-backed gateway speaking JSON over HTTP.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::wire::{
    AttackRequest, AttackResponse, BatteryResponse, LstmResponse, SampleResponse, SvmResponse,
};
use super::{
    check_sequence, AttackKind, AttackSample, DetectionGateway, GatewayError, GatewayResult,
    HealthStatus, SharedGateway, SpoofingVerdict,
};
use crate::detection::Detection;
use crate::reading::{RawSample, ReadingPayload};

const HEALTH_PATH: &str = "/api/health";
const SAMPLE_PATH: &str = "/api/data/sample";
const ATTACK_PATH: &str = "/api/attacks/generate";
const SVM_PATH: &str = "/api/anomaly/detect-svm";
const LSTM_PATH: &str = "/api/anomaly/detect-lstm";
const BATTERY_PATH: &str = "/api/battery/detect";

/// Gateway over the backend's HTTP API.
///
/// Only a connect timeout is configured; a request that hangs after
/// connecting is waited on indefinitely.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: String,
    client: Client,
}

impl HttpGateway {
    /// Create a gateway for `base_url` (e.g. `http://localhost:8000`).
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> GatewayResult<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| {
                GatewayError::RemoteUnavailable(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    /// Create a shared reference to this gateway
    pub fn shared(self) -> SharedGateway {
        Arc::new(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> GatewayResult<T> {
        let resp = request
            .send()
            .await
            .map_err(|e| GatewayError::RemoteUnavailable(format!("{endpoint}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(endpoint, status, &body));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| GatewayError::RemoteUnavailable(format!("{endpoint}: {e}")))?;
        serde_json::from_slice(&bytes).map_err(|e| GatewayError::invalid(endpoint, e))
    }
}

/// 4xx means the backend rejected the request shape; anything else is
/// treated as the remote side being unavailable.
fn status_error(endpoint: &'static str, status: StatusCode, body: &str) -> GatewayError {
    if status.is_client_error() {
        GatewayError::invalid(endpoint, format!("rejected with {status}: {body}"))
    } else {
        GatewayError::RemoteUnavailable(format!("{endpoint} returned {status}: {body}"))
    }
}

#[async_trait]
impl DetectionGateway for HttpGateway {
    async fn health(&self) -> GatewayResult<HealthStatus> {
        self.send(HEALTH_PATH, self.client.get(self.url(HEALTH_PATH)))
            .await
    }

    async fn fetch_samples(&self, n: NonZeroUsize) -> GatewayResult<Vec<RawSample>> {
        let request = self
            .client
            .get(self.url(SAMPLE_PATH))
            .query(&[("n", n.get())]);
        let resp: SampleResponse = self.send(SAMPLE_PATH, request).await?;

        if resp.samples.len() != n.get() || resp.count != resp.samples.len() {
            return Err(GatewayError::invalid(
                SAMPLE_PATH,
                format!(
                    "asked for {} samples, got {} (count field {})",
                    n,
                    resp.samples.len(),
                    resp.count
                ),
            ));
        }
        debug!(n = n.get(), "fetched samples");
        Ok(resp.samples)
    }

    async fn classify_svm(&self, reading: &ReadingPayload) -> GatewayResult<Detection> {
        let request = self.client.post(self.url(SVM_PATH)).json(reading);
        let resp: SvmResponse = self.send(SVM_PATH, request).await?;
        Ok(resp.into_detection())
    }

    async fn classify_lstm(&self, sequence: &[ReadingPayload]) -> GatewayResult<Detection> {
        check_sequence(sequence)?;
        let request = self.client.post(self.url(LSTM_PATH)).json(sequence);
        let resp: LstmResponse = self.send(LSTM_PATH, request).await?;
        Ok(resp.into_detection())
    }

    async fn classify_battery_spoofing(
        &self,
        sequence: &[ReadingPayload],
    ) -> GatewayResult<SpoofingVerdict> {
        check_sequence(sequence)?;
        let request = self.client.post(self.url(BATTERY_PATH)).json(sequence);
        let resp: BatteryResponse = self.send(BATTERY_PATH, request).await?;
        Ok(resp.into())
    }

    async fn generate_attack_samples(
        &self,
        kind: AttackKind,
        count: NonZeroUsize,
    ) -> GatewayResult<Vec<AttackSample>> {
        let body = AttackRequest {
            attack_type: kind,
            num_samples: count.get(),
        };
        let request = self.client.post(self.url(ATTACK_PATH)).json(&body);
        let resp: AttackResponse = self.send(ATTACK_PATH, request).await?;

        if !resp.attack_type.eq_ignore_ascii_case(kind.as_str()) {
            return Err(GatewayError::invalid(
                ATTACK_PATH,
                format!("requested {kind}, backend generated {}", resp.attack_type),
            ));
        }
        if resp.count != resp.samples.len() {
            return Err(GatewayError::invalid(
                ATTACK_PATH,
                format!(
                    "count field {} disagrees with {} samples",
                    resp.count,
                    resp.samples.len()
                ),
            ));
        }
        if let Some(label) = resp
            .samples
            .iter()
            .filter_map(|s| s.attack.as_deref())
            .find(|label| !label.eq_ignore_ascii_case(kind.label()))
        {
            return Err(GatewayError::invalid(
                ATTACK_PATH,
                format!("sample labelled {label} in a {kind} batch"),
            ));
        }

        debug!(attack = %kind, samples = resp.samples.len(), "generated attack samples");
        Ok(resp
            .samples
            .into_iter()
            .map(|sample| AttackSample { kind, sample })
            .collect())
    }
}
