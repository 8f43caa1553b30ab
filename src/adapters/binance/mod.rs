//! Binance public REST adapters.
//!
//! Every request walks the same ordered endpoint list. Each attempt goes
//! through [`BinanceClient::try_endpoint`], which enforces the per-request
//! timeout and classifies the result: non-2xx statuses, unparseable bodies
//! and `{"code": .., "msg": ..}` error envelopes are all failures that move
//! on to the next endpoint. The same endpoint is never retried within a call.

pub mod exchange_info;
pub mod klines;

use crate::domain::error::FetchError;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_ENDPOINTS: &[&str] = &[
    "https://api.binance.com",
    "https://api1.binance.com",
    "https://api2.binance.com",
    "https://api3.binance.com",
    "https://data-api.binance.vision",
];

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Envelope codes Binance uses for request-weight and order-rate throttling.
const THROTTLE_CODES: &[i64] = &[-1003, -1015];

pub struct BinanceClient {
    client: reqwest::Client,
    endpoints: Vec<String>,
    timeout: Duration,
}

impl BinanceClient {
    pub fn new(endpoints: Vec<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(32)
            .build()
            .map_err(|e| FetchError::Endpoint {
                endpoint: "client".to_string(),
                reason: e.to_string(),
            })?;
        let endpoints = endpoints
            .into_iter()
            .map(|e| e.trim_end_matches('/').to_string())
            .collect();
        Ok(Self {
            client,
            endpoints,
            timeout,
        })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// GET `path` from each endpoint in order until one yields a payload
    /// accepted by `accept`. Returns the last failure once all are exhausted.
    pub async fn get_with_fallback<T, F>(
        &self,
        path: &str,
        query: &[(&str, String)],
        accept: F,
    ) -> Result<T, FetchError>
    where
        F: Fn(Value) -> Result<T, FetchError>,
    {
        let mut last_error = FetchError::Endpoint {
            endpoint: "none".to_string(),
            reason: "no endpoints configured".to_string(),
        };

        for endpoint in &self.endpoints {
            let attempt = match self.try_endpoint(endpoint, path, query).await {
                Ok(body) => accept(body),
                Err(e) => Err(e),
            };
            match attempt {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::debug!(endpoint = %endpoint, path, error = %e, "endpoint failed, falling back");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    async fn try_endpoint(
        &self,
        endpoint: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, FetchError> {
        let url = format!("{}{}", endpoint, path);
        let request = self.client.get(&url).query(query).send();

        let response = match tokio::time::timeout(self.timeout, request).await {
            Err(_) => return Err(FetchError::Timeout),
            Ok(Err(e)) if e.is_timeout() => return Err(FetchError::Timeout),
            Ok(Err(e)) => {
                return Err(FetchError::Endpoint {
                    endpoint: endpoint.to_string(),
                    reason: e.to_string(),
                })
            }
            Ok(Ok(r)) => r,
        };

        let status = response.status();
        if status.as_u16() == 429 || status.as_u16() == 418 {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            return Err(FetchError::Endpoint {
                endpoint: endpoint.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        let body = match tokio::time::timeout(self.timeout, response.json::<Value>()).await {
            Err(_) => return Err(FetchError::Timeout),
            Ok(Err(e)) => {
                return Err(FetchError::Endpoint {
                    endpoint: endpoint.to_string(),
                    reason: format!("malformed body: {}", e),
                })
            }
            Ok(Ok(v)) => v,
        };

        reject_error_envelope(endpoint, body)
    }
}

/// A 200 response can still carry `{"code": -1121, "msg": "Invalid symbol."}`.
pub fn reject_error_envelope(endpoint: &str, body: Value) -> Result<Value, FetchError> {
    let Some(code) = body.as_object().and_then(|o| o.get("code")) else {
        return Ok(body);
    };
    let code = code.as_i64().unwrap_or_default();
    if THROTTLE_CODES.contains(&code) {
        return Err(FetchError::RateLimited);
    }
    let msg = body
        .get("msg")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    Err(FetchError::Endpoint {
        endpoint: endpoint.to_string(),
        reason: format!("error envelope {}: {}", code, msg),
    })
}
