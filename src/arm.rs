// Copyright 2025 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Azure Resource Manager client for Application Gateways.
//!
//! A create-or-update is a `PUT` on the gateway resource. ARM answers with
//! the accepted resource and, for long-running writes, an
//! `Azure-AsyncOperation` or `Location` header to poll until the operation
//! reaches a terminal state.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::client::{ApplicationGatewayClient, CancellationToken, ClientError, LongRunningOperation};
use crate::config::ArmConfig;
use crate::gateway::ApplicationGateway;

const AZURE_ASYNC_OPERATION: &str = "azure-asyncoperation";

/// Consecutive throttled or server-error polls tolerated before giving up.
const MAX_TRANSIENT_POLL_FAILURES: u32 = 5;

/// ARM client bound to one subscription.
#[derive(Clone)]
pub struct ArmClient {
    http: reqwest::Client,
    endpoint: String,
    subscription_id: String,
    api_version: String,
    token: String,
    poll_interval: Duration,
}

impl ArmClient {
    /// Creates a client from the ARM configuration and a bearer token.
    pub fn new(
        config: &ArmConfig,
        subscription_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(transport)?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            subscription_id: subscription_id.into(),
            api_version: config.api_version.clone(),
            token: token.into(),
            poll_interval: config.poll_interval,
        })
    }

    /// Returns the URL of the gateway resource.
    pub fn gateway_url(&self, resource_group: &str, name: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/applicationGateways/{}?api-version={}",
            self.endpoint, self.subscription_id, resource_group, name, self.api_version
        )
    }
}

impl fmt::Debug for ArmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArmClient")
            .field("endpoint", &self.endpoint)
            .field("subscription_id", &self.subscription_id)
            .field("api_version", &self.api_version)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ApplicationGatewayClient for ArmClient {
    async fn create_or_update(
        &self,
        cancel: &CancellationToken,
        resource_group: &str,
        name: &str,
        gateway: &ApplicationGateway,
    ) -> Result<Box<dyn LongRunningOperation>, ClientError> {
        let url = self.gateway_url(resource_group, name);
        debug!(%url, "sending CreateOrUpdate request");

        let request = self.http.put(&url).bearer_auth(&self.token).json(gateway).send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            response = request => response.map_err(transport)?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message: arm_error_message(&body).unwrap_or(body),
            });
        }

        let headers = response.headers();
        let retry_after = retry_after(headers);
        let target = if let Some(url) = header_string(headers, AZURE_ASYNC_OPERATION) {
            PollTarget::AsyncOperation(url)
        } else if let Some(url) = header_string(headers, LOCATION.as_str()) {
            PollTarget::Location(url)
        } else {
            PollTarget::Resource(url)
        };

        let initial_state = match target {
            PollTarget::Resource(_) => response
                .json::<ApplicationGateway>()
                .await
                .ok()
                .and_then(|gw| gw.provisioning_state().map(str::to_string)),
            _ => None,
        };

        debug!(%status, ?target, "CreateOrUpdate accepted");

        Ok(Box::new(ArmOperation {
            http: self.http.clone(),
            token: self.token.clone(),
            target,
            poll_interval: self.poll_interval,
            retry_after,
            initial_state,
            transient_failures: 0,
        }))
    }
}

/// Where to look for the outcome of an accepted write.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PollTarget {
    /// `Azure-AsyncOperation` status resource.
    AsyncOperation(String),
    /// `Location` header; 202 while running.
    Location(String),
    /// The gateway itself, via `properties.provisioningState`.
    Resource(String),
}

impl PollTarget {
    fn url(&self) -> &str {
        match self {
            PollTarget::AsyncOperation(url) | PollTarget::Location(url) | PollTarget::Resource(url) => url,
        }
    }
}

/// A pending ARM write.
pub struct ArmOperation {
    http: reqwest::Client,
    token: String,
    target: PollTarget,
    poll_interval: Duration,
    retry_after: Option<Duration>,
    initial_state: Option<String>,
    transient_failures: u32,
}

#[async_trait]
impl LongRunningOperation for ArmOperation {
    async fn wait_for_completion(&mut self, cancel: &CancellationToken) -> Result<(), ClientError> {
        if let Some(state) = self.initial_state.take() {
            if let Some(done) = terminal(&state, None) {
                return done;
            }
        }

        loop {
            let delay = self.retry_after.take().unwrap_or(self.poll_interval);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }

            let request = self.http.get(self.target.url()).bearer_auth(&self.token).send();
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                response = request => response.map_err(transport)?,
            };
            self.retry_after = retry_after(response.headers());

            if let Some(done) = self.poll_result(response).await? {
                return done;
            }
        }
    }
}

impl ArmOperation {
    /// Interprets one poll response. `None` means the operation is still running.
    ///
    /// 408, 429 and 5xx answers count as still running, up to
    /// [`MAX_TRANSIENT_POLL_FAILURES`] in a row.
    async fn poll_result(
        &mut self,
        response: Response,
    ) -> Result<Option<Result<(), ClientError>>, ClientError> {
        let status = response.status();
        trace!(%status, target = ?self.target, "polled long-running operation");

        if is_transient(status) && self.transient_failures < MAX_TRANSIENT_POLL_FAILURES {
            self.transient_failures += 1;
            debug!(%status, attempt = self.transient_failures, "transient poll failure; retrying");
            return Ok(None);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(Some(Err(ClientError::OperationFailed {
                status: status.as_u16().to_string(),
                message: arm_error_message(&body).unwrap_or(body),
            })));
        }

        self.transient_failures = 0;
        match &self.target {
            PollTarget::AsyncOperation(_) => {
                let body: OperationStatus = response.json().await.map_err(invalid_response)?;
                let message = body.error.and_then(|e| e.message);
                Ok(terminal(&body.status, message))
            }
            PollTarget::Location(_) => {
                if status == StatusCode::ACCEPTED {
                    Ok(None)
                } else {
                    Ok(Some(Ok(())))
                }
            }
            PollTarget::Resource(_) => {
                let gateway: ApplicationGateway = response.json().await.map_err(invalid_response)?;
                match gateway.provisioning_state() {
                    None => Ok(Some(Ok(()))),
                    Some(state) => Ok(terminal(state, None)),
                }
            }
        }
    }
}

/// Throttling, request timeouts and server errors are worth another poll.
fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/// Maps an ARM provisioning or operation state to a final result.
fn terminal(state: &str, message: Option<String>) -> Option<Result<(), ClientError>> {
    match state.to_ascii_lowercase().as_str() {
        "succeeded" => Some(Ok(())),
        "failed" | "canceled" | "cancelled" => Some(Err(ClientError::OperationFailed {
            status: state.to_string(),
            message: message.unwrap_or_else(|| format!("operation {}", state.to_lowercase())),
        })),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    status: String,
    #[serde(default)]
    error: Option<ArmErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ArmErrorBody {
    error: ArmErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ArmErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Extracts `code: message` from an ARM error body.
fn arm_error_message(body: &str) -> Option<String> {
    let detail = serde_json::from_str::<ArmErrorBody>(body).ok()?.error;
    match (detail.code, detail.message) {
        (Some(code), Some(message)) => Some(format!("{}: {}", code, message)),
        (None, Some(message)) => Some(message),
        (Some(code), None) => Some(code),
        (None, None) => None,
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header_string(headers, RETRY_AFTER.as_str())?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn transport(err: reqwest::Error) -> ClientError {
    ClientError::Transport(Box::new(err))
}

fn invalid_response(err: reqwest::Error) -> ClientError {
    ClientError::InvalidResponse(err.to_string())
}
