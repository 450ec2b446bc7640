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

//! Application Gateway ingress controller core.
//!
//! [`AppGwIngressController`] decides whether a configuration must be pushed
//! and, when it must, deploys it and waits for ARM to finish.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};

pub use tokio_util::sync::CancellationToken;

use crate::cache::ConfigCache;
use crate::client::{ApplicationGatewayClient, ClientError};
use crate::gateway::{ApplicationGateway, GatewayIdentifier};

/// Errors that can occur while deploying a configuration.
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("unable to send CreateOrUpdate request: {0}")]
    SubmissionRejected(#[source] ClientError),

    #[error("application gateway configuration failed after {elapsed:?}: {source}")]
    CompletionFailed {
        elapsed: Duration,
        #[source]
        source: ClientError,
    },

    #[error("application gateway deployment cancelled after {elapsed:?}")]
    Cancelled { elapsed: Duration },

    #[error("application gateway deployment did not complete within {timeout:?}")]
    TimedOut { timeout: Duration, elapsed: Duration },
}

impl DeployError {
    /// Classifies the failure.
    pub fn outcome(&self) -> DeploymentOutcome {
        match self {
            DeployError::SubmissionRejected(_) => DeploymentOutcome::SubmissionRejected,
            DeployError::CompletionFailed { .. } => DeploymentOutcome::CompletionFailed,
            DeployError::Cancelled { .. } | DeployError::TimedOut { .. } => {
                DeploymentOutcome::Cancelled
            }
        }
    }

    /// Time spent before the failure, when the wait had started.
    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            DeployError::SubmissionRejected(_) => None,
            DeployError::CompletionFailed { elapsed, .. }
            | DeployError::Cancelled { elapsed }
            | DeployError::TimedOut { elapsed, .. } => Some(*elapsed),
        }
    }
}

/// Result type for deployments.
pub type Result<T> = std::result::Result<T, DeployError>;

/// Per-call classification of a deployment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentOutcome {
    /// ARM accepted the configuration and the operation succeeded.
    Completed,
    /// ARM refused the request synchronously.
    SubmissionRejected,
    /// The long-running operation finished with a failure.
    CompletionFailed,
    /// The caller cancelled the attempt, or it timed out. The remote state
    /// is unknown and must be re-checked.
    Cancelled,
}

impl fmt::Display for DeploymentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeploymentOutcome::Completed => "completed",
            DeploymentOutcome::SubmissionRejected => "submission-rejected",
            DeploymentOutcome::CompletionFailed => "completion-failed",
            DeploymentOutcome::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// A successfully completed deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployment {
    /// Wall-clock time from start to completion.
    pub elapsed: Duration,
}

impl Deployment {
    /// Always [`DeploymentOutcome::Completed`].
    pub fn outcome(&self) -> DeploymentOutcome {
        DeploymentOutcome::Completed
    }
}

/// Controller that owns one Application Gateway.
///
/// Each instance owns its configuration cache. Deployment takes `&mut self`,
/// so one instance can never run two deployments at once.
pub struct AppGwIngressController {
    client: Arc<dyn ApplicationGatewayClient>,
    identifier: GatewayIdentifier,
    config_cache: ConfigCache,
    deployment_timeout: Option<Duration>,
}

impl AppGwIngressController {
    /// Creates a controller with an empty cache and no deployment timeout.
    pub fn new(client: Arc<dyn ApplicationGatewayClient>, identifier: GatewayIdentifier) -> Self {
        Self {
            client,
            identifier,
            config_cache: ConfigCache::new(),
            deployment_timeout: None,
        }
    }

    /// Uses `cache` as this controller's configuration slot.
    ///
    /// Lets a caller compare against a baseline before a client exists.
    pub fn with_config_cache(mut self, cache: ConfigCache) -> Self {
        self.config_cache = cache;
        self
    }

    /// Bounds how long [`deploy_config`](Self::deploy_config) waits for ARM.
    pub fn with_deployment_timeout(mut self, timeout: Duration) -> Self {
        self.deployment_timeout = Some(timeout);
        self
    }

    /// Returns the gateway this controller manages.
    pub fn identifier(&self) -> &GatewayIdentifier {
        &self.identifier
    }

    /// Returns a handle to the configuration cache.
    pub fn config_cache(&self) -> &ConfigCache {
        &self.config_cache
    }

    /// Returns true if `gateway` differs from the last deployed configuration.
    ///
    /// Read-only: the cache is only written by [`deploy_config`](Self::deploy_config).
    pub fn config_has_changed(&self, gateway: &ApplicationGateway) -> bool {
        self.config_cache.has_changed(gateway)
    }

    /// Pushes `gateway` to ARM and waits for the operation to finish.
    ///
    /// The cache is updated to `gateway` before the request is sent, whatever
    /// the remote outcome. A document that cannot be normalized is still
    /// deployed, leaving the cache as it was; an [`ApplicationGateway`] always
    /// serializes, so that only happens through [`ConfigCache::store`] with
    /// other document types. No retries are attempted.
    pub async fn deploy_config(
        &mut self,
        gateway: &ApplicationGateway,
        cancel: &CancellationToken,
    ) -> Result<Deployment> {
        debug!(gateway = %self.identifier, "START Application Gateway configuration");
        let start = Instant::now();

        if let Err(err) = self.config_cache.store(gateway) {
            error!(error = %err, "could not marshal configuration for caching; will not use cache");
        }

        let submitted = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            result = self.client.create_or_update(
                cancel,
                &self.identifier.resource_group,
                &self.identifier.name,
                gateway,
            ) => result,
        };

        let mut operation = match submitted {
            Ok(operation) => operation,
            Err(ClientError::Cancelled) => {
                warn!(gateway = %self.identifier, "configuration request cancelled");
                return Err(DeployError::Cancelled {
                    elapsed: start.elapsed(),
                });
            }
            Err(err) => {
                warn!(gateway = %self.identifier, error = %err, "configuration request failed");
                return Err(DeployError::SubmissionRejected(err));
            }
        };

        let wait = async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ClientError::Cancelled),
                result = operation.wait_for_completion(cancel) => result,
            }
        };
        let waited = match self.deployment_timeout {
            Some(timeout) => tokio::time::timeout(timeout, wait).await.ok(),
            None => Some(wait.await),
        };

        let elapsed = start.elapsed();
        debug!(gateway = %self.identifier, ?elapsed, "deployment wait finished");

        let result = match waited {
            None => {
                let timeout = self.deployment_timeout.unwrap_or_default();
                warn!(gateway = %self.identifier, ?timeout, "configuration did not complete in time");
                Err(DeployError::TimedOut { timeout, elapsed })
            }
            Some(Ok(())) => {
                info!(gateway = %self.identifier, ?elapsed, "application gateway configuration deployed");
                Ok(Deployment { elapsed })
            }
            Some(Err(ClientError::Cancelled)) => {
                warn!(gateway = %self.identifier, ?elapsed, "configuration wait cancelled");
                Err(DeployError::Cancelled { elapsed })
            }
            Some(Err(source)) => {
                warn!(gateway = %self.identifier, error = %source, "application gateway configuration failed");
                Err(DeployError::CompletionFailed { elapsed, source })
            }
        };

        debug!(gateway = %self.identifier, "FINISH Application Gateway configuration");
        result
    }
}

impl fmt::Debug for AppGwIngressController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppGwIngressController")
            .field("identifier", &self.identifier)
            .field("deployment_timeout", &self.deployment_timeout)
            .finish()
    }
}
