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

//! Configuration structures for the ingress controller.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::GatewayIdentifier;

/// Errors raised while validating a configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Main configuration for the ingress controller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppGwConfig {
    /// The gateway this controller owns.
    #[serde(default)]
    pub gateway: GatewayIdentifier,

    /// Azure Resource Manager client settings.
    #[serde(default)]
    pub arm: ArmConfig,

    /// Deployment settings.
    #[serde(default)]
    pub deployment: DeploymentConfig,
}

impl AppGwConfig {
    /// Checks that every required setting is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.subscription_id.is_empty() {
            return Err(ConfigError::Missing("gateway.subscriptionId"));
        }
        if self.gateway.resource_group.is_empty() {
            return Err(ConfigError::Missing("gateway.resourceGroup"));
        }
        if self.gateway.name.is_empty() {
            return Err(ConfigError::Missing("gateway.name"));
        }
        if self.arm.endpoint.is_empty() {
            return Err(ConfigError::Missing("arm.endpoint"));
        }
        if !self.arm.endpoint.starts_with("http://") && !self.arm.endpoint.starts_with("https://") {
            return Err(ConfigError::Invalid {
                name: "arm.endpoint",
                reason: format!("{} is not an http(s) URL", self.arm.endpoint),
            });
        }
        if self.arm.poll_interval.is_zero() {
            return Err(ConfigError::Invalid {
                name: "arm.pollInterval",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.arm.request_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: "arm.requestTimeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Azure Resource Manager client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmConfig {
    /// Base URL of the ARM endpoint.
    #[serde(default = "default_arm_endpoint")]
    pub endpoint: String,

    /// API version used for Microsoft.Network requests.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Environment variable holding the bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Interval between polls of a long-running operation when ARM sends no
    /// Retry-After hint.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Timeout for each individual HTTP request.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_arm_endpoint(),
            api_version: default_api_version(),
            token_env: default_token_env(),
            poll_interval: default_poll_interval(),
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_arm_endpoint() -> String {
    "https://management.azure.com".to_string()
}

fn default_api_version() -> String {
    "2018-12-01".to_string()
}

fn default_token_env() -> String {
    "AZURE_ACCESS_TOKEN".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Deployment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfig {
    /// Maximum time to wait for a deployment to complete.
    #[serde(default = "default_deployment_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            timeout: default_deployment_timeout(),
        }
    }
}

fn default_deployment_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

/// Module for duration serialization/deserialization with human-readable format.
mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s)
            .map_err(serde::de::Error::custom)
    }
}
