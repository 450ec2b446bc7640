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

//! Remote Application Gateway client interface.
//!
//! The controller only depends on these traits; [`crate::arm::ArmClient`] is
//! the production implementation.

use async_trait::async_trait;
use thiserror::Error;

pub use tokio_util::sync::CancellationToken;

use crate::gateway::ApplicationGateway;

/// Errors returned by a remote gateway client.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("long-running operation finished with status {status}: {message}")]
    OperationFailed { status: String, message: String },

    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl ClientError {
    /// Returns true if the error was caused by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }
}

/// Submits gateway configurations to the remote resource.
#[async_trait]
pub trait ApplicationGatewayClient: Send + Sync + 'static {
    /// Starts a create-or-update of the named gateway.
    ///
    /// Returns once the request has been accepted. Synchronous rejections
    /// (validation, authorization) are reported as errors here.
    async fn create_or_update(
        &self,
        cancel: &CancellationToken,
        resource_group: &str,
        name: &str,
        gateway: &ApplicationGateway,
    ) -> Result<Box<dyn LongRunningOperation>, ClientError>;
}

/// Handle to an accepted remote operation.
#[async_trait]
pub trait LongRunningOperation: Send {
    /// Blocks until the operation finishes.
    ///
    /// Returns `Err(ClientError::Cancelled)` promptly once `cancel` fires.
    async fn wait_for_completion(&mut self, cancel: &CancellationToken) -> Result<(), ClientError>;
}
