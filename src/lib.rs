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

//! appgw-ingress-controller - Application Gateway configuration sync
//!
//! This library provides the pieces an ingress controller needs to keep an
//! Azure Application Gateway in line with its desired configuration:
//! - Case-insensitive stripping of server-assigned keys
//! - Canonical, etag-free configuration snapshots
//! - A cache that answers "has the configuration changed?"
//! - A deployment sequence that submits to ARM and waits for completion

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arm;
pub mod cache;
pub mod client;
pub mod config;
pub mod controller;
pub mod gateway;
pub mod normalize;
pub mod strip;

// Re-export commonly used types
pub use arm::ArmClient;
pub use cache::ConfigCache;
pub use client::{ApplicationGatewayClient, ClientError, LongRunningOperation};
pub use config::AppGwConfig;
pub use controller::{AppGwIngressController, DeployError, Deployment, DeploymentOutcome};
pub use gateway::{add_tags, ApplicationGateway, GatewayIdentifier};
pub use normalize::{canonical_bytes, SerializationError};
pub use strip::{delete_key_from_json, strip_key};

/// Semantic version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default name for the controller.
pub const CONTROLLER_NAME: &str = "appgw-ingress-controller";
