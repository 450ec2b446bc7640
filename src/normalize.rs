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

//! Canonical byte form of a configuration document.
//!
//! Two documents that differ only in server-stamped volatile fields produce
//! identical bytes.

use serde::Serialize;
use thiserror::Error;

use crate::strip::strip_key;

/// The concurrency-control tag ARM stamps on every resource and sub-resource.
pub const VOLATILE_FIELD: &str = "etag";

/// The document could not be reduced to its canonical byte form.
#[derive(Error, Debug)]
#[error("could not marshal configuration: {0}")]
pub struct SerializationError(#[from] serde_json::Error);

/// Serializes `document` and strips [`VOLATILE_FIELD`] at every depth.
///
/// Object keys come out sorted, so the result is stable across runs.
pub fn canonical_bytes<T>(document: &T) -> Result<Vec<u8>, SerializationError>
where
    T: Serialize + ?Sized,
{
    let mut value = serde_json::to_value(document)?;
    strip_key(&mut value, VOLATILE_FIELD);
    Ok(serde_json::to_vec(&value)?)
}
