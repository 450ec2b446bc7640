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

//! Cached comparison of configuration snapshots.
//!
//! A [`ConfigCache`] holds the canonical bytes of the last configuration that
//! was either found unchanged or handed to ARM for deployment. Clones share
//! the same slot.

use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tracing::error;

use crate::normalize::{canonical_bytes, SerializationError};

/// Shared slot holding the last known canonical configuration bytes.
///
/// The slot starts empty. Callers are expected to serialize comparison and
/// deployment per controller instance; the lock only makes the handle
/// shareable, it does not order concurrent reconciliations.
#[derive(Debug, Clone, Default)]
pub struct ConfigCache {
    slot: Arc<RwLock<Option<Vec<u8>>>>,
}

impl ConfigCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `document` differs from the cached configuration.
    ///
    /// Never writes to the slot. A document that cannot be normalized is
    /// reported as changed.
    pub fn has_changed<T>(&self, document: &T) -> bool
    where
        T: Serialize + ?Sized,
    {
        match canonical_bytes(document) {
            Ok(bytes) => !self.matches(&bytes),
            Err(err) => {
                error!(error = %err, "could not marshal configuration to compare with cache; will not use cache");
                true
            }
        }
    }

    /// Compares `document` with the cache and commits it when it differs.
    ///
    /// Returns true if the configuration changed. On a normalization failure
    /// the slot is left untouched and the configuration is reported changed.
    pub fn check_and_update<T>(&self, document: &T) -> bool
    where
        T: Serialize + ?Sized,
    {
        let bytes = match canonical_bytes(document) {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(error = %err, "could not marshal configuration to compare with cache; will not use cache");
                return true;
            }
        };

        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        if slot.as_deref() == Some(bytes.as_slice()) {
            return false;
        }
        *slot = Some(bytes);
        true
    }

    /// Overwrites the slot with the canonical bytes of `document`.
    pub fn store<T>(&self, document: &T) -> Result<(), SerializationError>
    where
        T: Serialize + ?Sized,
    {
        let bytes = canonical_bytes(document)?;
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(bytes);
        Ok(())
    }

    /// Returns a copy of the cached bytes.
    pub fn snapshot(&self) -> Option<Vec<u8>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns true if nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Empties the slot so the next comparison reports a change.
    pub fn clear(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn matches(&self, bytes: &[u8]) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_deref()
            == Some(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ApplicationGateway;
    use crate::normalize::tests::Unserializable;

    #[test]
    fn test_empty_cache_is_filled_on_first_check() {
        let gateway = ApplicationGateway::named("something");
        let cache = ConfigCache::new();

        assert!(cache.check_and_update(&gateway));
        assert!(!cache.check_and_update(&gateway));
        assert_eq!(
            String::from_utf8(cache.snapshot().unwrap()).unwrap(),
            r#"{"name":"something"}"#
        );
    }

    #[test]
    fn test_has_changed_is_read_only() {
        let gateway = ApplicationGateway::named("something");
        let cache = ConfigCache::new();

        assert!(cache.has_changed(&gateway));
        assert!(cache.has_changed(&gateway));
        assert!(cache.is_empty());

        cache.store(&gateway).unwrap();
        assert!(!cache.has_changed(&gateway));
        assert!(cache.has_changed(&ApplicationGateway::named("other")));
    }

    #[test]
    fn test_etag_only_difference_is_unchanged() {
        let mut gateway = ApplicationGateway::named("gw");
        gateway.etag = Some("W/\"1\"".to_string());
        let cache = ConfigCache::new();
        cache.store(&gateway).unwrap();

        gateway.etag = Some("W/\"2\"".to_string());
        assert!(!cache.has_changed(&gateway));
        assert!(!cache.check_and_update(&gateway));
    }

    #[test]
    fn test_cached_bytes_never_hold_volatile_field() {
        let mut gateway = ApplicationGateway::named("gw");
        gateway.etag = Some("W/\"1\"".to_string());
        let cache = ConfigCache::new();

        cache.check_and_update(&gateway);

        let cached = String::from_utf8(cache.snapshot().unwrap()).unwrap();
        assert!(!cached.to_lowercase().contains("etag"));
    }

    #[test]
    fn test_failed_normalization_leaves_cache_untouched() {
        let sentinel = ApplicationGateway::named("sentinel");
        let cache = ConfigCache::new();
        cache.store(&sentinel).unwrap();
        let before = cache.snapshot();

        assert!(cache.check_and_update(&Unserializable));
        assert!(cache.has_changed(&Unserializable));

        assert_eq!(cache.snapshot(), before);
        assert!(!cache.has_changed(&sentinel));
    }

    #[test]
    fn test_store_failure_keeps_previous_value() {
        let cache = ConfigCache::new();
        cache.store(&ApplicationGateway::named("kept")).unwrap();

        assert!(cache.store(&Unserializable).is_err());
        assert!(!cache.has_changed(&ApplicationGateway::named("kept")));
    }

    #[test]
    fn test_clones_share_the_slot() {
        let cache = ConfigCache::new();
        let observer = cache.clone();

        cache.store(&ApplicationGateway::named("gw")).unwrap();
        assert!(!observer.is_empty());

        observer.clear();
        assert!(cache.is_empty());
    }
}
