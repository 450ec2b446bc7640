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

//! Case-insensitive key removal for untyped JSON documents.

use serde_json::{Map, Value};

/// Removes every key matching `key` (case-insensitively) from `value`.
///
/// The walk descends into mapping values and into sequence elements that are
/// mappings. Sequences nested directly inside sequences, and scalars, are
/// left untouched. Keys match on full lower-cased equality, never on prefix.
pub fn strip_key(value: &mut Value, key: &str) {
    let target = key.to_lowercase();
    strip_lowered(value, &target);
}

fn strip_lowered(value: &mut Value, target: &str) {
    match value {
        Value::Object(map) => strip_map(map, target),
        Value::Array(items) => {
            for item in items.iter_mut() {
                if let Value::Object(map) = item {
                    strip_map(map, target);
                }
            }
        }
        _ => {}
    }
}

fn strip_map(map: &mut Map<String, Value>, target: &str) {
    map.retain(|k, _| k.to_lowercase() != target);
    for child in map.values_mut() {
        strip_lowered(child, target);
    }
}

/// Parses `json`, strips `key` at every depth and re-serializes compactly.
///
/// Object keys in the output are sorted.
pub fn delete_key_from_json(json: &[u8], key: &str) -> serde_json::Result<Vec<u8>> {
    let mut value: Value = serde_json::from_slice(json)?;
    strip_key(&mut value, key);
    serde_json::to_vec(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_delete_key_from_json() {
        let with_etag = br#"{
            "etag":"W/\"d3aa9ec8-fb2a-40fb-ab2c-4ff2902fa11d\"",
            "id":"/subscriptions/xxx",
            "other": {"ETAG":123, "keepThis": 98, "andTHIS": "xyz"},
            "Etag":"delete this"
            }
        "#;
        let without_etag = br#"{"id":"/subscriptions/xxx","other":{"andTHIS":"xyz","keepThis":98}}"#;

        assert_eq!(
            delete_key_from_json(with_etag, "etag").unwrap(),
            without_etag.to_vec()
        );
    }

    #[test]
    fn test_delete_key_from_invalid_json() {
        assert!(delete_key_from_json(b"{not json", "etag").is_err());
    }

    #[test]
    fn test_strip_ignores_capitalization() {
        let mut doc = json!({
            "deleteThisKey": "value3453451",
            "key2": "value2",
            "nested": {
                "DELETETHISKEY": "value1123123",
                "key2": "value2"
            },
            "deleteTHISKEY": {
                "key3": "ok"
            },
            "list": [
                {
                    "delETETHISKEY": "value1123123",
                    "key2": "value2"
                }
            ]
        });

        strip_key(&mut doc, "deleteThiSKEY");

        assert_eq!(
            doc,
            json!({
                "key2": "value2",
                "nested": {"key2": "value2"},
                "list": [{"key2": "value2"}]
            })
        );
    }

    #[test]
    fn test_strip_every_casing() {
        let mut doc = json!({
            "etag": "W/\"x\"",
            "Etag": "y",
            "other": {"ETAG": 1, "keepThis": 2}
        });

        strip_key(&mut doc, "etag");

        assert_eq!(doc, json!({"other": {"keepThis": 2}}));
    }

    #[test]
    fn test_strip_deeply_nested_lists_of_maps() {
        let mut doc = json!({
            "a": [{"b": [{"c": [{"etag": 1, "d": {"eTag": 2, "e": [true, null, 3]}}]}]}]
        });

        strip_key(&mut doc, "ETAG");

        assert_eq!(
            doc,
            json!({"a": [{"b": [{"c": [{"d": {"e": [true, null, 3]}}]}]}]})
        );
    }

    #[test]
    fn test_strip_matches_whole_key_only() {
        let mut doc = json!({
            "etags": 1,
            "xetag": 2,
            "etag_value": 3,
            "etag": 4
        });

        strip_key(&mut doc, "etag");

        assert_eq!(doc, json!({"etags": 1, "xetag": 2, "etag_value": 3}));
    }

    #[test]
    fn test_strip_does_not_unwrap_nested_sequences() {
        let mut doc = json!({"outer": [[{"etag": 1}], {"etag": 2, "k": 3}]});

        strip_key(&mut doc, "etag");

        assert_eq!(doc, json!({"outer": [[{"etag": 1}], {"k": 3}]}));
    }

    #[test]
    fn test_strip_is_idempotent() {
        let mut once = json!({
            "ETag": "1",
            "properties": {
                "backendAddressPools": [{"etag": "2", "name": "pool"}],
                "sku": {"name": "Standard_v2", "tier": "Standard_v2"}
            }
        });
        strip_key(&mut once, "etag");

        let mut twice = once.clone();
        strip_key(&mut twice, "etag");

        assert_eq!(once, twice);
    }

    #[test]
    fn test_strip_without_matches_is_unchanged() {
        let original = json!({"name": "gw", "list": [1, "two", {"three": 3}], "n": null});
        let mut doc = original.clone();

        strip_key(&mut doc, "etag");

        assert_eq!(doc, original);
    }

    #[test]
    fn test_strip_scalar_root() {
        let mut doc = json!("etag");
        strip_key(&mut doc, "etag");
        assert_eq!(doc, json!("etag"));
    }
}
