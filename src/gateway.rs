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

//! Application Gateway configuration document.
//!
//! This is the desired state pushed to Azure Resource Manager. Only the
//! top-level envelope is typed; the gateway `properties` stay an untyped
//! [`serde_json::Value`] so the document can carry any shape ARM accepts.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tag that identifies a gateway as exclusively managed by the ingress controller.
pub const IS_MANAGED_BY_K8S_INGRESS: &str = "managed-by-k8s-ingress";

/// An Application Gateway resource as sent to and returned by ARM.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationGateway {
    /// Fully qualified ARM resource ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Resource name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Resource type, e.g. `Microsoft.Network/applicationGateways`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    /// Azure region.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Concurrency token stamped by the server on every write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Resource tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,

    /// Availability zones.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zones: Option<Vec<String>>,

    /// Managed identity block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<Value>,

    /// Gateway properties: listeners, pools, rules, probes and so on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
}

impl ApplicationGateway {
    /// Creates an empty gateway document with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Returns the provisioning state reported by ARM, if any.
    pub fn provisioning_state(&self) -> Option<&str> {
        self.properties
            .as_ref()?
            .get("provisioningState")?
            .as_str()
    }
}

/// Identifies the remote gateway a controller instance owns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayIdentifier {
    /// Azure subscription ID.
    #[serde(default)]
    pub subscription_id: String,

    /// Resource group holding the gateway.
    #[serde(default)]
    pub resource_group: String,

    /// Gateway name.
    #[serde(default)]
    pub name: String,
}

impl GatewayIdentifier {
    /// Creates a new identifier.
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            name: name.into(),
        }
    }

    /// Returns the ARM resource ID of the gateway.
    pub fn resource_id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/applicationGateways/{}",
            self.subscription_id, self.resource_group, self.name
        )
    }
}

impl fmt::Display for GatewayIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_group, self.name)
    }
}

/// Marks the gateway as exclusively managed by the ingress controller.
///
/// Initializes the tag map when absent. Calling it again is a no-op.
pub fn add_tags(gateway: &mut ApplicationGateway) {
    gateway
        .tags
        .get_or_insert_with(BTreeMap::new)
        .insert(IS_MANAGED_BY_K8S_INGRESS.to_string(), "true".to_string());
}

/// Returns true if the gateway carries the ownership tag.
pub fn is_managed_by_ingress(gateway: &ApplicationGateway) -> bool {
    gateway
        .tags
        .as_ref()
        .and_then(|tags| tags.get(IS_MANAGED_BY_K8S_INGRESS))
        .is_some_and(|value| value == "true")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_named_gateway_serializes_only_name() {
        let gateway = ApplicationGateway::named("something");
        assert_eq!(
            serde_json::to_string(&gateway).unwrap(),
            r#"{"name":"something"}"#
        );
    }

    #[test]
    fn test_add_tags_initializes_map() {
        let mut gateway = ApplicationGateway::named("gw");
        assert!(!is_managed_by_ingress(&gateway));

        add_tags(&mut gateway);

        let tags = gateway.tags.as_ref().unwrap();
        assert_eq!(tags.get(IS_MANAGED_BY_K8S_INGRESS).map(String::as_str), Some("true"));
        assert!(is_managed_by_ingress(&gateway));
    }

    #[test]
    fn test_add_tags_is_idempotent_and_keeps_other_tags() {
        let mut gateway = ApplicationGateway::named("gw");
        gateway.tags = Some(BTreeMap::from([("team".to_string(), "edge".to_string())]));

        add_tags(&mut gateway);
        let once = gateway.clone();
        add_tags(&mut gateway);

        assert_eq!(gateway, once);
        assert_eq!(gateway.tags.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_deserialize_arm_document() {
        let doc = json!({
            "id": "/subscriptions/xxx/resourceGroups/rg/providers/Microsoft.Network/applicationGateways/gw",
            "name": "gw",
            "type": "Microsoft.Network/applicationGateways",
            "etag": "W/\"abc\"",
            "properties": {"provisioningState": "Succeeded"}
        });

        let gateway: ApplicationGateway = serde_json::from_value(doc).unwrap();
        assert_eq!(gateway.type_.as_deref(), Some("Microsoft.Network/applicationGateways"));
        assert_eq!(gateway.provisioning_state(), Some("Succeeded"));
    }

    #[test]
    fn test_resource_id() {
        let id = GatewayIdentifier::new("sub", "rg", "gw");
        assert_eq!(
            id.resource_id(),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/applicationGateways/gw"
        );
        assert_eq!(id.to_string(), "rg/gw");
    }
}
