//! Instance descriptors and the resource metadata derived from them.
//!
//! Descriptors are assembled by the instance discovery collaborator and are
//! copied into sample metadata as-is; nothing here validates or rewrites the
//! declared fields beyond the reserved user-metadata namespace handling.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::error::CollectError;
use crate::sample::Metadata;

/// Declared type and capacity properties copied into instance metadata.
pub const INSTANCE_PROPERTIES: &[&str] = &[
    "reservation_id",
    "architecture",
    "kernel_id",
    "os_type",
    "ramdisk_id",
    "disk_gb",
    "ephemeral_gb",
    "memory_mb",
    "root_gb",
    "vcpus",
];

/// Default prefixes of user metadata reserved for metering.
pub const DEFAULT_RESERVED_NAMESPACE: &str = "metering.";

/// Default limit on the length of reserved metadata values.
pub const DEFAULT_RESERVED_LENGTH: usize = 256;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Flavor {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcpus: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageLink {
    pub href: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<ImageLink>,
}

/// A running virtualized compute instance as reported by discovery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    /// Name the hypervisor knows the instance by (e.g. `instance-0000002a`).
    #[serde(default)]
    pub instance_name: Option<String>,
    #[serde(default)]
    pub display_name: String,
    pub user_id: String,
    pub project_id: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub flavor: Option<Flavor>,
    #[serde(default)]
    pub image: Option<Image>,
    #[serde(default)]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    /// User-supplied metadata; only reserved prefixes are exported.
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl Instance {
    /// Hypervisor-level name used for every inspector call.
    pub fn hypervisor_name(&self) -> Result<&str, CollectError> {
        self.instance_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| CollectError::missing(&self.id, "instance_name"))
    }

    pub fn flavor_name(&self) -> Result<&str, CollectError> {
        self.flavor
            .as_ref()
            .map(|f| f.name.as_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| CollectError::missing(&self.id, "flavor"))
    }

    pub fn flavor_id(&self) -> Option<&str> {
        self.flavor.as_ref().map(|f| f.id.as_str())
    }
}

/// Rules for exporting reserved user metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataPolicy {
    pub reserved_namespaces: Vec<String>,
    pub reserved_length: usize,
}

impl Default for MetadataPolicy {
    fn default() -> Self {
        Self {
            reserved_namespaces: vec![DEFAULT_RESERVED_NAMESPACE.to_string()],
            reserved_length: DEFAULT_RESERVED_LENGTH,
        }
    }
}

/// Builds the `resource_metadata` shared by all instance-scoped samples.
pub fn instance_metadata(instance: &Instance, policy: &MetadataPolicy) -> Metadata {
    let mut metadata = Metadata::new();

    metadata.insert("display_name".into(), json!(instance.display_name));
    metadata.insert(
        "name".into(),
        json!(instance.instance_name.as_deref().unwrap_or("")),
    );
    metadata.insert("instance_type".into(), json!(instance.flavor_id()));
    metadata.insert("host".into(), json!(instance.host));
    metadata.insert("flavor".into(), json!(instance.flavor));
    metadata.insert("image".into(), json!(instance.image));
    metadata.insert(
        "image_ref".into(),
        json!(instance.image.as_ref().map(|i| i.id.as_str())),
    );
    // Images passed through without links carry no URL.
    let image_ref_url = instance
        .image
        .as_ref()
        .and_then(|i| i.links.first())
        .map(|l| l.href.as_str());
    metadata.insert("image_ref_url".into(), json!(image_ref_url));
    metadata.insert(
        "availability_zone".into(),
        json!(instance.availability_zone.as_deref().unwrap_or("")),
    );

    for &name in INSTANCE_PROPERTIES {
        let value = instance
            .properties
            .get(name)
            .cloned()
            .unwrap_or_else(|| json!(""));
        metadata.insert(name.to_string(), value);
    }

    add_reserved_user_metadata(instance, policy, &mut metadata);
    metadata
}

fn add_reserved_user_metadata(instance: &Instance, policy: &MetadataPolicy, metadata: &mut Metadata) {
    let mut user_metadata = serde_json::Map::new();

    for prefix in &policy.reserved_namespaces {
        for (key, value) in &instance.metadata {
            let Some(stripped) = key.strip_prefix(prefix.as_str()) else {
                continue;
            };
            let key = stripped.replace('.', "_");
            if metadata.contains_key(&key) {
                continue;
            }
            let value = match value {
                Value::String(s) => Value::String(s.chars().take(policy.reserved_length).collect()),
                other => other.clone(),
            };
            user_metadata.insert(key, value);
        }
    }

    if !user_metadata.is_empty() {
        metadata.insert("user_metadata".into(), Value::Object(user_metadata));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance() -> Instance {
        Instance {
            id: "i-1".into(),
            instance_name: Some("instance-00000001".into()),
            display_name: "web-1".into(),
            user_id: "u-1".into(),
            project_id: "p-1".into(),
            host: "compute-7".into(),
            flavor: Some(Flavor {
                id: "2".into(),
                name: "m1.small".into(),
                vcpus: Some(1),
                ram: Some(2048),
                disk: Some(20),
            }),
            image: Some(Image {
                id: "img-1".into(),
                links: vec![ImageLink {
                    href: "http://glance/images/img-1".into(),
                }],
            }),
            availability_zone: Some("az-1".into()),
            properties: BTreeMap::from([("memory_mb".into(), json!(2048))]),
            metadata: BTreeMap::from([
                ("metering.stack".into(), json!("blue")),
                ("metering.team.name".into(), json!("core")),
                ("metering.host".into(), json!("spoofed")),
                ("owner".into(), json!("alice")),
            ]),
        }
    }

    #[test]
    fn test_instance_metadata_fields() {
        let md = instance_metadata(&instance(), &MetadataPolicy::default());

        assert_eq!(md["display_name"], "web-1");
        assert_eq!(md["name"], "instance-00000001");
        assert_eq!(md["instance_type"], "2");
        assert_eq!(md["image_ref"], "img-1");
        assert_eq!(md["image_ref_url"], "http://glance/images/img-1");
        assert_eq!(md["availability_zone"], "az-1");
        assert_eq!(md["memory_mb"], 2048);
        assert_eq!(md["kernel_id"], "");
        assert_eq!(md["flavor"]["name"], "m1.small");
    }

    #[test]
    fn test_reserved_user_metadata() {
        let md = instance_metadata(&instance(), &MetadataPolicy::default());
        let user = md["user_metadata"].as_object().unwrap();

        assert_eq!(user["stack"], "blue");
        assert_eq!(user["team_name"], "core");
        // Keys colliding with existing metadata are skipped.
        assert!(!user.contains_key("host"));
        assert!(!user.contains_key("owner"));
    }

    #[test]
    fn test_reserved_values_truncated() {
        let mut inst = instance();
        inst.metadata = BTreeMap::from([("metering.note".into(), json!("abcdefgh"))]);
        let policy = MetadataPolicy {
            reserved_namespaces: vec!["metering.".into()],
            reserved_length: 3,
        };

        let md = instance_metadata(&inst, &policy);
        assert_eq!(md["user_metadata"]["note"], "abc");
    }

    #[test]
    fn test_user_metadata_omitted_when_empty() {
        let mut inst = instance();
        inst.metadata.clear();
        let md = instance_metadata(&inst, &MetadataPolicy::default());
        assert!(!md.contains_key("user_metadata"));
    }

    #[test]
    fn test_missing_attributes_are_configuration_errors() {
        let mut inst = instance();
        inst.instance_name = None;
        inst.flavor = None;

        assert_eq!(
            inst.hypervisor_name().unwrap_err(),
            CollectError::missing("i-1", "instance_name")
        );
        assert_eq!(
            inst.flavor_name().unwrap_err(),
            CollectError::missing("i-1", "flavor")
        );
        assert_eq!(inst.flavor_id(), None);
    }
}
