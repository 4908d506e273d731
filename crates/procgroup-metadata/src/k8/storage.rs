//!
//! # Storage
//!
//! A persistent volume is the backing capacity grant (cluster scoped); a claim is the
//! namespace scoped request bound to it.
//!
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use k8_types::core::pod::PersistentVolumeClaimVolumeSource;
use k8_types::{Crd, CrdNames, DefaultHeader, Spec, Status};

use crate::group::AccessMode;

/// key of the capacity entry in capacity and request maps
pub const STORAGE_KEY: &str = "storage";

const PERSISTENT_VOLUME_API: Crd = Crd {
    group: "core",
    version: "v1",
    names: CrdNames {
        kind: "PersistentVolume",
        plural: "persistentvolumes",
        singular: "persistentvolume",
    },
};

const PERSISTENT_VOLUME_CLAIM_API: Crd = Crd {
    group: "core",
    version: "v1",
    names: CrdNames {
        kind: "PersistentVolumeClaim",
        plural: "persistentvolumeclaims",
        singular: "persistentvolumeclaim",
    },
};

#[derive(Deserialize, Serialize, Debug, Default, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistentVolumeSpec {
    pub capacity: BTreeMap<String, String>,
    pub access_modes: Vec<AccessMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent_volume_reclaim_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_path: Option<HostPathSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_ref: Option<ObjectReference>,
}

impl Spec for PersistentVolumeSpec {
    type Status = PersistentVolumeStatus;
    type Header = DefaultHeader;
    const NAME_SPACED: bool = false;

    fn metadata() -> &'static Crd {
        &PERSISTENT_VOLUME_API
    }
}

impl PersistentVolumeSpec {
    pub fn capacity(&self) -> Option<&str> {
        self.capacity.get(STORAGE_KEY).map(String::as_str)
    }

    pub fn set_capacity(&mut self, capacity: impl Into<String>) {
        self.capacity.insert(STORAGE_KEY.to_owned(), capacity.into());
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct HostPathSource {
    pub path: String,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectReference {
    pub namespace: String,
    pub name: String,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistentVolumeStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl Status for PersistentVolumeStatus {}

#[derive(Deserialize, Serialize, Debug, Default, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistentVolumeClaimSpec {
    pub access_modes: Vec<AccessMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
    /// name of the volume this claim binds to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_name: Option<String>,
    pub resources: VolumeResources,
}

impl Spec for PersistentVolumeClaimSpec {
    type Status = PersistentVolumeClaimStatus;
    type Header = DefaultHeader;

    fn metadata() -> &'static Crd {
        &PERSISTENT_VOLUME_CLAIM_API
    }
}

impl PersistentVolumeClaimSpec {
    pub fn capacity(&self) -> Option<&str> {
        self.resources.requests.get(STORAGE_KEY).map(String::as_str)
    }

    pub fn set_capacity(&mut self, capacity: impl Into<String>) {
        self.resources
            .requests
            .insert(STORAGE_KEY.to_owned(), capacity.into());
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct VolumeResources {
    pub requests: BTreeMap<String, String>,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistentVolumeClaimStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    pub capacity: BTreeMap<String, String>,
}

impl Status for PersistentVolumeClaimStatus {}

/// Pod volume source mounting the claim `claim_name`.
/// The `k8_types` source keeps its fields private, it is built from its wire form.
pub fn claim_volume_source(
    claim_name: &str,
) -> Result<PersistentVolumeClaimVolumeSource, serde_json::Error> {
    serde_json::from_value(serde_json::json!({ "claimName": claim_name }))
}
