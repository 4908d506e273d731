use procgroup_metadata::k8::{PersistentVolumeClaimSpec, PersistentVolumeSpec};
use procgroup_metadata::labels::{LabelSelector, SelectorExt, LABEL_SCOPE};
use procgroup_metadata::quantity::is_wider;

use super::{ManagedSpec, ResourceAdapter};

/// persistent volumes, the capacity grant backing a claim
pub type StorageResourceAdapter<C> = ResourceAdapter<C, PersistentVolumeSpec>;

/// persistent volume claims
pub type StorageAdapter<C> = ResourceAdapter<C, PersistentVolumeClaimSpec>;

/// capacity to keep when applying `candidate` over `current`; storage never shrinks
fn widened(current: Option<&str>, candidate: Option<&str>) -> Option<String> {
    match (current, candidate) {
        (Some(current), Some(candidate)) if is_wider(current, candidate) => {
            Some(candidate.to_owned())
        }
        (None, Some(candidate)) => Some(candidate.to_owned()),
        _ => None,
    }
}

impl ManagedSpec for PersistentVolumeSpec {
    const REPLACE_LABELS: bool = false;

    fn merge(current: &Self, desired: &Self) -> Self {
        let mut merged = current.clone();
        if let Some(capacity) = widened(current.capacity(), desired.capacity()) {
            merged.set_capacity(capacity);
        }
        merged
    }

    fn unchanged(current: &Self, merged: &Self) -> bool {
        current == merged
    }

    /// volumes are cluster scoped, the owning namespace travels as scope label
    fn group_selector(namespace: &str, group: &str) -> LabelSelector {
        LabelSelector::group(group).and(LABEL_SCOPE, namespace)
    }
}

impl ManagedSpec for PersistentVolumeClaimSpec {
    const REPLACE_LABELS: bool = false;

    fn merge(current: &Self, desired: &Self) -> Self {
        let mut merged = current.clone();
        if let Some(capacity) = widened(current.capacity(), desired.capacity()) {
            merged.set_capacity(capacity);
        }
        merged
    }

    fn unchanged(current: &Self, merged: &Self) -> bool {
        current == merged
    }
}
