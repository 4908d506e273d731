//!
//! # Ownership labels
//!
//! Every managed resource carries a [`Model`]: its identity (namespace, name) and its
//! ownership (app, owner, scope, group). Ownership travels as well known labels on the
//! cluster object, everything else is kept as free-form labels.
//!
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use k8_types::LabelSelector;

pub const LABEL_APP: &str = "procgroup.io/app";
pub const LABEL_OWNER: &str = "procgroup.io/owner";
pub const LABEL_SCOPE: &str = "procgroup.io/scope";
pub const LABEL_GROUP: &str = "procgroup.io/group";

/// consulted when a resource carries no group label
pub const LABEL_GROUP_FALLBACK: &str = "app.kubernetes.io/part-of";

/// injected by the platform on pods owned by a workload
pub const LABEL_HASH: &str = "pod-template-hash";

/// free-form label tying a service to the process it exposes
pub const LABEL_PROCESS: &str = "procgroup.io/process";

pub type Labels = BTreeMap<String, String>;

/// Identity and ownership envelope of a managed resource
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Model {
    pub namespace: String,
    pub name: String,
    pub app: String,
    pub owner: String,
    pub scope: String,
    pub group: String,
    pub labels: Labels,
    pub allow_update: bool,
}

impl Model {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// rebuild a model from the labels of a cluster object
    pub fn from_labels(namespace: impl Into<String>, name: impl Into<String>, raw: &Labels) -> Self {
        let mut model = Self::new(namespace, name);
        model.set_labels(raw);
        model
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_app(mut self, app: impl Into<String>) -> Self {
        self.app = app.into();
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_allow_update(mut self, allow_update: bool) -> Self {
        self.allow_update = allow_update;
        self
    }

    /// group used for selection, defaults to own name
    pub fn group(&self) -> &str {
        if self.group.is_empty() {
            &self.name
        } else {
            &self.group
        }
    }

    /// selector matching every resource of the same group
    pub fn selector(&self) -> LabelSelector {
        LabelSelector::group(self.group())
    }

    /// ownership labels followed by free-form labels. Empty fields are omitted.
    pub fn labels(&self) -> Labels {
        let mut labels: Labels = self
            .labels
            .iter()
            .filter(|(key, _)| !is_reserved(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        for (key, value) in [
            (LABEL_APP, &self.app),
            (LABEL_OWNER, &self.owner),
            (LABEL_SCOPE, &self.scope),
            (LABEL_GROUP, &self.group),
        ] {
            if !value.is_empty() {
                labels.insert(key.to_owned(), value.clone());
            }
        }
        labels
    }

    /// Split raw labels into ownership fields and free-form labels.
    /// The caller's map is left untouched.
    pub fn set_labels(&mut self, raw: &Labels) {
        let lookup = |key: &str| raw.get(key).cloned().unwrap_or_default();

        self.app = lookup(LABEL_APP);
        self.owner = lookup(LABEL_OWNER);
        self.scope = lookup(LABEL_SCOPE);
        let group = raw.get(LABEL_GROUP).filter(|group| !group.is_empty());
        let fallback = raw
            .get(LABEL_GROUP_FALLBACK)
            .filter(|fallback| group.is_none() && !fallback.is_empty());

        self.group = group
            .or(fallback)
            .cloned()
            .unwrap_or_else(|| self.name.clone());

        // the fallback is only ownership when it supplied the group
        self.labels = raw
            .iter()
            .filter(|(key, _)| {
                !is_reserved(key) && !(fallback.is_some() && key.as_str() == LABEL_GROUP_FALLBACK)
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
    }
}

fn is_reserved(key: &str) -> bool {
    matches!(
        key,
        LABEL_APP | LABEL_OWNER | LABEL_SCOPE | LABEL_GROUP | LABEL_HASH
    )
}

/// Group selection on top of the platform label selector
pub trait SelectorExt: Sized {
    /// selector matching every resource of `group`
    fn group(group: &str) -> Self;

    /// narrow selector with extra label
    fn and(self, key: impl Into<String>, value: impl Into<String>) -> Self;

    fn matches<'a, I>(&self, labels: I) -> bool
    where
        I: IntoIterator<Item = (&'a String, &'a String)>;

    /// rendered in the form accepted by the cluster api: `k1=v1,k2=v2`, ordered by key
    fn to_query(&self) -> String;
}

impl SelectorExt for LabelSelector {
    fn group(group: &str) -> Self {
        Self::new_labels(vec![(LABEL_GROUP, group)])
    }

    fn and(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.match_labels.insert(key.into(), value.into());
        self
    }

    fn matches<'a, I>(&self, labels: I) -> bool
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let labels: BTreeMap<&String, &String> = labels.into_iter().collect();
        self.match_labels
            .iter()
            .all(|(key, value)| labels.get(key) == Some(&value))
    }

    fn to_query(&self) -> String {
        let ordered: BTreeMap<&String, &String> = self.match_labels.iter().collect();
        ordered
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod test {

    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_labels_omit_empty_fields() {
        let model = Model::new("ns", "web")
            .with_group("g1")
            .with_app("shop")
            .with_labels(raw(&[("tier", "front")]));

        let labels = model.labels();
        assert_eq!(labels.get(LABEL_GROUP).map(String::as_str), Some("g1"));
        assert_eq!(labels.get(LABEL_APP).map(String::as_str), Some("shop"));
        assert!(!labels.contains_key(LABEL_OWNER));
        assert!(!labels.contains_key(LABEL_SCOPE));
        assert_eq!(labels.get("tier").map(String::as_str), Some("front"));
    }

    #[test]
    fn test_set_labels_strips_known_keys() {
        let source = raw(&[
            (LABEL_APP, "shop"),
            (LABEL_GROUP, "g1"),
            (LABEL_HASH, "7f9c"),
            ("tier", "front"),
        ]);
        let model = Model::from_labels("ns", "web-1", &source);

        assert_eq!(model.app, "shop");
        assert_eq!(model.group, "g1");
        assert_eq!(model.labels, raw(&[("tier", "front")]));
        // caller map is untouched
        assert_eq!(source.len(), 4);
    }

    #[test]
    fn test_group_fallback() {
        let model = Model::from_labels("ns", "web", &raw(&[(LABEL_GROUP_FALLBACK, "legacy")]));
        assert_eq!(model.group(), "legacy");
        assert!(model.labels.is_empty());

        let model = Model::from_labels("ns", "web", &Labels::new());
        assert_eq!(model.group(), "web");
    }

    #[test]
    fn test_round_trip_through_labels() {
        let model = Model::new("ns", "web")
            .with_group("g1")
            .with_owner("ops")
            .with_scope("ns")
            .with_labels(raw(&[("tier", "front")]));

        let rebuilt = Model::from_labels("ns", "web", &model.labels());
        assert_eq!(rebuilt, model);
    }

    #[test]
    fn test_fallback_kept_when_group_present() {
        let source = raw(&[(LABEL_GROUP, "g1"), (LABEL_GROUP_FALLBACK, "shop-suite")]);
        let model = Model::from_labels("ns", "web", &source);

        assert_eq!(model.group(), "g1");
        assert_eq!(
            model.labels.get(LABEL_GROUP_FALLBACK).map(String::as_str),
            Some("shop-suite")
        );
        assert_eq!(Model::from_labels("ns", "web", &model.labels()), model);
    }

    #[test]
    fn test_empty_group_uses_fallback() {
        let source = raw(&[(LABEL_GROUP, ""), (LABEL_GROUP_FALLBACK, "legacy")]);
        let model = Model::from_labels("ns", "web", &source);
        assert_eq!(model.group(), "legacy");
        assert!(model.labels.is_empty());
    }

    #[test]
    fn test_selector() {
        let selector = LabelSelector::group("g1").and(LABEL_SCOPE, "ns");
        assert_eq!(
            selector.to_query(),
            format!("{LABEL_GROUP}=g1,{LABEL_SCOPE}=ns")
        );

        let labels = raw(&[(LABEL_GROUP, "g1"), (LABEL_SCOPE, "ns"), ("x", "y")]);
        assert!(selector.matches(&labels));
        assert!(!selector.matches(&raw(&[(LABEL_GROUP, "g1")])));
        assert!(LabelSelector::default().matches(&labels));
    }
}
