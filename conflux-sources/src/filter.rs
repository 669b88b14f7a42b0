//! Resource selection.

use crate::resource::Resource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Selects resources by label.
///
/// A resource matches if it carries every label in `match_labels` with the
/// given value and every label named in `exists` with any value. An empty
/// selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelSelector {
    pub match_labels: BTreeMap<String, String>,
    pub exists: Vec<String>,
}

impl LabelSelector {
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.match_labels.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_exists(mut self, key: impl Into<String>) -> Self {
        self.exists.push(key.into());
        self
    }

    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
            && self.exists.iter().all(|key| labels.contains_key(key))
    }
}

/// Restricts a watch to one namespace and a label selector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceFilter {
    /// `None` watches every namespace.
    pub namespace: Option<String>,
    pub selector: LabelSelector,
}

impl ResourceFilter {
    #[must_use]
    pub fn in_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_selector(mut self, selector: LabelSelector) -> Self {
        self.selector = selector;
        self
    }

    #[must_use]
    pub fn matches(&self, resource: &Resource) -> bool {
        self.namespace
            .as_ref()
            .is_none_or(|namespace| *namespace == resource.namespace)
            && self.selector.matches(&resource.labels)
    }
}
