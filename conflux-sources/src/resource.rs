//! Cluster resources carrying configuration data.

use crate::error::{SourceError, SourceResult};
use crate::factory::FragmentFactory;
use base64::{engine::general_purpose::STANDARD, Engine};
use conflux_types::Fragment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The kind of a [`Resource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Plain string data.
    ConfigMap,
    /// Base64-encoded data.
    Secret,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigMap => write!(f, "ConfigMap"),
            Self::Secret => write!(f, "Secret"),
        }
    }
}

/// A watched resource: metadata plus a string map of data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: ResourceKind,
    pub uid: String,
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub resource_version: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl Resource {
    #[must_use]
    pub fn new(kind: ResourceKind, uid: impl Into<String>, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kind,
            uid: uid.into(),
            name: name.into(),
            namespace: namespace.into(),
            labels: BTreeMap::new(),
            resource_version: "1".to_string(),
            data: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_resource_version(mut self, resource_version: impl Into<String>) -> Self {
        self.resource_version = resource_version.into();
        self
    }

    /// The value of `label`, or [`SourceError::MissingLabel`].
    pub fn label(&self, label: &str) -> SourceResult<&str> {
        self.labels
            .get(label)
            .map(String::as_str)
            .ok_or_else(|| SourceError::MissingLabel {
                resource: self.uid.clone(),
                label: label.to_string(),
            })
    }

    fn expect_kind(&self, kind: ResourceKind) -> SourceResult<()> {
        if self.kind != kind {
            return Err(SourceError::Invalid(format!(
                "resource {} is a {}, expected a {kind}",
                self.uid, self.kind
            )));
        }
        Ok(())
    }
}

type KeyFn<K> = Box<dyn Fn(&Resource) -> SourceResult<K> + Send + Sync>;
type ConfigurationFn<C> = Box<dyn Fn(&BTreeMap<String, String>) -> C + Send + Sync>;

/// Builds fragments from ConfigMaps. The fragment id is the resource uid.
pub struct ConfigMapFragmentFactory<K, C> {
    key: KeyFn<K>,
    configuration: ConfigurationFn<C>,
}

impl<K, C> ConfigMapFragmentFactory<K, C> {
    pub fn new(
        key: impl Fn(&Resource) -> SourceResult<K> + Send + Sync + 'static,
        configuration: impl Fn(&BTreeMap<String, String>) -> C + Send + Sync + 'static,
    ) -> Self {
        Self {
            key: Box::new(key),
            configuration: Box::new(configuration),
        }
    }
}

impl<C> ConfigMapFragmentFactory<String, C> {
    /// A factory taking the composition key from `label`.
    pub fn by_label(
        label: impl Into<String>,
        configuration: impl Fn(&BTreeMap<String, String>) -> C + Send + Sync + 'static,
    ) -> Self {
        let label = label.into();
        Self::new(
            move |resource| resource.label(&label).map(str::to_string),
            configuration,
        )
    }
}

impl<K, C> fmt::Debug for ConfigMapFragmentFactory<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigMapFragmentFactory").finish_non_exhaustive()
    }
}

impl<K, C> FragmentFactory<Resource> for ConfigMapFragmentFactory<K, C> {
    type Key = K;
    type Configuration = C;

    fn create_fragment(&self, source: &Resource) -> SourceResult<Fragment<String, K, C>> {
        source.expect_kind(ResourceKind::ConfigMap)?;
        Ok(Fragment::new(
            source.uid.clone(),
            (self.key)(source)?,
            (self.configuration)(&source.data),
        ))
    }
}

/// Builds fragments from Secrets, decoding their base64 data first.
///
/// The composition key is the value of a label.
pub struct SecretFragmentFactory<C> {
    label: String,
    configuration: ConfigurationFn<C>,
}

impl<C> SecretFragmentFactory<C> {
    pub fn new(
        label: impl Into<String>,
        configuration: impl Fn(&BTreeMap<String, String>) -> C + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            configuration: Box::new(configuration),
        }
    }

    fn decode(resource: &Resource) -> SourceResult<BTreeMap<String, String>> {
        resource
            .data
            .iter()
            .map(|(key, encoded)| {
                let decode_error = |reason: String| SourceError::Decode {
                    resource: resource.uid.clone(),
                    key: key.clone(),
                    reason,
                };
                let bytes = STANDARD
                    .decode(encoded)
                    .map_err(|e| decode_error(e.to_string()))?;
                let value = String::from_utf8(bytes).map_err(|e| decode_error(e.to_string()))?;
                Ok((key.clone(), value))
            })
            .collect()
    }
}

impl<C> fmt::Debug for SecretFragmentFactory<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretFragmentFactory")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl<C> FragmentFactory<Resource> for SecretFragmentFactory<C> {
    type Key = String;
    type Configuration = C;

    fn create_fragment(&self, source: &Resource) -> SourceResult<Fragment<String, String, C>> {
        source.expect_kind(ResourceKind::Secret)?;
        let key = source.label(&self.label)?.to_string();
        let data = Self::decode(source)?;
        Ok(Fragment::new(source.uid.clone(), key, (self.configuration)(&data)))
    }
}
