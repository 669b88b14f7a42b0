//! The composed application configuration.

use crate::ids::ApplicationId;
use conflux_types::Composed;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Well-known keys read by [`ApplicationConfiguration::from_map`].
pub mod keys {
    pub const CLIENT_ID: &str = "conflux.idp.client-id";
    pub const CLIENT_SECRET: &str = "conflux.idp.client-secret";
    pub const ISSUER_URI: &str = "conflux.idp.issuer-uri";
    pub const ADDITIONAL_ISSUER_URIS: &str = "conflux.idp.additional-issuer-uris";

    pub const ROUTING_DOMAINS: &str = "conflux.routing.domains";
    pub const CORS_ORIGINS: &str = "conflux.cors.origins";
}

/// Identity provider, routing and CORS settings of one application.
///
/// Fragments each carry a partial configuration; [`merge`](Self::merge) folds
/// them into one. Scalars keep the first value present, lists are unioned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfiguration {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub issuer_uri: Option<String>,
    pub additional_issuer_uris: BTreeSet<String>,
    pub routing_domains: BTreeSet<String>,
    pub cors_origins: BTreeSet<String>,
}

impl ApplicationConfiguration {
    /// Reads the well-known [`keys`] from a flat string map. Unknown keys are
    /// ignored. List values are separated by `,` or `;`.
    #[must_use]
    pub fn from_map(map: &BTreeMap<String, String>) -> Self {
        let list = |key: &str| map.get(key).map(|value| split(value)).unwrap_or_default();
        Self {
            client_id: map.get(keys::CLIENT_ID).cloned(),
            client_secret: map.get(keys::CLIENT_SECRET).cloned(),
            issuer_uri: map.get(keys::ISSUER_URI).cloned(),
            additional_issuer_uris: list(keys::ADDITIONAL_ISSUER_URIS),
            routing_domains: list(keys::ROUTING_DOMAINS),
            cors_origins: list(keys::CORS_ORIGINS),
        }
    }

    /// Combines two configurations. `self` wins for scalars present in both.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            client_id: self.client_id.or(other.client_id),
            client_secret: self.client_secret.or(other.client_secret),
            issuer_uri: self.issuer_uri.or(other.issuer_uri),
            additional_issuer_uris: union(self.additional_issuer_uris, other.additional_issuer_uris),
            routing_domains: union(self.routing_domains, other.routing_domains),
            cors_origins: union(self.cors_origins, other.cors_origins),
        }
    }

    #[must_use]
    pub fn for_application(self, application_id: ApplicationId) -> Composed<ApplicationId, Self> {
        Composed::new(application_id, Some(self))
    }

    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    #[must_use]
    pub fn with_client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    #[must_use]
    pub fn with_issuer_uri(mut self, issuer_uri: impl Into<String>) -> Self {
        self.issuer_uri = Some(issuer_uri.into());
        self
    }

    #[must_use]
    pub fn with_additional_issuer_uri(mut self, uri: impl Into<String>) -> Self {
        self.additional_issuer_uris.insert(uri.into());
        self
    }

    #[must_use]
    pub fn with_routing_domain(mut self, domain: impl Into<String>) -> Self {
        self.routing_domains.insert(domain.into());
        self
    }

    #[must_use]
    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origins.insert(origin.into());
        self
    }
}

fn split(value: &str) -> BTreeSet<String> {
    value
        .split([',', ';'])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn union(mut a: BTreeSet<String>, mut b: BTreeSet<String>) -> BTreeSet<String> {
    if a.len() < b.len() {
        std::mem::swap(&mut a, &mut b);
    }
    a.append(&mut b);
    a
}
