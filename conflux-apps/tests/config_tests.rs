use conflux_apps::{keys, ApplicationConfiguration, ApplicationId};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

// ── from_map ──────────────────────────────────────────────────────

#[test]
fn from_map_reads_known_keys() {
    let config = ApplicationConfiguration::from_map(&map(&[
        (keys::CLIENT_ID, "client"),
        (keys::CLIENT_SECRET, "secret"),
        (keys::ISSUER_URI, "https://auth.example/realms/a"),
        (keys::ADDITIONAL_ISSUER_URIS, "https://b.example"),
        (keys::ROUTING_DOMAINS, "a.example,b.example"),
        (keys::CORS_ORIGINS, "https://a.example"),
        ("unrelated", "ignored"),
    ]));

    assert_eq!(
        config,
        ApplicationConfiguration::default()
            .with_client_id("client")
            .with_client_secret("secret")
            .with_issuer_uri("https://auth.example/realms/a")
            .with_additional_issuer_uri("https://b.example")
            .with_routing_domain("a.example")
            .with_routing_domain("b.example")
            .with_cors_origin("https://a.example")
    );
}

#[test]
fn from_empty_map_is_default() {
    assert_eq!(
        ApplicationConfiguration::from_map(&BTreeMap::new()),
        ApplicationConfiguration::default()
    );
}

#[test]
fn lists_split_on_commas_and_semicolons() {
    let config = ApplicationConfiguration::from_map(&map(&[(
        keys::ROUTING_DOMAINS,
        " a.example ;b.example,,; c.example ,  ,a.example",
    )]));
    assert_eq!(
        config.routing_domains,
        set(&["a.example", "b.example", "c.example"])
    );
}

#[test]
fn blank_list_is_empty() {
    let config = ApplicationConfiguration::from_map(&map(&[(keys::CORS_ORIGINS, "   ")]));
    assert!(config.cors_origins.is_empty());
}

// ── merge ─────────────────────────────────────────────────────────

#[test]
fn merge_keeps_first_scalar() {
    let first = ApplicationConfiguration::default().with_client_id("first");
    let second = ApplicationConfiguration::default()
        .with_client_id("second")
        .with_client_secret("secret");

    let merged = first.merge(second);
    assert_eq!(merged.client_id.as_deref(), Some("first"));
    assert_eq!(merged.client_secret.as_deref(), Some("secret"));
}

#[test]
fn merge_unions_lists() {
    let a = ApplicationConfiguration::default()
        .with_routing_domain("a.example")
        .with_cors_origin("https://a.example");
    let b = ApplicationConfiguration::default()
        .with_routing_domain("b.example")
        .with_routing_domain("a.example");

    let merged = a.merge(b);
    assert_eq!(merged.routing_domains, set(&["a.example", "b.example"]));
    assert_eq!(merged.cors_origins, set(&["https://a.example"]));
}

#[test]
fn merge_is_not_commutative_for_scalars() {
    let a = ApplicationConfiguration::default().with_issuer_uri("a");
    let b = ApplicationConfiguration::default().with_issuer_uri("b");
    assert_ne!(a.clone().merge(b.clone()), b.merge(a));
}

#[test]
fn for_application_wraps_configuration() {
    let config = ApplicationConfiguration::default().with_client_id("client");
    let composed = config.clone().for_application(ApplicationId::from("app-1"));
    assert_eq!(composed.composition_key, ApplicationId::from("app-1"));
    assert_eq!(composed.configuration(), Some(&config));
}

#[test]
fn serde_fills_missing_fields() {
    let config: ApplicationConfiguration =
        serde_json::from_str(r#"{"client_id": "client", "routing_domains": ["a.example"]}"#)
            .unwrap();
    assert_eq!(
        config,
        ApplicationConfiguration::default()
            .with_client_id("client")
            .with_routing_domain("a.example")
    );
}

// ====================================================================
// Properties
// ====================================================================

fn arb_config() -> impl Strategy<Value = ApplicationConfiguration> {
    let scalar = proptest::option::of("[a-c]");
    let list = proptest::collection::btree_set("[a-d]", 0..3);
    (scalar.clone(), scalar.clone(), scalar, list.clone(), list.clone(), list).prop_map(
        |(client_id, client_secret, issuer_uri, additional_issuer_uris, routing_domains, cors_origins)| {
            ApplicationConfiguration {
                client_id,
                client_secret,
                issuer_uri,
                additional_issuer_uris,
                routing_domains,
                cors_origins,
            }
        },
    )
}

proptest! {
    #[test]
    fn merge_is_associative(a in arb_config(), b in arb_config(), c in arb_config()) {
        let left = a.clone().merge(b.clone()).merge(c.clone());
        let right = a.merge(b.merge(c));
        prop_assert_eq!(left, right);
    }

    #[test]
    fn default_is_identity(a in arb_config()) {
        prop_assert_eq!(a.clone().merge(ApplicationConfiguration::default()), a.clone());
        prop_assert_eq!(ApplicationConfiguration::default().merge(a.clone()), a);
    }

    #[test]
    fn merge_keeps_every_list_item(a in arb_config(), b in arb_config()) {
        let merged = a.clone().merge(b.clone());
        prop_assert!(a.routing_domains.is_subset(&merged.routing_domains));
        prop_assert!(b.routing_domains.is_subset(&merged.routing_domains));
        prop_assert_eq!(
            merged.cors_origins.len(),
            a.cors_origins.union(&b.cors_origins).count()
        );
    }
}
