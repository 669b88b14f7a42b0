//! Wires fragment sources, the fragment registry and the composition engine.

use crate::config::ServerConfig;
use anyhow::{Context, Result};
use conflux_apps::{ApplicationConfiguration, ApplicationId};
use conflux_channel::{EventChannel, Feed};
use conflux_compose::{CompositionEngine, FragmentRegistry};
use conflux_sources::{PropertiesFragmentFactory, StaticFragmentSource};
use conflux_types::Fragment;
use tracing::{debug, info};

pub type ApplicationEngine = CompositionEngine<String, ApplicationId, ApplicationConfiguration>;
pub type ApplicationRegistry = FragmentRegistry<String, ApplicationId, ApplicationConfiguration>;

type ApplicationFragment = Fragment<String, ApplicationId, ApplicationConfiguration>;

/// A running composition pipeline: static fragments flow into the registry,
/// the registry into the engine.
#[derive(Debug)]
pub struct Conflux {
    source: EventChannel<ApplicationFragment>,
    registry: ApplicationRegistry,
    engine: ApplicationEngine,
    feeds: Vec<Feed>,
}

impl Conflux {
    /// Starts the pipeline. Must be called from within a Tokio runtime.
    pub fn start(config: &ServerConfig) -> Result<Self> {
        let factory = PropertiesFragmentFactory::new(
            |key: &str| ApplicationId::from(key),
            ApplicationConfiguration::from_map,
        );
        let source = StaticFragmentSource::new(&config.sources, &factory)
            .context("Invalid static fragment configuration")?;
        let registry = ApplicationRegistry::with_config(config.registry.clone())
            .context("Failed to create fragment registry")?;
        let engine =
            ApplicationEngine::with_config(ApplicationConfiguration::merge, config.engine.clone());

        let source = source.channel();
        let feeds = vec![
            registry.subscribe(&source),
            engine.follow_registry(&registry),
        ];
        info!(
            fragments = config.sources.fragments.len(),
            merge_order = ?config.engine.merge_order,
            "Composition pipeline started"
        );

        Ok(Self {
            source,
            registry,
            engine,
            feeds,
        })
    }

    #[must_use]
    pub fn engine(&self) -> &ApplicationEngine {
        &self.engine
    }

    #[must_use]
    pub fn registry(&self) -> &ApplicationRegistry {
        &self.registry
    }

    #[must_use]
    pub fn feeds(&self) -> &[Feed] {
        &self.feeds
    }

    /// Stops every feed and closes the pipeline.
    pub fn shutdown(self) {
        for feed in &self.feeds {
            feed.cancel();
        }
        self.source.close();
        self.registry.close();
        self.engine.close();
        debug!("Composition pipeline stopped");
    }
}
