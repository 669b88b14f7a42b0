//! Application configuration for conflux.
//!
//! [`ApplicationConfiguration`] is the configuration type the server composes:
//! identity provider settings plus routing and CORS lists, parsed from flat
//! string maps and merged fragment by fragment.

mod config;
mod error;
mod ids;

pub use config::{keys, ApplicationConfiguration};
pub use error::{AppsError, AppsResult};
pub use ids::{ApplicationId, DeploymentId};
