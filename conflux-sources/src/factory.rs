//! Conversion of source data into fragments.

use crate::error::SourceResult;
use conflux_types::Fragment;

/// Turns one item of source data into a fragment.
///
/// Fragment ids are strings: a property entry name or a resource uid.
pub trait FragmentFactory<T>: Send + Sync {
    type Key;
    type Configuration;

    fn create_fragment(&self, source: &T) -> SourceResult<Fragment<String, Self::Key, Self::Configuration>>;
}
