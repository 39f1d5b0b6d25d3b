//! Service layer: the concrete provider and the directory hosting it.

pub mod directory;
pub mod provider;

pub use directory::{DynProvider, ProviderDirectory};
pub use provider::{discover_paths, Provider};
