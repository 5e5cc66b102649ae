//! decor core library: domain types, signals, collaborator traits,
//! in-memory registries, source manifests and configuration.
//!
//! - [`types`]: newtypes, resources and decoration payloads
//! - [`signal`]: [`Signal`] / [`Subscription`]
//! - [`traits`]: [`ChangeSource`], [`SourceRegistry`], [`DecorationRegistry`], [`Disposable`]
//! - [`memory`]: in-memory implementations of the traits
//! - [`manifest`]: `~/.decor/sources/*.yaml` load / save / list
//! - [`config`]: `~/.decor/config.yaml`
//! - [`error`]: [`DecorError`]

pub mod config;
pub mod error;
pub mod manifest;
pub mod memory;
pub mod signal;
pub mod traits;
pub mod types;

pub use config::DecorConfig;
pub use error::DecorError;
pub use manifest::SourceManifest;
pub use memory::{MemoryChangeSource, MemoryDecorationRegistry, MemorySourceRegistry};
pub use signal::{Signal, Subscription};
pub use traits::{ChangeSource, DecorationRegistry, Disposable, SourceRegistry};
pub use types::{
    DecorationData, DecorationIcon, DecorationTypeId, Resource, ResourceDecorations,
    ResourceGroup, ResourceUri, Severity, SourceId,
};
