//! Collaborator contracts consumed by the reconciler and coordinator.
//!
//! Everything here is single-threaded: registries use interior mutability and
//! take `&self`, and listeners are plain `Fn` closures run synchronously by
//! the emitting side.

use crate::signal::Subscription;
use crate::types::{DecorationData, DecorationTypeId, ResourceGroup, ResourceUri, SourceId};

/// An owned resource that must be released explicitly, in a known order.
pub trait Disposable {
    /// Release the resource. Calling `close` more than once is a no-op.
    fn close(&mut self);
}

/// One tracked, repository-like entity.
pub trait ChangeSource {
    /// Stable identity; two handles with the same id are the same source.
    fn id(&self) -> SourceId;

    /// Human-readable label, used to name the decoration type.
    fn label(&self) -> String;

    /// Current resource groups, in order.
    fn resource_groups(&self) -> Vec<ResourceGroup>;

    /// Attach a listener fired whenever the resource groups may have changed.
    fn on_did_change(&self, listener: Box<dyn Fn()>) -> Subscription;
}

/// The set of currently active change sources.
pub trait SourceRegistry {
    type Source: ChangeSource + Clone + 'static;

    /// Sources active right now.
    fn sources(&self) -> Vec<Self::Source>;

    /// Fired once per activation. Never fired twice for a live source.
    fn on_did_add(&self, listener: Box<dyn Fn(&Self::Source)>) -> Subscription;

    /// Fired once per deactivation of a previously active source.
    fn on_did_remove(&self, listener: Box<dyn Fn(&Self::Source)>) -> Subscription;
}

/// Process-wide store of decorations, partitioned by decoration type.
pub trait DecorationRegistry {
    /// Create a fresh, empty decoration type.
    fn register_decoration_type(&self, label: &str) -> DecorationTypeId;

    /// Upsert (`Some`) or clear (`None`) the decoration of `resource` under `ty`.
    fn set_decoration(
        &self,
        ty: DecorationTypeId,
        resource: &ResourceUri,
        data: Option<DecorationData>,
    );

    /// Drop the type and every decoration registered under it.
    fn dispose_decoration_type(&self, ty: DecorationTypeId);
}
