//! # decor-sync
//!
//! Keeps decoration types in step with change sources.
//!
//! Build a [`Coordinator`] over a source registry and a decoration registry;
//! it creates one [`Reconciler`] per active source and tears it down when the
//! source goes away.

pub mod coordinator;
pub mod reconciler;
pub mod snapshot;

pub use coordinator::{
    Coordinator, CoordinatorOptions, DecorationTypeHandle, ReconcilerEntry, COORDINATOR_ID,
};
pub use reconciler::{ReconcileReport, Reconciler};
pub use snapshot::DecorationSnapshot;
