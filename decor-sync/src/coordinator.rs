//! One reconciler per active change source.
//!
//! The [`Coordinator`] listens to a [`SourceRegistry`]. Every added source
//! gets a [`ReconcilerEntry`]: a fresh decoration type plus a subscription to
//! the source's change signal. Removing the source closes the entry, which
//! first detaches the subscription and then disposes the decoration type
//! (clearing everything decorated under it).
//!
//! Teardown ([`Coordinator::dispose`], also run on drop) detaches the
//! add/remove listeners and then closes any entry still open. Outstanding
//! entries at that point mean the owner skipped a remove; they are logged as a
//! lifecycle leak and released anyway.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use decor_core::{
    config::DecorConfig,
    signal::Subscription,
    traits::{ChangeSource, DecorationRegistry, Disposable, SourceRegistry},
    types::{DecorationTypeId, SourceId},
};

use crate::reconciler::{ReconcileReport, Reconciler};
use crate::snapshot::DecorationSnapshot;

/// Stable identifier of the coordinator as a contribution.
pub const COORDINATOR_ID: &str = "scm.decorations";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Behavior switches for a [`Coordinator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorOptions {
    /// Reconcile once immediately when a source is added.
    pub prime_on_add: bool,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self { prime_on_add: true }
    }
}

impl From<&DecorConfig> for CoordinatorOptions {
    fn from(config: &DecorConfig) -> Self {
        Self {
            prime_on_add: config.prime_on_add,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// A decoration type owned by one entry.
pub struct DecorationTypeHandle<D: DecorationRegistry> {
    decorations: Rc<D>,
    id: DecorationTypeId,
    disposed: bool,
}

impl<D: DecorationRegistry> DecorationTypeHandle<D> {
    fn register(decorations: Rc<D>, label: &str) -> Self {
        let id = decorations.register_decoration_type(label);
        Self {
            decorations,
            id,
            disposed: false,
        }
    }

    pub fn id(&self) -> DecorationTypeId {
        self.id
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl<D: DecorationRegistry> Disposable for DecorationTypeHandle<D> {
    fn close(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.decorations.dispose_decoration_type(self.id);
        }
    }
}

impl<D: DecorationRegistry> Drop for DecorationTypeHandle<D> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Everything the coordinator holds for one active source.
pub struct ReconcilerEntry<D: DecorationRegistry> {
    source: SourceId,
    subscription: Subscription,
    decoration_type: DecorationTypeHandle<D>,
    reconciler: Rc<RefCell<Reconciler<D>>>,
}

impl<D: DecorationRegistry> ReconcilerEntry<D> {
    pub fn source(&self) -> &SourceId {
        &self.source
    }

    pub fn decoration_type(&self) -> DecorationTypeId {
        self.decoration_type.id()
    }

    pub fn is_closed(&self) -> bool {
        self.subscription.is_closed() && self.decoration_type.is_disposed()
    }
}

impl<D: DecorationRegistry> Disposable for ReconcilerEntry<D> {
    /// Subscription first, so no notification can reach a disposed type.
    fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        self.subscription.close();
        self.decoration_type.close();
        tracing::info!(
            "decorations detached from source '{}' ({})",
            self.source,
            self.decoration_type.id()
        );
    }
}

impl<D: DecorationRegistry> Drop for ReconcilerEntry<D> {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

struct Shared<D: DecorationRegistry> {
    decorations: Rc<D>,
    options: CoordinatorOptions,
    entries: RefCell<BTreeMap<SourceId, ReconcilerEntry<D>>>,
}

/// Maintains exactly one [`ReconcilerEntry`] per active change source.
pub struct Coordinator<D: DecorationRegistry + 'static> {
    shared: Rc<Shared<D>>,
    subscriptions: Vec<Subscription>,
    disposed: bool,
}

impl<D: DecorationRegistry + 'static> Coordinator<D> {
    /// Attach to `sources` with default options.
    pub fn new<S: SourceRegistry>(sources: &S, decorations: Rc<D>) -> Self {
        Self::with_options(sources, decorations, CoordinatorOptions::default())
    }

    /// Attach to `sources`: adopt every already-active source, then listen
    /// for adds and removes.
    pub fn with_options<S: SourceRegistry>(
        sources: &S,
        decorations: Rc<D>,
        options: CoordinatorOptions,
    ) -> Self {
        let shared = Rc::new(Shared {
            decorations,
            options,
            entries: RefCell::new(BTreeMap::new()),
        });

        for source in sources.sources() {
            shared.on_added(&source);
        }

        let weak: Weak<Shared<D>> = Rc::downgrade(&shared);
        let added = sources.on_did_add(Box::new(move |source: &S::Source| {
            if let Some(shared) = weak.upgrade() {
                shared.on_added(source);
            }
        }));

        let weak: Weak<Shared<D>> = Rc::downgrade(&shared);
        let removed = sources.on_did_remove(Box::new(move |source: &S::Source| {
            if let Some(shared) = weak.upgrade() {
                shared.on_removed(&source.id());
            }
        }));

        tracing::info!(
            "{COORDINATOR_ID}: attached with {} active source(s)",
            shared.entries.borrow().len()
        );

        Self {
            shared,
            subscriptions: vec![added, removed],
            disposed: false,
        }
    }

    /// Stable identifier of this component.
    pub fn id(&self) -> &'static str {
        COORDINATOR_ID
    }

    /// Create the entry for `source`. A duplicate add is ignored.
    pub fn on_added<Src: ChangeSource + Clone + 'static>(&self, source: &Src) {
        self.shared.on_added(source);
    }

    /// Close and forget the entry for `source`; unknown sources are a no-op.
    pub fn on_removed<Src: ChangeSource>(&self, source: &Src) {
        self.shared.on_removed(&source.id());
    }

    pub fn len(&self) -> usize {
        self.shared.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.entries.borrow().is_empty()
    }

    pub fn contains(&self, id: &SourceId) -> bool {
        self.shared.entries.borrow().contains_key(id)
    }

    /// Ids of sources with an open entry, ascending.
    pub fn source_ids(&self) -> Vec<SourceId> {
        self.shared.entries.borrow().keys().cloned().collect()
    }

    pub fn decoration_type(&self, id: &SourceId) -> Option<DecorationTypeId> {
        self.shared
            .entries
            .borrow()
            .get(id)
            .map(ReconcilerEntry::decoration_type)
    }

    /// Copy of the source's current snapshot.
    pub fn snapshot(&self, id: &SourceId) -> Option<DecorationSnapshot> {
        self.shared
            .entries
            .borrow()
            .get(id)
            .and_then(|entry| entry.reconciler.try_borrow().ok().map(|r| r.snapshot().clone()))
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Detach from the source registry and close every remaining entry.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        for subscription in &mut self.subscriptions {
            subscription.close();
        }

        let leaked = std::mem::take(&mut *self.shared.entries.borrow_mut());
        if !leaked.is_empty() {
            tracing::warn!(
                "{COORDINATOR_ID}: {} source(s) still active at teardown; closing their entries",
                leaked.len()
            );
        }
        for (_, mut entry) in leaked {
            entry.close();
        }
    }
}

impl<D: DecorationRegistry + 'static> Drop for Coordinator<D> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<D: DecorationRegistry + 'static> Shared<D> {
    fn on_added<Src: ChangeSource + Clone + 'static>(&self, source: &Src) {
        let id = source.id();
        if self.entries.borrow().contains_key(&id) {
            tracing::warn!("source '{id}' added twice; keeping the existing entry");
            return;
        }

        let label = source.label();
        let decoration_type = DecorationTypeHandle::register(self.decorations.clone(), &label);
        let reconciler = Rc::new(RefCell::new(Reconciler::new(
            self.decorations.clone(),
            decoration_type.id(),
        )));

        let subscription = {
            let reconciler = Rc::downgrade(&reconciler);
            let reader = source.clone();
            source.on_did_change(Box::new(move || {
                if let Some(reconciler) = reconciler.upgrade() {
                    run_pass(&reconciler, &reader);
                }
            }))
        };

        tracing::info!(
            "decorations attached to source '{}' as '{}' ({})",
            id,
            label,
            decoration_type.id()
        );

        self.entries.borrow_mut().insert(
            id,
            ReconcilerEntry {
                source: source.id(),
                subscription,
                decoration_type,
                reconciler: reconciler.clone(),
            },
        );

        if self.options.prime_on_add {
            run_pass(&reconciler, source);
        }
    }

    fn on_removed(&self, id: &SourceId) {
        let entry = self.entries.borrow_mut().remove(id);
        match entry {
            Some(mut entry) => entry.close(),
            None => tracing::debug!("remove for unknown source '{id}' ignored"),
        }
    }
}

/// Run one pass unless one is already in progress for this reconciler.
fn run_pass<D, Src>(reconciler: &RefCell<Reconciler<D>>, source: &Src) -> Option<ReconcileReport>
where
    D: DecorationRegistry,
    Src: ChangeSource,
{
    let Ok(mut reconciler) = reconciler.try_borrow_mut() else {
        tracing::warn!(
            "re-entrant change notification from source '{}' dropped",
            source.id()
        );
        return None;
    };
    let groups = source.resource_groups();
    let report = reconciler.reconcile(&groups);
    tracing::debug!(
        "source '{}': {} upserted, {} cleared, {} decorated",
        source.id(),
        report.upserted,
        report.cleared.len(),
        report.decorated
    );
    Some(report)
}
