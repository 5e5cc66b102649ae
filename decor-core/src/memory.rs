//! In-memory implementations of the collaborator traits.
//!
//! These back the daemon (sources loaded from manifests) and the test suites.
//! All handles are single-threaded (`Rc` + `RefCell`).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::error::DecorError;
use crate::signal::{Signal, Subscription};
use crate::traits::{ChangeSource, DecorationRegistry, SourceRegistry};
use crate::types::{DecorationData, DecorationTypeId, ResourceGroup, ResourceUri, SourceId};

// ---------------------------------------------------------------------------
// 1. Change source
// ---------------------------------------------------------------------------

struct SourceInner {
    id: SourceId,
    label: String,
    groups: RefCell<Vec<ResourceGroup>>,
    changed: Signal<()>,
}

/// A change source whose groups are pushed in by the owner.
///
/// Cloning yields another handle to the same source.
#[derive(Clone)]
pub struct MemoryChangeSource {
    inner: Rc<SourceInner>,
}

impl MemoryChangeSource {
    pub fn new(id: impl Into<SourceId>, label: impl Into<String>) -> Self {
        Self::with_groups(id, label, Vec::new())
    }

    pub fn with_groups(
        id: impl Into<SourceId>,
        label: impl Into<String>,
        groups: Vec<ResourceGroup>,
    ) -> Self {
        Self {
            inner: Rc::new(SourceInner {
                id: id.into(),
                label: label.into(),
                groups: RefCell::new(groups),
                changed: Signal::new(),
            }),
        }
    }

    /// Replace the resource groups and fire the change signal.
    pub fn set_groups(&self, groups: Vec<ResourceGroup>) {
        *self.inner.groups.borrow_mut() = groups;
        self.notify_changed();
    }

    /// Fire the change signal without touching the groups.
    pub fn notify_changed(&self) {
        self.inner.changed.emit(&());
    }

    /// Number of listeners attached to the change signal.
    pub fn change_listener_count(&self) -> usize {
        self.inner.changed.listener_count()
    }
}

impl ChangeSource for MemoryChangeSource {
    fn id(&self) -> SourceId {
        self.inner.id.clone()
    }

    fn label(&self) -> String {
        self.inner.label.clone()
    }

    fn resource_groups(&self) -> Vec<ResourceGroup> {
        self.inner.groups.borrow().clone()
    }

    fn on_did_change(&self, listener: Box<dyn Fn()>) -> Subscription {
        self.inner.changed.subscribe(move |_| listener())
    }
}

impl fmt::Debug for MemoryChangeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryChangeSource")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("groups", &self.inner.groups.borrow().len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// 2. Source registry
// ---------------------------------------------------------------------------

/// Tracks active [`MemoryChangeSource`]s and signals add/remove.
#[derive(Debug, Default)]
pub struct MemorySourceRegistry {
    sources: RefCell<Vec<MemoryChangeSource>>,
    added: Signal<MemoryChangeSource>,
    removed: Signal<MemoryChangeSource>,
}

impl MemorySourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate `source` and fire "added".
    ///
    /// Returns [`DecorError::DuplicateSource`] if a source with the same id is
    /// already active; nothing is fired in that case.
    pub fn add(&self, source: MemoryChangeSource) -> Result<(), DecorError> {
        let id = source.id();
        {
            let mut sources = self.sources.borrow_mut();
            if sources.iter().any(|s| s.id() == id) {
                return Err(DecorError::DuplicateSource(id));
            }
            sources.push(source.clone());
        }
        self.added.emit(&source);
        Ok(())
    }

    /// Deactivate the source with `id` and fire "removed".
    ///
    /// Returns `None` (and fires nothing) if no such source is active.
    pub fn remove(&self, id: &SourceId) -> Option<MemoryChangeSource> {
        let removed = {
            let mut sources = self.sources.borrow_mut();
            let index = sources.iter().position(|s| &s.id() == id)?;
            sources.remove(index)
        };
        self.removed.emit(&removed);
        Some(removed)
    }

    pub fn get(&self, id: &SourceId) -> Option<MemoryChangeSource> {
        self.sources.borrow().iter().find(|s| &s.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sources.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.borrow().is_empty()
    }
}

impl SourceRegistry for MemorySourceRegistry {
    type Source = MemoryChangeSource;

    fn sources(&self) -> Vec<MemoryChangeSource> {
        self.sources.borrow().clone()
    }

    fn on_did_add(&self, listener: Box<dyn Fn(&MemoryChangeSource)>) -> Subscription {
        self.added.subscribe(move |source| listener(source))
    }

    fn on_did_remove(&self, listener: Box<dyn Fn(&MemoryChangeSource)>) -> Subscription {
        self.removed.subscribe(move |source| listener(source))
    }
}

// ---------------------------------------------------------------------------
// 3. Decoration registry
// ---------------------------------------------------------------------------

/// Serializable view of one decoration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecorationView {
    pub resource: ResourceUri,
    #[serde(flatten)]
    pub data: DecorationData,
}

/// Serializable view of one decoration type and its decorations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecorationTypeView {
    pub id: DecorationTypeId,
    pub label: String,
    pub decorations: Vec<DecorationView>,
}

#[derive(Debug)]
struct TypeSlot {
    label: String,
    entries: BTreeMap<String, (ResourceUri, DecorationData)>,
}

#[derive(Debug, Default)]
struct DecorationState {
    next_id: u64,
    types: BTreeMap<DecorationTypeId, TypeSlot>,
}

/// Decoration registry holding everything in memory.
///
/// Writes against an unknown or disposed type are ignored.
#[derive(Debug, Default)]
pub struct MemoryDecorationRegistry {
    state: RefCell<DecorationState>,
}

impl MemoryDecorationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self, ty: DecorationTypeId) -> bool {
        self.state.borrow().types.contains_key(&ty)
    }

    pub fn type_label(&self, ty: DecorationTypeId) -> Option<String> {
        self.state.borrow().types.get(&ty).map(|slot| slot.label.clone())
    }

    /// Ids of all live decoration types, ascending.
    pub fn type_ids(&self) -> Vec<DecorationTypeId> {
        self.state.borrow().types.keys().copied().collect()
    }

    pub fn decoration(&self, ty: DecorationTypeId, resource: &ResourceUri) -> Option<DecorationData> {
        self.state
            .borrow()
            .types
            .get(&ty)
            .and_then(|slot| slot.entries.get(&resource.canonical()))
            .map(|(_, data)| data.clone())
    }

    /// Decorations of `ty`, sorted by canonical resource string.
    pub fn decorations(&self, ty: DecorationTypeId) -> Vec<DecorationView> {
        self.state
            .borrow()
            .types
            .get(&ty)
            .map(slot_views)
            .unwrap_or_default()
    }

    /// Number of decorations across all types.
    pub fn total(&self) -> usize {
        self.state
            .borrow()
            .types
            .values()
            .map(|slot| slot.entries.len())
            .sum()
    }

    /// Every live type with its decorations.
    pub fn snapshot(&self) -> Vec<DecorationTypeView> {
        self.state
            .borrow()
            .types
            .iter()
            .map(|(id, slot)| DecorationTypeView {
                id: *id,
                label: slot.label.clone(),
                decorations: slot_views(slot),
            })
            .collect()
    }
}

fn slot_views(slot: &TypeSlot) -> Vec<DecorationView> {
    slot.entries
        .values()
        .map(|(resource, data)| DecorationView {
            resource: resource.clone(),
            data: data.clone(),
        })
        .collect()
}

impl DecorationRegistry for MemoryDecorationRegistry {
    fn register_decoration_type(&self, label: &str) -> DecorationTypeId {
        let mut state = self.state.borrow_mut();
        let id = DecorationTypeId(state.next_id);
        state.next_id += 1;
        state.types.insert(
            id,
            TypeSlot {
                label: label.to_string(),
                entries: BTreeMap::new(),
            },
        );
        id
    }

    fn set_decoration(
        &self,
        ty: DecorationTypeId,
        resource: &ResourceUri,
        data: Option<DecorationData>,
    ) {
        let mut state = self.state.borrow_mut();
        let Some(slot) = state.types.get_mut(&ty) else {
            return;
        };
        match data {
            Some(data) => {
                slot.entries
                    .insert(resource.canonical(), (resource.clone(), data));
            }
            None => {
                slot.entries.remove(&resource.canonical());
            }
        }
    }

    fn dispose_decoration_type(&self, ty: DecorationTypeId) {
        self.state.borrow_mut().types.remove(&ty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Resource, ResourceDecorations};
    use std::cell::Cell;

    fn payload(color: &str) -> DecorationData {
        DecorationData::from_descriptor(&ResourceDecorations {
            color: Some(color.to_string()),
            ..Default::default()
        })
        .expect("payload")
    }

    #[test]
    fn source_set_groups_fires_change_after_update() {
        let source = MemoryChangeSource::new("git", "Git");
        let observed = Rc::new(Cell::new(0usize));
        let _sub = {
            let observed = observed.clone();
            let reader = source.clone();
            source.on_did_change(Box::new(move || {
                observed.set(reader.resource_groups().len());
            }))
        };
        source.set_groups(vec![ResourceGroup::new(
            "index",
            vec![Resource::colored("file:///a", "green")],
        )]);
        assert_eq!(observed.get(), 1);
    }

    #[test]
    fn registry_rejects_duplicate_add() {
        let registry = MemorySourceRegistry::new();
        registry
            .add(MemoryChangeSource::new("git", "Git"))
            .expect("first add");
        let err = registry
            .add(MemoryChangeSource::new("git", "Git again"))
            .unwrap_err();
        assert!(matches!(err, DecorError::DuplicateSource(ref id) if id.0 == "git"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_remove_unknown_fires_nothing() {
        let registry = MemorySourceRegistry::new();
        let fired = Rc::new(Cell::new(false));
        let _sub = {
            let fired = fired.clone();
            registry.on_did_remove(Box::new(move |_| fired.set(true)))
        };
        assert!(registry.remove(&SourceId::from("nope")).is_none());
        assert!(!fired.get());
    }

    #[test]
    fn decoration_upsert_clear_and_dispose() {
        let registry = MemoryDecorationRegistry::new();
        let ty = registry.register_decoration_type("Git");
        let uri = ResourceUri::from("file:///a");

        registry.set_decoration(ty, &uri, Some(payload("green")));
        registry.set_decoration(ty, &uri, Some(payload("red")));
        assert_eq!(registry.decoration(ty, &uri).map(|d| d.color), Some("red".into()));
        assert_eq!(registry.total(), 1);

        registry.set_decoration(ty, &uri, None);
        assert!(registry.decoration(ty, &uri).is_none());

        registry.set_decoration(ty, &uri, Some(payload("green")));
        registry.dispose_decoration_type(ty);
        assert!(!registry.is_registered(ty));
        assert_eq!(registry.total(), 0);

        // Writes after dispose are ignored.
        registry.set_decoration(ty, &uri, Some(payload("green")));
        assert_eq!(registry.total(), 0);
    }

    #[test]
    fn type_ids_are_fresh_per_registration() {
        let registry = MemoryDecorationRegistry::new();
        let a = registry.register_decoration_type("Git");
        let b = registry.register_decoration_type("Git");
        assert_ne!(a, b);
        assert_eq!(registry.type_label(b).as_deref(), Some("Git"));
        assert_eq!(registry.snapshot().len(), 2);
    }
}
