//! Single-threaded decoration state owned by the coordinator task.

use std::rc::Rc;

use serde::Serialize;

use decor_core::{
    manifest::SourceManifest,
    memory::{DecorationView, MemoryChangeSource, MemoryDecorationRegistry, MemorySourceRegistry},
    traits::{ChangeSource, SourceRegistry},
    types::{DecorationTypeId, SourceId},
    DecorError,
};
use decor_sync::{Coordinator, CoordinatorOptions};

/// What applying one manifest event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyOutcome {
    /// New source activated.
    Added,
    /// Existing source received new groups.
    Updated,
    /// Label changed: the source was removed and re-added under a fresh type.
    Relabeled,
    Removed,
    /// Remove for a source that was never active.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStatus {
    pub id: SourceId,
    pub label: String,
    pub decoration_type: Option<DecorationTypeId>,
    pub decorations: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub sources: Vec<SourceStatus>,
    pub decorations: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDecorations {
    pub source: SourceId,
    pub label: String,
    pub decoration_type: DecorationTypeId,
    pub decorations: Vec<DecorationView>,
}

pub(crate) struct DecorState {
    coordinator: Coordinator<MemoryDecorationRegistry>,
    decorations: Rc<MemoryDecorationRegistry>,
    sources: MemorySourceRegistry,
    prime_on_add: bool,
}

impl DecorState {
    pub(crate) fn new(options: CoordinatorOptions) -> Self {
        let sources = MemorySourceRegistry::new();
        let decorations = Rc::new(MemoryDecorationRegistry::new());
        let prime_on_add = options.prime_on_add;
        let coordinator = Coordinator::with_options(&sources, decorations.clone(), options);
        Self {
            coordinator,
            decorations,
            sources,
            prime_on_add,
        }
    }

    /// Activate `id` or push the manifest's groups into the live source.
    pub(crate) fn upsert(
        &mut self,
        id: SourceId,
        manifest: SourceManifest,
    ) -> Result<ApplyOutcome, DecorError> {
        let Some(live) = self.sources.get(&id) else {
            self.activate(manifest.into_source(id))?;
            return Ok(ApplyOutcome::Added);
        };

        if live.label() != manifest.label {
            self.sources.remove(&id);
            self.activate(manifest.into_source(id))?;
            return Ok(ApplyOutcome::Relabeled);
        }

        live.set_groups(manifest.groups);
        Ok(ApplyOutcome::Updated)
    }

    /// Add `source`; without priming, the manifest load is its first change.
    fn activate(&self, source: MemoryChangeSource) -> Result<(), DecorError> {
        self.sources.add(source.clone())?;
        if !self.prime_on_add {
            source.notify_changed();
        }
        Ok(())
    }

    pub(crate) fn remove(&mut self, id: &SourceId) -> ApplyOutcome {
        match self.sources.remove(id) {
            Some(_) => ApplyOutcome::Removed,
            None => ApplyOutcome::Unknown,
        }
    }

    pub(crate) fn status(&self) -> StatusReport {
        let sources: Vec<SourceStatus> = self
            .sorted_sources()
            .into_iter()
            .map(|source| {
                let id = source.id();
                SourceStatus {
                    decoration_type: self.coordinator.decoration_type(&id),
                    decorations: self.decorated(&id),
                    label: source.label(),
                    id,
                }
            })
            .collect();
        StatusReport {
            sources,
            decorations: self.decorations.total(),
        }
    }

    /// Number of resources currently decorated for `id`.
    pub(crate) fn decorated(&self, id: &SourceId) -> usize {
        self.coordinator
            .decoration_type(id)
            .map(|ty| self.decorations.decorations(ty).len())
            .unwrap_or(0)
    }

    /// Decorations for every active source, or only for `filter`.
    pub(crate) fn decorations(
        &self,
        filter: Option<&SourceId>,
    ) -> Result<Vec<SourceDecorations>, String> {
        if let Some(id) = filter {
            if self.sources.get(id).is_none() {
                return Err(format!("unknown source '{id}'"));
            }
        }

        Ok(self
            .sorted_sources()
            .into_iter()
            .filter(|source| filter.map_or(true, |id| &source.id() == id))
            .filter_map(|source| {
                let id = source.id();
                let ty = self.coordinator.decoration_type(&id)?;
                Some(SourceDecorations {
                    source: id,
                    label: source.label(),
                    decoration_type: ty,
                    decorations: self.decorations.decorations(ty),
                })
            })
            .collect())
    }

    /// Remove every source, then detach the coordinator.
    pub(crate) fn shutdown(&mut self) {
        for source in self.sorted_sources() {
            self.sources.remove(&source.id());
        }
        self.coordinator.dispose();
    }

    fn sorted_sources(&self) -> Vec<MemoryChangeSource> {
        let mut sources = self.sources.sources();
        sources.sort_by_key(|source| source.id());
        sources
    }
}
