//! Per-source reconciliation pass.
//!
//! ## `reconcile`: 4-step pass
//!
//! 1. Start an empty current snapshot.
//! 2. Walk groups and resources in order; for every resource with a non-empty
//!    color, upsert an informational decoration and record it.
//! 3. Clear every resource of the previous snapshot missing from the current one.
//! 4. Swap the current snapshot in as the previous one.

use std::rc::Rc;

use decor_core::{
    traits::DecorationRegistry,
    types::{DecorationData, DecorationTypeId, ResourceGroup, ResourceUri},
};

use crate::snapshot::DecorationSnapshot;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Upsert calls issued (a resource listed twice counts twice).
    pub upserted: usize,
    /// Resources whose decoration was cleared, ascending by key.
    pub cleared: Vec<ResourceUri>,
    /// Size of the snapshot after the pass.
    pub decorated: usize,
}

/// Keeps one decoration type in step with one change source.
///
/// The reconciler is the only writer for its decoration type.
pub struct Reconciler<D: DecorationRegistry> {
    decorations: Rc<D>,
    decoration_type: DecorationTypeId,
    previous: DecorationSnapshot,
    passes: u64,
}

impl<D: DecorationRegistry> Reconciler<D> {
    pub fn new(decorations: Rc<D>, decoration_type: DecorationTypeId) -> Self {
        Self {
            decorations,
            decoration_type,
            previous: DecorationSnapshot::new(),
            passes: 0,
        }
    }

    pub fn decoration_type(&self) -> DecorationTypeId {
        self.decoration_type
    }

    /// Resources decorated as of the last pass.
    pub fn snapshot(&self) -> &DecorationSnapshot {
        &self.previous
    }

    /// Number of completed passes.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Run one pass against the source's current `groups`.
    pub fn reconcile(&mut self, groups: &[ResourceGroup]) -> ReconcileReport {
        let mut current = DecorationSnapshot::new();
        let mut upserted = 0usize;

        for group in groups {
            for resource in &group.resources {
                let Some(data) = DecorationData::from_descriptor(&resource.decorations) else {
                    continue;
                };
                tracing::debug!(
                    "{}: set {} on {}",
                    self.decoration_type,
                    data.color,
                    resource.uri
                );
                self.decorations
                    .set_decoration(self.decoration_type, &resource.uri, Some(data));
                current.insert(&resource.uri);
                upserted += 1;
            }
        }

        let cleared = self.previous.stale_in(&current);
        for uri in &cleared {
            tracing::debug!("{}: clear {}", self.decoration_type, uri);
            self.decorations.set_decoration(self.decoration_type, uri, None);
        }

        self.previous = current;
        self.passes += 1;

        ReconcileReport {
            upserted,
            cleared,
            decorated: self.previous.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use decor_core::types::{Resource, ResourceDecorations};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Set(String, String),
        Clear(String),
    }

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<Call>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<Call> {
            std::mem::take(&mut *self.calls.borrow_mut())
        }
    }

    impl DecorationRegistry for Recorder {
        fn register_decoration_type(&self, _label: &str) -> DecorationTypeId {
            DecorationTypeId(0)
        }

        fn set_decoration(
            &self,
            _ty: DecorationTypeId,
            resource: &ResourceUri,
            data: Option<DecorationData>,
        ) {
            let call = match data {
                Some(data) => Call::Set(resource.0.clone(), data.color),
                None => Call::Clear(resource.0.clone()),
            };
            self.calls.borrow_mut().push(call);
        }

        fn dispose_decoration_type(&self, _ty: DecorationTypeId) {}
    }

    fn group(resources: Vec<Resource>) -> Vec<ResourceGroup> {
        vec![ResourceGroup::new("changes", resources)]
    }

    fn set(uri: &str, color: &str) -> Call {
        Call::Set(uri.to_string(), color.to_string())
    }

    fn clear(uri: &str) -> Call {
        Call::Clear(uri.to_string())
    }

    fn keys(r: &Reconciler<Recorder>) -> Vec<String> {
        r.snapshot().keys().map(str::to_string).collect()
    }

    #[test]
    fn scenarios_a_b_c_in_sequence() {
        let recorder = Rc::new(Recorder::default());
        let mut r = Reconciler::new(recorder.clone(), DecorationTypeId(0));

        r.reconcile(&group(vec![Resource::colored("a", "green")]));
        assert_eq!(recorder.take(), vec![set("a", "green")]);
        assert_eq!(keys(&r), vec!["a"]);

        r.reconcile(&group(vec![Resource::colored("b", "red")]));
        assert_eq!(recorder.take(), vec![set("b", "red"), clear("a")]);
        assert_eq!(keys(&r), vec!["b"]);

        let report = r.reconcile(&group(vec![]));
        assert_eq!(recorder.take(), vec![clear("b")]);
        assert!(r.snapshot().is_empty());
        assert_eq!(report.decorated, 0);
        assert_eq!(r.passes(), 3);
    }

    #[test]
    fn scenario_d_uncolored_resource_is_ignored() {
        let recorder = Rc::new(Recorder::default());
        let mut r = Reconciler::new(recorder.clone(), DecorationTypeId(0));

        let report = r.reconcile(&group(vec![Resource::plain("a")]));
        assert!(recorder.take().is_empty());
        assert!(r.snapshot().is_empty());
        assert_eq!(report, ReconcileReport::default());
    }

    #[test]
    fn resource_losing_its_color_is_cleared_once() {
        let recorder = Rc::new(Recorder::default());
        let mut r = Reconciler::new(recorder.clone(), DecorationTypeId(0));

        r.reconcile(&group(vec![Resource::colored("a", "green")]));
        recorder.take();

        let uncolored = Resource {
            uri: "a".into(),
            decorations: ResourceDecorations {
                color: Some(String::new()),
                ..Default::default()
            },
        };
        r.reconcile(&group(vec![uncolored.clone()]));
        assert_eq!(recorder.take(), vec![clear("a")]);

        r.reconcile(&group(vec![uncolored]));
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn duplicate_resource_across_groups_is_upserted_each_time() {
        let recorder = Rc::new(Recorder::default());
        let mut r = Reconciler::new(recorder.clone(), DecorationTypeId(0));

        let groups = vec![
            ResourceGroup::new("index", vec![Resource::colored("a", "green")]),
            ResourceGroup::new("workingTree", vec![Resource::colored("a", "yellow")]),
        ];
        let report = r.reconcile(&groups);
        assert_eq!(recorder.take(), vec![set("a", "green"), set("a", "yellow")]);
        assert_eq!(report.upserted, 2);
        assert_eq!(report.decorated, 1);
    }

    #[test]
    fn empty_group_list_clears_everything() {
        let recorder = Rc::new(Recorder::default());
        let mut r = Reconciler::new(recorder.clone(), DecorationTypeId(0));

        r.reconcile(&group(vec![
            Resource::colored("a", "green"),
            Resource::colored("b", "green"),
        ]));
        recorder.take();

        let report = r.reconcile(&[]);
        assert_eq!(recorder.take(), vec![clear("a"), clear("b")]);
        assert_eq!(report.cleared.len(), 2);
    }
}
