//! Entry lifecycle: add, remove, re-add and coordinator teardown.

mod common;

use std::rc::Rc;

use common::{groups, init_logging, Call, Recording};
use decor_core::{
    memory::{MemoryChangeSource, MemorySourceRegistry},
    types::{ResourceUri, SourceId},
};
use decor_sync::Coordinator;

fn git() -> SourceId {
    SourceId::from("git")
}

#[test]
fn removal_disposes_type_and_detaches_source() {
    init_logging();
    let sources = MemorySourceRegistry::new();
    let decorations = Rc::new(Recording::new());
    let coordinator = Coordinator::new(&sources, decorations.clone());

    let source = MemoryChangeSource::new("git", "Git");
    sources.add(source.clone()).expect("add");
    source.set_groups(groups(&[("a", Some("green")), ("b", Some("red"))]));
    let ty = coordinator.decoration_type(&git()).expect("type");
    assert_eq!(decorations.inner.decorations(ty).len(), 2);
    decorations.take();

    sources.remove(&git()).expect("remove");

    assert!(!coordinator.contains(&git()));
    assert!(!decorations.inner.is_registered(ty));
    assert_eq!(decorations.inner.total(), 0);
    assert_eq!(decorations.take(), vec![Call::Dispose { ty }]);
    assert_eq!(source.change_listener_count(), 0);

    // The detached source no longer reaches the registry.
    source.set_groups(groups(&[("c", Some("green"))]));
    source.notify_changed();
    assert!(decorations.take().is_empty());
    assert_eq!(decorations.inner.total(), 0);
}

#[test]
fn one_entry_per_add_until_matching_remove() {
    init_logging();
    let sources = MemorySourceRegistry::new();
    let decorations = Rc::new(Recording::new());
    let coordinator = Coordinator::new(&sources, decorations.clone());

    for id in ["git", "hg", "svn"] {
        sources.add(MemoryChangeSource::new(id, id)).expect("add");
    }
    assert_eq!(coordinator.len(), 3);
    assert_eq!(decorations.inner.type_ids().len(), 3);

    sources.remove(&SourceId::from("hg")).expect("remove");
    assert_eq!(
        coordinator.source_ids(),
        vec![SourceId::from("git"), SourceId::from("svn")]
    );
    assert_eq!(decorations.inner.type_ids().len(), 2);

    // A second remove for the same source fires nothing.
    assert!(sources.remove(&SourceId::from("hg")).is_none());
    assert_eq!(coordinator.len(), 2);
}

#[test]
fn re_added_source_gets_a_fresh_type_and_empty_snapshot() {
    init_logging();
    let sources = MemorySourceRegistry::new();
    let decorations = Rc::new(Recording::new());
    let coordinator = Coordinator::new(&sources, decorations.clone());

    let first = MemoryChangeSource::with_groups("git", "Git", groups(&[("a", Some("green"))]));
    sources.add(first).expect("add");
    let old_ty = coordinator.decoration_type(&git()).expect("type");
    sources.remove(&git()).expect("remove");

    let second = MemoryChangeSource::new("git", "Git");
    sources.add(second.clone()).expect("re-add");
    let new_ty = coordinator.decoration_type(&git()).expect("type");

    assert_ne!(old_ty, new_ty);
    assert!(coordinator.snapshot(&git()).expect("entry").is_empty());
    assert!(decorations
        .inner
        .decoration(new_ty, &ResourceUri::from("a"))
        .is_none());
    assert_eq!(second.change_listener_count(), 1);
}

#[test]
fn dropping_the_coordinator_releases_everything() {
    init_logging();
    let sources = MemorySourceRegistry::new();
    let decorations = Rc::new(Recording::new());
    let source = MemoryChangeSource::with_groups("git", "Git", groups(&[("a", Some("green"))]));
    sources.add(source.clone()).expect("add");

    {
        let coordinator = Coordinator::new(&sources, decorations.clone());
        assert_eq!(coordinator.len(), 1);
        assert_eq!(decorations.inner.total(), 1);
    }

    assert_eq!(source.change_listener_count(), 0);
    assert!(decorations.inner.type_ids().is_empty());

    // Nobody is listening for new sources any more.
    sources
        .add(MemoryChangeSource::new("hg", "Mercurial"))
        .expect("add");
    assert!(decorations.inner.type_ids().is_empty());
}

#[test]
fn teardown_after_clean_removal_disposes_nothing_twice() {
    init_logging();
    let sources = MemorySourceRegistry::new();
    let decorations = Rc::new(Recording::new());
    let mut coordinator = Coordinator::new(&sources, decorations.clone());

    sources
        .add(MemoryChangeSource::new("git", "Git"))
        .expect("add");
    sources.remove(&git()).expect("remove");
    decorations.take();

    coordinator.dispose();
    assert!(decorations.take().is_empty());
}
