//! Shared fixtures: a decoration registry that records every call.

#![allow(dead_code)]

use std::cell::RefCell;

use decor_core::{
    memory::MemoryDecorationRegistry,
    traits::DecorationRegistry,
    types::{DecorationData, DecorationTypeId, Resource, ResourceGroup, ResourceUri},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Register { ty: DecorationTypeId, label: String },
    Set { ty: DecorationTypeId, uri: String, data: DecorationData },
    Clear { ty: DecorationTypeId, uri: String },
    Dispose { ty: DecorationTypeId },
}

/// Memory registry plus a log of the calls made against it.
#[derive(Default)]
pub struct Recording {
    pub inner: MemoryDecorationRegistry,
    calls: RefCell<Vec<Call>>,
}

impl Recording {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the call log.
    pub fn take(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.borrow_mut())
    }

    /// `(uri, color)` of every upsert in a call list.
    pub fn upserts(calls: &[Call]) -> Vec<(String, String)> {
        calls
            .iter()
            .filter_map(|c| match c {
                Call::Set { uri, data, .. } => Some((uri.clone(), data.color.clone())),
                _ => None,
            })
            .collect()
    }

    /// URIs of every clear in a call list.
    pub fn clears(calls: &[Call]) -> Vec<String> {
        calls
            .iter()
            .filter_map(|c| match c {
                Call::Clear { uri, .. } => Some(uri.clone()),
                _ => None,
            })
            .collect()
    }
}

impl DecorationRegistry for Recording {
    fn register_decoration_type(&self, label: &str) -> DecorationTypeId {
        let ty = self.inner.register_decoration_type(label);
        self.calls.borrow_mut().push(Call::Register {
            ty,
            label: label.to_string(),
        });
        ty
    }

    fn set_decoration(
        &self,
        ty: DecorationTypeId,
        resource: &ResourceUri,
        data: Option<DecorationData>,
    ) {
        let call = match &data {
            Some(data) => Call::Set {
                ty,
                uri: resource.0.clone(),
                data: data.clone(),
            },
            None => Call::Clear {
                ty,
                uri: resource.0.clone(),
            },
        };
        self.calls.borrow_mut().push(call);
        self.inner.set_decoration(ty, resource, data);
    }

    fn dispose_decoration_type(&self, ty: DecorationTypeId) {
        self.calls.borrow_mut().push(Call::Dispose { ty });
        self.inner.dispose_decoration_type(ty);
    }
}

/// A single group holding `resources` as `(uri, color)` pairs; `None` means uncolored.
pub fn groups(resources: &[(&str, Option<&str>)]) -> Vec<ResourceGroup> {
    vec![ResourceGroup::new(
        "changes",
        resources
            .iter()
            .map(|(uri, color)| match color {
                Some(color) => Resource::colored(*uri, *color),
                None => Resource::plain(*uri),
            })
            .collect(),
    )]
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
