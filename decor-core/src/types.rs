//! Domain types shared by sources, reconcilers and decoration registries.
//!
//! All types are serializable/deserializable via serde + serde_yaml so that a
//! change source can be described by an on-disk manifest.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stable identifier of an active change source.
///
/// Entries are keyed by this value, never by the address of the source handle.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceId(pub String);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A URI-like resource identifier (`file:///repo/src/main.rs`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceUri(pub String);

impl ResourceUri {
    /// Canonical string form used as the snapshot key.
    pub fn canonical(&self) -> String {
        self.0.clone()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ResourceUri {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ResourceUri {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Handle issued by a decoration registry for one decoration type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DecorationTypeId(pub u64);

impl fmt::Display for DecorationTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decoration-type#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Severity carried by a decoration payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

// ---------------------------------------------------------------------------
// Source-side structs
// ---------------------------------------------------------------------------

/// Decoration descriptor attached to a resource by its change source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResourceDecorations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<ResourceUri>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_dark: Option<ResourceUri>,
}

impl ResourceDecorations {
    /// The color, if present and non-empty. An empty string counts as absent.
    pub fn relevant_color(&self) -> Option<&str> {
        self.color.as_deref().filter(|c| !c.is_empty())
    }
}

/// One changed resource reported by a change source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub uri: ResourceUri,
    #[serde(flatten)]
    pub decorations: ResourceDecorations,
}

impl Resource {
    /// A resource with no decoration descriptor.
    pub fn plain(uri: impl Into<ResourceUri>) -> Self {
        Self {
            uri: uri.into(),
            decorations: ResourceDecorations::default(),
        }
    }

    /// A resource decorated with `color` and no icons.
    pub fn colored(uri: impl Into<ResourceUri>, color: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            decorations: ResourceDecorations {
                color: Some(color.into()),
                ..ResourceDecorations::default()
            },
        }
    }
}

/// An ordered group of resources (e.g. "Staged Changes").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResourceGroup {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl ResourceGroup {
    pub fn new(id: impl Into<String>, resources: Vec<Resource>) -> Self {
        Self {
            id: id.into(),
            label: String::new(),
            resources,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry-side structs
// ---------------------------------------------------------------------------

/// Light/dark icon pair of a decoration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DecorationIcon {
    pub light: Option<ResourceUri>,
    pub dark: Option<ResourceUri>,
}

/// Payload stored by a decoration registry for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecorationData {
    pub severity: Severity,
    pub color: String,
    pub icon: DecorationIcon,
}

impl DecorationData {
    /// Informational payload built from a resource descriptor.
    ///
    /// Returns `None` when the descriptor carries no usable color.
    pub fn from_descriptor(descriptor: &ResourceDecorations) -> Option<Self> {
        let color = descriptor.relevant_color()?;
        Some(Self {
            severity: Severity::Info,
            color: color.to_string(),
            icon: DecorationIcon {
                light: descriptor.icon.clone(),
                dark: descriptor.icon_dark.clone(),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(SourceId::from("git").to_string(), "git");
        assert_eq!(ResourceUri::from("file:///a").to_string(), "file:///a");
        assert_eq!(DecorationTypeId(3).to_string(), "decoration-type#3");
    }

    #[test]
    fn empty_color_is_not_relevant() {
        let d = ResourceDecorations {
            color: Some(String::new()),
            ..Default::default()
        };
        assert!(d.relevant_color().is_none());
        assert!(DecorationData::from_descriptor(&d).is_none());
    }

    #[test]
    fn payload_copies_icons_and_is_informational() {
        let d = ResourceDecorations {
            color: Some("green".into()),
            icon: Some("file:///light.svg".into()),
            icon_dark: Some("file:///dark.svg".into()),
        };
        let data = DecorationData::from_descriptor(&d).expect("payload");
        assert_eq!(data.severity, Severity::Info);
        assert_eq!(data.color, "green");
        assert_eq!(data.icon.light, Some(ResourceUri::from("file:///light.svg")));
        assert_eq!(data.icon.dark, Some(ResourceUri::from("file:///dark.svg")));
    }

    #[test]
    fn resource_yaml_uses_flat_descriptor() {
        let yaml = "uri: file:///a.rs\ncolor: red\nicon_dark: file:///d.svg\n";
        let r: Resource = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(r.uri.as_str(), "file:///a.rs");
        assert_eq!(r.decorations.relevant_color(), Some("red"));
        assert!(r.decorations.icon.is_none());
    }

    #[test]
    fn severity_display() {
        assert_eq!(Severity::Warning.to_string(), "warning");
        assert_eq!(Severity::default(), Severity::Info);
    }
}
