//! On-disk change-source manifests.
//!
//! # Storage layout
//!
//! ```text
//! ~/.decor/
//!   config.yaml            (optional, see [`crate::config`])
//!   sources/
//!     <source_id>.yaml     (one manifest per change source, mode 0600)
//! ```
//!
//! # API pattern
//!
//! Every function that touches the filesystem has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DecorError;
use crate::memory::MemoryChangeSource;
use crate::types::{ResourceGroup, SourceId};

/// A change source as described on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceManifest {
    pub label: String,
    #[serde(default)]
    pub groups: Vec<ResourceGroup>,
}

impl SourceManifest {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            groups: vec![],
        }
    }

    /// Number of resources carrying a non-empty color, across all groups.
    pub fn colored_resources(&self) -> usize {
        self.groups
            .iter()
            .flat_map(|g| g.resources.iter())
            .filter(|r| r.decorations.relevant_color().is_some())
            .count()
    }

    /// Build an in-memory change source seeded with this manifest's groups.
    pub fn into_source(self, id: SourceId) -> MemoryChangeSource {
        MemoryChangeSource::with_groups(id, self.label, self.groups)
    }
}

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.decor/`
pub fn decor_root(home: &Path) -> PathBuf {
    home.join(".decor")
}

/// `<home>/.decor/sources/`. Pure, no I/O.
pub fn sources_dir_at(home: &Path) -> PathBuf {
    decor_root(home).join("sources")
}

/// `<home>/.decor/sources/<id>.yaml`. Pure, no I/O.
pub fn manifest_path_at(home: &Path, id: &SourceId) -> PathBuf {
    sources_dir_at(home).join(format!("{}.yaml", id.0))
}

/// Source id for a manifest path: the file stem of a `*.yaml` file.
pub fn source_id_for_path(path: &Path) -> Option<SourceId> {
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("yaml"))
        .unwrap_or(false);
    if !is_yaml {
        return None;
    }
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(SourceId::from)
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load the manifest for `id`.
///
/// Returns `DecorError::ManifestNotFound` if absent,
/// `DecorError::Parse` (with path + line context) if malformed YAML.
pub fn load_manifest_at(home: &Path, id: &SourceId) -> Result<SourceManifest, DecorError> {
    validate_id(id)?;
    let path = manifest_path_at(home, id);
    if !path.exists() {
        return Err(DecorError::ManifestNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| DecorError::Parse { path, source: e })
}

/// `load_manifest_at` convenience wrapper.
pub fn load_manifest(id: &SourceId) -> Result<SourceManifest, DecorError> {
    load_manifest_at(&home()?, id)
}

/// Ids of every `<home>/.decor/sources/*.yaml`, sorted.
///
/// A missing sources directory yields an empty list. Temporary `.yaml.tmp`
/// siblings are ignored.
pub fn list_source_ids_at(home: &Path) -> Result<Vec<SourceId>, DecorError> {
    let dir = sources_dir_at(home);
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut ids: Vec<SourceId> = std::fs::read_dir(&dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|e| source_id_for_path(&e.path()))
        .collect();
    ids.sort();
    Ok(ids)
}

/// Load every `<home>/.decor/sources/*.yaml`, sorted by source id.
///
/// Fails on the first manifest that cannot be read or parsed.
pub fn list_manifests_at(home: &Path) -> Result<Vec<(SourceId, SourceManifest)>, DecorError> {
    list_source_ids_at(home)?
        .into_iter()
        .map(|id| load_manifest_at(home, &id).map(|manifest| (id, manifest)))
        .collect()
}

/// `list_manifests_at` convenience wrapper.
pub fn list_manifests() -> Result<Vec<(SourceId, SourceManifest)>, DecorError> {
    list_manifests_at(&home()?)
}

// ---------------------------------------------------------------------------
// 3. Save (atomic) / remove
// ---------------------------------------------------------------------------

/// Atomically save a manifest to `<home>/.decor/sources/<id>.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
/// `.tmp` is always in the same directory as the target (same filesystem).
pub fn save_manifest_at(
    home: &Path,
    id: &SourceId,
    manifest: &SourceManifest,
) -> Result<(), DecorError> {
    validate_id(id)?;
    ensure_sources_dir_at(home)?;
    let path = manifest_path_at(home, id);
    let tmp_path = path.with_file_name(format!("{}.yaml.tmp", id.0));

    let yaml = serde_yaml::to_string(manifest)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// `save_manifest_at` convenience wrapper.
pub fn save_manifest(id: &SourceId, manifest: &SourceManifest) -> Result<(), DecorError> {
    save_manifest_at(&home()?, id, manifest)
}

/// Delete the manifest for `id`. Returns `ManifestNotFound` if absent.
pub fn remove_manifest_at(home: &Path, id: &SourceId) -> Result<(), DecorError> {
    validate_id(id)?;
    let path = manifest_path_at(home, id);
    if !path.exists() {
        return Err(DecorError::ManifestNotFound { path });
    }
    std::fs::remove_file(&path)?;
    Ok(())
}

/// `remove_manifest_at` convenience wrapper.
pub fn remove_manifest(id: &SourceId) -> Result<(), DecorError> {
    remove_manifest_at(&home()?, id)
}

/// Create `<home>/.decor/sources/` (mode `0700`) if it does not yet exist.
pub fn ensure_sources_dir_at(home: &Path) -> Result<PathBuf, DecorError> {
    let dir = sources_dir_at(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

pub(crate) fn home() -> Result<PathBuf, DecorError> {
    dirs::home_dir().ok_or(DecorError::HomeNotFound)
}

fn validate_id(id: &SourceId) -> Result<(), DecorError> {
    let bad = id.0.is_empty()
        || id.0 == "."
        || id.0 == ".."
        || id.0.contains(['/', '\\']);
    if bad {
        return Err(DecorError::InvalidSourceId(id.0.clone()));
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), DecorError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), DecorError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), DecorError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), DecorError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
