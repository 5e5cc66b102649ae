//! `decor preview`: one-shot reconciliation of every manifest.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use decor_core::{
    config::load_config_at,
    manifest,
    memory::{DecorationView, MemoryDecorationRegistry, MemorySourceRegistry},
    traits::{ChangeSource, SourceRegistry},
    types::{DecorationTypeId, SourceId},
};
use decor_sync::{Coordinator, CoordinatorOptions};

/// Arguments for `decor preview`.
#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl PreviewArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let preview = build_preview(&home)?;
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&preview)
                    .context("failed to serialize preview JSON")?
            );
            return Ok(());
        }
        print_table(&preview);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct SourcePreview {
    source: SourceId,
    label: String,
    decoration_type: DecorationTypeId,
    decorations: Vec<DecorationView>,
}

#[derive(Tabled)]
struct DecorationRow {
    #[tabled(rename = "resource")]
    resource: String,
    #[tabled(rename = "color")]
    color: String,
    #[tabled(rename = "icon")]
    icon: String,
}

/// Load every manifest into a memory registry, let a coordinator reconcile
/// each source once, and collect what ends up decorated.
fn build_preview(home: &Path) -> Result<Vec<SourcePreview>> {
    let config = load_config_at(home).context("failed to load ~/.decor/config.yaml")?;
    let manifests =
        manifest::list_manifests_at(home).context("failed to load source manifests")?;

    let sources = MemorySourceRegistry::new();
    let decorations = Rc::new(MemoryDecorationRegistry::new());
    let options = CoordinatorOptions::from(&config);
    let prime = options.prime_on_add;
    let mut coordinator = Coordinator::with_options(&sources, decorations.clone(), options);

    for (id, manifest) in manifests {
        let source = manifest.into_source(id);
        sources
            .add(source.clone())
            .with_context(|| format!("failed to activate source '{}'", source.id()))?;
        if !prime {
            source.notify_changed();
        }
    }

    let preview = sources
        .sources()
        .into_iter()
        .filter_map(|source| {
            let id = source.id();
            let ty = coordinator.decoration_type(&id)?;
            Some(SourcePreview {
                label: source.label(),
                decoration_type: ty,
                decorations: decorations.decorations(ty),
                source: id,
            })
        })
        .collect();

    for source in sources.sources() {
        sources.remove(&source.id());
    }
    coordinator.dispose();
    Ok(preview)
}

fn print_table(preview: &[SourcePreview]) {
    if preview.is_empty() {
        println!("No sources registered.");
        println!("Run: decor source add <id> --label <label>");
        return;
    }

    let total: usize = preview.iter().map(|p| p.decorations.len()).sum();
    println!(
        "decor v{} | {} sources | {} decorations",
        env!("CARGO_PKG_VERSION"),
        preview.len(),
        total,
    );

    for entry in preview {
        println!(
            "{} {} ({})",
            entry.label.bold(),
            format!("[{}]", entry.source).bright_black(),
            entry.decoration_type,
        );
        if entry.decorations.is_empty() {
            println!("  nothing decorated");
            continue;
        }
        let rows: Vec<DecorationRow> = entry
            .decorations
            .iter()
            .map(|view| DecorationRow {
                resource: view.resource.to_string(),
                color: view.data.color.clone(),
                icon: icon_summary(view),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }
}

fn icon_summary(view: &DecorationView) -> String {
    match (&view.data.icon.light, &view.data.icon.dark) {
        (Some(light), Some(dark)) if light == dark => light.to_string(),
        (Some(light), Some(dark)) => format!("{light} / {dark}"),
        (Some(icon), None) | (None, Some(icon)) => icon.to_string(),
        (None, None) => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decor_core::{
        config::config_path_at,
        manifest::{save_manifest_at, SourceManifest},
        types::{Resource, ResourceGroup},
    };
    use tempfile::TempDir;

    fn seed(home: &Path) {
        let mut git = SourceManifest::new("Git");
        git.groups.push(ResourceGroup::new(
            "index",
            vec![
                Resource::colored("file:///repo/a.rs", "green"),
                Resource::plain("file:///repo/b.rs"),
            ],
        ));
        save_manifest_at(home, &SourceId::from("git"), &git).expect("save git");
        save_manifest_at(home, &SourceId::from("hg"), &SourceManifest::new("Mercurial"))
            .expect("save hg");
    }

    #[test]
    fn preview_decorates_only_colored_resources() {
        let home = TempDir::new().expect("home");
        seed(home.path());

        let preview = build_preview(home.path()).expect("preview");
        let summary: Vec<(&str, usize)> = preview
            .iter()
            .map(|p| (p.source.0.as_str(), p.decorations.len()))
            .collect();
        assert_eq!(summary, vec![("git", 1), ("hg", 0)]);
        assert_eq!(preview[0].decorations[0].resource.as_str(), "file:///repo/a.rs");
    }

    #[test]
    fn preview_without_priming_matches_primed_result() {
        let home = TempDir::new().expect("home");
        seed(home.path());
        let primed = build_preview(home.path()).expect("primed");

        std::fs::write(config_path_at(home.path()), "prime_on_add: false\n").expect("config");
        let unprimed = build_preview(home.path()).expect("unprimed");

        let counts = |p: &[SourcePreview]| p.iter().map(|e| e.decorations.len()).collect::<Vec<_>>();
        assert_eq!(counts(&primed), counts(&unprimed));
    }

    #[test]
    fn icon_summary_collapses_identical_variants() {
        use decor_core::types::{DecorationData, DecorationIcon, ResourceUri, Severity};

        let view = |light: Option<&str>, dark: Option<&str>| DecorationView {
            resource: ResourceUri::from("file:///a"),
            data: DecorationData {
                severity: Severity::Info,
                color: "green".to_string(),
                icon: DecorationIcon {
                    light: light.map(ResourceUri::from),
                    dark: dark.map(ResourceUri::from),
                },
            },
        };
        assert_eq!(icon_summary(&view(Some("m.svg"), Some("m.svg"))), "m.svg");
        assert_eq!(icon_summary(&view(Some("l.svg"), Some("d.svg"))), "l.svg / d.svg");
        assert_eq!(icon_summary(&view(None, None)), "-");
    }
}
