//! `decor source list|add|remove`

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use tabled::{settings::Style, Table, Tabled};

use decor_core::{
    manifest::{self, SourceManifest},
    types::SourceId,
};

/// Manage change-source manifests.
#[derive(Subcommand, Debug)]
pub enum SourceCommand {
    /// List every manifest with its group and colored-resource counts.
    List,

    /// Create an empty manifest for a new change source.
    Add(AddArgs),

    /// Delete a change source's manifest.
    Remove(RemoveArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Source id; also the manifest file name (e.g. "git" → git.yaml).
    pub id: String,

    /// Human-readable label for the source's decoration type. Defaults to the id.
    #[arg(long, short = 'l')]
    pub label: Option<String>,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    pub id: String,
}

#[derive(Tabled)]
struct SourceRow {
    #[tabled(rename = "source")]
    id: String,
    #[tabled(rename = "label")]
    label: String,
    #[tabled(rename = "groups")]
    groups: usize,
    #[tabled(rename = "colored")]
    colored: usize,
}

pub fn run(cmd: SourceCommand) -> Result<()> {
    let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
    match cmd {
        SourceCommand::List => list(&home),
        SourceCommand::Add(args) => add(&home, args),
        SourceCommand::Remove(args) => remove(&home, args),
    }
}

fn list(home: &Path) -> Result<()> {
    let manifests =
        manifest::list_manifests_at(home).context("failed to load source manifests")?;

    if manifests.is_empty() {
        println!("No sources registered.");
        println!("Run: decor source add <id> --label <label>");
        return Ok(());
    }

    let rows: Vec<SourceRow> = manifests
        .into_iter()
        .map(|(id, manifest)| SourceRow {
            colored: manifest.colored_resources(),
            groups: manifest.groups.len(),
            label: manifest.label,
            id: id.0,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn add(home: &Path, args: AddArgs) -> Result<()> {
    let id = SourceId::from(args.id.clone());
    let path = manifest::manifest_path_at(home, &id);
    if path.exists() {
        bail!("source '{}' already exists at {}", id, path.display());
    }

    let label = args.label.unwrap_or_else(|| args.id.clone());
    manifest::save_manifest_at(home, &id, &SourceManifest::new(label.clone()))
        .with_context(|| format!("failed to create manifest for '{id}'"))?;

    println!("✓ Added source '{id}' ({label})");
    println!("  {}", path.display());
    Ok(())
}

fn remove(home: &Path, args: RemoveArgs) -> Result<()> {
    let id = SourceId::from(args.id);
    manifest::remove_manifest_at(home, &id)
        .with_context(|| format!("failed to remove source '{id}'"))?;
    println!("✓ Removed source '{id}'");
    Ok(())
}
