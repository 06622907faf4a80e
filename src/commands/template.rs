use anyhow::{Context, Result};
use std::path::PathBuf;

use xhub::codec::{self, TemplateSummary};
use xhub::storage::AssetStore;

/// Restore `file` offline and print what the hub would load from it
pub fn template(file: PathBuf, files_dir: PathBuf) -> Result<()> {
    let text = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read template {}", file.display()))?;

    let label = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let assets = AssetStore::new(files_dir, "xhub_descriptions.json");
    let topology = codec::restore(&label, &text, &assets);
    let summary = TemplateSummary::of(&topology);

    println!("Template: {label}");
    println!("{:-<40}", "");
    println!("  Nodes:       {}", summary.nodes);
    println!("  Servers:     {}", summary.servers);
    println!("  Domains:     {}", summary.domains);
    println!("  Assignments: {}", summary.assignments);
    println!();
    print!("{}", codec::backup(&topology));
    Ok(())
}
