use std::{collections::HashSet, io::Write, time::Duration};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::{drive::FolderCache, session::SyncSession};

/// Handle the folders command
/// Print the folder tree holding the files matched by `leaf_query`
pub fn handle<W: Write>(session: &SyncSession, leaf_query: &str, output: &mut W) -> Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner} {msg}")
            .context("Failed to create spinner template")?,
    );
    spinner.set_message("Listing folders");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let cache = session.build_folder_cache(leaf_query);
    spinner.finish_and_clear();
    let cache = cache.context("Failed to list folders")?;

    render_tree(&cache, output)
}

/// Write the hierarchy below the root, one record per line, leaves marked with `*`
pub fn render_tree<W: Write>(cache: &FolderCache, output: &mut W) -> Result<()> {
    writeln!(output, "{}", cache.title(cache.root_id()).unwrap_or("My Drive"))?;

    let mut visited = HashSet::new();
    visited.insert(cache.root_id().to_string());

    // (id, depth), depth-first with children in id order
    let mut stack: Vec<(&str, usize)> = cache
        .children_of(cache.root_id())
        .iter()
        .rev()
        .map(|id| (id.as_str(), 1))
        .collect();

    while let Some((id, depth)) = stack.pop() {
        if !visited.insert(id.to_string()) {
            continue;
        }

        let marker = if cache.is_leaf(id) { "*" } else { "" };
        writeln!(
            output,
            "{}{}{}",
            "  ".repeat(depth),
            cache.title(id).unwrap_or(id),
            marker
        )?;

        for child in cache.children_of(id).iter().rev() {
            stack.push((child.as_str(), depth + 1));
        }
    }

    Ok(())
}
