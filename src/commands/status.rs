use anyhow::Result;
use std::io::Write;

use crate::workspace::{FileStatus, LocalWorkspace};

/// Handle the status command
/// List local changes since the last pull or push
pub fn handle<W: Write>(workspace: &LocalWorkspace, output: &mut W) -> Result<()> {
    if !workspace.is_tracked() {
        anyhow::bail!(
            "{} is not a synced workspace; pull a project first",
            workspace.root().display()
        );
    }

    let statuses = workspace.status()?;
    let mut clean = true;
    for (name, status) in &statuses {
        let marker = match status {
            FileStatus::New => "new",
            FileStatus::Modified => "modified",
            FileStatus::Deleted => "deleted",
            FileStatus::Unchanged => continue,
        };
        clean = false;
        writeln!(output, "{:>9}  {}", marker, name)?;
    }

    if clean {
        writeln!(output, "Nothing to push ({} file(s) in sync)", statuses.len())?;
    }

    Ok(())
}
