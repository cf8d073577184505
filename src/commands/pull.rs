use anyhow::{Context, Result};
use std::io::Write;

use crate::{session::SyncSession, workspace::LocalWorkspace};

/// Handle the pull command
/// Download a script project into the workspace directory
pub fn handle<W: Write>(
    session: &SyncSession,
    workspace: &LocalWorkspace,
    file_id: &str,
    output: &mut W,
) -> Result<()> {
    let project = session
        .read_project_strict(file_id)
        .with_context(|| format!("Failed to read project {}", file_id))?;

    workspace.record_pull(&project)?;

    for name in project.files.keys() {
        writeln!(output, "  {}", name)?;
    }
    writeln!(
        output,
        "Pulled {} file(s) into {}",
        project.files.len(),
        workspace.root().display()
    )?;

    Ok(())
}
