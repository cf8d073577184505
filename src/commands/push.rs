//! Handle push command

use std::io::Write;

use anyhow::{Context, Result};

use crate::{error::SyncError, session::SyncSession, workspace::LocalWorkspace};

/// Handle push command - send local changes and record the ids of new files
pub fn handle<W: Write>(
    session: &SyncSession,
    workspace: &LocalWorkspace,
    output: &mut W,
) -> Result<()> {
    let plan = workspace.plan_push()?;

    if plan.is_empty() {
        writeln!(output, "Nothing to push")?;
        return Ok(());
    }

    for name in &plan.deleted {
        writeln!(output, "  deleting {}", name)?;
    }

    let assigned = match session.write_project(&plan.project, &plan.modified) {
        Ok(assigned) => assigned,
        Err(e @ SyncError::RemoteValidation { .. }) => {
            return Err(e).context("The server rejected the script content; fix it and push again")
        }
        Err(e @ SyncError::Transport(_)) => {
            return Err(e).context("A network problem occurred while pushing")
        }
        Err(e) => return Err(e).context("Push failed"),
    };

    for (name, info) in &assigned {
        writeln!(
            output,
            "  created {} ({})",
            name,
            info.document_id().unwrap_or_default()
        )?;
    }

    workspace
        .record_push(&plan, &assigned)
        .context("Pushed, but failed to update the workspace state")?;

    writeln!(
        output,
        "Pushed {} changed and {} deleted file(s)",
        plan.modified.len(),
        plan.deleted.len()
    )?;

    Ok(())
}
