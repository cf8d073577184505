use anyhow::Result;
use std::io::Write;

use crate::session::SyncSession;

/// Handle the logout command
/// Forget the stored token and drop the connection
pub fn handle<W: Write>(session: &SyncSession, output: &mut W) -> Result<()> {
    session.log_out()?;
    writeln!(output, "Logged out")?;
    Ok(())
}
