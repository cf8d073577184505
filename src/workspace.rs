mod local;
mod state;

pub use local::{FileStatus, LocalWorkspace, PushPlan};
pub use state::{TrackedFile, WorkspaceState};
