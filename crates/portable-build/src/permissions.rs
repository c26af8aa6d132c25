use std::path::Path;

use portable_exec::{ToolCommand, ToolError, ToolExecutor};

/// Give the owner read/write on everything under `stage_dir_abs`, plus
/// execute on directories and files that are already executable by someone.
///
/// Returns `chmod`'s exit code; a non-zero code is for the caller to judge.
pub async fn fix_permissions<E: ToolExecutor>(
    executor: &E,
    stage_dir_abs: &Path,
) -> Result<i32, ToolError> {
    let cmd = ToolCommand::new("chmod")
        .args(["-R", "u+rwX"])
        .path_arg(stage_dir_abs);
    executor.status(&cmd).await
}
