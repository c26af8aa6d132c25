use std::path::{Path, PathBuf};

use portable_exec::{ToolCommand, ToolError, ToolExecutor};

use crate::layer::LAYER_TARBALL;

/// tar up the stage dir as `<tarball>`, rooted at its parent so the archive
/// holds a single top-level directory. Every `layer.tar` is left out.
///
/// Returns the absolute path of the written tarball.
pub async fn tar_stage_dir<E: ToolExecutor>(
    executor: &E,
    stage_dir_abs: &Path,
    tarball: &Path,
) -> Result<PathBuf, AssembleError> {
    let tarball_abs = std::path::absolute(tarball).map_err(|e| AssembleError::Resolve {
        path: tarball.to_path_buf(),
        source: e,
    })?;
    let (Some(parent), Some(base)) = (stage_dir_abs.parent(), stage_dir_abs.file_name()) else {
        return Err(AssembleError::InvalidStageDir(stage_dir_abs.to_path_buf()));
    };

    let cmd = ToolCommand::new("tar")
        .arg("-C")
        .path_arg(parent)
        .arg(format!("--exclude={LAYER_TARBALL}"))
        .arg("-czf")
        .path_arg(&tarball_abs)
        .arg(base.to_string_lossy().into_owned());

    executor
        .run(&cmd)
        .await
        .map_err(|e| AssembleError::Tar {
            tarball: tarball_abs.clone(),
            stage_dir: stage_dir_abs.to_path_buf(),
            source: e,
        })?;

    Ok(tarball_abs)
}

/// Number of entries (files, directories, links) in a gzip tarball.
pub async fn count_entries<E: ToolExecutor>(
    executor: &E,
    tarball: &Path,
) -> Result<usize, ToolError> {
    let cmd = ToolCommand::new("tar").arg("-tzf").path_arg(tarball);
    let listing = executor.output(&cmd).await?;
    Ok(String::from_utf8_lossy(&listing)
        .lines()
        .filter(|line| !line.is_empty())
        .count())
}

#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error("failed to resolve tarball path {path}")]
    Resolve {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("stage dir {0} has no parent directory to archive from")]
    InvalidStageDir(PathBuf),

    #[error("unable to create tarball ({tarball}) from stage 2 dir ({stage_dir})")]
    Tar {
        tarball: PathBuf,
        stage_dir: PathBuf,
        source: ToolError,
    },
}
