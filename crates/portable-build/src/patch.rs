use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use portable_exec::{ToolCommand, ToolError, ToolExecutor};

/// Patch files are picked up by this extension.
pub const PATCH_GLOB: &str = "*.patch";

/// Gather every `*.patch` file directly inside `patch_dirs`, sorted by file
/// name. The directory a patch came from does not affect its position.
pub fn collect_patches(patch_dirs: &[PathBuf]) -> Result<Vec<PathBuf>, PatchError> {
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };

    let mut patches = Vec::new();
    for dir in patch_dirs {
        let dir = std::path::absolute(dir).map_err(|e| PatchError::ResolveDir {
            path: dir.clone(),
            source: e,
        })?;
        let pattern = format!(
            "{}/{PATCH_GLOB}",
            Pattern::escape(&dir.to_string_lossy())
        );
        let matches = glob::glob_with(&pattern, options).map_err(|e| PatchError::Pattern {
            pattern: pattern.clone(),
            source: e,
        })?;
        for entry in matches {
            let path = entry.map_err(|e| PatchError::Glob { source: e })?;
            if path.is_file() {
                patches.push(path);
            }
        }
    }

    patches.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(patches)
}

/// Apply all patches from `patch_dirs` to the tree at `stage_dir_abs`.
///
/// Patches are `-p1` and applied in [`collect_patches`] order with the tree
/// as working directory. The first failure stops the run. Returns the
/// number of patches applied.
pub async fn apply_patches<E: ToolExecutor>(
    executor: &E,
    stage_dir_abs: &Path,
    patch_dirs: &[PathBuf],
) -> Result<usize, PatchError> {
    let patches = collect_patches(patch_dirs)?;

    for patch in &patches {
        tracing::info!(patch = %patch.display(), "applying patch");
        let cmd = ToolCommand::new("patch")
            .args(["-p1", "--force", "--input"])
            .path_arg(patch)
            .current_dir(stage_dir_abs);

        executor
            .run(&cmd)
            .await
            .map_err(|e| PatchError::Failed {
                patch: patch.clone(),
                source: e,
            })?;
    }

    Ok(patches.len())
}

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("failed to resolve patch directory {path}")]
    ResolveDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid patch glob {pattern}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("failed to read patch directory entry")]
    Glob { source: glob::GlobError },

    #[error("patch file {patch} failed to apply")]
    Failed { patch: PathBuf, source: ToolError },
}
