//! Whiteout handling for a single layer archive.
//!
//! A layer records a deletion from a lower layer as an empty entry named
//! `.wh.<name>` next to the deleted path (`.wh..wh..opq` marks a whole
//! directory opaque). Extracted on their own, these would show up as stray
//! files, so they are removed from the archive before it is unpacked.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use portable_exec::{ToolCommand, ToolError, ToolExecutor};
use regex::Regex;

const WHITEOUT_PREFIX: &str = ".wh.";
const OPAQUE_MARKER: &str = ".wh..wh..opq";

/// Entries passed to one `tar --delete` invocation.
const DELETE_BATCH: usize = 200;

static WHITEOUT_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|/)[.]wh[.]").expect("whiteout pattern is valid"));

pub fn is_whiteout(entry: &str) -> bool {
    WHITEOUT_ENTRY.is_match(entry)
}

/// Delete every whiteout entry from `tarball` in place.
///
/// Returns the removed entry names; an archive without whiteouts is left
/// untouched.
pub async fn delete_whiteouts<E: ToolExecutor>(
    executor: &E,
    tarball: &Path,
) -> Result<Vec<String>, WhiteoutError> {
    // Names must come back byte for byte so `--delete` can match them; the
    // default quoting style octal-escapes anything non-ASCII.
    let list = ToolCommand::new("tar")
        .arg("--quoting-style=literal")
        .arg("-tf")
        .path_arg(tarball);
    let listing = executor
        .output(&list)
        .await
        .map_err(|e| WhiteoutError::List {
            tarball: tarball.to_path_buf(),
            source: e,
        })?;

    let markers: Vec<String> = String::from_utf8_lossy(&listing)
        .lines()
        .filter(|line| is_whiteout(line))
        .map(str::to_owned)
        .collect();

    if markers.is_empty() {
        tracing::debug!(tarball = %tarball.display(), "no whiteout entries");
        return Ok(markers);
    }

    for batch in markers.chunks(DELETE_BATCH) {
        let delete = ToolCommand::new("tar")
            .arg("-f")
            .path_arg(tarball)
            .arg("--delete")
            .args(batch.iter().cloned());
        executor
            .run(&delete)
            .await
            .map_err(|e| WhiteoutError::Delete {
                tarball: tarball.to_path_buf(),
                source: e,
            })?;
    }

    tracing::debug!(tarball = %tarball.display(), count = markers.len(), "deleted whiteout entries");
    Ok(markers)
}

/// Path (relative to the layer root) that a whiteout marker deletes.
///
/// `None` for opaque markers and for anything that would escape the root.
pub fn whiteout_target(marker: &str) -> Option<PathBuf> {
    let marker = Path::new(marker.trim_end_matches('/'));
    let file_name = marker.file_name()?.to_str()?;
    if file_name == OPAQUE_MARKER {
        return None;
    }
    let target_name = file_name.strip_prefix(WHITEOUT_PREFIX)?;
    if target_name.is_empty() {
        return None;
    }

    let target = match marker.parent() {
        Some(parent) => parent.join(target_name),
        None => PathBuf::from(target_name),
    };
    target
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        .then_some(target)
}

/// Remove whatever the given whiteout markers target from the unpacked tree
/// at `root`. Returns how many paths were removed.
pub fn prune_whiteout_targets(root: &Path, markers: &[String]) -> Result<usize, WhiteoutError> {
    let mut removed = 0;
    for target in markers.iter().filter_map(|m| whiteout_target(m)) {
        let path = root.join(&target);
        let meta = match std::fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(WhiteoutError::Prune { path, source: e }),
        };
        let result = if meta.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        result.map_err(|e| WhiteoutError::Prune {
            path: path.clone(),
            source: e,
        })?;
        tracing::debug!(path = %path.display(), "removed whiteout target");
        removed += 1;
    }
    Ok(removed)
}

#[derive(Debug, thiserror::Error)]
pub enum WhiteoutError {
    #[error("failed to list entries of {tarball}")]
    List { tarball: PathBuf, source: ToolError },

    #[error("failed to delete .wh. files from {tarball}")]
    Delete { tarball: PathBuf, source: ToolError },

    #[error("failed to remove whiteout target {path}")]
    Prune {
        path: PathBuf,
        source: std::io::Error,
    },
}
