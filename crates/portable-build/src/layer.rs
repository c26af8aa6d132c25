//! Top-layer extraction from a container image export.
//!
//! `docker save` / `podman save` produce an uncompressed tar holding a
//! `manifest.json` and one archive per layer. The manifest is an array of
//! image records; each record's `Layers` lists its layer archives oldest
//! first. We take the first record and its last layer. That ordering is how
//! current docker and podman write the export, not something the format
//! guarantees, so a tool change here would show up as the wrong layer.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Component, Path, PathBuf};

use portable_exec::{ContainerClient, ContainerError, ToolCommand, ToolError, ToolExecutor};
use serde::Deserialize;

/// File name of the extracted layer inside the stage directory. It is
/// excluded from the final tarball.
pub const LAYER_TARBALL: &str = "layer.tar";

const EXPORT_FILE: &str = "image.tar";
const MANIFEST_FILE: &str = "manifest.json";
const WORKDIR_PREFIX: &str = "portabletmp";

#[derive(Debug, Deserialize)]
struct ManifestRecord {
    #[serde(rename = "Layers", default)]
    layers: Vec<String>,
}

/// Directory for the image export. Exports can be several GB, so the usual
/// small `/tmp` is swapped for `/var/tmp`.
pub fn export_temp_root() -> PathBuf {
    let tmp = std::env::temp_dir();
    if tmp == Path::new("/tmp") {
        PathBuf::from("/var/tmp")
    } else {
        tmp
    }
}

/// Name (inside the export) of the topmost layer described by `manifest`.
pub fn top_layer_name(manifest: &[u8]) -> Result<String, LayerError> {
    let records: Vec<ManifestRecord> =
        serde_json::from_slice(manifest).map_err(|e| LayerError::ManifestParse { source: e })?;
    let first = records.first().ok_or(LayerError::NoImages)?;
    first.layers.last().cloned().ok_or(LayerError::NoLayers)
}

/// Export `image` and save its topmost layer to `dest`.
pub async fn extract_top_layer<E: ToolExecutor>(
    container: &ContainerClient<E>,
    image: &str,
    dest: &Path,
) -> Result<(), LayerError> {
    extract_top_layer_in(container, image, dest, &export_temp_root()).await
}

/// [`extract_top_layer`] with the export placed under `work_root`.
///
/// The work directory is removed on return, whether or not extraction
/// succeeded, and `dest` is only created once the layer has been copied out
/// completely.
pub async fn extract_top_layer_in<E: ToolExecutor>(
    container: &ContainerClient<E>,
    image: &str,
    dest: &Path,
    work_root: &Path,
) -> Result<(), LayerError> {
    let workdir = tempfile::Builder::new()
        .prefix(WORKDIR_PREFIX)
        .tempdir_in(work_root)
        .map_err(|e| LayerError::Workdir {
            path: work_root.to_path_buf(),
            source: e,
        })?;
    let export_path = workdir.path().join(EXPORT_FILE);

    tracing::debug!(image, export = %export_path.display(), "exporting image");
    container
        .save(image, &export_path)
        .await
        .map_err(|e| LayerError::Export { source: e })?;

    let manifest = read_member(&export_path, MANIFEST_FILE)?.ok_or_else(|| {
        LayerError::ManifestMissing {
            image: image.to_owned(),
        }
    })?;
    let layer_name = top_layer_name(&manifest)?;
    tracing::debug!(image, layer = %layer_name, "selected topmost layer");

    let dest_dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut staged = tempfile::NamedTempFile::new_in(&dest_dir).map_err(|e| LayerError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;

    if !copy_member(&export_path, &layer_name, staged.as_file_mut())? {
        return Err(LayerError::LayerMissing { layer: layer_name });
    }

    staged
        .as_file_mut()
        .flush()
        .map_err(|e| LayerError::Write {
            path: dest.to_path_buf(),
            source: e,
        })?;
    staged.persist(dest).map_err(|e| LayerError::Write {
        path: dest.to_path_buf(),
        source: e.error,
    })?;

    Ok(())
}

/// Unpack `layer_tarball` into `stage_dir`.
pub async fn unpack_layer<E: ToolExecutor>(
    executor: &E,
    stage_dir: &Path,
    layer_tarball: &Path,
) -> Result<(), LayerError> {
    let cmd = ToolCommand::new("tar")
        .arg("-xf")
        .path_arg(layer_tarball)
        .arg("-C")
        .path_arg(stage_dir);

    executor
        .run(&cmd)
        .await
        .map_err(|e| LayerError::Unpack {
            layer: layer_tarball.to_path_buf(),
            source: e,
        })
}

/// Read one member of `archive` into memory. `Ok(None)` if it is absent.
fn read_member(archive: &Path, member: &str) -> Result<Option<Vec<u8>>, LayerError> {
    let mut buf = Vec::new();
    if copy_member(archive, member, &mut buf)? {
        Ok(Some(buf))
    } else {
        Ok(None)
    }
}

/// Stream the first entry of `archive` named `member` into `out`.
/// Returns whether the member was found.
fn copy_member(archive: &Path, member: &str, out: &mut impl Write) -> Result<bool, LayerError> {
    let read_err = |e: io::Error| LayerError::Read {
        path: archive.to_path_buf(),
        source: e,
    };

    let file = File::open(archive).map_err(read_err)?;
    let mut tar = tar::Archive::new(BufReader::new(file));

    for entry in tar.entries().map_err(read_err)? {
        let mut entry = entry.map_err(read_err)?;
        let path = entry.path().map_err(read_err)?.into_owned();
        if !same_member(&path, member) {
            continue;
        }
        io::copy(&mut entry, out).map_err(read_err)?;
        return Ok(true);
    }

    Ok(false)
}

/// Compare archive paths ignoring `./` prefixes and trailing slashes.
fn same_member(path: &Path, name: &str) -> bool {
    normal_components(path).eq(normal_components(Path::new(name)))
}

fn normal_components(path: &Path) -> impl Iterator<Item = Component<'_>> {
    path.components().filter(|c| !matches!(c, Component::CurDir))
}

#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    #[error("failed to create export directory under {path}")]
    Workdir { path: PathBuf, source: io::Error },

    #[error("failed to export image")]
    Export { source: ContainerError },

    #[error("could not find manifest.json in the export of {image}")]
    ManifestMissing { image: String },

    #[error("failed to parse manifest.json")]
    ManifestParse { source: serde_json::Error },

    #[error("manifest.json describes no images")]
    NoImages,

    #[error("manifest.json lists no layers for the first image")]
    NoLayers,

    #[error("layer {layer} is listed in manifest.json but missing from the export")]
    LayerMissing { layer: String },

    #[error("failed to read image export {path}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write layer to {path}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to extract layer tarball {layer}")]
    Unpack { layer: PathBuf, source: ToolError },
}
