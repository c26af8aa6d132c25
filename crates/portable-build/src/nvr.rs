use std::collections::HashMap;
use std::path::{Path, PathBuf};

use portable_exec::{ToolCommand, ToolError, ToolExecutor};

/// Package list written by the image build (`rpm -qa | sort`), inside the layer.
pub const VERSIONS_FILE: &str = "portable-xrootd/versions.txt";

/// Name, version and release of one installed package.
///
/// # Examples
///
/// ```
/// use portable_build::Nvr;
///
/// let nvr = Nvr::parse("xrootd-client-libs-5.9.1-1.osg24").unwrap();
/// assert_eq!(nvr.name, "xrootd-client-libs");
/// assert_eq!(nvr.version, "5.9.1");
/// assert_eq!(nvr.release, "1.osg24");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nvr {
    pub name: String,
    pub version: String,
    pub release: String,
}

/// Installed packages keyed by name.
pub type NvrMap = HashMap<String, Nvr>;

impl Nvr {
    /// Split on the last two hyphens, so hyphenated names survive.
    /// `None` when the line has fewer than two hyphens.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.trim().rsplitn(3, '-');
        let release = parts.next()?;
        let version = parts.next()?;
        let name = parts.next()?;
        Some(Self {
            name: name.to_owned(),
            version: version.to_owned(),
            release: release.to_owned(),
        })
    }
}

/// Parse one NVR per line. Unparseable lines are skipped and a later line
/// for the same name replaces an earlier one.
pub fn parse_nvrs(text: &str) -> NvrMap {
    let mut nvrs = NvrMap::new();
    for nvr in text.lines().filter_map(Nvr::parse) {
        nvrs.insert(nvr.name.clone(), nvr);
    }
    nvrs
}

/// Read the package versions recorded in `tarball` without unpacking it.
pub async fn read_nvrs<E: ToolExecutor>(
    executor: &E,
    tarball: &Path,
) -> Result<NvrMap, VersionReadError> {
    let cmd = ToolCommand::new("tar")
        .args(["--to-stdout", "-xf"])
        .path_arg(tarball)
        .arg(VERSIONS_FILE);

    let contents = executor
        .output(&cmd)
        .await
        .map_err(|e| VersionReadError {
            tarball: tarball.to_path_buf(),
            source: e,
        })?;

    Ok(parse_nvrs(&String::from_utf8_lossy(&contents)))
}

#[derive(Debug, thiserror::Error)]
#[error("unable to get versions from {tarball}")]
pub struct VersionReadError {
    pub tarball: PathBuf,
    pub source: ToolError,
}
