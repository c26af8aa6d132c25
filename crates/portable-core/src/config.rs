use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Dver;

/// Default file name of the bundle configuration.
pub const BUNDLES_FILE: &str = "bundles.toml";

/// bundles.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundlesConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub bundles: BTreeMap<String, BundleConfig>,
    /// Directory the config was loaded from; relative paths resolve against it.
    #[serde(skip)]
    pub base_dir: PathBuf,
    #[serde(skip)]
    pub source_path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Bundles built when none are named on the command line
    #[serde(default)]
    pub default_bundles: Vec<String>,
}

/// One named package set that becomes one tarball per distro version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Top-level directory name inside the tarball
    pub dirname: String,
    /// Distro versions this bundle supports
    pub dvers: Vec<Dver>,
    /// Pre-rendered container build file, relative to the config directory
    pub dockerfile: PathBuf,
    /// Packages installed into the image (passed as the PACKAGES build arg)
    #[serde(default)]
    pub packages: Vec<String>,
    /// Tarball file name pattern; `{version}`, `{relnum}` and `{dver}` are substituted
    pub tarballname: String,
    /// Package whose version becomes the tarball version when none is given
    #[serde(default)]
    pub versionrpm: Option<String>,
    /// Patch directories, relative to the config directory; `{dver}` is substituted
    #[serde(default)]
    pub patchdirs: Vec<String>,
}

/// Values substituted into [`BundleConfig::tarballname`].
#[derive(Debug, Clone, Copy)]
pub struct TarballName<'a> {
    pub version: &'a str,
    pub relnum: &'a str,
    pub dver: Dver,
}

impl BundlesConfig {
    /// Load and parse the bundle configuration at `path`.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| crate::Error::ConfigLoad {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut config: Self = toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            // arch-lint: allow(no-silent-result-drop) reason="a bare file name lives in the current directory"
            .unwrap_or_else(|| PathBuf::from("."));
        config.source_path = path.to_path_buf();
        tracing::debug!(path = %path.display(), bundles = config.bundles.len(), "loaded bundle config");
        Ok(config)
    }

    pub fn bundle(&self, name: &str) -> crate::Result<&BundleConfig> {
        self.bundles
            .get(name)
            .ok_or_else(|| crate::Error::UnknownBundle {
                name: name.to_owned(),
                available: self.bundles.keys().cloned().collect(),
            })
    }

    /// Bundles to build when the caller did not name any.
    pub fn default_bundles(&self) -> crate::Result<&[String]> {
        if self.global.default_bundles.is_empty() {
            return Err(crate::Error::NoDefaultBundles {
                path: self.source_path.clone(),
            });
        }
        Ok(&self.global.default_bundles)
    }
}

impl BundleConfig {
    /// Distro versions to build: the bundle's own, optionally narrowed to `only`.
    pub fn selected_dvers(&self, only: Option<Dver>) -> Vec<Dver> {
        let mut dvers: Vec<Dver> = self
            .dvers
            .iter()
            .copied()
            .filter(|d| only.is_none_or(|o| o == *d))
            .collect();
        dvers.sort();
        dvers.dedup();
        dvers
    }

    pub fn dockerfile_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.dockerfile)
    }

    /// Patch directories for `dver`, resolved against `base_dir`.
    pub fn patch_dirs(&self, dver: Dver, base_dir: &Path) -> Vec<PathBuf> {
        self.patchdirs
            .iter()
            .map(|dir| base_dir.join(dir.replace("{dver}", dver.as_str())))
            .collect()
    }

    pub fn tarball_name(&self, values: TarballName<'_>) -> String {
        self.tarballname
            .replace("{version}", values.version)
            .replace("{relnum}", values.relnum)
            .replace("{dver}", values.dver.as_str())
    }
}
