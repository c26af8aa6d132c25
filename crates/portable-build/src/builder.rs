use std::path::{Path, PathBuf};

use portable_core::{BundleConfig, Dver, OsgRepo, TarballName};
use portable_exec::{ContainerClient, ContainerError, ImageBuild, RealExecutor, ToolExecutor};

use crate::assemble;
use crate::layer::{self, LAYER_TARBALL, LayerError};
use crate::nvr::{self, Nvr};
use crate::stage2::{Stage2, Stage2Error, Stage2Request};

/// Version used when none is given and none can be read from the image.
pub const UNKNOWN_VERSION: &str = "unknown";
/// Release number used when none is given and none is inferred.
pub const DEFAULT_RELNUM: &str = "1";

/// Everything needed to produce one tarball for one (bundle, dver) pair.
#[derive(Debug, Clone)]
pub struct TarballRequest<'a> {
    pub bundle_name: &'a str,
    pub bundle: &'a BundleConfig,
    /// Directory of the bundle config; build context and relative paths
    pub base_dir: &'a Path,
    pub dver: Dver,
    /// Tag for the image; unique to this run
    pub image_name: &'a str,
    /// Patch directories, already resolved for `dver`
    pub patch_dirs: &'a [PathBuf],
    pub stage_dir: &'a Path,
    /// Where the finished tarball is written
    pub output_dir: &'a Path,
    pub osg_repo: OsgRepo,
    pub version: Option<&'a str>,
    pub relnum: Option<&'a str>,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarballOutcome {
    pub path: PathBuf,
    pub size: u64,
    /// Entries in the tarball; `None` if listing it failed
    pub file_count: Option<usize>,
    pub version: String,
    pub relnum: String,
}

/// Builds tarballs, parameterized over the executor for testability.
pub struct PortableBuilder<E: ToolExecutor = RealExecutor> {
    container: ContainerClient<E>,
    /// Where image exports are written
    work_root: PathBuf,
}

impl<E: ToolExecutor> PortableBuilder<E> {
    pub fn new(container: ContainerClient<E>) -> Self {
        Self {
            container,
            work_root: layer::export_temp_root(),
        }
    }

    /// Put image exports under `work_root` instead of the system temp dir.
    pub fn with_work_root(mut self, work_root: impl Into<PathBuf>) -> Self {
        self.work_root = work_root.into();
        self
    }

    pub fn container(&self) -> &ContainerClient<E> {
        &self.container
    }

    /// Run all the steps to make a non-root tarball.
    ///
    /// On failure the image and stage directory are left in place and named
    /// in the error; on success the image tag is removed.
    pub async fn make_tarball(
        &self,
        request: &TarballRequest<'_>,
    ) -> Result<TarballOutcome, BuildError> {
        let executor = self.container.executor();
        let dver = request.dver;

        let build_args = build_args(request);
        let dockerfile = request.bundle.dockerfile_path(request.base_dir);
        self.container
            .build(&ImageBuild {
                context_dir: request.base_dir,
                dockerfile: &dockerfile,
                tag: request.image_name,
                build_args: &build_args,
            })
            .await
            .map_err(|e| BuildError::ImageBuild { source: e })?;

        std::fs::create_dir_all(request.stage_dir).map_err(|e| BuildError::StageDir {
            path: request.stage_dir.to_path_buf(),
            source: e,
        })?;
        let layer_tarball = request.stage_dir.join(LAYER_TARBALL);
        tracing::info!(%dver, image = request.image_name, "extracting top layer");
        layer::extract_top_layer_in(
            &self.container,
            request.image_name,
            &layer_tarball,
            &self.work_root,
        )
        .await
        .map_err(|e| BuildError::LayerExtraction {
            image: request.image_name.to_owned(),
            source: e,
        })?;

        let (version, relnum) = self.resolve_version(request, &layer_tarball).await;
        let tarball_name = request.bundle.tarball_name(TarballName {
            version: &version,
            relnum: &relnum,
            dver,
        });
        let tarball = request.output_dir.join(&tarball_name);

        tracing::info!(%dver, tarball = %tarball_name, "making stage 2 tarball");
        let tarball = Stage2::new(executor)
            .run(&Stage2Request {
                tarball: &tarball,
                layer_tarball: &layer_tarball,
                stage_dir: request.stage_dir,
                patch_dirs: request.patch_dirs,
                dver,
            })
            .await
            .map_err(|e| BuildError::Stage2 {
                stage_dir: request.stage_dir.to_path_buf(),
                image: request.image_name.to_owned(),
                source: e,
            })?;

        let size = std::fs::metadata(&tarball)
            .map_err(|e| BuildError::ArtifactStat {
                path: tarball.clone(),
                source: e,
            })?
            .len();

        let file_count = match assemble::count_entries(executor, &tarball).await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!(tarball = %tarball.display(), error = %e, "error getting file count");
                None
            }
        };

        // arch-lint: allow(no-error-swallowing) reason="the tarball is already written; a leftover image tag is only reported"
        if let Err(e) = self.container.remove_image(request.image_name).await {
            tracing::warn!(image = request.image_name, error = %e, "failed to clean up image");
        }

        Ok(TarballOutcome {
            path: tarball,
            size,
            file_count,
            version,
            relnum,
        })
    }

    /// Pick the tarball version and release number.
    ///
    /// An explicit version wins. Otherwise the bundle's `versionrpm` is looked
    /// up in the layer's package list, and its release also becomes the
    /// release number unless one was given. Anything missing falls back to
    /// [`UNKNOWN_VERSION`] / [`DEFAULT_RELNUM`].
    pub async fn resolve_version(
        &self,
        request: &TarballRequest<'_>,
        layer_tarball: &Path,
    ) -> (String, String) {
        let (version, inferred_release) = match request.version {
            Some(version) => (version.to_owned(), None),
            None => match self.infer_version(request, layer_tarball).await {
                Some(nvr) => (nvr.version, Some(nvr.release)),
                None => (UNKNOWN_VERSION.to_owned(), None),
            },
        };

        let relnum = request
            .relnum
            .map(str::to_owned)
            .or(inferred_release)
            // arch-lint: allow(no-silent-result-drop) reason="an absent release number means the default release"
            .unwrap_or_else(|| DEFAULT_RELNUM.to_owned());

        (version, relnum)
    }

    async fn infer_version(&self, request: &TarballRequest<'_>, layer_tarball: &Path) -> Option<Nvr> {
        let Some(versionrpm) = request.bundle.versionrpm.as_deref() else {
            tracing::warn!(bundle = request.bundle_name, "no versionrpm configured; version is unknown");
            return None;
        };

        let mut nvrs = match nvr::read_nvrs(self.container.executor(), layer_tarball).await {
            Ok(nvrs) => nvrs,
            Err(e) => {
                tracing::warn!(bundle = request.bundle_name, error = %e, "version is unknown");
                return None;
            }
        };

        let found = nvrs.remove(versionrpm);
        if found.is_none() {
            tracing::warn!(
                bundle = request.bundle_name,
                versionrpm,
                "package not found in image; version is unknown"
            );
        }
        found
    }
}

fn build_args(request: &TarballRequest<'_>) -> Vec<(String, String)> {
    vec![
        ("BUNDLE".to_owned(), request.bundle_name.to_owned()),
        ("DVER".to_owned(), request.dver.to_string()),
        ("PACKAGES".to_owned(), request.bundle.packages.join(" ")),
        ("YUM_FLAGS".to_owned(), request.osg_repo.yum_flags().join(" ")),
    ]
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to build container image")]
    ImageBuild { source: ContainerError },

    #[error("failed to create stage dir {path}")]
    StageDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to extract top layer; image has been left as '{image}'")]
    LayerExtraction { image: String, source: LayerError },

    #[error(
        "making stage 2 tarball unsuccessful; files have been left in '{}', image has been left as '{image}'",
        stage_dir.display()
    )]
    Stage2 {
        stage_dir: PathBuf,
        image: String,
        source: Stage2Error,
    },

    #[error("failed to stat tarball {path}")]
    ArtifactStat {
        path: PathBuf,
        source: std::io::Error,
    },
}
