//! Stage 2: turn an extracted image layer into a relocatable tarball.
//!
//! ```text
//! Preparing → Cleaning → Extracting → [Patching] → FixingPermissions → Assembling
//! ```
//!
//! Any failing step ends the run; nothing is retried. Permission fixing is
//! the exception: a non-zero `chmod` is logged and the run continues. The
//! stage directory is never removed here, so a failed run can be inspected.

use std::error::Error as _;
use std::fmt;
use std::path::{Path, PathBuf};

use portable_core::Dver;
use portable_exec::ToolExecutor;

use crate::assemble::{self, AssembleError};
use crate::layer::{self, LayerError};
use crate::patch::{self, PatchError};
use crate::permissions;
use crate::whiteout::{self, WhiteoutError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage2Step {
    Preparing,
    Cleaning,
    Extracting,
    Patching,
    FixingPermissions,
    Assembling,
}

impl fmt::Display for Stage2Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage2Step::Preparing => "preparing stage dir",
            Stage2Step::Cleaning => "deleting .wh. files from layer tarball",
            Stage2Step::Extracting => "extracting layer tarball",
            Stage2Step::Patching => "patching packages",
            Stage2Step::FixingPermissions => "fixing permissions",
            Stage2Step::Assembling => "creating tarball",
        })
    }
}

/// Inputs for one (bundle, dver) stage 2 run.
#[derive(Debug, Clone)]
pub struct Stage2Request<'a> {
    /// Where the finished tarball goes
    pub tarball: &'a Path,
    /// Extracted top layer, normally `<stage_dir>/layer.tar`
    pub layer_tarball: &'a Path,
    /// Tree the layer is unpacked into; its name is the tarball's top directory
    pub stage_dir: &'a Path,
    pub patch_dirs: &'a [PathBuf],
    pub dver: Dver,
}

/// Runs stage 2, parameterized over the executor for testability.
pub struct Stage2<E: ToolExecutor> {
    executor: E,
}

impl<E: ToolExecutor> Stage2<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Run every step and return the absolute tarball path.
    pub async fn run(&self, request: &Stage2Request<'_>) -> Result<PathBuf, Stage2Error> {
        let dver = request.dver;
        tracing::info!(%dver, stage_dir = %request.stage_dir.display(), "making stage2 tarball");

        let stage_dir_abs = std::path::absolute(request.stage_dir)
            .and_then(|abs| std::fs::create_dir_all(&abs).map(|()| abs))
            .map_err(|e| Stage2Error::StageDir {
                path: request.stage_dir.to_path_buf(),
                source: e,
            })?;
        let layer_abs =
            std::path::absolute(request.layer_tarball).map_err(|e| Stage2Error::StageDir {
                path: request.layer_tarball.to_path_buf(),
                source: e,
            })?;

        step(dver, Stage2Step::Cleaning);
        let markers = whiteout::delete_whiteouts(&self.executor, &layer_abs)
            .await
            .map_err(Stage2Error::Whiteout)?;

        step(dver, Stage2Step::Extracting);
        layer::unpack_layer(&self.executor, &stage_dir_abs, &layer_abs)
            .await
            .map_err(Stage2Error::Extract)?;
        whiteout::prune_whiteout_targets(&stage_dir_abs, &markers)
            .map_err(Stage2Error::Prune)?;

        if !request.patch_dirs.is_empty() {
            step(dver, Stage2Step::Patching);
            let applied =
                patch::apply_patches(&self.executor, &stage_dir_abs, request.patch_dirs).await?;
            tracing::info!(%dver, applied, "patches applied");
        }

        step(dver, Stage2Step::FixingPermissions);
        match permissions::fix_permissions(&self.executor, &stage_dir_abs).await {
            Ok(0) => {}
            Ok(code) => tracing::warn!(%dver, code, "chmod exited non-zero; continuing"),
            // arch-lint: allow(no-error-swallowing) reason="permission fixing is best effort; assembly still runs"
            Err(e) => tracing::warn!(%dver, error = %e, "could not run chmod; continuing"),
        }

        step(dver, Stage2Step::Assembling);
        let tarball = assemble::tar_stage_dir(&self.executor, &stage_dir_abs, request.tarball)
            .await?;

        Ok(tarball)
    }

    /// Run stage 2 and reduce the outcome to success or failure, logging
    /// the reason for a failure.
    ///
    /// This is the entry point for callers that only need a yes/no answer.
    /// [`PortableBuilder`](crate::PortableBuilder) calls [`Stage2::run`] instead so the typed
    /// [`Stage2Error`] reaches the build report.
    pub async fn make_stage2_tarball(&self, request: &Stage2Request<'_>) -> bool {
        match self.run(request).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(dver = %request.dver, step = %e.step(), "{}", e.report());
                false
            }
        }
    }
}

fn step(dver: Dver, step: Stage2Step) {
    tracing::info!(%dver, "{step}");
}

#[derive(Debug, thiserror::Error)]
pub enum Stage2Error {
    #[error("failed to prepare {path}")]
    StageDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Whiteout(WhiteoutError),

    #[error(transparent)]
    Extract(LayerError),

    #[error(transparent)]
    Prune(WhiteoutError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Assemble(#[from] AssembleError),
}

impl Stage2Error {
    /// The step the run aborted in.
    pub fn step(&self) -> Stage2Step {
        match self {
            Stage2Error::StageDir { .. } => Stage2Step::Preparing,
            Stage2Error::Whiteout(_) => Stage2Step::Cleaning,
            Stage2Error::Extract(_) | Stage2Error::Prune(_) => Stage2Step::Extracting,
            Stage2Error::Patch(_) => Stage2Step::Patching,
            Stage2Error::Assemble(_) => Stage2Step::Assembling,
        }
    }

    /// The error and all of its causes on one line.
    pub fn report(&self) -> String {
        let mut report = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            report.push_str(": ");
            report.push_str(&cause.to_string());
            source = cause.source();
        }
        report
    }
}
