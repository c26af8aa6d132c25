use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use portable_build::{PortableBuilder, TarballOutcome, TarballRequest};
use portable_core::{BundleConfig, BundlesConfig, Dver, OsgRepo, sanitize_image_tag};

use super::report::Report;
use super::{EXIT_NO_BUNDLES, EXIT_TOOL_MISSING, tools};

const STAGE_DIR_PREFIX: &str = "stagedir-";

/// Parsed command line.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub bundles: Vec<String>,
    pub version: Option<String>,
    pub relnum: Option<String>,
    pub dver: Option<Dver>,
    pub osg_repo: OsgRepo,
    pub config: PathBuf,
    pub container_tool: Option<PathBuf>,
    pub clean_failed: bool,
    pub output_dir: PathBuf,
}

/// Build a tarball for every selected (bundle, dver) pair.
///
/// A failed run is recorded and the loop moves on; the exit status is
/// non-zero if any run failed.
pub async fn build(options: &BuildOptions) -> anyhow::Result<ExitCode> {
    tracing::info!("Checking required tools");
    let Some(container) = tools::check_tools(options.container_tool.as_deref()) else {
        return Ok(ExitCode::from(EXIT_TOOL_MISSING));
    };

    let config = BundlesConfig::load(&options.config)?;
    let bundles = if options.bundles.is_empty() {
        match config.default_bundles() {
            Ok(defaults) => defaults.to_vec(),
            Err(e) => {
                tracing::error!("{e}");
                return Ok(ExitCode::from(EXIT_NO_BUNDLES));
            }
        }
    } else {
        options.bundles.clone()
    };
    for name in &bundles {
        config.bundle(name)?;
    }

    std::fs::create_dir_all(&options.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            options.output_dir.display()
        )
    })?;

    let builder = PortableBuilder::new(container);
    let mut report = Report::default();

    for name in &bundles {
        let bundle = config.bundle(name)?;
        let dvers = bundle.selected_dvers(options.dver);
        if dvers.is_empty() {
            tracing::info!(
                "Skipping {name} because it is not supported for the selected distro versions"
            );
            continue;
        }

        for dver in dvers {
            let run = Run {
                name,
                bundle,
                base_dir: &config.base_dir,
                dver,
            };
            match run.execute(&builder, options).await? {
                Some(outcome) => report.written(outcome),
                None => report.failed(name, dver),
            }
        }
    }

    report.print();
    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// One (bundle, dver) pair.
struct Run<'a> {
    name: &'a str,
    bundle: &'a BundleConfig,
    base_dir: &'a Path,
    dver: Dver,
}

impl Run<'_> {
    /// `Ok(None)` when the tarball could not be made; the reason is logged.
    async fn execute(
        &self,
        builder: &PortableBuilder,
        options: &BuildOptions,
    ) -> anyhow::Result<Option<TarballOutcome>> {
        let dver = self.dver;
        let stage_parent = tempfile::Builder::new()
            .prefix(&format!("{STAGE_DIR_PREFIX}{dver}-"))
            .tempdir()
            .context("failed to create staging directory")?;
        let stage_dir = stage_parent.path().join(&self.bundle.dirname);
        let image_name = image_name(self.name, stage_parent.path());
        let patch_dirs = self.bundle.patch_dirs(dver, self.base_dir);

        tracing::info!(bundle = self.name, %dver, image = %image_name, "building tarball");
        let request = TarballRequest {
            bundle_name: self.name,
            bundle: self.bundle,
            base_dir: self.base_dir,
            dver,
            image_name: &image_name,
            patch_dirs: &patch_dirs,
            stage_dir: &stage_dir,
            output_dir: &options.output_dir,
            osg_repo: options.osg_repo,
            version: options.version.as_deref(),
            relnum: options.relnum.as_deref(),
        };

        match builder.make_tarball(&request).await {
            Ok(outcome) => {
                tracing::info!("Removing temp dirs");
                // arch-lint: allow(no-error-swallowing) reason="the tarball is already written; a leftover temp dir is only reported"
                if let Err(e) = stage_parent.close() {
                    tracing::warn!(error = %e, "failed to remove staging directory");
                }
                Ok(Some(outcome))
            }
            Err(e) => {
                tracing::error!(bundle = self.name, %dver, "{:#}", anyhow::Error::new(e));
                if options.clean_failed {
                    // arch-lint: allow(no-error-swallowing) reason="the run has already failed; cleanup errors are only reported"
                    if let Err(e) = stage_parent.close() {
                        tracing::warn!(error = %e, "failed to remove staging directory");
                    }
                } else {
                    let kept = stage_parent.keep();
                    tracing::info!(path = %kept.display(), "staging files kept for inspection");
                }
                Ok(None)
            }
        }
    }
}

/// `<bundle>:<run token>`, the token being the staging directory's unique
/// suffix so concurrent invocations never share a tag.
fn image_name(bundle: &str, stage_parent: &Path) -> String {
    let dir_name = stage_parent
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        // arch-lint: allow(no-silent-result-drop) reason="tempdir paths always have a file name"
        .unwrap_or_default();
    // arch-lint: allow(no-silent-result-drop) reason="an unprefixed name is used whole"
    let token = dir_name.strip_prefix(STAGE_DIR_PREFIX).unwrap_or(&dir_name);
    format!(
        "{}:{}",
        sanitize_image_tag(bundle),
        sanitize_image_tag(token)
    )
}
