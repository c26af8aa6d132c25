use std::path::{Path, PathBuf};

use crate::executor::{RealExecutor, ToolExecutor};
use crate::tool::{self, ToolCommand, ToolError};

/// Container tools tried, in order, when none is configured.
pub const CONTAINER_TOOLS: &[&str] = &["docker", "podman"];

/// Parameters for one image build.
#[derive(Debug, Clone)]
pub struct ImageBuild<'a> {
    /// Build context directory
    pub context_dir: &'a Path,
    /// Build file (need not live inside the context)
    pub dockerfile: &'a Path,
    pub tag: &'a str,
    /// `--build-arg NAME=VALUE` pairs
    pub build_args: &'a [(String, String)],
}

/// Container image operations, parameterized over the executor for testability.
pub struct ContainerClient<E: ToolExecutor = RealExecutor> {
    executor: E,
    program: String,
}

impl ContainerClient<RealExecutor> {
    /// Use `explicit` if given, otherwise the first of `docker`/`podman` on `PATH`.
    /// Either way the program must resolve to an executable.
    pub fn locate(explicit: Option<&Path>) -> Result<Self, ContainerError> {
        let program = match explicit {
            Some(path) => tool::locate(&path.to_string_lossy()).ok_or_else(|| {
                ContainerError::ToolNotFound {
                    tried: path.display().to_string(),
                }
            })?,
            None => find_container_tool().ok_or_else(|| ContainerError::ToolNotFound {
                tried: CONTAINER_TOOLS.join(", "),
            })?,
        };
        Ok(Self::with_executor(
            RealExecutor,
            program.to_string_lossy().into_owned(),
        ))
    }
}

impl<E: ToolExecutor> ContainerClient<E> {
    pub fn with_executor(executor: E, program: impl Into<String>) -> Self {
        Self {
            executor,
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// The executor shared with the rest of the pipeline.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub async fn build(&self, build: &ImageBuild<'_>) -> Result<(), ContainerError> {
        let mut cmd = ToolCommand::new(&self.program)
            .arg("build")
            .arg("-f")
            .path_arg(build.dockerfile)
            .args(["-t", build.tag]);
        for (name, value) in build.build_args {
            cmd = cmd.arg("--build-arg").arg(format!("{name}={value}"));
        }
        cmd = cmd.path_arg(build.context_dir);

        tracing::info!(tag = build.tag, dockerfile = %build.dockerfile.display(), "building image");
        self.executor
            .run(&cmd)
            .await
            .map_err(|e| ContainerError::Build {
                tag: build.tag.to_owned(),
                source: e,
            })
    }

    /// Export `image` as an uncompressed archive at `dest`.
    pub async fn save(&self, image: &str, dest: &Path) -> Result<(), ContainerError> {
        let cmd = ToolCommand::new(&self.program)
            .args(["save", "-o"])
            .path_arg(dest)
            .arg(image);

        self.executor
            .run(&cmd)
            .await
            .map_err(|e| ContainerError::Save {
                image: image.to_owned(),
                source: e,
            })
    }

    /// Untag `image`.
    pub async fn remove_image(&self, image: &str) -> Result<(), ContainerError> {
        let cmd = ToolCommand::new(&self.program).args(["rmi", image]);

        self.executor
            .run(&cmd)
            .await
            .map_err(|e| ContainerError::Remove {
                image: image.to_owned(),
                source: e,
            })
    }
}

/// First of [`CONTAINER_TOOLS`] found on `PATH`.
pub fn find_container_tool() -> Option<PathBuf> {
    CONTAINER_TOOLS.iter().find_map(|t| tool::locate(t))
}

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("Required executable '{tried}' not found")]
    ToolNotFound { tried: String },

    #[error("failed to build image {tag}")]
    Build { tag: String, source: ToolError },

    #[error("failed to export image {image}")]
    Save { image: String, source: ToolError },

    #[error("failed to remove image {image}")]
    Remove { image: String, source: ToolError },
}
