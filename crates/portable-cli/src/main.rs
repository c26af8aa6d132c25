mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use portable_core::{BUNDLES_FILE, Dver, OsgRepo};

#[derive(Parser)]
#[command(
    name = "portable",
    about = "Build relocatable, non-root tarballs from container images"
)]
#[command(disable_version_flag = true)]
struct Cli {
    /// Bundles to build (default: [global].default_bundles from the config)
    bundles: Vec<String>,

    /// Version of the tarball; taken from the bundle's versionrpm if not specified
    #[arg(long, short = 'v')]
    version: Option<String>,

    /// Release number; taken from the versionrpm release if not specified, else 1
    #[arg(long, short = 'r')]
    relnum: Option<String>,

    /// Build tarballs for this distro version only (el8, el9, el10)
    #[arg(long, short = 'd')]
    dver: Option<Dver>,

    /// Which OSG repo to use (production, osg, testing, development)
    #[arg(long, default_value_t = OsgRepo::Testing)]
    osg_repo: OsgRepo,

    /// Bundle configuration file
    #[arg(long, short = 'c', default_value = BUNDLES_FILE)]
    config: PathBuf,

    /// Container tool to use instead of the first of docker/podman on PATH
    #[arg(long)]
    container_tool: Option<PathBuf>,

    /// Also remove staging files of failed runs
    #[arg(long)]
    clean_failed: bool,

    /// Directory the tarballs are written to
    #[arg(long, short = 'o', default_value = ".")]
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                // arch-lint: allow(no-silent-result-drop) reason="an unset or invalid RUST_LOG falls back to the info level"
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = commands::BuildOptions {
        bundles: cli.bundles,
        version: cli.version,
        relnum: cli.relnum,
        dver: cli.dver,
        osg_repo: cli.osg_repo,
        config: cli.config,
        container_tool: cli.container_tool,
        clean_failed: cli.clean_failed,
        output_dir: cli.output_dir,
    };

    match commands::build(&options).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
