use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error(
        "unknown bundle '{name}'; configured bundles: {}",
        format_names(available)
    )]
    UnknownBundle {
        name: String,
        available: Vec<String>,
    },

    #[error("no bundles given and [global].default_bundles is not set in {path}")]
    NoDefaultBundles { path: PathBuf },

    #[error(
        "invalid distro version '{0}' (expected one of: {names})",
        names = crate::Dver::names()
    )]
    InvalidDver(String),

    #[error("invalid OSG repository '{0}' (expected production, osg, testing or development)")]
    InvalidRepo(String),
}

fn format_names(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_owned()
    } else {
        names.join(", ")
    }
}
