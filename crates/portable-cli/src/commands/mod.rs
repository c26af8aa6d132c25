mod build;
mod report;
mod tools;

/// Exit status when a required executable is missing.
pub(crate) const EXIT_TOOL_MISSING: u8 = 127;
/// Exit status when no bundles were named and none are configured as default.
pub(crate) const EXIT_NO_BUNDLES: u8 = 2;

pub use build::{BuildOptions, build};
