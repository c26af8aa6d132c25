//! Core types and configuration for portable.
//!
//! This crate defines the `bundles.toml` schema ([`BundlesConfig`]), the
//! supported distro versions ([`Dver`]), repository selection ([`OsgRepo`]),
//! image tag sanitizing, and shared error types.

pub mod config;
pub mod dver;
pub mod error;
pub mod tag;

pub use config::{BUNDLES_FILE, BundleConfig, BundlesConfig, GlobalConfig, TarballName};
pub use dver::{Dver, OsgRepo};
pub use error::{Error, Result};
pub use tag::sanitize_image_tag;
