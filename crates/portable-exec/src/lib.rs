//! External tool execution for portable.
//!
//! Every program the pipeline runs (`tar`, `patch`, `chmod`, and the
//! container tool) goes through [`ToolExecutor`], so tests can substitute
//! mocks instead of invoking real binaries.

pub mod container;
pub mod executor;
pub mod tool;

pub use container::{ContainerClient, ContainerError, ImageBuild};
pub use executor::{RealExecutor, ToolExecutor};
pub use tool::{ToolCommand, ToolError};
