//! Layer extraction and tarball assembly for portable.
//!
//! # Build pipeline
//!
//! ```text
//! portable <bundle>
//!   1. Image build  ── <tool> build -f <dockerfile> -t <bundle>:<run>
//!   2. Top layer    ── <tool> save → manifest.json → Layers[-1] → layer.tar
//!   3. Version      ── versions.txt in layer.tar (unless --version)
//!   4. Stage 2
//!      a. Whiteouts ── tar --delete every `.wh.` entry
//!      b. Extract   ── tar -xf layer.tar -C <stage_dir>
//!      c. Patch     ── patch -p1, sorted by file name
//!      d. Perms     ── chmod -R u+rwX
//!      e. Assemble  ── tar -czf <tarball> --exclude=layer.tar
//!   5. Cleanup      ── <tool> rmi
//! ```
//!
//! Stage 2 ([`stage2::Stage2`]) is the recovery boundary for a single
//! (bundle, dver) run. Every external program goes through
//! [`portable_exec::ToolExecutor`].

pub mod assemble;
pub mod builder;
pub mod layer;
pub mod nvr;
pub mod patch;
pub mod permissions;
pub mod stage2;
pub mod whiteout;

pub use builder::{BuildError, PortableBuilder, TarballOutcome, TarballRequest};
pub use layer::{LAYER_TARBALL, extract_top_layer};
pub use nvr::{Nvr, NvrMap};
pub use stage2::{Stage2, Stage2Error, Stage2Request, Stage2Step};
