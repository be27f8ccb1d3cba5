//! Build This - deploy packager for saved builder forms
//!
//! Scans the form registry, and for each selected form assembles a
//! self-contained directory under `deploy/this_<name>/`:
//! 1. A generated `index.php` embedding the form payload
//! 2. The preview renderer and static assets
//! 3. `.htaccess`, a fresh service worker and a deploy README
//! 4. A build manifest with a digest of every file

pub mod artifacts;
pub mod assets;
pub mod hashing;
pub mod layout;
pub mod menu;
pub mod pipeline;
pub mod registry;
pub mod slug;

pub use artifacts::BuildContext;
pub use hashing::{canonical_json, compute_manifest_hash, sha256_hex};
pub use layout::{BuildLayout, BuildTarget};
pub use menu::{Selection, SelectionError};
pub use pipeline::{BuildError, BuildManifest, BuildPipeline, BuildSummary, Step, StepEvent, StepFailure};
pub use registry::{FormRecord, RegistryError};
pub use slug::sanitize_name;

pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");
