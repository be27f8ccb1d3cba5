//! Build Layout - where forms are read from and packages are written to

use std::path::{Path, PathBuf};

use crate::slug::sanitize_name;

/// Extension of saved form records in the registry.
pub const FORM_EXTENSION: &str = "json";

/// Prefix of every deploy directory name.
pub const TARGET_PREFIX: &str = "this_";

/// Renderer path, relative to both the source tree and the deploy target.
pub const RENDERER_PATH: &str = "builder/preview.php";

/// Directories created inside every fresh target.
pub const SKELETON_DIRS: [&str; 3] = ["assets/css", "assets/js", "src/builder"];

/// Optional static assets, relative to the assets directory on the source
/// side and to `<target>/assets` on the deploy side.
pub const STATIC_ASSETS: [&str; 3] = ["css/main.css", "js/quote.js", "favicon.png"];

pub const ENTRY_FILE: &str = "index.php";
pub const ACCESS_FILE: &str = ".htaccess";
pub const SERVICE_WORKER_FILE: &str = "sw.js";
pub const README_FILE: &str = "README.md";
pub const MANIFEST_FILE: &str = "build-manifest.json";

/// Source and output directories for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLayout {
    pub forms_dir: PathBuf,
    pub src_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub deploy_base: PathBuf,
}

impl BuildLayout {
    /// Conventional layout under a project root.
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            forms_dir: root.join("data").join("forms"),
            src_dir: root.join("src"),
            assets_dir: root.join("assets"),
            deploy_base: root.join("deploy"),
        }
    }

    /// Deterministic output directory for a display name.
    pub fn target_for(&self, display_name: &str) -> BuildTarget {
        BuildTarget {
            root: self
                .deploy_base
                .join(format!("{}{}", TARGET_PREFIX, sanitize_name(display_name))),
        }
    }

    pub fn renderer_source(&self) -> PathBuf {
        self.src_dir.join(RENDERER_PATH)
    }

    /// `(source, relative destination)` pairs for the optional assets.
    pub fn asset_pairs(&self) -> Vec<(PathBuf, PathBuf)> {
        STATIC_ASSETS
            .iter()
            .map(|rel| (self.assets_dir.join(rel), Path::new("assets").join(rel)))
            .collect()
    }
}

/// Output directory of one build. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    root: PathBuf,
}

impl BuildTarget {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    pub fn renderer(&self) -> PathBuf {
        self.root.join("src").join(RENDERER_PATH)
    }

    pub fn skeleton(&self) -> impl Iterator<Item = PathBuf> + '_ {
        SKELETON_DIRS.iter().map(move |d| self.root.join(d))
    }
}
