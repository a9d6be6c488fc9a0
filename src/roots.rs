use std::ffi::OsString;

use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};

use crate::templates;

/// Environment variable holding extra package roots, separated like `PATH`.
pub const ROOTS_ENV: &str = "REACTIFY_PACKAGE_ROOTS";

/// Source of installed-package root directories. The first root is the one
/// scaffolding copies from.
pub trait PackageRoots {
    fn package_roots(&self) -> Result<Vec<Utf8PathBuf>>;
}

/// Roots gathered from command-line flags, the config file, and the
/// environment, falling back to the template bundled in the binary.
#[derive(Debug, Default)]
pub struct SearchPath {
    pub explicit: Vec<Utf8PathBuf>,
    pub configured: Vec<Utf8PathBuf>,
    pub env_value: Option<OsString>,
    /// Where the bundled template gets unpacked; `None` disables the fallback.
    pub bundle_dir: Option<Utf8PathBuf>,
    /// Write the bundled template into `bundle_dir` when it is used. When off,
    /// `bundle_dir` is still returned but nothing touches the disk.
    pub unpack: bool,
}

impl SearchPath {
    pub fn from_environment(
        explicit: Vec<Utf8PathBuf>,
        configured: Vec<Utf8PathBuf>,
        use_bundled: bool,
    ) -> Result<Self> {
        let bundle_dir = if use_bundled {
            Some(default_bundle_dir()?)
        } else {
            None
        };
        Ok(Self {
            explicit,
            configured,
            env_value: std::env::var_os(ROOTS_ENV),
            bundle_dir,
            unpack: true,
        })
    }

    /// Resolve roots without unpacking the bundled template.
    pub fn read_only(mut self) -> Self {
        self.unpack = false;
        self
    }

    /// Whether `root` is the bundled template's package root.
    pub fn is_bundle(&self, root: &Utf8Path) -> bool {
        self.bundle_dir.as_deref() == Some(root)
    }

    fn env_roots(&self) -> Result<Vec<Utf8PathBuf>> {
        let Some(raw) = &self.env_value else {
            return Ok(Vec::new());
        };
        std::env::split_paths(raw)
            .filter(|path| !path.as_os_str().is_empty())
            .map(|path| {
                Utf8PathBuf::from_path_buf(path)
                    .map_err(|_| anyhow!("{} contains a non UTF-8 path", ROOTS_ENV))
            })
            .collect()
    }
}

impl PackageRoots for SearchPath {
    fn package_roots(&self) -> Result<Vec<Utf8PathBuf>> {
        let mut roots: Vec<Utf8PathBuf> = Vec::new();
        let env_roots = self.env_roots()?;
        for root in self.explicit.iter().chain(&self.configured).chain(&env_roots) {
            if !roots.contains(root) {
                roots.push(root.clone());
            }
        }

        if !roots.is_empty() {
            tracing::debug!("package roots: {:?}", roots);
            return Ok(roots);
        }

        let Some(bundle_dir) = &self.bundle_dir else {
            return Ok(roots);
        };
        if self.unpack {
            unpack_bundle(bundle_dir)?;
        } else {
            tracing::debug!("bundled template root {} (not unpacked)", bundle_dir);
        }
        Ok(vec![bundle_dir.clone()])
    }
}

/// Version-scoped cache directory the bundled template is unpacked into.
pub fn default_bundle_dir() -> Result<Utf8PathBuf> {
    let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
    let dir = base.join("reactify").join(env!("CARGO_PKG_VERSION"));
    Utf8PathBuf::from_path_buf(dir).map_err(|_| anyhow!("cache directory must be valid UTF-8"))
}

fn unpack_bundle(bundle_dir: &Utf8Path) -> Result<()> {
    let target = bundle_dir.join(templates::BUNDLE_PREFIX);
    let written = templates::materialize(templates::BUNDLE_PREFIX, &target)
        .with_context(|| format!("unpacking bundled template into {}", target))?;
    if written > 0 {
        tracing::info!("unpacked bundled template into {} ({} files)", target, written);
    } else {
        tracing::debug!("bundled template already present at {}", target);
    }
    Ok(())
}
