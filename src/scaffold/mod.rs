pub mod copy;
pub mod install;
pub mod plan;

use std::fs;
use std::io;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::platform::Platform;
use crate::roots::PackageRoots;
use install::Installer;
use plan::{CopyPlan, PlanError};

/// Folder name of the scaffold template inside a package root.
pub const TEMPLATE_DIR: &str = "reactify";

static APP_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{XID_Start}_]\p{XID_Continue}*$").expect("app name pattern is valid")
});

#[derive(Debug, Error)]
pub enum ScaffoldError {
    #[error(
        "`{0}` is not a valid application name (an identifier: letters, digits and underscores, not starting with a digit)"
    )]
    InvalidAppName(String),
    #[error("no installed package roots found")]
    NoPackageRootFound,
    #[error("looking up package roots: {0}")]
    PackageRootLookup(String),
    #[error("template root {0} is not a directory")]
    TemplateRootMissing(Utf8PathBuf),
    #[error(transparent)]
    InvalidPlan(#[from] PlanError),
    #[error("step `{step}` failed")]
    CopyStepFailed {
        step: String,
        #[source]
        source: io::Error,
    },
    #[error("could not start `{command}`")]
    PackageManagerUnavailable {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("`{command}` failed with exit code {code:?}")]
    PackageManagerInstallFailed { command: String, code: Option<i32> },
}

/// Inputs of one scaffold run.
#[derive(Clone, Debug)]
pub struct ScaffoldRequest {
    pub app_name: String,
    /// Directory the application directory is created in.
    pub base_dir: Utf8PathBuf,
    pub platform: Platform,
    /// Run the package manager after copying.
    pub install: bool,
}

#[derive(Debug)]
pub struct ScaffoldReport {
    pub app_dir: Utf8PathBuf,
    pub template_root: Utf8PathBuf,
    pub files_copied: usize,
    pub installed: bool,
}

pub fn validate_app_name(name: &str) -> Result<(), ScaffoldError> {
    if APP_NAME.is_match(name) {
        Ok(())
    } else {
        Err(ScaffoldError::InvalidAppName(name.to_owned()))
    }
}

/// First package root plus the template folder, joined the way `platform` separates paths.
pub fn resolve_template_root(
    roots: &dyn PackageRoots,
    platform: Platform,
) -> Result<Utf8PathBuf, ScaffoldError> {
    let roots = roots
        .package_roots()
        .map_err(|err| ScaffoldError::PackageRootLookup(format!("{err:#}")))?;
    let first = roots.first().ok_or(ScaffoldError::NoPackageRootFound)?;
    let template_root = platform.join(first, TEMPLATE_DIR);
    tracing::debug!(
        "template root {} ({} separators)",
        template_root,
        platform.as_str()
    );
    Ok(template_root)
}

/// Validate the request and compute the copy plan. The template root does not
/// have to exist yet, and nothing is written.
pub fn preview(
    request: &ScaffoldRequest,
    roots: &dyn PackageRoots,
) -> Result<(Utf8PathBuf, CopyPlan), ScaffoldError> {
    validate_app_name(&request.app_name)?;
    let template_root = resolve_template_root(roots, request.platform)?;
    let plan = CopyPlan::build(&template_root, &request.app_name, &request.base_dir)?;
    Ok((template_root, plan))
}

/// Like [`preview`], but the template root must be an existing directory.
pub fn prepare(
    request: &ScaffoldRequest,
    roots: &dyn PackageRoots,
) -> Result<(Utf8PathBuf, CopyPlan), ScaffoldError> {
    let (template_root, plan) = preview(request, roots)?;
    if !template_root.is_dir() {
        return Err(ScaffoldError::TemplateRootMissing(template_root));
    }
    Ok((template_root, plan))
}

/// Copy the template into a new application directory, then install its
/// front-end dependencies. Install failures are returned, not swallowed.
pub fn scaffold(
    request: &ScaffoldRequest,
    roots: &dyn PackageRoots,
    installer: &dyn Installer,
) -> Result<ScaffoldReport, ScaffoldError> {
    let (template_root, plan) = prepare(request, roots)?;

    println!("Creating {} from {}", request.app_name, template_root);
    let files_copied = copy::execute(&plan)?;
    tracing::info!("copied {} files into {}", files_copied, plan.app_dir());

    let app_dir = plan.app_dir().to_path_buf();
    if !request.install {
        return Ok(ScaffoldReport {
            app_dir,
            template_root,
            files_copied,
            installed: false,
        });
    }

    let command = installer.describe();
    match describe_package(&app_dir.join("package.json")) {
        Some(summary) => println!("Installing {} with `{}`", summary, command),
        None => println!("Installing front-end packages with `{}`", command),
    }

    let status = installer
        .install(&app_dir)
        .map_err(|source| ScaffoldError::PackageManagerUnavailable {
            command: command.clone(),
            source,
        })?;
    if !status.success() {
        return Err(ScaffoldError::PackageManagerInstallFailed {
            command,
            code: status.code(),
        });
    }

    Ok(ScaffoldReport {
        app_dir,
        template_root,
        files_copied,
        installed: true,
    })
}

#[derive(Deserialize)]
struct PackageManifest {
    name: Option<String>,
    #[serde(default)]
    dependencies: serde_json::Map<String, Value>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: serde_json::Map<String, Value>,
}

/// Short description of a `package.json`, e.g. `my-app (3 dependencies, 2 dev dependencies)`.
fn describe_package(path: &Utf8Path) -> Option<String> {
    let raw = fs::read_to_string(path).ok()?;
    let manifest: PackageManifest = match serde_json::from_str(&raw) {
        Ok(manifest) => manifest,
        Err(err) => {
            tracing::warn!("could not parse {}: {}", path, err);
            return None;
        }
    };
    let name = manifest.name.as_deref().unwrap_or("front-end packages");
    Some(format!(
        "{} ({} dependencies, {} dev dependencies)",
        name,
        manifest.dependencies.len(),
        manifest.dev_dependencies.len()
    ))
}
