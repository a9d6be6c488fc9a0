use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use toml_edit::{DocumentMut, Item, Table, value};

use crate::templates;

const CONFIG_DIR: &str = ".reactify";
const CONFIG_FILE: &str = "config.toml";

/// Root configuration document, `~/.reactify/config.toml` by default.
#[derive(Debug, Default, Deserialize)]
pub struct ReactifyConfig {
    pub package_roots: Option<Vec<String>>,
    pub bundled_template: Option<bool>,
    pub package_manager: Option<PackageManagerConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PackageManagerConfig {
    pub program: Option<String>,
    pub install: Option<Vec<String>>,
    pub dev_script: Option<String>,
}

impl ReactifyConfig {
    pub fn package_roots(&self) -> Vec<Utf8PathBuf> {
        self.package_roots
            .iter()
            .flatten()
            .filter(|root| !root.trim().is_empty())
            .map(|root| Utf8PathBuf::from(root.as_str()))
            .collect()
    }

    pub fn bundled_template(&self) -> bool {
        self.bundled_template.unwrap_or(true)
    }

    pub fn package_manager_program(&self) -> Option<&str> {
        self.package_manager.as_ref()?.program.as_deref()
    }

    pub fn install_args(&self) -> Option<&[String]> {
        self.package_manager.as_ref()?.install.as_deref()
    }

    pub fn dev_script(&self) -> Option<&str> {
        self.package_manager.as_ref()?.dev_script.as_deref()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigPathSource {
    Explicit,
    Discovered,
    HomeDefault,
}

impl ConfigPathSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigPathSource::Explicit => "explicit",
            ConfigPathSource::Discovered => "discovered",
            ConfigPathSource::HomeDefault => "home-default",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedConfigPath {
    pub path: Utf8PathBuf,
    pub source: ConfigPathSource,
}

/// Pick the config file: explicit `--file`, then the nearest `.reactify/config.toml`
/// walking up from `cwd`, then the one in the home directory.
pub fn resolve_path(explicit: Option<&PathBuf>, cwd: &Utf8Path) -> Result<ResolvedConfigPath> {
    if let Some(path) = explicit {
        let path = Utf8PathBuf::from_path_buf(path.clone())
            .map_err(|_| anyhow!("config path must be valid UTF-8"))?;
        return Ok(ResolvedConfigPath {
            path,
            source: ConfigPathSource::Explicit,
        });
    }

    let mut dir = Some(cwd);
    while let Some(current) = dir {
        let candidate = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if candidate.is_file() {
            return Ok(ResolvedConfigPath {
                path: candidate,
                source: ConfigPathSource::Discovered,
            });
        }
        dir = current.parent();
    }

    let home = dirs::home_dir().ok_or_else(|| anyhow!("unable to determine home directory"))?;
    let path = Utf8PathBuf::from_path_buf(home.join(CONFIG_DIR).join(CONFIG_FILE))
        .map_err(|_| anyhow!("config path must be valid UTF-8"))?;
    Ok(ResolvedConfigPath {
        path,
        source: ConfigPathSource::HomeDefault,
    })
}

/// Load a configuration file from disk and deserialize it.
pub fn load_from_path(path: &Utf8Path) -> Result<ReactifyConfig> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading config {}", path))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path))
}

/// Like [`load_from_path`], but a missing file yields the defaults unless it was
/// named explicitly.
pub fn load_resolved(resolved: &ResolvedConfigPath) -> Result<ReactifyConfig> {
    if !resolved.path.exists() && resolved.source != ConfigPathSource::Explicit {
        tracing::debug!("no config at {}, using defaults", resolved.path);
        return Ok(ReactifyConfig::default());
    }
    load_from_path(&resolved.path)
}

pub fn write_example_config(path: &Utf8Path, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        bail!("{} already exists; rerun with --force to overwrite", path);
    }

    templates::write_template(path, "config/example.config.toml")
}

pub fn set_package_manager(path: &Utf8Path, program: &str) -> Result<()> {
    if program.trim().is_empty() {
        bail!("package manager name must not be empty");
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating directory {}", parent))?;
    }

    let mut doc: DocumentMut = if path.exists() {
        let raw = fs::read_to_string(path).with_context(|| format!("reading config {}", path))?;
        raw.parse()
            .with_context(|| format!("parsing config {}", path))?
    } else {
        DocumentMut::new()
    };

    if !doc.as_table().contains_key("package_manager") {
        doc["package_manager"] = Item::Table(Table::new());
    }
    let table = doc
        .get_mut("package_manager")
        .and_then(Item::as_table_mut)
        .ok_or_else(|| anyhow!("config has non-table `package_manager` entry"))?;
    table.insert("program", value(program));

    fs::write(path, doc.to_string()).with_context(|| format!("writing config {}", path))
}

pub fn format_summary(config: &ReactifyConfig) -> String {
    let mut out = String::new();
    let roots = config.package_roots();
    let roots_display = if roots.is_empty() {
        "<none>".to_string()
    } else {
        roots.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(", ")
    };
    let program = config.package_manager_program().unwrap_or("npm");
    let install = config
        .install_args()
        .map(|args| args.join(" "))
        .unwrap_or_else(|| "install".to_string());

    let _ = writeln!(out, "Package roots: {}", roots_display);
    let _ = writeln!(out, "Bundled template: {}", config.bundled_template());
    let _ = writeln!(out, "Package manager: {} {}", program, install);
    let _ = writeln!(out, "Dev script: {}", config.dev_script().unwrap_or("dev"));
    out
}
