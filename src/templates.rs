use std::fs;

use anyhow::{Context, Result, anyhow};
use camino::Utf8Path;
use rust_embed::RustEmbed;

/// Prefix of the scaffold tree inside the embedded folder.
pub const BUNDLE_PREFIX: &str = "reactify";

#[derive(RustEmbed)]
#[folder = "templates"]
struct Templates;

pub fn get_bytes(path: &str) -> Result<Vec<u8>> {
    let file = Templates::get(path).ok_or_else(|| anyhow!("embedded template `{}` missing", path))?;
    Ok(file.data.as_ref().to_vec())
}

/// Embedded file paths below `prefix`, sorted.
pub fn list(prefix: &str) -> Vec<String> {
    let dir = format!("{}/", prefix.trim_end_matches('/'));
    let mut paths: Vec<String> = Templates::iter()
        .filter(|path| path.starts_with(&dir))
        .map(|path| path.into_owned())
        .collect();
    paths.sort();
    paths
}

pub fn write_to(destination: &Utf8Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent))?;
    }
    fs::write(destination, bytes).with_context(|| format!("writing {}", destination))
}

pub fn write_template(destination: &Utf8Path, template: &str) -> Result<()> {
    let bytes = get_bytes(template)?;
    write_to(destination, &bytes)
}

/// Write every embedded file under `prefix` into `destination`, keeping the
/// relative layout. Files already present with the same size are left alone.
/// Returns how many files were written.
pub fn materialize(prefix: &str, destination: &Utf8Path) -> Result<usize> {
    let entries = list(prefix);
    if entries.is_empty() {
        return Err(anyhow!("no embedded templates under `{}`", prefix));
    }

    let mut written = 0;
    for path in entries {
        let relative = path
            .strip_prefix(prefix)
            .map(|rest| rest.trim_start_matches('/'))
            .unwrap_or(&path);
        let target = destination.join(relative);
        let bytes = get_bytes(&path)?;

        if let Ok(meta) = fs::metadata(&target) {
            if meta.is_file() && meta.len() == bytes.len() as u64 {
                continue;
            }
        }

        write_to(&target, &bytes)?;
        tracing::trace!("materialized {}", target);
        written += 1;
    }
    Ok(written)
}
