use std::fs::{self, File};
use std::io;
use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use walkdir::WalkDir;

use super::ScaffoldError;
use super::plan::{CopyPlan, Operation};

/// Run every step of `plan` in order. The first failing step aborts the rest;
/// whatever was already written stays on disk.
pub fn execute(plan: &CopyPlan) -> Result<usize, ScaffoldError> {
    let total = plan.operations().len();
    let mut copied = 0;
    for (idx, op) in plan.operations().iter().enumerate() {
        tracing::debug!("[{}/{}] {}", idx + 1, total, op);
        copied += run_operation(op).map_err(|source| ScaffoldError::CopyStepFailed {
            step: op.to_string(),
            source,
        })?;
    }
    Ok(copied)
}

/// Returns the number of files copied.
fn run_operation(op: &Operation) -> io::Result<usize> {
    match op {
        Operation::MakeDir {
            path,
            exclusive: true,
        } => fs::create_dir(path).map(|_| 0),
        Operation::MakeDir {
            path,
            exclusive: false,
        } => fs::create_dir_all(path).map(|_| 0),
        Operation::CopyTree { src, dst } => copy_tree(src, dst),
        Operation::CopyGlob {
            src_dir,
            pattern,
            dst,
        } => copy_glob(src_dir, pattern, dst),
    }
}

fn copy_tree(src: &Utf8Path, dst: &Utf8Path) -> io::Result<usize> {
    if !src.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", src),
        ));
    }

    let dst_permissions = ensure_writable(dst.as_std_path())?;
    let mut copied = 0;
    let mut dirs = Vec::new();
    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        let relative = Utf8Path::from_path(relative).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("non UTF-8 path under {}", src),
            )
        })?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
            ensure_writable(target.as_std_path())?;
            let meta = entry.metadata()?;
            dirs.push((target, meta.permissions(), meta.modified().ok()));
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
            copied += 1;
        } else {
            copy_file(entry.path(), target.as_std_path())?;
            copied += 1;
        }
    }

    // Deepest first, so a read-only parent does not block its children.
    for (dir, permissions, modified) in dirs.into_iter().rev() {
        if let Some(time) = modified {
            if let Err(err) = set_dir_modified(dir.as_std_path(), time) {
                tracing::debug!("could not preserve mtime on {}: {}", dir, err);
            }
        }
        fs::set_permissions(&dir, permissions)?;
    }
    if let Some(permissions) = dst_permissions {
        fs::set_permissions(dst, permissions)?;
    }
    Ok(copied)
}

/// Add owner write permission to `dir`, returning the original permissions
/// when they had to change.
#[cfg(unix)]
fn ensure_writable(dir: &std::path::Path) -> io::Result<Option<fs::Permissions>> {
    use std::os::unix::fs::PermissionsExt;

    let original = fs::metadata(dir)?.permissions();
    let mode = original.mode();
    if mode & 0o200 != 0 {
        return Ok(None);
    }
    fs::set_permissions(dir, fs::Permissions::from_mode(mode | 0o200))?;
    Ok(Some(original))
}

#[cfg(not(unix))]
fn ensure_writable(_dir: &std::path::Path) -> io::Result<Option<fs::Permissions>> {
    Ok(None)
}

fn copy_glob(src_dir: &Utf8Path, pattern: &str, dst: &Utf8Path) -> io::Result<usize> {
    let matcher =
        glob_regex(pattern).map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    let include_hidden = pattern.starts_with('.');

    let mut matches: Vec<Utf8PathBuf> = Vec::new();
    for entry in src_dir.read_dir_utf8()? {
        let entry = entry?;
        let name = entry.file_name();
        if name.starts_with('.') && !include_hidden {
            continue;
        }
        if matcher.is_match(name) && entry.path().is_file() {
            matches.push(entry.into_path());
        }
    }

    if matches.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no files match {}/{}", src_dir, pattern),
        ));
    }

    matches.sort();
    for path in &matches {
        let Some(name) = path.file_name() else {
            continue;
        };
        copy_file(path.as_std_path(), dst.join(name).as_std_path())?;
    }
    Ok(matches.len())
}

/// Translate a shell filename pattern (`*`, `?`) into an anchored regex.
fn glob_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut expr = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(r"[^/\\]*"),
            '?' => expr.push_str(r"[^/\\]"),
            other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    expr.push('$');
    Regex::new(&expr)
}

fn copy_file(src: &std::path::Path, dst: &std::path::Path) -> io::Result<()> {
    // A read-only file left by an earlier copy cannot be opened for writing.
    if let Ok(meta) = fs::symlink_metadata(dst) {
        if !meta.is_dir() {
            fs::remove_file(dst)?;
        }
    }
    // `fs::copy` carries permission bits over.
    fs::copy(src, dst)?;
    let modified = fs::metadata(src)?.modified()?;
    if let Err(err) = set_modified(dst, modified) {
        tracing::debug!("could not preserve mtime on {}: {}", dst.display(), err);
    }
    Ok(())
}

#[cfg(unix)]
fn set_modified(path: &std::path::Path, time: SystemTime) -> io::Result<()> {
    File::open(path)?.set_modified(time)
}

#[cfg(windows)]
fn set_modified(path: &std::path::Path, time: SystemTime) -> io::Result<()> {
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_WRITE_ATTRIBUTES: u32 = 0x0100;
    File::options()
        .access_mode(FILE_WRITE_ATTRIBUTES)
        .open(path)?
        .set_modified(time)
}

#[cfg(not(any(unix, windows)))]
fn set_modified(path: &std::path::Path, time: SystemTime) -> io::Result<()> {
    File::options().write(true).open(path)?.set_modified(time)
}

#[cfg(unix)]
fn set_dir_modified(path: &std::path::Path, time: SystemTime) -> io::Result<()> {
    set_modified(path, time)
}

#[cfg(not(unix))]
fn set_dir_modified(_path: &std::path::Path, _time: SystemTime) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &std::path::Path, dst: &Utf8Path) -> io::Result<()> {
    let target = fs::read_link(src)?;
    if dst.symlink_metadata().is_ok() {
        fs::remove_file(dst)?;
    }
    std::os::unix::fs::symlink(target, dst)
}

#[cfg(not(unix))]
fn copy_symlink(src: &std::path::Path, dst: &Utf8Path) -> io::Result<()> {
    copy_file(src, dst.as_std_path())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf8_tempdir() -> (tempfile::TempDir, Utf8PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        (tmp, path)
    }

    #[test]
    fn glob_matches_like_the_shell() {
        let css = glob_regex("*.css").unwrap();
        assert!(css.is_match("main.css"));
        assert!(!css.is_match("main.css.map"));
        assert!(!css.is_match("main.scss"));

        let single = glob_regex("a?.js").unwrap();
        assert!(single.is_match("ab.js"));
        assert!(!single.is_match("abc.js"));

        let literal = glob_regex("package.json").unwrap();
        assert!(!literal.is_match("packageXjson"));
    }

    #[test]
    fn copy_tree_is_recursive_and_keeps_mtime() {
        let (_tmp, root) = utf8_tempdir();
        let src = root.join("src");
        fs::create_dir_all(src.join("nested").join("deeper")).unwrap();
        fs::write(src.join("top.txt"), "top").unwrap();
        fs::write(src.join("nested").join("deeper").join("leaf.txt"), "leaf").unwrap();
        let dst = root.join("dst");
        fs::create_dir(&dst).unwrap();

        let copied = copy_tree(&src, &dst).unwrap();
        assert_eq!(copied, 2);
        assert_eq!(
            fs::read_to_string(dst.join("nested").join("deeper").join("leaf.txt")).unwrap(),
            "leaf"
        );
        let before = fs::metadata(src.join("top.txt")).unwrap().modified().unwrap();
        let after = fs::metadata(dst.join("top.txt")).unwrap().modified().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn copy_tree_requires_source_dir() {
        let (_tmp, root) = utf8_tempdir();
        let err = copy_tree(&root.join("missing"), &root).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn copy_glob_filters_and_skips_hidden() {
        let (_tmp, root) = utf8_tempdir();
        let src = root.join("src");
        fs::create_dir_all(src.join("sub.css")).unwrap();
        fs::write(src.join("a.css"), "a").unwrap();
        fs::write(src.join("b.txt"), "b").unwrap();
        fs::write(src.join(".hidden.css"), "h").unwrap();
        let dst = root.join("dst");
        fs::create_dir(&dst).unwrap();

        let copied = copy_glob(&src, "*.css", &dst).unwrap();
        assert_eq!(copied, 1);
        assert!(dst.join("a.css").is_file());
        assert!(!dst.join("b.txt").exists());
        assert!(!dst.join(".hidden.css").exists());
        assert!(!dst.join("sub.css").exists());
    }

    #[test]
    fn copy_glob_without_matches_fails() {
        let (_tmp, root) = utf8_tempdir();
        let err = copy_glob(&root, "*.html", &root).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(err.to_string().contains("*.html"));
    }

    #[test]
    fn exclusive_mkdir_fails_when_present() {
        let (_tmp, root) = utf8_tempdir();
        let op = Operation::MakeDir {
            path: root.join("app"),
            exclusive: true,
        };
        run_operation(&op).unwrap();
        let err = run_operation(&op).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[cfg(unix)]
    #[test]
    fn copy_tree_recreates_symlinks() {
        let (_tmp, root) = utf8_tempdir();
        let src = root.join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("real.js"), "x").unwrap();
        std::os::unix::fs::symlink("real.js", src.join("alias.js")).unwrap();
        let dst = root.join("dst");
        fs::create_dir(&dst).unwrap();

        copy_tree(&src, &dst).unwrap();
        let link = fs::read_link(dst.join("alias.js")).unwrap();
        assert_eq!(link, std::path::PathBuf::from("real.js"));
    }

    #[cfg(unix)]
    #[test]
    fn copy_tree_keeps_directory_mtime() {
        use std::time::Duration;

        let (_tmp, root) = utf8_tempdir();
        let src = root.join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("nested").join("leaf.txt"), "leaf").unwrap();
        let stamp = SystemTime::UNIX_EPOCH + Duration::from_secs(1_500_000_000);
        set_modified(src.join("nested").as_std_path(), stamp).unwrap();
        let dst = root.join("dst");
        fs::create_dir(&dst).unwrap();

        copy_tree(&src, &dst).unwrap();
        let copied = fs::metadata(dst.join("nested")).unwrap().modified().unwrap();
        assert_eq!(copied, stamp);
    }

    #[cfg(unix)]
    #[test]
    fn copy_tree_twice_over_read_only_entries() {
        use std::os::unix::fs::PermissionsExt;

        let (_tmp, root) = utf8_tempdir();
        let src = root.join("src");
        let locked = src.join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("frozen.txt"), "v1").unwrap();
        fs::set_permissions(locked.join("frozen.txt"), fs::Permissions::from_mode(0o444)).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();
        let dst = root.join("dst");
        fs::create_dir(&dst).unwrap();

        let first = copy_tree(&src, &dst);
        let second = copy_tree(&src, &dst);
        let mode = fs::metadata(dst.join("locked")).unwrap().permissions().mode();

        for dir in [&locked, &dst.join("locked")] {
            fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).unwrap();
        }
        assert_eq!(first.unwrap(), 1);
        assert_eq!(second.unwrap(), 1);
        assert_eq!(mode & 0o777, 0o555);
        assert_eq!(
            fs::read_to_string(dst.join("locked").join("frozen.txt")).unwrap(),
            "v1"
        );
    }
}
