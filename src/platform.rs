use camino::{Utf8Path, Utf8PathBuf};

/// Host platform, used to pick the path separator when building the template root.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
}

impl Platform {
    /// Platform the binary is running on.
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Map an OS identifier (as reported by `std::env::consts::OS`) to a platform tag.
    /// Anything that is not Windows or macOS gets the POSIX convention.
    pub fn from_os(os: &str) -> Self {
        match os {
            "windows" => Platform::Windows,
            "macos" => Platform::MacOs,
            "linux" => Platform::Linux,
            other => {
                tracing::debug!("unrecognised platform `{}`, using POSIX separators", other);
                Platform::Linux
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Linux => "linux",
            Platform::MacOs => "macos",
        }
    }

    pub fn separator(&self) -> char {
        match self {
            Platform::Windows => '\\',
            Platform::Linux | Platform::MacOs => '/',
        }
    }

    /// Append `segment` to `root` with this platform's separator.
    pub fn join(&self, root: &Utf8Path, segment: &str) -> Utf8PathBuf {
        let sep = self.separator();
        let trimmed = root.as_str().trim_end_matches(['/', '\\']);
        if trimmed.is_empty() {
            return Utf8PathBuf::from(format!("{sep}{segment}"));
        }
        Utf8PathBuf::from(format!("{trimmed}{sep}{segment}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_os_identifiers() {
        assert_eq!(Platform::from_os("windows"), Platform::Windows);
        assert_eq!(Platform::from_os("linux"), Platform::Linux);
        assert_eq!(Platform::from_os("macos"), Platform::MacOs);
    }

    #[test]
    fn unknown_os_falls_back_to_posix() {
        let platform = Platform::from_os("freebsd");
        assert_eq!(platform, Platform::Linux);
        assert_eq!(platform.separator(), '/');
    }

    #[test]
    fn join_uses_platform_separator() {
        let root = Utf8Path::new("/pkg");
        assert_eq!(Platform::Linux.join(root, "reactify"), "/pkg/reactify");
        assert_eq!(Platform::MacOs.join(root, "reactify"), "/pkg/reactify");

        let win_root = Utf8Path::new(r"C:\Python\Lib\site-packages\");
        assert_eq!(
            Platform::Windows.join(win_root, "reactify").as_str(),
            r"C:\Python\Lib\site-packages\reactify"
        );
    }

    #[test]
    fn join_on_filesystem_root() {
        assert_eq!(Platform::Linux.join(Utf8Path::new("/"), "reactify"), "/reactify");
    }
}
