use std::io::{self, BufRead, BufReader};
use std::process::{Command, Stdio};
use std::thread;

use camino::Utf8Path;

/// Exit state of an install run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InstallStatus {
    code: Option<i32>,
}

impl InstallStatus {
    pub fn from_code(code: Option<i32>) -> Self {
        Self { code }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// `None` when the process was killed by a signal.
    pub fn code(&self) -> Option<i32> {
        self.code
    }
}

/// Something that installs front-end dependencies inside an app directory.
pub trait Installer {
    /// Human readable command line, for status output and errors.
    fn describe(&self) -> String;

    /// Run the install with `dir` as the working directory. `Err` means the
    /// process could not be started at all.
    fn install(&self, dir: &Utf8Path) -> io::Result<InstallStatus>;
}

/// An external package manager such as `npm`, `pnpm` or `yarn`.
#[derive(Clone, Debug)]
pub struct PackageManager {
    program: String,
    install_args: Vec<String>,
}

impl PackageManager {
    pub fn new(program: impl Into<String>, install_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            install_args,
        }
    }

    pub fn npm() -> Self {
        Self::new("npm", vec!["install".to_owned()])
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.install_args.len() + 1);
        argv.push(self.program.clone());
        argv.extend(self.install_args.iter().cloned());
        argv
    }
}

impl Installer for PackageManager {
    fn describe(&self) -> String {
        format_command(&self.argv())
    }

    fn install(&self, dir: &Utf8Path) -> io::Result<InstallStatus> {
        // Resolves `npm.cmd` and friends on Windows.
        let program = which::which(&self.program)
            .map(|path| path.into_os_string())
            .unwrap_or_else(|_| self.program.clone().into());
        tracing::debug!("running {:?} {:?} in {}", program, self.install_args, dir);

        let mut command = Command::new(program);
        command
            .args(&self.install_args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        run_streaming(command)
    }
}

fn run_streaming(mut command: Command) -> io::Result<InstallStatus> {
    let mut child = command.spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stdout_handle = stdout.map(|pipe| {
        thread::spawn(move || {
            for line in BufReader::new(pipe).lines().map_while(Result::ok) {
                println!("     {}", line);
            }
        })
    });

    let stderr_handle = stderr.map(|pipe| {
        thread::spawn(move || {
            for line in BufReader::new(pipe).lines().map_while(Result::ok) {
                eprintln!("     {}", line);
            }
        })
    });

    if let Some(handle) = stdout_handle {
        let _ = handle.join();
    }
    if let Some(handle) = stderr_handle {
        let _ = handle.join();
    }

    let status = child.wait()?;
    Ok(InstallStatus::from_code(status.code()))
}

pub fn format_command(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| {
            if arg.chars().any(|c| c.is_whitespace()) {
                let escaped = arg.replace('"', "\\\"");
                format!("\"{}\"", escaped)
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn npm_is_the_default() {
        assert_eq!(PackageManager::npm().describe(), "npm install");
    }

    #[test]
    fn format_command_quotes_whitespace() {
        let argv = vec!["yarn".to_owned(), "add".to_owned(), "a b".to_owned()];
        assert_eq!(format_command(&argv), "yarn add \"a b\"");
    }

    #[test]
    fn status_success_requires_zero() {
        assert!(InstallStatus::from_code(Some(0)).success());
        assert!(!InstallStatus::from_code(Some(1)).success());
        assert!(!InstallStatus::from_code(None).success());
    }

    #[test]
    fn missing_program_fails_to_start() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        let pm = PackageManager::new("reactify-no-such-package-manager", vec![]);
        assert!(pm.install(&dir).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn runs_in_the_app_directory_and_reports_exit_code() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();

        let ok = PackageManager::new("sh", vec!["-c".into(), "pwd > where.txt".into()]);
        assert!(ok.install(&dir).unwrap().success());
        let recorded = std::fs::read_to_string(dir.join("where.txt")).unwrap();
        let recorded = std::fs::canonicalize(recorded.trim()).unwrap();
        assert_eq!(recorded, std::fs::canonicalize(&dir).unwrap());

        let failing = PackageManager::new("sh", vec!["-c".into(), "exit 3".into()]);
        assert_eq!(failing.install(&dir).unwrap().code(), Some(3));
    }
}
