use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};

use crate::cli::{Cli, Command, ConfigCommand, NewArgs, RootArgs, TemplateCommand};
use crate::config::{self, ReactifyConfig, ResolvedConfigPath};
use crate::platform::Platform;
use crate::roots::SearchPath;
use crate::scaffold::install::{Installer, PackageManager};
use crate::scaffold::{self, ScaffoldRequest};
use crate::templates;

const DEFAULT_DEV_SCRIPT: &str = "dev";

pub fn run(cli: Cli) -> Result<()> {
    let ctx = CliContext::from(&cli);
    ctx.apply_chdir()?;

    match cli.command {
        Command::New(args) => handle_new(&ctx, args),
        Command::Template { command } => handle_template(&ctx, command),
        Command::Config { command } => handle_config(&ctx, command),
    }
}

fn handle_new(ctx: &CliContext, args: NewArgs) -> Result<()> {
    let config = ctx.load_config()?;
    let roots = search_path(&args.roots, &config)?;
    let package_manager = package_manager(args.package_manager.as_deref(), &config);
    let request = ScaffoldRequest {
        app_name: args.name,
        base_dir: ctx.cwd()?,
        platform: Platform::current(),
        install: !args.no_install,
    };

    if ctx.dry_run {
        let roots = roots.read_only();
        let (template_root, plan) = scaffold::preview(&request, &roots)?;
        println!(
            "Template root: {} ({})",
            template_root,
            root_state(&roots, &template_root)
        );
        let total = plan.operations().len();
        for (idx, op) in plan.operations().iter().enumerate() {
            println!("[{}/{}] {}", idx + 1, total, op);
        }
        if request.install {
            println!(
                "[install] {} (in {})",
                package_manager.describe(),
                plan.app_dir()
            );
        }
        println!("    (dry-run) skipped");
        return Ok(());
    }

    let report = scaffold::scaffold(&request, &roots, &package_manager)
        .with_context(|| format!("creating app `{}`", request.app_name))?;

    println!(
        "Created {} from {} ({} files copied)",
        report.app_dir, report.template_root, report.files_copied
    );
    for line in closing_lines(&request.app_name, &package_manager, &config, report.installed) {
        println!("{}", line);
    }
    Ok(())
}

/// Status lines printed once the app exists.
fn closing_lines(
    app_name: &str,
    package_manager: &PackageManager,
    config: &ReactifyConfig,
    installed: bool,
) -> Vec<String> {
    let mut lines = Vec::new();
    if !installed {
        lines.push(format!(
            "Skipped package install; run `{}` inside {} first.",
            package_manager.describe(),
            app_name
        ));
    }
    let dev_script = config.dev_script().unwrap_or(DEFAULT_DEV_SCRIPT);
    lines.push(format!(
        "cd {} and run: {} run {}",
        app_name,
        package_manager.program(),
        dev_script
    ));
    lines.push("Happy hacking!".to_owned());
    lines
}

fn root_state(roots: &SearchPath, root: &Utf8Path) -> &'static str {
    if root.is_dir() {
        "present"
    } else if root.parent().is_some_and(|parent| roots.is_bundle(parent)) {
        "bundled, not yet unpacked"
    } else {
        "missing"
    }
}

fn handle_template(ctx: &CliContext, command: TemplateCommand) -> Result<()> {
    match command {
        TemplateCommand::List => {
            let prefix = format!("{}/", templates::BUNDLE_PREFIX);
            for path in templates::list(templates::BUNDLE_PREFIX) {
                println!("  {}", path.strip_prefix(&prefix).unwrap_or(&path));
            }
            Ok(())
        }
        TemplateCommand::Path(args) => {
            let config = ctx.load_config()?;
            let roots = search_path(&args, &config)?.read_only();
            let root = scaffold::resolve_template_root(&roots, Platform::current())?;
            println!("{} ({})", root, root_state(&roots, &root));
            Ok(())
        }
    }
}

fn handle_config(ctx: &CliContext, command: Option<ConfigCommand>) -> Result<()> {
    let resolved = ctx.resolve_config()?;
    let config_path = resolved.path.clone();
    match command {
        Some(ConfigCommand::Path) => {
            println!("Config path: {} ({})", config_path, resolved.source.as_str());
            Ok(())
        }
        None | Some(ConfigCommand::Show) => {
            if !config_path.exists() {
                println!("No config found at {}; using defaults.", config_path);
                println!("Use `reactify config generate` to scaffold a default configuration.");
                println!("{}", config::format_summary(&ReactifyConfig::default()));
                return Ok(());
            }

            let config = config::load_from_path(&config_path)?;
            println!("Config path: {} ({})", config_path, resolved.source.as_str());
            println!("{}", config::format_summary(&config));
            Ok(())
        }
        Some(ConfigCommand::Check) => {
            let config = config::load_from_path(&config_path)?;
            for root in config.package_roots() {
                if !root.join(scaffold::TEMPLATE_DIR).is_dir() {
                    tracing::warn!(
                        "package root {} has no `{}` folder",
                        root,
                        scaffold::TEMPLATE_DIR
                    );
                }
            }
            println!("Config OK: {} ({})", config_path, resolved.source.as_str());
            println!("{}", config::format_summary(&config));
            Ok(())
        }
        Some(ConfigCommand::Generate { path, force }) => {
            let target = match path {
                Some(path) => utf8(path, "config generate path")?,
                None => config_path,
            };
            if ctx.dry_run {
                println!("Would write example config to {}", target);
                return Ok(());
            }
            config::write_example_config(&target, force)?;
            if force {
                println!("Overwrote config at {}", target);
            } else {
                println!("Wrote example config to {}", target);
            }
            Ok(())
        }
        Some(ConfigCommand::SetPackageManager { name }) => {
            if ctx.dry_run {
                println!("Would set package manager to `{}` in {}", name, config_path);
                return Ok(());
            }
            config::set_package_manager(&config_path, &name)?;
            println!(
                "Package manager set to `{}` in {} ({})",
                name,
                config_path,
                resolved.source.as_str()
            );
            Ok(())
        }
    }
}

fn search_path(args: &RootArgs, config: &ReactifyConfig) -> Result<SearchPath> {
    let explicit = args
        .package_roots
        .iter()
        .map(|root| utf8(root.clone(), "package root"))
        .collect::<Result<Vec<_>>>()?;
    let use_bundled = !args.no_bundled && config.bundled_template();
    SearchPath::from_environment(explicit, config.package_roots(), use_bundled)
}

/// A `--package-manager` flag replaces the configured program and its install arguments.
fn package_manager(flag: Option<&str>, config: &ReactifyConfig) -> PackageManager {
    if let Some(program) = flag {
        return PackageManager::new(program, vec!["install".to_owned()]);
    }
    match config.package_manager_program() {
        Some(program) => {
            let args = config
                .install_args()
                .map(|args| args.to_vec())
                .unwrap_or_else(|| vec!["install".to_owned()]);
            PackageManager::new(program, args)
        }
        None => PackageManager::npm(),
    }
}

fn utf8(path: PathBuf, what: &str) -> Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path).map_err(|_| anyhow!("{} must be valid UTF-8", what))
}

#[derive(Clone, Debug)]
struct CliContext {
    chdir: Option<PathBuf>,
    file: Option<PathBuf>,
    dry_run: bool,
}

impl CliContext {
    fn apply_chdir(&self) -> Result<()> {
        if let Some(path) = &self.chdir {
            std::env::set_current_dir(path)
                .with_context(|| format!("changing directory to {}", path.display()))?;
        }
        Ok(())
    }

    fn cwd(&self) -> Result<Utf8PathBuf> {
        let cwd = std::env::current_dir().context("determining current directory")?;
        utf8(cwd, "current directory")
    }

    fn resolve_config(&self) -> Result<ResolvedConfigPath> {
        config::resolve_path(self.file.as_ref(), &self.cwd()?)
    }

    fn load_config(&self) -> Result<ReactifyConfig> {
        let resolved = self.resolve_config()?;
        tracing::debug!("config {} ({})", resolved.path, resolved.source.as_str());
        config::load_resolved(&resolved)
    }
}

impl From<&Cli> for CliContext {
    fn from(cli: &Cli) -> Self {
        Self {
            chdir: cli.chdir.clone(),
            file: cli.file.clone(),
            dry_run: cli.dry_run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(raw: &str) -> ReactifyConfig {
        toml::from_str(raw).unwrap()
    }

    #[test]
    fn defaults_to_npm_install() {
        let pm = package_manager(None, &ReactifyConfig::default());
        assert_eq!(pm.describe(), "npm install");
        assert_eq!(pm.program(), "npm");
    }

    #[test]
    fn configured_package_manager_keeps_its_arguments() {
        let cfg = config(
            r#"
[package_manager]
program = "pnpm"
install = ["install", "--prefer-offline"]
"#,
        );
        assert_eq!(
            package_manager(None, &cfg).describe(),
            "pnpm install --prefer-offline"
        );
        assert_eq!(package_manager(Some("yarn"), &cfg).describe(), "yarn install");
    }

    #[test]
    fn no_bundled_flag_overrides_config() {
        let args = RootArgs {
            package_roots: vec![PathBuf::from("/flag")],
            no_bundled: true,
        };
        let search = search_path(&args, &config("package_roots = [\"/cfg\"]\n")).unwrap();
        assert_eq!(search.explicit, vec![Utf8PathBuf::from("/flag")]);
        assert_eq!(search.configured, vec![Utf8PathBuf::from("/cfg")]);
        assert!(search.bundle_dir.is_none());
    }

    #[test]
    fn config_can_disable_bundle() {
        let search =
            search_path(&RootArgs::default(), &config("bundled_template = false\n")).unwrap();
        assert!(search.bundle_dir.is_none());
    }

    #[test]
    fn closing_lines_point_at_dev_script() {
        let lines = closing_lines(
            "blog",
            &package_manager(None, &ReactifyConfig::default()),
            &ReactifyConfig::default(),
            true,
        );
        assert_eq!(lines, vec!["cd blog and run: npm run dev", "Happy hacking!"]);
    }

    #[test]
    fn closing_lines_follow_configured_package_manager() {
        let cfg = config(
            r#"
[package_manager]
program = "pnpm"
dev_script = "start"
"#,
        );
        let lines = closing_lines("blog", &package_manager(None, &cfg), &cfg, false);
        assert_eq!(
            lines,
            vec![
                "Skipped package install; run `pnpm install` inside blog first.",
                "cd blog and run: pnpm run start",
                "Happy hacking!",
            ]
        );
    }

    #[test]
    fn unpacked_bundle_root_is_reported_without_writing() {
        let tmp = tempfile::tempdir().unwrap();
        let bundle = Utf8PathBuf::from_path_buf(tmp.path().join("bundle")).unwrap();
        let roots = SearchPath {
            bundle_dir: Some(bundle.clone()),
            ..SearchPath::default()
        }
        .read_only();
        let root = scaffold::resolve_template_root(&roots, Platform::current()).unwrap();
        assert_eq!(root_state(&roots, &root), "bundled, not yet unpacked");
        assert_eq!(root_state(&roots, &bundle.join("elsewhere").join("x")), "missing");
        assert!(!bundle.exists());
    }
}
