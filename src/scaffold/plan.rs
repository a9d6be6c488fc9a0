use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// One filesystem step of a scaffold.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Operation {
    /// Create a directory and any missing parents. An exclusive create fails if
    /// the directory already exists.
    MakeDir { path: Utf8PathBuf, exclusive: bool },
    /// Copy the contents of `src` into `dst`, recursively.
    CopyTree { src: Utf8PathBuf, dst: Utf8PathBuf },
    /// Copy the files directly inside `src_dir` whose names match `pattern`.
    CopyGlob {
        src_dir: Utf8PathBuf,
        pattern: String,
        dst: Utf8PathBuf,
    },
}

impl Operation {
    /// Directory this step writes into.
    pub fn destination(&self) -> &Utf8Path {
        match self {
            Operation::MakeDir { path, .. } => path,
            Operation::CopyTree { dst, .. } | Operation::CopyGlob { dst, .. } => dst,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::MakeDir {
                path,
                exclusive: true,
            } => write!(f, "mkdir {}", path),
            Operation::MakeDir {
                path,
                exclusive: false,
            } => write!(f, "mkdir -p {}", path),
            Operation::CopyTree { src, dst } => write!(f, "copy {}/. -> {}", src, dst),
            Operation::CopyGlob {
                src_dir,
                pattern,
                dst,
            } => write!(f, "copy {}/{} -> {}", src_dir, pattern, dst),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("step {step} (`{operation}`) copies into a directory no earlier step creates")]
    DestinationNotCreated { step: usize, operation: String },
    #[error("step {step} (`{operation}`) writes outside {app_dir}")]
    OutsideAppDir {
        step: usize,
        operation: String,
        app_dir: Utf8PathBuf,
    },
}

/// Ordered filesystem steps that populate one application directory.
///
/// Every copy destination is created by an earlier `MakeDir` (itself or as a
/// parent of a deeper one) and sits inside the application directory. The
/// constructor enforces this, so a `CopyPlan` value is always safe to run in order.
#[derive(Clone, Debug)]
pub struct CopyPlan {
    app_dir: Utf8PathBuf,
    operations: Vec<Operation>,
}

impl CopyPlan {
    pub fn new(app_dir: Utf8PathBuf, operations: Vec<Operation>) -> Result<Self, PlanError> {
        let mut created: Vec<&Utf8Path> = Vec::new();
        for (idx, op) in operations.iter().enumerate() {
            let step = idx + 1;
            let dst = op.destination();
            if !dst.starts_with(&app_dir) {
                return Err(PlanError::OutsideAppDir {
                    step,
                    operation: op.to_string(),
                    app_dir,
                });
            }

            match op {
                Operation::MakeDir { path, .. } => created.push(path),
                Operation::CopyTree { .. } | Operation::CopyGlob { .. } => {
                    if !created.iter().any(|dir| dir.starts_with(dst)) {
                        return Err(PlanError::DestinationNotCreated {
                            step,
                            operation: op.to_string(),
                        });
                    }
                }
            }
        }

        Ok(Self {
            app_dir,
            operations,
        })
    }

    /// The standard React scaffold: `app_name` under `base_dir`, filled from `template_root`.
    pub fn build(
        template_root: &Utf8Path,
        app_name: &str,
        base_dir: &Utf8Path,
    ) -> Result<Self, PlanError> {
        let app = base_dir.join(app_name);
        let src_static = template_root.join("static");
        let src_templates = template_root.join("templates");
        let app_static = app.join("static");
        let app_templates = app.join("templates");

        let mkdir = |path: Utf8PathBuf| Operation::MakeDir {
            path,
            exclusive: false,
        };
        let tree = |src: Utf8PathBuf, dst: Utf8PathBuf| Operation::CopyTree { src, dst };
        let glob = |src_dir: Utf8PathBuf, pattern: &str, dst: Utf8PathBuf| Operation::CopyGlob {
            src_dir,
            pattern: pattern.to_owned(),
            dst,
        };

        let operations = vec![
            Operation::MakeDir {
                path: app.clone(),
                exclusive: true,
            },
            mkdir(app.join("react")),
            mkdir(app_templates.join(app_name)),
            mkdir(app_static.join(app_name).join("css")),
            mkdir(app_static.join(app_name).join("images")),
            mkdir(app_static.join("js")),
            tree(template_root.join("react"), app.join("react")),
            glob(src_templates.clone(), "*.html", app_templates.clone()),
            glob(
                src_templates.join("reactify"),
                "*.html",
                app_templates.join(app_name),
            ),
            tree(src_static.clone(), app_static.clone()),
            tree(src_static.join("js"), app_static.join("js")),
            glob(
                src_static.join("css"),
                "*.css",
                app_static.join(app_name).join("css"),
            ),
            tree(
                src_static.join("images"),
                app_static.join(app_name).join("images"),
            ),
            glob(template_root.to_path_buf(), "*.json", app.clone()),
            glob(template_root.to_path_buf(), "*.js", app.clone()),
        ];

        Self::new(app, operations)
    }

    pub fn app_dir(&self) -> &Utf8Path {
        &self.app_dir
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }
}
