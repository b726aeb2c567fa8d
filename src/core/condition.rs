//! Step guard conditions

use crate::core::context::RunContext;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Guard that lets a step run only when a file exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileGuard {
    /// Path template, relative to the working directory unless absolute
    pub path: String,
}

impl FileGuard {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Render the path template for a context
    pub fn render(&self, context: &RunContext) -> String {
        context.render(&self.path)
    }

    /// Resolve the guarded path against a working directory
    pub fn resolve(&self, workdir: &Path, context: &RunContext) -> PathBuf {
        let rendered = PathBuf::from(self.render(context));
        if rendered.is_absolute() {
            rendered
        } else {
            workdir.join(rendered)
        }
    }

    /// Evaluate the guard. Only regular files satisfy it.
    pub fn holds(&self, workdir: &Path, context: &RunContext) -> bool {
        self.resolve(workdir, context).is_file()
    }
}
