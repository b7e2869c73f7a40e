//! External compiler invocation.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Flag that keeps the compiler from prompting for input.
const NON_INTERACTIVE_FLAG: &str = "--yes";

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Failed to run compiler: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Compiler exited with an error:\n{stderr}")]
    Failed { stderr: String },
}

/// Wrapper around the external compiler binary. The binary is a black box:
/// all the mirror sees is the exit status, captured stderr, and whatever
/// artifact files appear under the package directory.
pub struct Compiler {
    binary: PathBuf,
}

impl Compiler {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Compiles the package rooted at `package_dir`. A non-zero exit is an
    /// error carrying the captured stderr for diagnostics.
    pub async fn compile(&self, package_dir: &Path) -> Result<(), CompileError> {
        debug!("Compiling {:?} with {:?}", package_dir, self.binary);

        let output = Command::new(&self.binary)
            .arg(NON_INTERACTIVE_FLAG)
            .current_dir(package_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(CompileError::Failed {
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}
