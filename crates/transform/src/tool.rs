use crate::error::{ErrorKind, Result};
use std::path::{Path, PathBuf};

/// Executable names Ghostscript is installed under, in preference order.
const GHOSTSCRIPT_EXECUTABLES: [&str; 3] = ["gs", "gswin64c", "gswin32c"];

/// A located external executable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tool {
    path: PathBuf,
}
impl Tool {
    /// Find Ghostscript on this machine.
    pub fn discover() -> Result<Self> {
        for exe in GHOSTSCRIPT_EXECUTABLES {
            if let Ok(path) = which::which(exe) {
                tracing::debug!(path = %path.display(), "Discovered Ghostscript in PATH");
                return Ok(Self { path });
            }
        }
        tracing::info!("Ghostscript executable not found in PATH");
        #[cfg(windows)]
        if let Some(path) = program_files() {
            tracing::debug!(path = %path.display(), "Discovered Ghostscript under Program Files");
            return Ok(Self { path });
        }
        exn::bail!(ErrorKind::ToolNotFound);
    }

    /// Use a configured program instead of searching.
    ///
    /// A bare name (`gs`) is looked up in `PATH`; anything with a directory
    /// component must point at an existing file.
    pub fn at(program: impl AsRef<Path>) -> Result<Self> {
        let program = program.as_ref();
        if program.components().count() == 1 {
            return match which::which(program) {
                Ok(path) => Ok(Self { path }),
                Err(_) => exn::bail!(ErrorKind::ToolMissing(program.to_path_buf())),
            };
        }
        match program.is_file() {
            true => Ok(Self { path: program.to_path_buf() }),
            false => exn::bail!(ErrorKind::ToolMissing(program.to_path_buf())),
        }
    }

    /// Resolve `program` if given, otherwise [`discover()`](Self::discover).
    pub fn locate(program: Option<&Path>) -> Result<Self> {
        match program {
            Some(program) => Self::at(program),
            None => Self::discover(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The Windows installer puts each version in its own directory and does not
/// touch `PATH`; take the newest.
#[cfg(windows)]
fn program_files() -> Option<PathBuf> {
    let root = std::env::var_os("ProgramFiles").map(PathBuf::from)?.join("gs");
    let mut versions: Vec<PathBuf> = std::fs::read_dir(root).ok()?.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    versions.sort();
    versions.into_iter().rev().find_map(|dir| {
        ["gswin64c.exe", "gswin32c.exe"].into_iter().map(|exe| dir.join("bin").join(exe)).find(|p| p.is_file())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_missing_path() {
        let err = Tool::at("/definitely/not/here/gs").unwrap_err();
        assert!(matches!(&*err, ErrorKind::ToolMissing(_)));
        let err = Tool::at("pressroom-no-such-program").unwrap_err();
        assert!(matches!(&*err, ErrorKind::ToolMissing(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_at_finds_bare_name_in_path() {
        let tool = Tool::at("sh").unwrap();
        assert!(tool.path().is_absolute());
        assert_eq!(Tool::locate(Some(tool.path())).unwrap(), tool);
    }
}
