//! External programs that turn one file into another.

use crate::Preset;
use crate::error::{ErrorKind, ExitReport, Result};
use crate::tool::Tool;
use async_trait::async_trait;
use exn::ResultExt;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Longest stderr excerpt kept in a failure cause, in characters.
const MAX_EXCERPT_LEN: usize = 200;
/// Placeholder replaced with the input path in [`CustomCommand`] arguments.
pub const INPUT_PLACEHOLDER: &str = "{input}";
/// Placeholder replaced with the output path in [`CustomCommand`] arguments.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Reads `input` and writes a transformed copy to `output`.
///
/// Implementations only run the tool. Deadlines, cleanup and reporting are
/// the [`Runner`](crate::Runner)'s job, so a dropped future must not leave a
/// process behind.
#[async_trait]
pub trait Transformer: Send + Sync {
    fn name(&self) -> &str;

    async fn transform(&self, input: &Path, output: &Path) -> Result<()>;
}

/// PDF recompression with Ghostscript's `pdfwrite` device.
#[derive(Clone, Debug)]
pub struct Ghostscript {
    tool: Tool,
    preset: Preset,
    compatibility: String,
}
impl Ghostscript {
    pub fn new(tool: Tool) -> Self {
        Self {
            tool,
            preset: Preset::default(),
            compatibility: "1.4".to_string(),
        }
    }

    pub fn with_preset(mut self, preset: Preset) -> Self {
        self.preset = preset;
        self
    }

    /// PDF version to emit, e.g. `1.4`.
    pub fn with_compatibility(mut self, level: impl Into<String>) -> Self {
        self.compatibility = level.into();
        self
    }

    pub fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut output_file = OsString::from("-sOutputFile=");
        output_file.push(output);
        vec![
            "-sDEVICE=pdfwrite".into(),
            format!("-dCompatibilityLevel={}", self.compatibility).into(),
            format!("-dPDFSETTINGS=/{}", self.preset).into(),
            "-dNOPAUSE".into(),
            "-dQUIET".into(),
            "-dBATCH".into(),
            output_file,
            input.into(),
        ]
    }
}
#[async_trait]
impl Transformer for Ghostscript {
    fn name(&self) -> &str {
        "ghostscript"
    }

    async fn transform(&self, input: &Path, output: &Path) -> Result<()> {
        execute(self.tool.path(), self.args(input, output)).await
    }
}

/// Any program taking `{input}` and `{output}` placeholders in its arguments.
///
/// ```
/// use pressroom_transform::CustomCommand;
/// use std::path::Path;
///
/// let cmd = CustomCommand::new("qpdf", ["--linearize", "{input}", "{output}"]);
/// let args = cmd.args(Path::new("/tmp/in.pdf"), Path::new("/tmp/out.pdf"));
/// assert_eq!(args, ["--linearize", "/tmp/in.pdf", "/tmp/out.pdf"]);
/// ```
#[derive(Clone, Debug)]
pub struct CustomCommand {
    name: String,
    program: PathBuf,
    args: Vec<String>,
}
impl CustomCommand {
    pub fn new(program: impl Into<PathBuf>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let program = program.into();
        Self {
            name: program.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
            program,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        self.args
            .iter()
            .map(|arg| match arg.as_str() {
                INPUT_PLACEHOLDER => input.as_os_str().to_os_string(),
                OUTPUT_PLACEHOLDER => output.as_os_str().to_os_string(),
                _ => arg
                    .replace(INPUT_PLACEHOLDER, &input.to_string_lossy())
                    .replace(OUTPUT_PLACEHOLDER, &output.to_string_lossy())
                    .into(),
            })
            .collect()
    }
}
#[async_trait]
impl Transformer for CustomCommand {
    fn name(&self) -> &str {
        &self.name
    }

    async fn transform(&self, input: &Path, output: &Path) -> Result<()> {
        execute(&self.program, self.args(input, output)).await
    }
}

/// Run `program` to completion, mapping a non-zero exit to [`ErrorKind::Failed`].
///
/// The child is killed if the returned future is dropped before it exits.
async fn execute(program: &Path, args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> Result<()> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    tracing::trace!(program = %program.display(), "Spawning external tool");
    let output = command
        .output()
        .await
        .or_raise(|| ErrorKind::Launch(program.display().to_string()))?;
    if output.status.success() {
        return Ok(());
    }
    // Ghostscript reports most errors on stdout.
    let stderr = match excerpt(&output.stderr) {
        s if s.is_empty() => excerpt(&output.stdout),
        s => s,
    };
    exn::bail!(ErrorKind::Failed(ExitReport { code: output.status.code(), stderr }));
}

/// Last non-empty line of `output`, truncated.
fn excerpt(output: &[u8]) -> String {
    let text = String::from_utf8_lossy(output);
    let line = text.lines().map(str::trim).rfind(|l| !l.is_empty()).unwrap_or_default();
    line.chars().take(MAX_EXCERPT_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ghostscript_args() {
        let gs = Ghostscript::new(Tool::at(std::env::current_exe().unwrap()).unwrap());
        let args = gs.args(Path::new("/in/a.pdf"), Path::new("/out/b.pdf"));
        assert_eq!(
            args,
            [
                "-sDEVICE=pdfwrite",
                "-dCompatibilityLevel=1.4",
                "-dPDFSETTINGS=/ebook",
                "-dNOPAUSE",
                "-dQUIET",
                "-dBATCH",
                "-sOutputFile=/out/b.pdf",
                "/in/a.pdf",
            ]
        );
        let args = gs.with_preset(Preset::Screen).with_compatibility("1.7").args(Path::new("a"), Path::new("b"));
        assert!(args.contains(&OsString::from("-dPDFSETTINGS=/screen")));
        assert!(args.contains(&OsString::from("-dCompatibilityLevel=1.7")));
    }

    #[test]
    fn test_custom_command_placeholders() {
        let cmd = CustomCommand::new("/usr/bin/tool", ["-o", "{output}", "--in={input}"]);
        assert_eq!(cmd.name(), "tool");
        let args = cmd.args(Path::new("/a.pdf"), Path::new("/b.pdf"));
        assert_eq!(args, ["-o", "/b.pdf", "--in=/a.pdf"]);
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt(b"first\nsecond line\n\n  \n"), "second line");
        assert_eq!(excerpt(b""), "");
        assert_eq!(excerpt("x".repeat(500).as_bytes()).len(), MAX_EXCERPT_LEN);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_reports_exit_code() {
        let err = execute(Path::new("sh"), ["-c", "echo 'bad input' >&2; exit 3"]).await.unwrap_err();
        match &*err {
            ErrorKind::Failed(report) => {
                assert_eq!(report.code, Some(3));
                assert_eq!(report.stderr, "bad input");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_execute_missing_program() {
        let err = execute(Path::new("/definitely/not/a/program"), ["x"]).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Launch(_)));
    }
}
