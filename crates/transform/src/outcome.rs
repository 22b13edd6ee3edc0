use pressroom_storage::Location;

/// A client-supplied file already persisted to scratch storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
    /// Name as given by the client, untrusted.
    pub name: String,
    pub location: Location,
    pub size: u64,
}
impl UploadedFile {
    pub fn new(name: impl Into<String>, location: Location, size: u64) -> Self {
        Self { name: name.into(), location, size }
    }
}

/// Result of transforming one file. Exactly one is produced per upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransformOutcome {
    Succeeded(Success),
    Failed(Failure),
}
impl TransformOutcome {
    pub fn source_name(&self) -> &str {
        match self {
            TransformOutcome::Succeeded(s) => &s.source_name,
            TransformOutcome::Failed(f) => &f.source_name,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TransformOutcome::Succeeded(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Success {
    pub source_name: String,
    /// Name the output should carry when handed back to the client.
    pub display_name: String,
    pub output: Location,
    pub size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub source_name: String,
    pub cause: String,
}

/// Client-facing name for the output of `source_name`.
///
/// Only the final path component of the client name is kept, since it may
/// end up as an archive member name.
pub fn display_name(prefix: &str, source_name: &str) -> String {
    let base = source_name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    match base.is_empty() {
        true => format!("{prefix}document.pdf"),
        false => format!("{prefix}{base}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("compressed_", "report.pdf", "compressed_report.pdf")]
    #[case("compressed_", "my report.pdf", "compressed_my report.pdf")]
    #[case("compressed_", "../../evil.pdf", "compressed_evil.pdf")]
    #[case("compressed_", "C:\\docs\\scan.pdf", "compressed_scan.pdf")]
    #[case("compressed_", "", "compressed_document.pdf")]
    #[case("", "report.pdf", "report.pdf")]
    fn test_display_name(#[case] prefix: &str, #[case] source: &str, #[case] expected: &str) {
        assert_eq!(display_name(prefix, source), expected);
    }
}
