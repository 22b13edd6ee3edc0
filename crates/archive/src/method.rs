use crate::error::{Error, ErrorKind};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use zip::CompressionMethod;

/// How members are stored inside the container.
///
/// Variants gated behind feature flags (`bzip2`, `zstd`) are only available
/// when the corresponding feature is enabled. Defaults to
/// [`Deflated`](Self::Deflated), which every unzip tool understands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Method {
    /// No compression. Recompressed PDFs rarely shrink further.
    Stored,
    #[default]
    Deflated,
    #[cfg(feature = "bzip2")]
    Bzip2,
    #[cfg(feature = "zstd")]
    Zstd,
}
impl Method {
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Stored => "stored",
            Method::Deflated => "deflated",
            #[cfg(feature = "bzip2")]
            Method::Bzip2 => "bzip2",
            #[cfg(feature = "zstd")]
            Method::Zstd => "zstd",
        }
    }

    pub(crate) fn zip_method(&self) -> CompressionMethod {
        match self {
            Method::Stored => CompressionMethod::Stored,
            Method::Deflated => CompressionMethod::Deflated,
            #[cfg(feature = "bzip2")]
            Method::Bzip2 => CompressionMethod::Bzip2,
            #[cfg(feature = "zstd")]
            Method::Zstd => CompressionMethod::Zstd,
        }
    }
}
impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
impl FromStr for Method {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stored" | "store" | "none" => Ok(Method::Stored),
            "deflated" | "deflate" => Ok(Method::Deflated),
            #[cfg(feature = "bzip2")]
            "bzip2" | "bz2" => Ok(Method::Bzip2),
            #[cfg(not(feature = "bzip2"))]
            "bzip2" | "bz2" => exn::bail!(ErrorKind::DisabledMethod(s.to_string())),
            #[cfg(feature = "zstd")]
            "zstd" | "zst" => Ok(Method::Zstd),
            #[cfg(not(feature = "zstd"))]
            "zstd" | "zst" => exn::bail!(ErrorKind::DisabledMethod(s.to_string())),
            _ => exn::bail!(ErrorKind::UnsupportedMethod(s.to_string())),
        }
    }
}

/// What a batch with exactly one successful file is delivered as.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Packaging {
    /// Always a container, even for one member.
    #[default]
    Archive,
    /// The single output file itself.
    Bare,
}
impl Packaging {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Packaging::Archive => "archive",
            Packaging::Bare => "bare",
        }
    }
}
impl Display for Packaging {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
impl FromStr for Packaging {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "archive" | "zip" => Ok(Packaging::Archive),
            "bare" | "file" => Ok(Packaging::Bare),
            _ => exn::bail!(ErrorKind::UnknownPackaging(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("stored", Method::Stored)]
    #[case("STORE", Method::Stored)]
    #[case("deflate", Method::Deflated)]
    #[case("deflated", Method::Deflated)]
    #[cfg_attr(feature = "bzip2", case("bz2", Method::Bzip2))]
    #[cfg_attr(feature = "zstd", case("zstd", Method::Zstd))]
    fn test_method_from_str(#[case] input: &str, #[case] expected: Method) {
        assert_eq!(input.parse::<Method>().unwrap(), expected);
        assert_eq!(expected.as_str().parse::<Method>().unwrap(), expected);
    }

    #[test]
    fn test_method_errors() {
        let err = "rar".parse::<Method>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedMethod(_)));
        #[cfg(not(feature = "zstd"))]
        {
            let err = "zstd".parse::<Method>().unwrap_err();
            assert!(matches!(&*err, ErrorKind::DisabledMethod(_)));
        }
    }

    #[test]
    fn test_packaging() {
        assert_eq!(Packaging::default(), Packaging::Archive);
        assert_eq!("bare".parse::<Packaging>().unwrap(), Packaging::Bare);
        assert_eq!(Packaging::Bare.to_string(), "bare");
        assert!("folder".parse::<Packaging>().is_err());
    }
}
