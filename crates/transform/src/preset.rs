use crate::error::{Error, ErrorKind};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Ghostscript `-dPDFSETTINGS` quality preset.
///
/// Defaults to [`Ebook`](Self::Ebook) (150 dpi images), the usual compromise
/// between size and legibility.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Preset {
    /// 72 dpi, smallest output.
    Screen,
    /// 150 dpi.
    #[default]
    Ebook,
    /// 300 dpi.
    Printer,
    /// 300 dpi, colour preserving.
    Prepress,
    /// Ghostscript's own default, a wide-use setting close to `printer`.
    Default,
}
impl Preset {
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Screen => "screen",
            Preset::Ebook => "ebook",
            Preset::Printer => "printer",
            Preset::Prepress => "prepress",
            Preset::Default => "default",
        }
    }
}
impl Display for Preset {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
impl FromStr for Preset {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('/').to_lowercase().as_str() {
            "screen" => Ok(Preset::Screen),
            "ebook" => Ok(Preset::Ebook),
            "printer" => Ok(Preset::Printer),
            "prepress" => Ok(Preset::Prepress),
            "default" => Ok(Preset::Default),
            _ => exn::bail!(ErrorKind::UnknownPreset(s.to_string())),
        }
    }
}
