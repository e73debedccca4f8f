// dir2iso/src/format.rs
use std::fmt;
use std::str::FromStr;

use crate::error::ImageError;

/// The filesystem written into the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FormatVariant {
    Iso9660,
    /// ISO9660 plus a Joliet supplementary hierarchy.
    Joliet,
    #[default]
    Udf,
}

impl FormatVariant {
    /// Deepest directory level the format can record, root being level 1.
    pub fn max_depth(self) -> Option<usize> {
        match self {
            FormatVariant::Iso9660 | FormatVariant::Joliet => Some(8),
            FormatVariant::Udf => None,
        }
    }

    pub fn has_path_tables(self) -> bool {
        !matches!(self, FormatVariant::Udf)
    }
}

impl FromStr for FormatVariant {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "iso9660" | "iso" => Ok(FormatVariant::Iso9660),
            "joliet" => Ok(FormatVariant::Joliet),
            "udf" => Ok(FormatVariant::Udf),
            _ => Err(ImageError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for FormatVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatVariant::Iso9660 => "ISO9660",
            FormatVariant::Joliet => "Joliet",
            FormatVariant::Udf => "UDF",
        };
        f.write_str(name)
    }
}
