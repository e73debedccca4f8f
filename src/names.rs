// dir2iso/src/names.rs
//! Maps host file names onto the identifier rules of each image format.
//!
//! * ISO9660: upper case d-characters (`A-Z0-9_`), 8.3 names, files carry a
//!   `;1` version suffix.
//! * Joliet: UCS-2 big-endian, at most 64 code units, `;1` on files.
//! * UDF: OSTA CS0 compressed unicode (compression id 8 or 16).
//!
//! Siblings whose encodings collide are disambiguated with a numeric `_<n>`
//! tag so every directory level holds unique identifiers.

use std::collections::HashSet;

use log::warn;

use crate::error::NameCollisionWarning;
use crate::format::FormatVariant;

const ISO_STEM_MAX: usize = 8;
const ISO_EXT_MAX: usize = 3;
const JOLIET_MAX_UNITS: usize = 64;
const UDF_MAX_BYTES: usize = 255;

/// An identifier in its target format's character rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedName {
    text: String,
    variant: FormatVariant,
}

impl EncodedName {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The identifier as it is recorded on disc.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self.variant {
            FormatVariant::Iso9660 => self.text.as_bytes().to_vec(),
            FormatVariant::Joliet => ucs2_be(&self.text),
            FormatVariant::Udf => osta_cs0(&self.text),
        }
    }

    /// Key that orders identifiers the way the format sorts directory entries.
    pub fn sort_key(&self) -> Vec<u8> {
        match self.variant {
            FormatVariant::Iso9660 => {
                // ECMA-119 9.3: name, then extension, shorter padded with spaces.
                let without_version = self.text.split(';').next().unwrap_or_default();
                let (stem, ext) = without_version
                    .split_once('.')
                    .unwrap_or((without_version, ""));
                let mut key = stem.as_bytes().to_vec();
                key.push(0);
                key.extend_from_slice(ext.as_bytes());
                key
            }
            FormatVariant::Joliet => match self.text.rsplit_once(';') {
                // Files: name, then extension, then version.
                Some((without_version, version)) => {
                    let (stem, ext) = without_version
                        .rsplit_once('.')
                        .unwrap_or((without_version, ""));
                    let mut key = ucs2_be(stem);
                    key.extend_from_slice(&[0, 0]);
                    key.extend(ucs2_be(ext));
                    key.extend_from_slice(&[0, 0]);
                    key.extend(ucs2_be(version));
                    key
                }
                None => ucs2_be(&self.text),
            },
            FormatVariant::Udf => ucs2_be(&self.text),
        }
    }
}

/// Encodes one name without collision handling.
pub fn encode(name: &str, variant: FormatVariant, is_dir: bool) -> EncodedName {
    encode_with_tag(name, variant, is_dir, None)
}

/// Encodes every sibling of one directory, renaming collisions.
///
/// Siblings are visited in original-name order so the same tree always gets
/// the same tags. Returned names line up with `siblings`.
pub fn encode_siblings(
    directory: &str,
    siblings: &[(&str, bool)],
    variant: FormatVariant,
    warnings: &mut Vec<NameCollisionWarning>,
) -> Vec<EncodedName> {
    let natural: Vec<EncodedName> = siblings
        .iter()
        .map(|(name, is_dir)| encode(name, variant, *is_dir))
        .collect();
    let reserved: HashSet<&str> = natural.iter().map(|n| n.as_str()).collect();

    let mut order: Vec<usize> = (0..siblings.len()).collect();
    order.sort_by(|&a, &b| siblings[a].0.cmp(siblings[b].0).then(a.cmp(&b)));

    let mut taken: HashSet<String> = HashSet::new();
    let mut result: Vec<Option<EncodedName>> = vec![None; siblings.len()];

    for index in order {
        let (name, is_dir) = siblings[index];
        let candidate = &natural[index];
        if taken.insert(candidate.as_str().to_string()) {
            result[index] = Some(candidate.clone());
            continue;
        }

        let mut tag = 1u32;
        let renamed = loop {
            let attempt = encode_with_tag(name, variant, is_dir, Some(tag));
            if !taken.contains(attempt.as_str()) && !reserved.contains(attempt.as_str()) {
                break attempt;
            }
            tag += 1;
        };
        taken.insert(renamed.as_str().to_string());

        let warning = NameCollisionWarning {
            directory: directory.to_string(),
            original: name.to_string(),
            encoded: renamed.as_str().to_string(),
        };
        warn!("{}", warning);
        warnings.push(warning);
        result[index] = Some(renamed);
    }

    result.into_iter().flatten().collect()
}

fn encode_with_tag(name: &str, variant: FormatVariant, is_dir: bool, tag: Option<u32>) -> EncodedName {
    let text = match variant {
        FormatVariant::Iso9660 => iso_identifier(name, is_dir, tag),
        FormatVariant::Joliet => joliet_identifier(name, is_dir, tag),
        FormatVariant::Udf => udf_identifier(name, is_dir, tag),
    };
    EncodedName { text, variant }
}

fn iso_identifier(name: &str, is_dir: bool, tag: Option<u32>) -> String {
    let upper = name.to_uppercase();
    let (stem, ext) = if is_dir {
        (upper.as_str(), None)
    } else {
        match upper.rsplit_once('.') {
            Some((stem, ext)) => (stem, Some(ext)),
            None => (upper.as_str(), None),
        }
    };

    let mut stem = d_characters(stem);
    if stem.is_empty() {
        stem.push('_');
    }
    let tag = tag.map(|n| format!("_{n}")).unwrap_or_default();
    stem.truncate(ISO_STEM_MAX.saturating_sub(tag.len()));
    stem.push_str(&tag);

    if is_dir {
        return stem;
    }
    let mut ext = ext.map(d_characters).unwrap_or_default();
    ext.truncate(ISO_EXT_MAX);
    format!("{stem}.{ext};1")
}

pub(crate) fn d_characters(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn joliet_identifier(name: &str, is_dir: bool, tag: Option<u32>) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c < ' ' || matches!(c, '*' | '/' | ':' | ';' | '?' | '\\') || c as u32 > 0xFFFF {
                '_'
            } else {
                c
            }
        })
        .collect();
    let version = if is_dir { "" } else { ";1" };
    let base = fit_name(&cleaned, is_dir, tag, JOLIET_MAX_UNITS - version.len());
    format!("{base}{version}")
}

fn udf_identifier(name: &str, is_dir: bool, tag: Option<u32>) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c == '\0' || c == '/' || c as u32 > 0xFFFF { '_' } else { c })
        .collect();
    let limit = if cleaned.chars().all(|c| (c as u32) <= 0xFF) {
        UDF_MAX_BYTES - 1
    } else {
        (UDF_MAX_BYTES - 1) / 2
    };
    fit_name(&cleaned, is_dir, tag, limit)
}

/// Truncates `name` to `limit` characters, keeping the extension and placing
/// the collision tag in front of it.
fn fit_name(name: &str, is_dir: bool, tag: Option<u32>, limit: usize) -> String {
    let tag = tag.map(|n| format!("_{n}")).unwrap_or_default();
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !is_dir && !stem.is_empty() => (stem, format!(".{ext}")),
        _ => (name, String::new()),
    };
    let stem_room = limit.saturating_sub(ext.chars().count() + tag.len());
    if stem_room == 0 {
        let mut whole = take_chars(name, limit.saturating_sub(tag.len()));
        whole.push_str(&tag);
        return whole;
    }
    format!("{}{}{}", take_chars(stem, stem_room), tag, ext)
}

fn take_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// UCS-2 big-endian code units.
pub fn ucs2_be(s: &str) -> Vec<u8> {
    s.chars()
        .flat_map(|c| {
            let unit = if (c as u32) <= 0xFFFF { c as u32 as u16 } else { b'_' as u16 };
            unit.to_be_bytes()
        })
        .collect()
}

/// OSTA CS0 d-characters: a compression id followed by 8- or 16-bit units.
pub fn osta_cs0(s: &str) -> Vec<u8> {
    if s.is_empty() {
        return Vec::new();
    }
    if s.chars().all(|c| (c as u32) <= 0xFF) {
        let mut out = Vec::with_capacity(s.len() + 1);
        out.push(8);
        out.extend(s.chars().map(|c| c as u32 as u8));
        out
    } else {
        let mut out = vec![16];
        out.extend(ucs2_be(s));
        out
    }
}
