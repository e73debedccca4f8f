// dir2iso/src/builder.rs
use std::io::Write;
use std::path::Path;

use log::{info, warn};

use crate::copier::{ByteCounters, copy_stream};
use crate::error::{ImageError, NameCollisionWarning, Result};
use crate::format::FormatVariant;
use crate::fs_node::DirNode;
use crate::iso;
use crate::layout::{self, Layout};
use crate::names::{d_characters, osta_cs0};
use crate::scan::scan_directory;
use crate::serializer::ImagePlan;
use crate::udf;
use crate::utils::Timestamp;

/// Label used when the input directory name leaves nothing usable.
pub const DEFAULT_VOLUME_ID: &str = "CDROM";
const ISO_VOLUME_ID_MAX: usize = 32;
/// The 32-byte field holds 16 UCS-2 units.
const JOLIET_VOLUME_ID_MAX: usize = 16;
/// A dstring[32] holds 31 bytes of CS0 data.
const UDF_VOLUME_ID_MAX_BYTES: usize = 31;

/// Configuration for the image to be built.
#[derive(Debug, Clone, Default)]
pub struct ImageOptions {
    pub format: FormatVariant,
    /// Volume label; derived from the input directory name when `None`.
    pub volume_id: Option<String>,
    /// Unix seconds written into every timestamp. `None` leaves them unset
    /// so the output only depends on the input tree.
    pub recording_time: Option<i64>,
}

/// Outcome of a successful build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub format: FormatVariant,
    pub volume_id: String,
    pub total_sectors: u32,
    pub counters: ByteCounters,
    pub warnings: Vec<NameCollisionWarning>,
}

/// Scans `input` and plans the complete image without writing anything.
pub fn build_plan(input: &Path, options: &ImageOptions) -> Result<ImagePlan> {
    let mut root = scan_directory(input)?;
    // `.` and friends have no usable name of their own.
    if let Some(name) = input
        .canonicalize()
        .ok()
        .and_then(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
    {
        root.name = name;
    }
    plan_tree(root, options)
}

/// Plans an already scanned tree.
pub fn plan_tree(mut root: DirNode, options: &ImageOptions) -> Result<ImagePlan> {
    let volume_id = resolve_volume_id(options.volume_id.as_deref(), &root.name, options.format)?;
    let joliet_volume_id =
        resolve_joliet_volume_id(options.volume_id.as_deref(), &root.name, &volume_id);
    let recorded = options.recording_time.map(Timestamp::from_unix).transpose()?;

    let mut warnings = Vec::new();
    let layout = layout::plan(&mut root, options.format, &mut warnings)?;
    let regions = match &layout {
        Layout::Iso(iso_layout) => iso::build_regions(
            &root,
            iso_layout,
            iso::VolumeLabels {
                primary: &volume_id,
                joliet: &joliet_volume_id,
            },
            recorded,
        )?,
        Layout::Udf(udf_layout) => udf::build_regions(&root, udf_layout, &volume_id, recorded)?,
    };
    ImagePlan::new(
        options.format,
        volume_id,
        layout.total_sectors(),
        regions,
        warnings,
    )
}

/// Builds the image of `input` and streams it into `sink`.
///
/// Nothing is written unless the whole tree could be planned. On error the
/// sink may hold a partial image; discarding it is up to the caller.
pub fn create_image<W: Write + ?Sized>(
    input: &Path,
    sink: &mut W,
    options: &ImageOptions,
) -> Result<BuildReport> {
    info!("building {} image of {}", options.format, input.display());
    let plan = build_plan(input, options)?;
    let counters = copy_stream(plan.sectors(), sink)?;
    if counters.bytes_written != plan.image_size() {
        return Err(ImageError::fault(format!(
            "wrote {} bytes, the image is {} bytes",
            counters.bytes_written,
            plan.image_size()
        )));
    }
    info!(
        "image '{}' complete: {} sectors, {} name collision(s)",
        plan.volume_id(),
        plan.total_sectors(),
        plan.warnings().len()
    );
    Ok(BuildReport {
        format: plan.variant(),
        volume_id: plan.volume_id().to_string(),
        total_sectors: plan.total_sectors(),
        counters,
        warnings: plan.warnings().to_vec(),
    })
}

/// Applies the label rules of `format`. An explicit label that does not fit
/// is an error; a derived one is shortened.
pub fn resolve_volume_id(
    explicit: Option<&str>,
    directory_name: &str,
    format: FormatVariant,
) -> Result<String> {
    let label = match (format, explicit) {
        (FormatVariant::Iso9660 | FormatVariant::Joliet, Some(id)) => {
            let label = d_characters(&id.to_uppercase());
            if label.chars().count() > ISO_VOLUME_ID_MAX {
                return Err(ImageError::overflow(
                    "volume identifier",
                    format!("'{}' is longer than {} characters", id, ISO_VOLUME_ID_MAX),
                ));
            }
            label
        }
        (FormatVariant::Iso9660 | FormatVariant::Joliet, None) => {
            let label = d_characters(&directory_name.to_uppercase());
            let truncated: String = label.chars().take(ISO_VOLUME_ID_MAX).collect();
            if truncated != label {
                warn!("volume label '{}' truncated to '{}'", label, truncated);
            }
            truncated
        }
        (FormatVariant::Udf, Some(id)) => {
            if osta_cs0(id).len() > UDF_VOLUME_ID_MAX_BYTES {
                return Err(ImageError::overflow(
                    "volume identifier",
                    format!("'{}' needs more than {} bytes", id, UDF_VOLUME_ID_MAX_BYTES),
                ));
            }
            id.to_string()
        }
        (FormatVariant::Udf, None) => {
            let mut label: String = directory_name
                .chars()
                .map(|c| if c == '\0' || c as u32 > 0xFFFF { '_' } else { c })
                .collect();
            let original = label.clone();
            while osta_cs0(&label).len() > UDF_VOLUME_ID_MAX_BYTES {
                label.pop();
            }
            if label != original {
                warn!("volume label '{}' truncated to '{}'", original, label);
            }
            label
        }
    };

    if label.trim_matches(|c| c == '_' || c == ' ').is_empty() {
        return Ok(DEFAULT_VOLUME_ID.to_string());
    }
    Ok(label)
}

/// Joliet keeps the label's case and non-ASCII characters, up to 16 UCS-2
/// units. Falls back to `primary` when nothing printable is left.
pub fn resolve_joliet_volume_id(
    explicit: Option<&str>,
    directory_name: &str,
    primary: &str,
) -> String {
    let label: String = explicit
        .unwrap_or(directory_name)
        .chars()
        .map(|c| if c < ' ' || c as u32 > 0xFFFF { '_' } else { c })
        .take(JOLIET_VOLUME_ID_MAX)
        .collect();
    if label.trim_matches(|c| c == '_' || c == ' ').is_empty() {
        return primary.chars().take(JOLIET_VOLUME_ID_MAX).collect();
    }
    label
}
