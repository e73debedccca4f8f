//! Builds ISO9660, Joliet and UDF disc images from a directory tree.
//!
//! The pipeline scans the input directory, plans every extent of the image,
//! builds the format's descriptors and streams the result sector by sector
//! into any [`std::io::Write`] sink.

pub mod builder;
pub mod copier;
pub mod error;
pub mod format;
pub mod fs_node;
pub mod iso;
pub mod layout;
pub mod names;
pub mod scan;
pub mod serializer;
pub mod udf;
pub mod utils;

pub use builder::{BuildReport, ImageOptions, build_plan, create_image, plan_tree};
pub use copier::{ByteCounters, copy_stream};
pub use error::{ImageError, NameCollisionWarning, Result};
pub use format::FormatVariant;
pub use fs_node::{DirNode, Extent, FileNode, FsNode};
pub use names::{EncodedName, encode};
pub use scan::scan_directory;
pub use serializer::{ImagePlan, Region, RegionData};
pub use utils::SECTOR_SIZE;
