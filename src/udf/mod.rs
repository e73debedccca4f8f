// dir2iso/src/udf/mod.rs
//! UDF 1.02 image builder.
//!
//! Sector map: volume recognition sequence (16-18), main volume descriptor
//! sequence (32), reserve sequence (48), integrity sequence (64), anchor
//! (256), then the partition. Inside the partition, logical block 0 is the
//! file set descriptor and block 1 its terminator. A second anchor closes
//! the image.

pub mod file_entry;
pub mod tag;
pub mod volume;

use log::debug;

use crate::error::{ImageError, Result};
use crate::fs_node::{DirNode, Extent, FsNode};
use crate::layout::UdfLayout;
use crate::serializer::Region;
use crate::utils::{SECTOR_SIZE, Timestamp};

use self::file_entry::{
    CHAR_DIRECTORY, FileEntryInfo, FileIdentifier, directory_stream, file_entry,
    file_set_descriptor,
};
use self::volume::{
    IntegrityInfo, VolumeInfo, anchor_pointer, integrity_descriptor, recognition_sequence_entry,
    terminating_descriptor, volume_descriptor_sequence,
};

pub const RECOGNITION_START: u32 = 16;
pub const MAIN_VDS: Extent = Extent {
    start: 32,
    sectors: 16,
};
pub const RESERVE_VDS: Extent = Extent {
    start: 48,
    sectors: 16,
};
pub const INTEGRITY_SEQUENCE: Extent = Extent {
    start: 64,
    sectors: 2,
};
pub const ANCHOR_LBA: u32 = 256;
pub const PARTITION_START: u32 = ANCHOR_LBA + 1;
/// Unique ids below this are reserved for the root and the file set.
const FIRST_UNIQUE_ID: u64 = 16;

/// Builds every descriptor of the UDF image and the file data regions.
pub fn build_regions(
    root: &DirNode,
    layout: &UdfLayout,
    volume_id: &str,
    recorded: Option<Timestamp>,
) -> Result<Vec<Region>> {
    let mut regions = Vec::new();
    for (i, identifier) in [b"BEA01", b"NSR02", b"TEA01"].iter().enumerate() {
        regions.push(Region::bytes(
            Extent::new(RECOGNITION_START + i as u32, 1),
            recognition_sequence_entry(identifier),
        ));
    }

    let info = VolumeInfo {
        volume_id,
        partition: layout.partition,
        integrity_extent: INTEGRITY_SEQUENCE,
        recorded,
    };
    for sequence in [MAIN_VDS, RESERVE_VDS] {
        let descriptors = volume_descriptor_sequence(&info, sequence.start)?;
        for (i, desc) in descriptors.into_iter().enumerate() {
            regions.push(Region::bytes(Extent::new(sequence.start + i as u32, 1), desc));
        }
    }

    let (files, directories) = root.count();
    let integrity = IntegrityInfo {
        next_unique_id: FIRST_UNIQUE_ID + layout.partition.sectors as u64,
        files: count_field("file count", files)?,
        directories: count_field("directory count", directories)?,
    };
    regions.push(Region::bytes(
        Extent::new(INTEGRITY_SEQUENCE.start, 1),
        integrity_descriptor(&info, &integrity, INTEGRITY_SEQUENCE.start),
    ));
    regions.push(Region::bytes(
        Extent::new(INTEGRITY_SEQUENCE.start + 1, 1),
        terminating_descriptor(INTEGRITY_SEQUENCE.start + 1),
    ));

    let last = layout.total_sectors - 1;
    for location in [ANCHOR_LBA, last] {
        regions.push(Region::bytes(
            Extent::new(location, 1),
            anchor_pointer(MAIN_VDS, RESERVE_VDS, location),
        ));
    }

    let partition = Partition {
        start: layout.partition.start,
        recorded,
    };
    let root_fe = partition.lbn(root.placement.file_entry, &root.name)?;
    regions.push(Region::bytes(
        Extent::new(partition.start, 1),
        file_set_descriptor(volume_id, root_fe, recorded)?,
    ));
    regions.push(Region::bytes(
        Extent::new(partition.start + 1, 1),
        terminating_descriptor(1),
    ));
    partition.directory_regions(root, root_fe, 0, &mut regions)?;

    Ok(regions)
}

fn count_field(field: &str, count: u64) -> Result<u32> {
    u32::try_from(count).map_err(|_| ImageError::overflow(field, count.to_string()))
}

struct Partition {
    start: u32,
    recorded: Option<Timestamp>,
}

impl Partition {
    /// Logical block number of an absolute extent.
    fn lbn(&self, extent: Option<Extent>, name: &str) -> Result<u32> {
        let extent = extent
            .ok_or_else(|| ImageError::fault(format!("'{}' was not placed", name)))?;
        extent.start.checked_sub(self.start).ok_or_else(|| {
            ImageError::fault(format!("'{}' lies before the partition", name))
        })
    }

    fn unique_id(&self, fe_lbn: u32, is_root: bool) -> u64 {
        if is_root {
            0
        } else {
            FIRST_UNIQUE_ID + fe_lbn as u64
        }
    }

    fn directory_regions(
        &self,
        dir: &DirNode,
        parent_fe: u32,
        depth: usize,
        regions: &mut Vec<Region>,
    ) -> Result<()> {
        let fe_lbn = self.lbn(dir.placement.file_entry, &dir.name)?;
        let stream_extent = dir
            .placement
            .extent
            .ok_or_else(|| ImageError::fault(format!("'{}' has no identifier stream", dir.name)))?;
        let stream_lbn = self.lbn(Some(stream_extent), &dir.name)?;
        let own_id = self.unique_id(fe_lbn, depth == 0);
        let parent_id = if depth <= 1 {
            0
        } else {
            self.unique_id(parent_fe, false)
        };

        let mut identifiers = vec![FileIdentifier::parent(parent_fe, parent_id)];
        for child in &dir.children {
            let name = child
                .placement()
                .name
                .as_ref()
                .ok_or_else(|| ImageError::fault(format!("'{}' has no name", child.name())))?;
            let icb_lbn = self.lbn(child.placement().file_entry, child.name())?;
            identifiers.push(FileIdentifier {
                characteristics: if child.is_dir() { CHAR_DIRECTORY } else { 0 },
                identifier: name.to_bytes(),
                icb_lbn,
                unique_id: self.unique_id(icb_lbn, false),
            });
        }
        let stream = directory_stream(stream_lbn, &identifiers)?;
        if stream.len() as u64 > stream_extent.sectors as u64 * SECTOR_SIZE as u64 {
            return Err(ImageError::fault(format!(
                "identifiers of '{}' need {} bytes, planned {} sectors",
                dir.name,
                stream.len(),
                stream_extent.sectors
            )));
        }

        let subdirs = dir.subdirs().count();
        let entry = file_entry(&FileEntryInfo {
            lbn: fe_lbn,
            is_dir: true,
            length: stream.len() as u64,
            data_lbn: stream_lbn,
            link_count: u16::try_from(1 + subdirs).map_err(|_| {
                ImageError::overflow(
                    "UDF link count",
                    format!("'{}' has {} subdirectories", dir.name, subdirs),
                )
            })?,
            unique_id: own_id,
            recorded: self.recorded,
        })?;
        debug!("UDF directory '{}': entry lbn {}, stream lbn {}", dir.name, fe_lbn, stream_lbn);
        regions.push(Region::bytes(Extent::new(self.start + fe_lbn, 1), entry));
        regions.push(Region::bytes(stream_extent, stream));

        for child in &dir.children {
            match child {
                FsNode::File(file) => {
                    let file_fe = self.lbn(file.placement.file_entry, &file.name)?;
                    let data = file.placement.extent.ok_or_else(|| {
                        ImageError::fault(format!("file '{}' has no data extent", file.name))
                    })?;
                    let entry = file_entry(&FileEntryInfo {
                        lbn: file_fe,
                        is_dir: false,
                        length: file.size,
                        data_lbn: self.lbn(Some(data), &file.name)?,
                        link_count: 1,
                        unique_id: self.unique_id(file_fe, false),
                        recorded: self.recorded,
                    })?;
                    regions.push(Region::bytes(Extent::new(self.start + file_fe, 1), entry));
                    regions.push(Region::file(data, file.source.clone(), file.size));
                }
                FsNode::Directory(subdir) => {
                    self.directory_regions(subdir, fe_lbn, depth + 1, regions)?;
                }
            }
        }
        Ok(())
    }
}
