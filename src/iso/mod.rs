// dir2iso/src/iso/mod.rs
//! ISO9660 and Joliet descriptor builder.

pub mod dir_record;
pub mod path_table;
pub mod volume_descriptor;

use crate::error::{ImageError, Result};
use crate::fs_node::{DirNode, Extent, FsNode, Placement};
use crate::layout::{IsoLayout, PVD_LBA, PathTableLayout};
use crate::names::EncodedName;
use crate::serializer::Region;
use crate::utils::{SECTOR_SIZE, Timestamp};

use self::dir_record::{FLAG_DIRECTORY, IsoDirEntry, PARENT_ID, SELF_ID, pack_records};
use self::path_table::{PathTableType, encode_table, path_table_entries};
use self::volume_descriptor::{
    VolumeInfo, joliet_volume_descriptor, primary_volume_descriptor, volume_descriptor_terminator,
};

/// Which directory tree of the image is being described.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hierarchy {
    /// The ISO9660 tree referenced by the primary descriptor.
    Primary,
    /// The UCS-2 tree referenced by the Joliet descriptor.
    Joliet,
}

impl Hierarchy {
    pub fn name<'a>(self, placement: &'a Placement, original: &str) -> Result<&'a EncodedName> {
        let name = match self {
            Hierarchy::Primary => placement.name.as_ref(),
            Hierarchy::Joliet => placement.joliet_name.as_ref(),
        };
        name.ok_or_else(|| ImageError::fault(format!("'{}' has no {:?} name", original, self)))
    }

    pub fn dir_extent(self, dir: &DirNode) -> Result<Extent> {
        let extent = match self {
            Hierarchy::Primary => dir.placement.extent,
            Hierarchy::Joliet => dir.placement.joliet_extent,
        };
        extent.ok_or_else(|| {
            ImageError::fault(format!("directory '{}' has no {:?} extent", dir.name, self))
        })
    }

    /// Children in the order their records appear.
    pub fn ordered_children(self, dir: &DirNode) -> Result<Vec<&FsNode>> {
        let mut children: Vec<&FsNode> = dir.children.iter().collect();
        if self == Hierarchy::Joliet {
            let mut keyed = Vec::with_capacity(children.len());
            for child in children {
                keyed.push((self.name(child.placement(), child.name())?.sort_key(), child));
            }
            keyed.sort_by(|a, b| a.0.cmp(&b.0));
            children = keyed.into_iter().map(|(_, child)| child).collect();
        }
        Ok(children)
    }

    pub fn ordered_subdirs(self, dir: &DirNode) -> Result<Vec<&DirNode>> {
        Ok(self
            .ordered_children(dir)?
            .into_iter()
            .filter_map(|child| match child {
                FsNode::Directory(subdir) => Some(subdir),
                FsNode::File(_) => None,
            })
            .collect())
    }
}

/// Volume identifiers of the primary and Joliet descriptors.
#[derive(Debug, Clone, Copy)]
pub struct VolumeLabels<'a> {
    pub primary: &'a str,
    pub joliet: &'a str,
}

/// Builds every metadata region of an ISO9660 (optionally Joliet) image and
/// the file data regions they reference.
pub fn build_regions(
    root: &DirNode,
    layout: &IsoLayout,
    labels: VolumeLabels<'_>,
    recorded: Option<Timestamp>,
) -> Result<Vec<Region>> {
    let mut regions = Vec::new();
    let mut hierarchies = vec![(Hierarchy::Primary, layout.path_table, PVD_LBA)];
    if let Some(joliet_table) = layout.joliet_path_table {
        hierarchies.push((Hierarchy::Joliet, joliet_table, PVD_LBA + 1));
    }

    for (hierarchy, table, descriptor_lba) in hierarchies {
        let root_extent = hierarchy.dir_extent(root)?;
        let root_record = IsoDirEntry {
            lba: root_extent.start,
            size: extent_bytes(root_extent)?,
            flags: FLAG_DIRECTORY,
            identifier: SELF_ID,
            recorded: Timestamp::iso_record_bytes(recorded),
        }
        .to_bytes();
        let info = VolumeInfo {
            volume_id: match hierarchy {
                Hierarchy::Primary => labels.primary,
                Hierarchy::Joliet => labels.joliet,
            },
            total_sectors: layout.total_sectors,
            path_table: table,
            root_record: &root_record,
            recorded,
        };
        let descriptor = match hierarchy {
            Hierarchy::Primary => primary_volume_descriptor(&info),
            Hierarchy::Joliet => joliet_volume_descriptor(&info),
        };
        regions.push(Region::bytes(Extent::new(descriptor_lba, 1), descriptor.to_vec()));

        regions.extend(path_table_regions(root, hierarchy, table)?);
        directory_regions(root, root_extent, hierarchy, recorded, &mut regions)?;
    }

    regions.push(Region::bytes(
        Extent::new(layout.terminator, 1),
        volume_descriptor_terminator().to_vec(),
    ));
    file_regions(root, &mut regions)?;
    Ok(regions)
}

fn path_table_regions(
    root: &DirNode,
    hierarchy: Hierarchy,
    table: PathTableLayout,
) -> Result<[Region; 2]> {
    let entries = path_table_entries(root, hierarchy)?;
    let l_table = encode_table(&entries, hierarchy, PathTableType::LittleEndian)?;
    let m_table = encode_table(&entries, hierarchy, PathTableType::BigEndian)?;
    if l_table.len() as u64 != table.size as u64 {
        return Err(ImageError::fault(format!(
            "{:?} path table is {} bytes, planned {}",
            hierarchy,
            l_table.len(),
            table.size
        )));
    }
    Ok([
        Region::bytes(table.l_extent, l_table),
        Region::bytes(table.m_extent, m_table),
    ])
}

fn directory_regions(
    dir: &DirNode,
    parent_extent: Extent,
    hierarchy: Hierarchy,
    recorded: Option<Timestamp>,
    regions: &mut Vec<Region>,
) -> Result<()> {
    let own_extent = hierarchy.dir_extent(dir)?;
    let time = Timestamp::iso_record_bytes(recorded);
    let children = hierarchy.ordered_children(dir)?;

    let mut records = vec![
        IsoDirEntry {
            lba: own_extent.start,
            size: extent_bytes(own_extent)?,
            flags: FLAG_DIRECTORY,
            identifier: SELF_ID,
            recorded: time,
        }
        .to_bytes(),
        IsoDirEntry {
            lba: parent_extent.start,
            size: extent_bytes(parent_extent)?,
            flags: FLAG_DIRECTORY,
            identifier: PARENT_ID,
            recorded: time,
        }
        .to_bytes(),
    ];

    for child in &children {
        let identifier = hierarchy.name(child.placement(), child.name())?.to_bytes();
        let (lba, size, flags) = match child {
            FsNode::File(file) => {
                let extent = file.placement.extent.ok_or_else(|| {
                    ImageError::fault(format!("file '{}' has no data extent", file.name))
                })?;
                let size = u32::try_from(file.size).map_err(|_| {
                    ImageError::overflow(
                        "ISO9660 data length",
                        format!("'{}' is {} bytes", file.source.display(), file.size),
                    )
                })?;
                (extent.start, size, 0x00)
            }
            FsNode::Directory(subdir) => {
                let extent = hierarchy.dir_extent(subdir)?;
                (extent.start, extent_bytes(extent)?, FLAG_DIRECTORY)
            }
        };
        records.push(
            IsoDirEntry {
                lba,
                size,
                flags,
                identifier: &identifier,
                recorded: time,
            }
            .to_bytes(),
        );
    }

    let block = pack_records(&records);
    if block.len() as u64 != extent_bytes(own_extent)? as u64 {
        return Err(ImageError::fault(format!(
            "directory '{}' needs {} bytes, planned {} sectors",
            dir.name,
            block.len(),
            own_extent.sectors
        )));
    }
    regions.push(Region::bytes(own_extent, block));

    for child in children {
        if let FsNode::Directory(subdir) = child {
            directory_regions(subdir, own_extent, hierarchy, recorded, regions)?;
        }
    }
    Ok(())
}

fn file_regions(dir: &DirNode, regions: &mut Vec<Region>) -> Result<()> {
    for child in &dir.children {
        match child {
            FsNode::File(file) => {
                let extent = file.placement.extent.ok_or_else(|| {
                    ImageError::fault(format!("file '{}' has no data extent", file.name))
                })?;
                regions.push(Region::file(extent, file.source.clone(), file.size));
            }
            FsNode::Directory(subdir) => file_regions(subdir, regions)?,
        }
    }
    Ok(())
}

fn extent_bytes(extent: Extent) -> Result<u32> {
    u32::try_from(extent.sectors as u64 * SECTOR_SIZE as u64).map_err(|_| {
        ImageError::overflow(
            "ISO9660 directory length",
            format!("{} sectors", extent.sectors),
        )
    })
}
