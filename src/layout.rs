// dir2iso/src/layout.rs
//! Layout planner: names every node, orders siblings, and hands out sector
//! extents.
//!
//! ISO9660/Joliet sector map:
//! system area (0-15), PVD (16), Joliet SVD (17), terminator, type L and
//! type M path tables (a second pair for Joliet), directory record blocks,
//! Joliet directory record blocks, file data.
//!
//! UDF sector map: see [`crate::udf`]; the partition holds the file set
//! descriptor, directory File Entries, directory identifier streams, file
//! File Entries and file data, followed by the closing anchor.

use log::{debug, info};

use crate::error::{ImageError, NameCollisionWarning, Result};
use crate::format::FormatVariant;
use crate::fs_node::{DirNode, Extent, FileNode, FsNode};
use crate::iso::Hierarchy;
use crate::iso::dir_record::directory_size;
use crate::iso::path_table::{path_table_entries, table_size};
use crate::names::encode_siblings;
use crate::udf;
use crate::utils::{SECTOR_SIZE, sectors_for};

pub const SYSTEM_AREA_SECTORS: u32 = 16;
pub const PVD_LBA: u32 = SYSTEM_AREA_SECTORS;
/// Sector numbers are 32-bit in every supported format.
pub const MAX_SECTORS: u64 = u32::MAX as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathTableLayout {
    pub size: u32,
    pub l_extent: Extent,
    pub m_extent: Extent,
}

#[derive(Debug, Clone)]
pub struct IsoLayout {
    pub terminator: u32,
    pub path_table: PathTableLayout,
    pub joliet_path_table: Option<PathTableLayout>,
    pub total_sectors: u32,
}

#[derive(Debug, Clone)]
pub struct UdfLayout {
    pub partition: Extent,
    pub total_sectors: u32,
}

#[derive(Debug, Clone)]
pub enum Layout {
    Iso(IsoLayout),
    Udf(UdfLayout),
}

impl Layout {
    pub fn total_sectors(&self) -> u32 {
        match self {
            Layout::Iso(layout) => layout.total_sectors,
            Layout::Udf(layout) => layout.total_sectors,
        }
    }
}

/// Hands out consecutive sectors, refusing to pass the 32-bit limit.
struct SectorAllocator {
    next: u64,
}

impl SectorAllocator {
    fn new(start: u32) -> Self {
        Self { next: start as u64 }
    }

    fn allocate(&mut self, sectors: u64) -> Result<Extent> {
        let start = self.next;
        self.next += sectors;
        if self.next > MAX_SECTORS {
            return Err(ImageError::Oversize {
                sectors: self.next,
                max: MAX_SECTORS,
            });
        }
        Ok(Extent::new(start as u32, sectors as u32))
    }

    fn position(&self) -> u32 {
        self.next as u32
    }
}

/// Assigns names and extents to the whole tree.
pub fn plan(
    root: &mut DirNode,
    variant: FormatVariant,
    warnings: &mut Vec<NameCollisionWarning>,
) -> Result<Layout> {
    if let Some(max_depth) = variant.max_depth() {
        check_depth(root, 1, max_depth)?;
    }

    let layout = if variant.has_path_tables() {
        let joliet = variant == FormatVariant::Joliet;
        assign_names(root, "/", FormatVariant::Iso9660, joliet, warnings);
        Layout::Iso(plan_iso(root, joliet)?)
    } else {
        assign_names(root, "/", FormatVariant::Udf, false, warnings);
        Layout::Udf(plan_udf(root)?)
    };
    info!(
        "planned {} image: {} sectors ({} bytes)",
        variant,
        layout.total_sectors(),
        layout.total_sectors() as u64 * SECTOR_SIZE as u64
    );
    Ok(layout)
}

fn check_depth(dir: &DirNode, level: usize, max_depth: usize) -> Result<()> {
    if level > max_depth {
        return Err(ImageError::overflow(
            "directory depth",
            format!(
                "{} is at level {}, the limit is {}",
                dir.source.display(),
                level,
                max_depth
            ),
        ));
    }
    for subdir in dir.subdirs() {
        check_depth(subdir, level + 1, max_depth)?;
    }
    Ok(())
}

/// Encodes the names of every node and sorts siblings by primary name.
fn assign_names(
    dir: &mut DirNode,
    path: &str,
    primary: FormatVariant,
    joliet: bool,
    warnings: &mut Vec<NameCollisionWarning>,
) {
    let siblings: Vec<(String, bool)> = dir
        .children
        .iter()
        .map(|child| (child.name().to_string(), child.is_dir()))
        .collect();
    let borrowed: Vec<(&str, bool)> = siblings.iter().map(|(n, d)| (n.as_str(), *d)).collect();

    let names = encode_siblings(path, &borrowed, primary, warnings);
    let joliet_names = if joliet {
        Some(encode_siblings(path, &borrowed, FormatVariant::Joliet, warnings))
    } else {
        None
    };

    for (index, (child, name)) in dir.children.iter_mut().zip(names).enumerate() {
        let placement = child.placement_mut();
        placement.name = Some(name);
        placement.joliet_name = joliet_names.as_ref().map(|names| names[index].clone());
    }

    dir.children.sort_by_cached_key(|child| {
        child
            .placement()
            .name
            .as_ref()
            .map(|name| name.sort_key())
            .unwrap_or_default()
    });

    for child in dir.children.iter_mut() {
        if let FsNode::Directory(subdir) = child {
            let child_path = if path.ends_with('/') {
                format!("{}{}", path, subdir.name)
            } else {
                format!("{}/{}", path, subdir.name)
            };
            assign_names(subdir, &child_path, primary, joliet, warnings);
        }
    }
}

fn plan_iso(root: &mut DirNode, joliet: bool) -> Result<IsoLayout> {
    let mut allocator = SectorAllocator::new(PVD_LBA);
    allocator.allocate(1)?;
    if joliet {
        allocator.allocate(1)?;
    }
    let terminator = allocator.allocate(1)?.start;

    let path_table = plan_path_table(root, Hierarchy::Primary, &mut allocator)?;
    let joliet_path_table = if joliet {
        Some(plan_path_table(root, Hierarchy::Joliet, &mut allocator)?)
    } else {
        None
    };

    assign_directory_extents(root, Hierarchy::Primary, &mut allocator)?;
    if joliet {
        assign_directory_extents(root, Hierarchy::Joliet, &mut allocator)?;
    }
    assign_file_extents(root, &mut allocator, &mut |file| {
        if file.size > u32::MAX as u64 {
            return Err(ImageError::overflow(
                "ISO9660 data length",
                format!("'{}' is {} bytes", file.source.display(), file.size),
            ));
        }
        Ok(())
    })?;

    Ok(IsoLayout {
        terminator,
        path_table,
        joliet_path_table,
        total_sectors: allocator.position(),
    })
}

fn plan_path_table(
    root: &DirNode,
    hierarchy: Hierarchy,
    allocator: &mut SectorAllocator,
) -> Result<PathTableLayout> {
    let entries = path_table_entries(root, hierarchy)?;
    let size = table_size(&entries);
    let size = u32::try_from(size)
        .map_err(|_| ImageError::overflow("path table size", format!("{} bytes", size)))?;
    let l_extent = allocator.allocate(sectors_for(size as u64))?;
    let m_extent = allocator.allocate(sectors_for(size as u64))?;
    debug!(
        "{:?} path table: {} directories, {} bytes, L at {}, M at {}",
        hierarchy,
        entries.len(),
        size,
        l_extent.start,
        m_extent.start
    );
    Ok(PathTableLayout {
        size,
        l_extent,
        m_extent,
    })
}

fn assign_directory_extents(
    dir: &mut DirNode,
    hierarchy: Hierarchy,
    allocator: &mut SectorAllocator,
) -> Result<()> {
    // Records never straddle sectors, so the size depends on record order.
    let mut id_lens = Vec::with_capacity(dir.children.len());
    for child in hierarchy.ordered_children(dir)? {
        id_lens.push(hierarchy.name(child.placement(), child.name())?.to_bytes().len());
    }
    let bytes = directory_size(id_lens);
    let extent = allocator.allocate(bytes / SECTOR_SIZE as u64)?;
    debug!("{:?} directory '{}' at {:?}", hierarchy, dir.name, extent);
    match hierarchy {
        Hierarchy::Primary => dir.placement.extent = Some(extent),
        Hierarchy::Joliet => dir.placement.joliet_extent = Some(extent),
    }

    for child in dir.children.iter_mut() {
        if let FsNode::Directory(subdir) = child {
            assign_directory_extents(subdir, hierarchy, allocator)?;
        }
    }
    Ok(())
}

/// Places file data depth first in sibling order; empty files still get a
/// sector.
fn assign_file_extents(
    dir: &mut DirNode,
    allocator: &mut SectorAllocator,
    check: &mut impl FnMut(&FileNode) -> Result<()>,
) -> Result<()> {
    for child in dir.children.iter_mut() {
        if let FsNode::File(file) = child {
            let extent = allocator.allocate(sectors_for(file.size))?;
            check(file)?;
            debug!("file '{}' at {:?}", file.name, extent);
            file.placement.extent = Some(extent);
        }
    }
    for child in dir.children.iter_mut() {
        if let FsNode::Directory(subdir) = child {
            assign_file_extents(subdir, allocator, check)?;
        }
    }
    Ok(())
}

fn plan_udf(root: &mut DirNode) -> Result<UdfLayout> {
    let mut allocator = SectorAllocator::new(udf::PARTITION_START);
    // File set descriptor and its terminator.
    allocator.allocate(2)?;

    assign_udf_directory_entries(root, &mut allocator)?;
    assign_udf_directory_streams(root, &mut allocator)?;
    assign_udf_file_entries(root, &mut allocator)?;
    assign_file_extents(root, &mut allocator, &mut |file| {
        udf::file_entry::check_allocation_fits(file.size, &file.source)
    })?;

    let partition_end = allocator.position();
    // Closing anchor in the last sector.
    allocator.allocate(1)?;

    Ok(UdfLayout {
        partition: Extent::new(udf::PARTITION_START, partition_end - udf::PARTITION_START),
        total_sectors: allocator.position(),
    })
}

fn assign_udf_directory_entries(dir: &mut DirNode, allocator: &mut SectorAllocator) -> Result<()> {
    dir.placement.file_entry = Some(allocator.allocate(1)?);
    for child in dir.children.iter_mut() {
        if let FsNode::Directory(subdir) = child {
            assign_udf_directory_entries(subdir, allocator)?;
        }
    }
    Ok(())
}

fn assign_udf_directory_streams(dir: &mut DirNode, allocator: &mut SectorAllocator) -> Result<()> {
    let mut id_lens = Vec::with_capacity(dir.children.len());
    for child in &dir.children {
        id_lens.push(Hierarchy::Primary.name(child.placement(), child.name())?.to_bytes().len());
    }
    let bytes = udf::file_entry::directory_stream_size(id_lens);
    udf::file_entry::check_allocation_fits(bytes, &dir.source)?;
    let extent = allocator.allocate(sectors_for(bytes))?;
    debug!("UDF directory '{}' identifiers at {:?}", dir.name, extent);
    dir.placement.extent = Some(extent);

    for child in dir.children.iter_mut() {
        if let FsNode::Directory(subdir) = child {
            assign_udf_directory_streams(subdir, allocator)?;
        }
    }
    Ok(())
}

fn assign_udf_file_entries(dir: &mut DirNode, allocator: &mut SectorAllocator) -> Result<()> {
    for child in dir.children.iter_mut() {
        if let FsNode::File(file) = child {
            file.placement.file_entry = Some(allocator.allocate(1)?);
        }
    }
    for child in dir.children.iter_mut() {
        if let FsNode::Directory(subdir) = child {
            assign_udf_file_entries(subdir, allocator)?;
        }
    }
    Ok(())
}
