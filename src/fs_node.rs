// dir2iso/src/fs_node.rs
use std::path::PathBuf;

use crate::names::EncodedName;

/// A contiguous run of sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Extent {
    pub start: u32,
    pub sectors: u32,
}

impl Extent {
    pub fn new(start: u32, sectors: u32) -> Self {
        Self { start, sectors }
    }

    /// First sector past the extent.
    pub fn end(&self) -> u64 {
        self.start as u64 + self.sectors as u64
    }

    pub fn overlaps(&self, other: &Extent) -> bool {
        (self.start as u64) < other.end() && (other.start as u64) < self.end()
    }
}

/// Where a node ended up, filled in by the layout planner.
#[derive(Debug, Clone, Default)]
pub struct Placement {
    /// File data, ISO9660 directory records, or the UDF identifier stream.
    pub extent: Option<Extent>,
    /// Joliet directory records.
    pub joliet_extent: Option<Extent>,
    /// UDF File Entry block.
    pub file_entry: Option<Extent>,
    /// Name in the primary hierarchy.
    pub name: Option<EncodedName>,
    pub joliet_name: Option<EncodedName>,
}

/// Represents a file within the input tree.
#[derive(Debug, Clone)]
pub struct FileNode {
    pub name: String,
    pub source: PathBuf,
    pub size: u64,
    pub placement: Placement,
}

/// Represents a directory within the input tree.
#[derive(Debug, Clone)]
pub struct DirNode {
    pub name: String,
    pub source: PathBuf,
    pub children: Vec<FsNode>,
    pub placement: Placement,
}

impl DirNode {
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            children: Vec::new(),
            placement: Placement::default(),
        }
    }

    pub fn subdirs(&self) -> impl Iterator<Item = &DirNode> {
        self.children.iter().filter_map(|child| match child {
            FsNode::Directory(dir) => Some(dir),
            FsNode::File(_) => None,
        })
    }

    pub fn files(&self) -> impl Iterator<Item = &FileNode> {
        self.children.iter().filter_map(|child| match child {
            FsNode::File(file) => Some(file),
            FsNode::Directory(_) => None,
        })
    }

    /// Counts (files, directories) below and including this directory.
    pub fn count(&self) -> (u64, u64) {
        let mut files = 0;
        let mut dirs = 1;
        for child in &self.children {
            match child {
                FsNode::File(_) => files += 1,
                FsNode::Directory(dir) => {
                    let (f, d) = dir.count();
                    files += f;
                    dirs += d;
                }
            }
        }
        (files, dirs)
    }
}

impl FileNode {
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            size,
            placement: Placement::default(),
        }
    }
}

/// A node in the input tree, either a file or a directory.
#[derive(Debug, Clone)]
pub enum FsNode {
    File(FileNode),
    Directory(DirNode),
}

impl FsNode {
    pub fn name(&self) -> &str {
        match self {
            FsNode::File(file) => &file.name,
            FsNode::Directory(dir) => &dir.name,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, FsNode::Directory(_))
    }

    pub fn placement(&self) -> &Placement {
        match self {
            FsNode::File(file) => &file.placement,
            FsNode::Directory(dir) => &dir.placement,
        }
    }

    pub fn placement_mut(&mut self) -> &mut Placement {
        match self {
            FsNode::File(file) => &mut file.placement,
            FsNode::Directory(dir) => &mut dir.placement,
        }
    }
}
