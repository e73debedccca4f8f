// dir2iso/src/iso/path_table.rs
//! Path tables (ECMA-119 9.4): every directory with its parent's number,
//! ordered by level, then parent number, then identifier. The root is
//! record 1 and its own parent.

use std::collections::VecDeque;

use crate::error::{ImageError, Result};
use crate::fs_node::{DirNode, Extent};
use crate::iso::Hierarchy;
use crate::iso::dir_record::SELF_ID;

/// Path table byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathTableType {
    /// Type L
    LittleEndian,
    /// Type M
    BigEndian,
}

pub struct PathTableEntry<'a> {
    pub dir: &'a DirNode,
    pub identifier: Vec<u8>,
    pub parent: u16,
}

/// Lists directories breadth first, parents before children.
pub fn path_table_entries(root: &DirNode, hierarchy: Hierarchy) -> Result<Vec<PathTableEntry<'_>>> {
    let mut entries = vec![PathTableEntry {
        dir: root,
        identifier: SELF_ID.to_vec(),
        parent: 1,
    }];
    let mut queue = VecDeque::from([(root, 1u16)]);

    while let Some((dir, number)) = queue.pop_front() {
        for subdir in hierarchy.ordered_subdirs(dir)? {
            let identifier = hierarchy.name(&subdir.placement, &subdir.name)?.to_bytes();
            entries.push(PathTableEntry {
                dir: subdir,
                identifier,
                parent: number,
            });
            let own_number = u16::try_from(entries.len()).map_err(|_| {
                ImageError::overflow(
                    "path table directory number",
                    format!("more than {} directories", u16::MAX),
                )
            })?;
            queue.push_back((subdir, own_number));
        }
    }

    Ok(entries)
}

pub fn record_size(id_len: usize) -> usize {
    8 + id_len + id_len % 2
}

pub fn table_size(entries: &[PathTableEntry<'_>]) -> u64 {
    entries
        .iter()
        .map(|e| record_size(e.identifier.len()) as u64)
        .sum()
}

/// Serialises the table; directory extents must already be assigned.
pub fn encode_table(
    entries: &[PathTableEntry<'_>],
    hierarchy: Hierarchy,
    table_type: PathTableType,
) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(table_size(entries) as usize);
    for entry in entries {
        let extent: Extent = hierarchy.dir_extent(entry.dir)?;
        let id_len = entry.identifier.len();
        out.push(id_len as u8);
        out.push(0); // Extended attribute record length
        match table_type {
            PathTableType::LittleEndian => {
                out.extend_from_slice(&extent.start.to_le_bytes());
                out.extend_from_slice(&entry.parent.to_le_bytes());
            }
            PathTableType::BigEndian => {
                out.extend_from_slice(&extent.start.to_be_bytes());
                out.extend_from_slice(&entry.parent.to_be_bytes());
            }
        }
        out.extend_from_slice(&entry.identifier);
        if id_len % 2 == 1 {
            out.push(0);
        }
    }
    Ok(out)
}
