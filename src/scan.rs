// dir2iso/src/scan.rs
use std::fs;
use std::io;
use std::path::Path;

use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{ImageError, Result};
use crate::fs_node::{DirNode, FileNode, FsNode};

/// Walks `root` and returns it as a tree, children ordered by file name.
///
/// Symbolic links are followed; a link leading back to one of its own
/// ancestors is reported as [`ImageError::Cycle`]. Any unreadable entry
/// aborts the scan with [`ImageError::Access`]. Sockets, FIFOs and device
/// nodes are skipped.
pub fn scan_directory(root: &Path) -> Result<DirNode> {
    let is_dir = fs::metadata(root).map(|m| m.is_dir()).unwrap_or(false);
    if !is_dir {
        return Err(ImageError::NotFound {
            path: root.to_path_buf(),
        });
    }

    // Open directories from the root down to the entry being visited.
    let mut stack: Vec<DirNode> = Vec::new();

    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|err| walk_error(root, err))?;
        close_until(&mut stack, entry.depth().max(1))?;

        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_name().to_str().is_none() {
            warn!("{} is not valid UTF-8, recorded as '{}'", entry.path().display(), name);
        }

        let file_type = entry.file_type();
        if file_type.is_dir() {
            debug!("scan: directory {}", entry.path().display());
            stack.push(DirNode::new(name, entry.path()));
        } else if file_type.is_file() {
            let size = entry
                .metadata()
                .map_err(|err| walk_error(root, err))?
                .len();
            let parent = stack
                .last_mut()
                .ok_or_else(|| ImageError::fault("file visited before its directory"))?;
            parent
                .children
                .push(FsNode::File(FileNode::new(name, entry.path(), size)));
        } else {
            warn!("skipping special file {}", entry.path().display());
        }
    }

    close_until(&mut stack, 1)?;
    let tree = stack
        .pop()
        .ok_or_else(|| ImageError::fault("scan produced no root directory"))?;
    let (files, dirs) = tree.count();
    info!("scanned {}: {} files, {} directories", root.display(), files, dirs);
    Ok(tree)
}

/// Pops finished directories into their parents until `depth` remain open.
fn close_until(stack: &mut Vec<DirNode>, depth: usize) -> Result<()> {
    while stack.len() > depth {
        let done = stack
            .pop()
            .ok_or_else(|| ImageError::fault("directory stack underflow"))?;
        let parent = stack
            .last_mut()
            .ok_or_else(|| ImageError::fault("directory without a parent"))?;
        parent.children.push(FsNode::Directory(done));
    }
    Ok(())
}

fn walk_error(root: &Path, err: walkdir::Error) -> ImageError {
    let path = err.path().unwrap_or(root).to_path_buf();
    if let Some(ancestor) = err.loop_ancestor() {
        return ImageError::Cycle {
            path,
            ancestor: ancestor.to_path_buf(),
        };
    }
    let message = err.to_string();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::other(message));
    ImageError::Access { path, source }
}
