//! Capability-scoped file access for database files, archives and local
//! import sources.
//!
//! Every helper opens the parent directory with ambient authority and then
//! operates on the file name inside it, so paths are handled uniformly
//! whether they are absolute or relative.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use std::{fs::File, io, path::Component};

/// Open an existing file for reading.
pub fn open_file(path: &Utf8Path) -> io::Result<File> {
    let (dir, name) = parent_and_name(path)?;
    Ok(dir.open(name.as_str())?.into_std())
}

/// Create or truncate a file for writing, creating missing parent
/// directories first.
pub fn create_file(path: &Utf8Path) -> io::Result<File> {
    ensure_parent_dir(path)?;
    let (dir, name) = parent_and_name(path)?;
    Ok(dir.create(name.as_str())?.into_std())
}

/// Report whether `path` names an existing regular file.
///
/// A missing file or parent directory yields `Ok(false)`.
pub fn is_file(path: &Utf8Path) -> io::Result<bool> {
    let lookup = parent_and_name(path).and_then(|(dir, name)| dir.metadata(name.as_str()));
    match lookup {
        Ok(meta) => Ok(meta.is_file()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Create every missing directory above `path`.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() {
        return Ok(());
    }
    let (root, relative) = root_and_relative(parent)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    root.create_dir_all(&relative)
}

fn parent_and_name(path: &Utf8Path) -> io::Result<(Dir, String)> {
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("{path} has no file name")))?
        .to_owned();
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, name))
}

/// Split a directory path into an ambient root and the part below it.
fn root_and_relative(parent: &Utf8Path) -> io::Result<(Dir, Utf8PathBuf)> {
    let std_parent = parent.as_std_path();
    let (root, relative) = match std_parent.components().next() {
        // Drive or UNC prefix.
        Some(Component::Prefix(prefix)) => {
            let prefix = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            let root = Utf8PathBuf::from(prefix).join(std::path::MAIN_SEPARATOR_STR);
            let relative = parent
                .strip_prefix(&root)
                .or_else(|_| parent.strip_prefix(prefix))
                .map_err(|_| io::Error::other("failed to strip prefix from parent path"))?
                .to_owned();
            (root, relative)
        }
        Some(Component::RootDir) => {
            let root = Utf8PathBuf::from(std::path::MAIN_SEPARATOR_STR);
            let relative = parent
                .strip_prefix(&root)
                .map_err(|_| io::Error::other("failed to strip root from absolute path"))?
                .to_owned();
            (root, relative)
        }
        _ => (Utf8PathBuf::from("."), parent.to_owned()),
    };
    let dir = Dir::open_ambient_dir(&root, ambient_authority())?;
    Ok((dir, relative))
}
