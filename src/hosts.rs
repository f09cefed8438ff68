//! Managed-section rewriting of the hosts file.
//!
//! The daemon owns exactly the lines between [`BEGIN_MARKER`] and
//! [`END_MARKER`]; everything outside that span is preserved byte for
//! byte. Replacement goes through a temporary file in the target's
//! directory followed by a rename, so a concurrent reader observes either
//! the fully-old or the fully-new content and a crash mid-write leaves
//! the original untouched.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use log::{debug, info};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::types::HostEntry;

pub const BEGIN_MARKER: &str = "# BEGIN DOCKER CONTAINERS";
pub const END_MARKER: &str = "# END DOCKER CONTAINERS";

/// Mode applied to the rewritten file when the original mode cannot be read.
#[cfg(unix)]
const FALLBACK_MODE: u32 = 0o644;

/// Replace every line strictly between the markers with the rendered
/// entries. Fails with [`Error::MarkersNotFound`] when either marker is
/// missing or the pair is out of order; the file is left unmodified on
/// every failure path.
pub fn replace_managed_section(path: &Path, entries: &[HostEntry]) -> Result<()> {
    let contents = read(path)?;
    let lines: Vec<&str> = contents.lines().collect();

    let begin = lines.iter().position(|line| line.trim() == BEGIN_MARKER);
    let end = lines.iter().position(|line| line.trim() == END_MARKER);
    let (begin, end) = match (begin, end) {
        (Some(begin), Some(end)) if begin < end => (begin, end),
        _ => {
            return Err(Error::MarkersNotFound {
                path: path.to_path_buf(),
            })
        }
    };

    let mut updated = String::with_capacity(contents.len());
    for line in &lines[..=begin] {
        updated.push_str(line);
        updated.push('\n');
    }
    for entry in entries {
        updated.push_str(&entry.render());
        updated.push('\n');
    }
    for line in &lines[end..] {
        updated.push_str(line);
        updated.push('\n');
    }
    if !contents.ends_with('\n') {
        updated.pop();
    }

    write_atomic(path, &updated)?;
    debug!(
        "rewrote managed section of {} with {} entries",
        path.display(),
        entries.len()
    );
    Ok(())
}

/// Ensure the managed section markers exist, appending an empty section at
/// end-of-file when they do not. Idempotent; never removes or reorders
/// existing content.
pub fn ensure_managed_section(path: &Path) -> Result<()> {
    let contents = read(path)?;
    let has_begin = contents.lines().any(|line| line.trim() == BEGIN_MARKER);
    let has_end = contents.lines().any(|line| line.trim() == END_MARKER);
    if has_begin && has_end {
        return Ok(());
    }

    info!("adding managed section markers to {}", path.display());
    let mut file = fs::OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| classify(path, e))?;
    file.write_all(format!("\n{}\n{}\n", BEGIN_MARKER, END_MARKER).as_bytes())
        .map_err(|e| classify(path, e))?;
    Ok(())
}

/// Replace non-breaking spaces with plain spaces across the whole file.
/// Stray U+00A0 bytes sneak in from copy-pasted entries and break hosts
/// file parsing. No-op when the file contains none.
pub fn scrub_non_breaking_spaces(path: &Path) -> Result<()> {
    let contents = read(path)?;
    if !contents.contains('\u{a0}') {
        return Ok(());
    }

    info!("replacing non-breaking spaces in {}", path.display());
    write_atomic(path, &contents.replace('\u{a0}', " "))
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| classify(path, e))
}

/// Write the full new content beside the target and rename it into place.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| classify(path, e))?;
    tmp.write_all(contents.as_bytes())
        .map_err(|e| classify(path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(path)
            .map(|m| m.permissions().mode())
            .unwrap_or(FALLBACK_MODE);
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(mode))
            .map_err(|e| classify(path, e))?;
    }

    // Dropping the NamedTempFile on any earlier failure unlinks it.
    tmp.persist(path).map_err(|e| classify(path, e.error))?;
    Ok(())
}

fn classify(path: &Path, source: io::Error) -> Error {
    if source.kind() == io::ErrorKind::PermissionDenied {
        Error::WritePermissionDenied {
            path: path.to_path_buf(),
            source,
        }
    } else {
        Error::Io(source)
    }
}
