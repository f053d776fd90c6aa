//! Owner-only file helpers.
//!
//! Key material, backups and shares are written through these so the
//! permission handling lives in one place.

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::warn;

use crate::core::constants::{PRIVATE_DIR_MODE, PRIVATE_FILE_MODE};
use crate::error::Result;

/// Create a directory (and parents) restricted to the owner.
pub fn create_private_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(PRIVATE_DIR_MODE))?;
    }

    Ok(())
}

/// Write `contents` to `path` with owner-only permissions.
///
/// Writes to a sibling temp file and renames it into place, so readers
/// never observe a partially written file.
pub fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    {
        let mut file = open_private(&tmp, false)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }

    fs::rename(&tmp, path)?;
    Ok(())
}

/// Create a new owner-only file, failing if it already exists.
pub fn create_private(path: &Path) -> std::io::Result<fs::File> {
    open_private(path, true)
}

fn open_private(path: &Path, create_new: bool) -> std::io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true);
    if create_new {
        options.create_new(true);
    } else {
        options.create(true).truncate(true);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(PRIVATE_FILE_MODE);
    }

    let file = options.open(path)?;

    // mode() is masked by the umask; make sure the final bits are exact
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(PRIVATE_FILE_MODE))?;
    }

    Ok(file)
}

/// Warn when a key file is readable by anyone but the owner.
pub fn check_private(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        if let Ok(metadata) = fs::metadata(path) {
            let mode = metadata.permissions().mode() & 0o777;
            if mode & 0o077 != 0 {
                warn!(
                    path = %path.display(),
                    mode = %format!("{:o}", mode),
                    "insecure key file permissions"
                );
            }
        }
    }

    #[cfg(not(unix))]
    let _ = path;
}
