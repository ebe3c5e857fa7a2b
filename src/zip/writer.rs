use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{Result, ZipError};

use super::structures::ExtractionTarget;

/// Convert a `/`-separated entry name into a relative host path.
///
/// Empty and `.` segments are dropped, so a leading `/` cannot make the
/// path absolute. Any `..` segment, or a segment the host would read as
/// something other than a plain name (a drive prefix on Windows), is
/// rejected with [`ZipError::UnsafePath`].
pub fn sanitize_entry_path(name: &str) -> Result<PathBuf> {
    let mut path = PathBuf::new();

    for segment in name.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            return Err(ZipError::UnsafePath(name.to_string()));
        }

        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => path.push(part),
            _ => return Err(ZipError::UnsafePath(name.to_string())),
        }
    }

    if path.as_os_str().is_empty() {
        return Err(ZipError::UnsafePath(name.to_string()));
    }

    Ok(path)
}

/// Materialize `target` under `output_root`.
///
/// Directories are created with all missing ancestors. Files get their
/// parent directories first and then replace whatever was at the path.
/// Directory creation tolerates concurrent callers creating the same
/// ancestors.
pub async fn write_entry(output_root: &Path, target: &ExtractionTarget) -> Result<PathBuf> {
    let destination = output_root.join(sanitize_entry_path(&target.relative_path)?);

    match &target.contents {
        None => {
            fs::create_dir_all(&destination).await?;
            debug!(path = %destination.display(), "created directory");
        }
        Some(contents) => {
            // Create parent directories if needed
            if let Some(parent) = destination.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).await?;
                }
            }

            let mut file = fs::File::create(&destination).await?;
            file.write_all(contents).await?;
            file.flush().await?;
            debug!(
                path = %destination.display(),
                bytes = contents.len(),
                "wrote file"
            );
        }
    }

    Ok(destination)
}
