//! Collision-free moves into the processed and error trees

use crate::error::IngestError;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Move `src` into `root/<subdir>/`, creating the directory as needed.
///
/// An existing file at the destination is never replaced: the moved file is
/// renamed `{stem}__v{n}{ext}` with the smallest free `n` starting at 1.
pub async fn move_to(root: &Path, src: &Path, subdir: Option<&str>) -> Result<PathBuf, IngestError> {
    let dir = match subdir {
        Some(subdir) => root.join(subdir),
        None => root.to_path_buf(),
    };
    fs::create_dir_all(&dir).await?;

    let name = src
        .file_name()
        .ok_or_else(|| IngestError::InvalidPath(src.display().to_string()))?;

    let mut dest = dir.join(name);
    if fs::try_exists(&dest).await? {
        let stem = src
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = src
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut version = 1;
        loop {
            dest = dir.join(format!("{}__v{}{}", stem, version, ext));
            if !fs::try_exists(&dest).await? {
                break;
            }
            version += 1;
        }
    }

    fs::rename(src, &dest).await?;
    Ok(dest)
}
