//! Turns an input target into a readable directory. Plain directories
//! pass through; zip/war and tar.gz archives are unpacked into a temp dir
//! that lives as long as the returned handle.

use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// A usable source tree. Holds the temp dir guard when the input was an
/// archive so the extracted files survive until the run finishes.
pub struct MaterializedRoot {
    path: PathBuf,
    _extracted: Option<TempDir>,
}

impl MaterializedRoot {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn materialize(target: &Path) -> Result<MaterializedRoot> {
    if target.is_dir() {
        return Ok(MaterializedRoot {
            path: target.to_path_buf(),
            _extracted: None,
        });
    }
    if !target.is_file() {
        bail!("target {} does not exist", target.display());
    }

    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let dir = TempDir::new().context("create extraction dir")?;

    if name.ends_with(".zip") || name.ends_with(".war") || name.ends_with(".ear") {
        extract_zip(target, dir.path())?;
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        extract_tar_gz(target, dir.path())?;
    } else {
        bail!("unsupported archive type: {}", target.display());
    }

    debug!(
        archive = %target.display(),
        dir = %dir.path().display(),
        "archive extracted"
    );
    Ok(MaterializedRoot {
        path: dir.path().to_path_buf(),
        _extracted: Some(dir),
    })
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    let file =
        File::open(archive).with_context(|| format!("open {}", archive.display()))?;
    let mut zip = zip::ZipArchive::new(file)
        .with_context(|| format!("read zip {}", archive.display()))?;
    zip.extract(dest)
        .with_context(|| format!("extract {}", archive.display()))
}

fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<()> {
    let file =
        File::open(archive).with_context(|| format!("open {}", archive.display()))?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    tar.unpack(dest)
        .with_context(|| format!("extract {}", archive.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;

    #[test]
    fn directory_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let root = materialize(dir.path()).unwrap();
        assert_eq!(root.path(), dir.path());
    }

    #[test]
    fn missing_target_is_an_error() {
        assert!(materialize(Path::new("/nonexistent/thing")).is_err());
    }

    #[test]
    fn unknown_extension_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.rar");
        fs::write(&path, b"not an archive").unwrap();
        assert!(materialize(&path).is_err());
    }

    #[test]
    fn zip_archive_extracts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.zip");
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file("index.jsp", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<html/>").unwrap();
        writer.finish().unwrap();

        let root = materialize(&path).unwrap();
        assert!(root.path().join("index.jsp").is_file());
    }
}
