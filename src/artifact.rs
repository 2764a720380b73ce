//! The generated image and its fixed location on disk.
//!
//! Generated code writes `architecture_diagram.png` into whatever directory it
//! runs in. The executor gives every run its own scratch directory; a run only
//! counts once [`ArtifactStore::promote`] finds a real PNG there and copies it
//! over the fixed artifact path. A failed run never touches the previous image.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const ARTIFACT_FILE_NAME: &str = "architecture_diagram.png";
pub const DEFAULT_OUTPUT_DIR: &str = "generated_diagrams";

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Result of checking a scratch directory after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Promotion {
    /// A PNG was produced and now lives at the artifact path.
    Updated(ArtifactInfo),
    /// The code never wrote the expected file.
    Missing,
    /// The file exists but is not a PNG.
    NotPng,
}

impl Promotion {
    pub fn is_updated(&self) -> bool {
        matches!(self, Promotion::Updated(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    pub bytes: u64,
    /// Pixel size from the IHDR chunk, when the header is intact.
    pub dimensions: Option<(u32, u32)>,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    path: PathBuf,
}

impl ArtifactStore {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            path: output_dir.as_ref().join(ARTIFACT_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Size and dimensions of the current artifact, if there is one.
    pub fn info(&self) -> Option<ArtifactInfo> {
        let bytes = fs::read(&self.path).ok()?;
        if !is_png(&bytes) {
            return None;
        }
        Some(ArtifactInfo {
            path: self.path.clone(),
            bytes: bytes.len() as u64,
            dimensions: png_dimensions(&bytes),
        })
    }

    /// Copy the image a run left in `scratch_dir` over the artifact path.
    pub fn promote(&self, scratch_dir: &Path) -> Result<Promotion> {
        let produced = scratch_dir.join(ARTIFACT_FILE_NAME);
        if !produced.is_file() {
            debug!(scratch = %scratch_dir.display(), "Run produced no image");
            return Ok(Promotion::Missing);
        }

        let bytes = fs::read(&produced)
            .with_context(|| format!("Failed to read {}", produced.display()))?;
        if !is_png(&bytes) {
            warn!(file = %produced.display(), "Run produced a file that is not a PNG");
            return Ok(Promotion::NotPng);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&self.path, &bytes)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        let info = ArtifactInfo {
            path: self.path.clone(),
            bytes: bytes.len() as u64,
            dimensions: png_dimensions(&bytes),
        };
        info!(path = %info.path.display(), bytes = info.bytes, "Diagram updated");
        Ok(Promotion::Updated(info))
    }

    /// Remove the artifact. Missing files are fine.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}

pub fn is_png(bytes: &[u8]) -> bool {
    bytes.starts_with(&PNG_SIGNATURE)
}

// Signature (8) + IHDR length (4) + "IHDR" (4), then width and height big-endian.
fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.len() < 24 || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
    Some((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fake_png;

    #[test]
    fn test_absent_before_any_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join(DEFAULT_OUTPUT_DIR));
        assert!(!store.exists());
        assert!(store.info().is_none());
        assert!(store.path().ends_with("generated_diagrams/architecture_diagram.png"));
    }

    #[test]
    fn test_promote_copies_png_and_reads_dimensions() {
        let out = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        fs::write(scratch.path().join(ARTIFACT_FILE_NAME), fake_png(640, 480)).unwrap();

        let store = ArtifactStore::new(out.path().join("nested"));
        let promotion = store.promote(scratch.path()).unwrap();

        let Promotion::Updated(info) = promotion else {
            panic!("expected an update, got {:?}", promotion);
        };
        assert_eq!(info.path, store.path());
        assert_eq!(info.dimensions, Some((640, 480)));
        assert_eq!(store.info(), Some(info));
    }

    #[test]
    fn test_promote_rejects_missing_and_non_png() {
        let out = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(out.path());

        assert_eq!(store.promote(scratch.path()).unwrap(), Promotion::Missing);

        fs::write(scratch.path().join(ARTIFACT_FILE_NAME), b"not an image").unwrap();
        assert_eq!(store.promote(scratch.path()).unwrap(), Promotion::NotPng);
        assert!(!store.exists());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let out = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(out.path());
        fs::write(store.path(), fake_png(1, 1)).unwrap();

        store.clear().unwrap();
        assert!(!store.exists());
        store.clear().unwrap();
    }

    #[test]
    fn test_truncated_header_has_no_dimensions() {
        let mut bytes = fake_png(10, 10);
        bytes.truncate(20);
        assert!(is_png(&bytes));
        assert_eq!(png_dimensions(&bytes), None);
    }
}
