use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use treediff_common::{Blake3Hash, TreeDiffError};

/// Result of an overwrite
#[derive(Debug, Clone)]
pub struct OverwriteResult {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub bytes_copied: u64,
    pub dry_run: bool,
    /// Source file hash (if verification was enabled)
    pub source_hash: Option<Blake3Hash>,
    /// Destination file hash (if verification was enabled)
    pub dest_hash: Option<Blake3Hash>,
    pub verified: bool,
}

/// Copies one side of a pair onto the other
pub struct FileOperations {
    dry_run: bool,
    verify_copies: bool,
}

impl FileOperations {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            verify_copies: false,
        }
    }

    pub fn with_verification(dry_run: bool, verify: bool) -> Self {
        Self {
            dry_run,
            verify_copies: verify,
        }
    }

    /// Copy `source` onto `dest`, replacing it.
    ///
    /// Missing parent directories of `dest` are created. Any failure is a
    /// `CopyFailure` and nothing is retried.
    pub fn overwrite(&self, source: &Path, dest: &Path) -> Result<OverwriteResult, TreeDiffError> {
        let fail = |reason: String| TreeDiffError::CopyFailure {
            from: source.to_path_buf(),
            to: dest.to_path_buf(),
            reason,
        };

        if !source.is_file() {
            return Err(fail("source is not a regular file".to_string()));
        }
        if dest.is_dir() {
            return Err(fail("destination is a directory".to_string()));
        }

        if self.dry_run {
            info!(
                "DRY RUN: Would overwrite {} with {}",
                dest.display(),
                source.display()
            );
            return Ok(OverwriteResult {
                source: source.to_path_buf(),
                destination: dest.to_path_buf(),
                bytes_copied: 0,
                dry_run: true,
                source_hash: None,
                dest_hash: None,
                verified: false,
            });
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;
        }

        debug!("Copying {} to {}", source.display(), dest.display());
        let bytes = fs::copy(source, dest).map_err(|e| fail(e.to_string()))?;

        // Preserve timestamps
        if let Ok(modified) = fs::metadata(source).and_then(|m| m.modified()) {
            let mtime = filetime::FileTime::from_system_time(modified);
            if let Err(e) = filetime::set_file_mtime(dest, mtime) {
                debug!("Could not preserve mtime on {}: {}", dest.display(), e);
            }
        }

        if !self.verify_copies {
            info!(
                "Copied {} bytes from {} to {}",
                bytes,
                source.display(),
                dest.display()
            );
            return Ok(OverwriteResult {
                source: source.to_path_buf(),
                destination: dest.to_path_buf(),
                bytes_copied: bytes,
                dry_run: false,
                source_hash: None,
                dest_hash: None,
                verified: false,
            });
        }

        let source_hash = hash_file(source).map_err(|e| fail(e.to_string()))?;
        let dest_hash = hash_file(dest).map_err(|e| fail(e.to_string()))?;
        if source_hash != dest_hash {
            warn!(
                "Hash mismatch after copying {} to {}",
                source.display(),
                dest.display()
            );
            return Err(fail(format!(
                "hash mismatch (source: {}, dest: {})",
                source_hash.to_hex(),
                dest_hash.to_hex()
            )));
        }

        info!(
            "Copied and verified {} bytes from {} to {}",
            bytes,
            source.display(),
            dest.display()
        );
        Ok(OverwriteResult {
            source: source.to_path_buf(),
            destination: dest.to_path_buf(),
            bytes_copied: bytes,
            dry_run: false,
            source_hash: Some(source_hash),
            dest_hash: Some(dest_hash),
            verified: true,
        })
    }
}

/// Compute BLAKE3 hash for a file
pub fn hash_file(path: &Path) -> Result<Blake3Hash, TreeDiffError> {
    let file_size = fs::metadata(path)?.len();

    // Use adaptive buffer sizing for better performance
    let buffer_size = if file_size > 10 * 1024 * 1024 {
        1024 * 1024 // 1MB buffer for large files
    } else {
        64 * 1024 // 64KB buffer for small files
    };

    let mut file = fs::File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0; buffer_size];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().into())
}
