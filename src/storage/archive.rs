//! Idempotent compression and checksumming of completed log segments
//!
//! A segment is archived by compressing to a temporary path, writing the
//! digest sidecar to a temporary path, then renaming both into place;
//! rename is the only crash-safety boundary. The uncompressed source is
//! removed only after both final artifacts exist; any earlier failure
//! leaves it untouched for a later retry.

use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

/// zstd compression level, matching archival-grade settings
const ZSTD_LEVEL: i32 = 19;

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

/// Hex SHA-256 digest of a file's contents
fn sha256_file(path: &Path) -> Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut chunk = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        hasher.update(&chunk[..n]);
    }
    let mut hex = String::with_capacity(64);
    for byte in hasher.finalize() {
        let _ = write!(hex, "{:02x}", byte);
    }
    Ok(hex)
}

/// Compress `src` to `<src>.zst` and write a `<src>.zst.sha256` sidecar
///
/// Idempotent and safe to re-run: a no-op when both final artifacts already
/// exist or the source is gone. The source is deleted only once both
/// artifacts are durable.
pub fn compress_and_checksum(src: &Path) -> Result<()> {
    let zst_tmp = with_suffix(src, ".zst.tmp");
    let zst_final = with_suffix(src, ".zst");
    let sha_final = with_suffix(src, ".zst.sha256");
    let sha_tmp = with_suffix(src, ".zst.sha256.tmp");

    // Done previously
    if zst_final.exists() && sha_final.exists() {
        return Ok(());
    }

    // Already archived and removed, or never written
    if !src.exists() {
        return Ok(());
    }

    // Compress to the temporary path and force it to durable storage
    {
        let mut input = BufReader::new(File::open(src)?);
        let output = File::create(&zst_tmp)?;
        zstd::stream::copy_encode(&mut input, &output, ZSTD_LEVEL)?;
        output.sync_all()?;
    }

    // Checksum the compressed artifact, sidecar in sha256sum line format
    let digest = sha256_file(&zst_tmp)?;
    let artifact_name = zst_final
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    {
        let mut sidecar = File::create(&sha_tmp)?;
        writeln!(sidecar, "{}  {}", digest, artifact_name)?;
        sidecar.flush()?;
        sidecar.sync_all()?;
    }

    // Finalize: blob first, then sidecar
    fs::rename(&zst_tmp, &zst_final)?;
    fs::rename(&sha_tmp, &sha_final)?;

    // Both finals exist, reclaim the uncompressed source
    match fs::remove_file(src) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    log::info!(
        "Compressed and checksummed: {}",
        src.file_name().unwrap_or_default().to_string_lossy()
    );
    Ok(())
}

/// Archive the previous hour's file pair if present and not yet processed
///
/// Safe to run at startup and on every hour tick; failures are logged and
/// the sources stay in place for the next attempt.
pub fn rotate_previous_hour(root: &Path, now: DateTime<Utc>) {
    let prev = now - Duration::hours(1);
    for src in [hour_path(root, prev, "nmea"), hour_path(root, prev, "ubx")] {
        if src.exists()
            && let Err(e) = compress_and_checksum(&src)
        {
            log::error!("Failed to archive {}: {}", src.display(), e);
        }
    }
}

/// Path of an hourly log file for `dt` (no directories are created)
pub fn hour_path(root: &Path, dt: DateTime<Utc>, extension: &str) -> PathBuf {
    root.join(dt.format("%Y").to_string())
        .join(dt.format("%m").to_string())
        .join(dt.format("%d").to_string())
        .join(format!("{}.{}", dt.format("%H"), extension))
}
