use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const DB_FILE_NAME: &str = "attendance.sqlite3";
const MANIFEST_ENTRY: &str = "manifest.json";
const DB_ENTRY: &str = "db/attendance.sqlite3";
const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";
pub const BUNDLE_FORMAT_V1: &str = "attendance-workspace-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub db_sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub checksum_verified: bool,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let db_path = workspace_path.join(DB_FILE_NAME);
    if !db_path.is_file() {
        return Err(anyhow!(
            "workspace database not found: {}",
            db_path.to_string_lossy()
        ));
    }
    let db_bytes = std::fs::read(&db_path)
        .with_context(|| format!("failed to read database {}", db_path.to_string_lossy()))?;
    let db_sha256 = sha256_hex(&db_bytes);

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let exported_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": exported_at,
        "dbSha256": db_sha256,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(DB_ENTRY, opts)
        .context("failed to start database entry")?;
    zip.write_all(&db_bytes)
        .context("failed to write database entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 2,
        db_sha256,
    })
}

/// Restores a bundle into `workspace_path`. A bare SQLite file is accepted as
/// a raw database copy.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    std::fs::create_dir_all(workspace_path).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace_path.to_string_lossy()
        )
    })?;
    let dst = workspace_path.join(DB_FILE_NAME);

    let sig = read_signature(in_path)?;
    if sig.starts_with(SQLITE_HEADER) {
        std::fs::copy(in_path, &dst).with_context(|| {
            format!(
                "failed to copy sqlite database from {} to {}",
                in_path.to_string_lossy(),
                dst.to_string_lossy()
            )
        })?;
        return Ok(ImportSummary {
            bundle_format_detected: "raw-sqlite3".to_string(),
            checksum_verified: false,
        });
    }
    if !sig.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
        return Err(anyhow!(
            "not a workspace bundle or sqlite database: {}",
            in_path.to_string_lossy()
        ));
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }
    let expected_sha = manifest
        .get("dbSha256")
        .and_then(|v| v.as_str())
        .map(|s| s.to_ascii_lowercase());

    let mut db_bytes = Vec::new();
    archive
        .by_name(DB_ENTRY)
        .context("bundle missing db/attendance.sqlite3")?
        .read_to_end(&mut db_bytes)
        .context("failed to extract database entry")?;

    if let Some(expected) = expected_sha.as_deref() {
        let actual = sha256_hex(&db_bytes);
        if actual != expected {
            return Err(anyhow!(
                "database checksum mismatch: expected {}, got {}",
                expected,
                actual
            ));
        }
    }

    let tmp_dst = workspace_path.join("attendance.sqlite3.importing");
    if tmp_dst.exists() {
        let _ = std::fs::remove_file(&tmp_dst);
    }
    let mut db_out = File::create(&tmp_dst).with_context(|| {
        format!(
            "failed to create temp database {}",
            tmp_dst.to_string_lossy()
        )
    })?;
    db_out
        .write_all(&db_bytes)
        .context("failed to write extracted database")?;
    db_out
        .flush()
        .context("failed to flush extracted database")?;
    drop(db_out);

    if dst.exists() {
        std::fs::remove_file(&dst).with_context(|| {
            format!(
                "failed to remove existing database {}",
                dst.to_string_lossy()
            )
        })?;
    }
    std::fs::rename(&tmp_dst, &dst).with_context(|| {
        format!(
            "failed to move extracted database to {}",
            dst.to_string_lossy()
        )
    })?;

    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        checksum_verified: expected_sha.is_some(),
    })
}

fn read_signature(path: &Path) -> anyhow::Result<Vec<u8>> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; 16];
    let mut read = 0usize;
    while read < sig.len() {
        let n = f
            .read(&mut sig[read..])
            .context("failed to read file signature")?;
        if n == 0 {
            break;
        }
        read += n;
    }
    Ok(sig[..read].to_vec())
}
