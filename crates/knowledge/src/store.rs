//! On-disk persistence of the trained index.
//!
//! Layout under the state directory:
//!
//! ```text
//! manifest.json                      points at the live generation
//! generations/<uuid>/vectorizer.json  TF-IDF model
//! generations/<uuid>/matrix.bin       sparse weight rows
//! generations/<uuid>/fragments.json   fragment collection
//! ```
//!
//! A save writes a complete new generation, then renames a fresh manifest
//! over the old one. Readers therefore see either the previous generation or
//! the new one. The previous generation is kept for readers that loaded the
//! old manifest just before the swap; older ones are pruned.

use crate::index::{SparseVector, TfidfVectorizer, VectorIndex};
use crate::types::Fragment;
use chrono::{DateTime, Utc};
use docqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const VECTORIZER_FILE: &str = "vectorizer.json";
pub const MATRIX_FILE: &str = "matrix.bin";
pub const FRAGMENTS_FILE: &str = "fragments.json";

const GENERATIONS_DIR: &str = "generations";
const FORMAT_VERSION: u32 = 1;
const MATRIX_MAGIC: &[u8; 4] = b"DQMX";

/// SHA-256 (hex) of each artifact, recorded at save time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactChecksums {
    pub vectorizer: String,
    pub matrix: String,
    pub fragments: String,
}

/// Description of one persisted generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub generation: String,
    pub created_at: DateTime<Utc>,
    pub fragments_count: usize,
    pub vocabulary_size: usize,
    pub checksums: ArtifactChecksums,
}

/// A validated index restored from disk.
#[derive(Debug)]
pub struct PersistedIndexState {
    pub manifest: Manifest,
    pub index: VectorIndex,
}

/// File-backed index store rooted at one directory.
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the state directory if needed.
    pub fn ensure_dir(&self) -> AppResult<()> {
        fs::create_dir_all(self.root.join(GENERATIONS_DIR)).map_err(|e| {
            AppError::Config(format!(
                "Failed to create index state directory {:?}: {}",
                self.root, e
            ))
        })
    }

    /// Persist `index` as a new generation and make it the live one.
    /// Filesystem failures surface as `AppError::Io`.
    pub fn save(&self, index: &VectorIndex) -> AppResult<Manifest> {
        fs::create_dir_all(self.root.join(GENERATIONS_DIR))?;

        let generation = Uuid::new_v4().to_string();
        let dir = self.generation_dir(&generation);
        fs::create_dir_all(&dir)?;

        match self.write_generation(&dir, &generation, index) {
            Ok(manifest) => {
                let previous = self.read_manifest().ok().flatten();
                self.write_manifest(&manifest)?;

                let mut keep = vec![manifest.generation.clone()];
                keep.extend(previous.map(|m| m.generation));
                self.prune(&keep);

                tracing::info!(
                    "Saved index generation {} ({} fragments, {} terms) to {:?}",
                    manifest.generation,
                    manifest.fragments_count,
                    manifest.vocabulary_size,
                    self.root
                );
                Ok(manifest)
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&dir) {
                    tracing::warn!("Failed to remove partial generation {:?}: {}", dir, cleanup);
                }
                Err(e)
            }
        }
    }

    fn write_generation(
        &self,
        dir: &Path,
        generation: &str,
        index: &VectorIndex,
    ) -> AppResult<Manifest> {
        let vectorizer = serde_json::to_vec(index.vectorizer())?;
        let matrix = encode_matrix(index.rows(), index.vocabulary_size());
        let fragments = serde_json::to_vec(index.fragments())?;

        write_synced(&dir.join(VECTORIZER_FILE), &vectorizer)?;
        write_synced(&dir.join(MATRIX_FILE), &matrix)?;
        write_synced(&dir.join(FRAGMENTS_FILE), &fragments)?;

        Ok(Manifest {
            format_version: FORMAT_VERSION,
            generation: generation.to_string(),
            created_at: Utc::now(),
            fragments_count: index.len(),
            vocabulary_size: index.vocabulary_size(),
            checksums: ArtifactChecksums {
                vectorizer: checksum(&vectorizer),
                matrix: checksum(&matrix),
                fragments: checksum(&fragments),
            },
        })
    }

    fn write_manifest(&self, manifest: &Manifest) -> AppResult<()> {
        let bytes = serde_json::to_vec_pretty(manifest)?;
        let staging = self
            .root
            .join(format!("{}.{}.tmp", MANIFEST_FILE, manifest.generation));

        write_synced(&staging, &bytes)?;
        fs::rename(&staging, self.root.join(MANIFEST_FILE))?;
        Ok(())
    }

    /// Read the live manifest; `None` on a cold start.
    pub fn read_manifest(&self) -> AppResult<Option<Manifest>> {
        let path = self.root.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path)?;
        let manifest: Manifest = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::CorruptState(format!("unreadable manifest: {}", e)))?;

        if manifest.format_version != FORMAT_VERSION {
            return Err(AppError::CorruptState(format!(
                "unsupported format version {}",
                manifest.format_version
            )));
        }
        if Uuid::parse_str(&manifest.generation).is_err() {
            return Err(AppError::CorruptState(format!(
                "invalid generation id '{}'",
                manifest.generation
            )));
        }

        Ok(Some(manifest))
    }

    /// Restore the live generation.
    ///
    /// Returns `Ok(None)` when the manifest or any artifact is missing, and
    /// `CorruptState` when artifacts exist but cannot be trusted.
    pub fn load(&self) -> AppResult<Option<PersistedIndexState>> {
        let Some(manifest) = self.read_manifest()? else {
            tracing::info!("No persisted index at {:?}", self.root);
            return Ok(None);
        };

        let dir = self.generation_dir(&manifest.generation);
        for name in [VECTORIZER_FILE, MATRIX_FILE, FRAGMENTS_FILE] {
            if !dir.join(name).exists() {
                tracing::warn!(
                    "Generation {} is missing {}; treating index as absent",
                    manifest.generation,
                    name
                );
                return Ok(None);
            }
        }

        let vectorizer_bytes = read_verified(&dir, VECTORIZER_FILE, &manifest.checksums.vectorizer)?;
        let matrix_bytes = read_verified(&dir, MATRIX_FILE, &manifest.checksums.matrix)?;
        let fragment_bytes = read_verified(&dir, FRAGMENTS_FILE, &manifest.checksums.fragments)?;

        let vectorizer: TfidfVectorizer = serde_json::from_slice(&vectorizer_bytes)
            .map_err(|e| AppError::CorruptState(format!("unreadable vectorizer: {}", e)))?;
        let fragments: Vec<Fragment> = serde_json::from_slice(&fragment_bytes)
            .map_err(|e| AppError::CorruptState(format!("unreadable fragments: {}", e)))?;
        let rows = decode_matrix(&matrix_bytes, vectorizer.vocabulary_len())?;

        if fragments.len() != manifest.fragments_count {
            return Err(AppError::CorruptState(format!(
                "manifest records {} fragments but {} were stored",
                manifest.fragments_count,
                fragments.len()
            )));
        }

        let index = VectorIndex::from_parts(vectorizer, rows, fragments)?;

        tracing::info!(
            "Loaded index generation {}: {} fragments",
            manifest.generation,
            index.len()
        );

        Ok(Some(PersistedIndexState { manifest, index }))
    }

    fn generation_dir(&self, generation: &str) -> PathBuf {
        self.root.join(GENERATIONS_DIR).join(generation)
    }

    /// Remove every generation directory not listed in `keep`.
    fn prune(&self, keep: &[String]) {
        let entries = match fs::read_dir(self.root.join(GENERATIONS_DIR)) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to list generations in {:?}: {}", self.root, e);
                return;
            }
        };

        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name().to_string_lossy().into_owned();
            if keep.contains(&name) {
                continue;
            }
            match fs::remove_dir_all(entry.path()) {
                Ok(()) => tracing::debug!("Pruned index generation {}", name),
                Err(e) => tracing::warn!("Failed to prune generation {}: {}", name, e),
            }
        }
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> AppResult<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

fn read_verified(dir: &Path, name: &str, expected: &str) -> AppResult<Vec<u8>> {
    let bytes = fs::read(dir.join(name))?;
    if checksum(&bytes) != expected {
        return Err(AppError::CorruptState(format!("checksum mismatch for {}", name)));
    }
    Ok(bytes)
}

fn checksum(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Serialize rows as: magic, row count, column count, then per row its
/// entry count followed by `(column, weight)` pairs. All little-endian.
fn encode_matrix(rows: &[SparseVector], columns: usize) -> Vec<u8> {
    let entries: usize = rows.iter().map(|r| r.nnz()).sum();
    let mut bytes = Vec::with_capacity(12 + rows.len() * 4 + entries * 8);

    bytes.extend_from_slice(MATRIX_MAGIC);
    bytes.extend_from_slice(&(rows.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&(columns as u32).to_le_bytes());

    for row in rows {
        bytes.extend_from_slice(&(row.nnz() as u32).to_le_bytes());
        for (column, weight) in row.iter() {
            bytes.extend_from_slice(&column.to_le_bytes());
            bytes.extend_from_slice(&weight.to_le_bytes());
        }
    }

    bytes
}

fn decode_matrix(bytes: &[u8], vocabulary_size: usize) -> AppResult<Vec<SparseVector>> {
    let mut reader = ByteReader::new(bytes);

    if reader.take(4)? != MATRIX_MAGIC {
        return Err(AppError::CorruptState("matrix has a bad header".to_string()));
    }
    let row_count = reader.u32()? as usize;
    let columns = reader.u32()? as usize;

    if columns != vocabulary_size {
        return Err(AppError::CorruptState(format!(
            "matrix has {} columns but the vocabulary has {} terms",
            columns, vocabulary_size
        )));
    }

    let mut rows = Vec::with_capacity(row_count.min(bytes.len() / 4));
    for _ in 0..row_count {
        let nnz = reader.u32()? as usize;
        let mut pairs = Vec::with_capacity(nnz.min(bytes.len() / 8));
        for _ in 0..nnz {
            let column = reader.u32()?;
            let weight = reader.f32()?;
            if !weight.is_finite() {
                return Err(AppError::CorruptState("matrix holds a non-finite weight".to_string()));
            }
            pairs.push((column, weight));
        }
        rows.push(SparseVector::from_pairs(pairs));
    }

    if !reader.is_exhausted() {
        return Err(AppError::CorruptState(
            "matrix has trailing bytes".to_string(),
        ));
    }

    Ok(rows)
}

/// Bounds-checked little-endian reader.
struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> AppResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| AppError::CorruptState("matrix is truncated".to_string()))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> AppResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f32(&mut self) -> AppResult<f32> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn is_exhausted(&self) -> bool {
        self.pos == self.bytes.len()
    }
}
