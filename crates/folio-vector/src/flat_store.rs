//! Exact inner-product vector store
//!
//! Vectors live in one contiguous row-major buffer; slot `i` of the buffer
//! always describes `metadata[i]`. The store only grows, and rebuilding is
//! the way to change it.
//!
//! On disk a store is a directory holding two files written together:
//! - `index.vec`: magic, format version, dimension (u32), count (u64), then
//!   `count * dimension` little-endian f32 values
//! - `metadata.json`: the chunks in slot order

use crate::embedding::{l2_normalize, EmbeddingClient};
use folio_core::{Chunk, EmbeddedChunk, FolioError, Result, SearchResult};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 8] = b"FOLIOVEC";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 8 + 4 + 4 + 8;

pub const VECTORS_FILE: &str = "index.vec";
pub const METADATA_FILE: &str = "metadata.json";

/// Default minimum score for a search hit
pub const DEFAULT_SIMILARITY_FLOOR: f32 = 0.1;

/// Flat collection of (vector, chunk) pairs
#[derive(Debug, Clone)]
pub struct FlatStore {
    dimension: usize,
    similarity_floor: f32,
    vectors: Vec<f32>,
    metadata: Vec<Chunk>,
}

impl FlatStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            similarity_floor: DEFAULT_SIMILARITY_FLOOR,
            vectors: Vec::new(),
            metadata: Vec::new(),
        }
    }

    pub fn with_similarity_floor(mut self, floor: f32) -> Self {
        self.similarity_floor = floor;
        self
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn similarity_floor(&self) -> f32 {
        self.similarity_floor
    }

    /// Number of stored vectors (always equal to the metadata length)
    pub fn size(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn metadata(&self) -> &[Chunk] {
        &self.metadata
    }

    /// Embed and append chunks
    pub async fn add(&mut self, chunks: Vec<Chunk>, embedder: &dyn EmbeddingClient) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text().to_string()).collect();
        let vectors = embedder.embed_batch(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(FolioError::Embedding(format!(
                "Embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        self.add_embedded(
            chunks
                .into_iter()
                .zip(vectors)
                .map(|(chunk, vector)| EmbeddedChunk::new(chunk, vector))
                .collect(),
        )
    }

    /// Append pre-embedded chunks; nothing is appended if any vector has the wrong dimension
    pub fn add_embedded(&mut self, items: Vec<EmbeddedChunk>) -> Result<()> {
        if let Some(bad) = items.iter().find(|i| i.vector().len() != self.dimension) {
            return Err(FolioError::InvalidInput(format!(
                "Vector of dimension {} added to a {}-dimensional store",
                bad.vector().len(),
                self.dimension
            )));
        }

        self.vectors.reserve(items.len() * self.dimension);
        self.metadata.reserve(items.len());
        for item in items {
            let (chunk, vector) = item.into_parts();
            self.vectors.extend_from_slice(&vector);
            self.metadata.push(chunk);
        }
        Ok(())
    }

    fn row(&self, slot: usize) -> &[f32] {
        let start = slot * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    /// Up to `k` best matches scoring at or above the similarity floor
    ///
    /// Results are sorted by descending score; equal scores keep slot order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if query.len() != self.dimension {
            return Err(FolioError::InvalidInput(format!(
                "Query of dimension {} against a {}-dimensional store",
                query.len(),
                self.dimension
            )));
        }

        let k = k.min(self.size());
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut query = query.to_vec();
        l2_normalize(&mut query);

        let mut scored: Vec<(usize, f32)> = (0..self.size())
            .map(|slot| {
                let score = self
                    .row(slot)
                    .iter()
                    .zip(&query)
                    .map(|(a, b)| a * b)
                    .sum::<f32>();
                (slot, score)
            })
            .filter(|(_, score)| *score >= self.similarity_floor)
            .collect();

        // Stable sort keeps insertion order among ties
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(slot, score)| SearchResult::from_chunk(&self.metadata[slot], score))
            .collect())
    }

    /// Persist vectors and metadata into `dir`
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        let mut blob = Vec::with_capacity(HEADER_LEN + self.vectors.len() * 4);
        blob.extend_from_slice(MAGIC);
        blob.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        blob.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        blob.extend_from_slice(&(self.size() as u64).to_le_bytes());
        for value in &self.vectors {
            blob.extend_from_slice(&value.to_le_bytes());
        }
        let metadata = serde_json::to_vec(&self.metadata)?;

        // Write both temporaries before replacing either file
        let vec_tmp = dir.join(format!("{VECTORS_FILE}.tmp"));
        let meta_tmp = dir.join(format!("{METADATA_FILE}.tmp"));
        std::fs::write(&vec_tmp, &blob)?;
        std::fs::write(&meta_tmp, &metadata)?;
        std::fs::rename(&vec_tmp, dir.join(VECTORS_FILE))?;
        std::fs::rename(&meta_tmp, dir.join(METADATA_FILE))?;

        tracing::debug!("Saved {} vectors to {}", self.size(), dir.display());
        Ok(())
    }

    /// Restore a store saved with [`FlatStore::save`]
    ///
    /// Fails with `NotFound` when neither file exists and with
    /// `InvariantViolation` when the pair is incomplete or inconsistent.
    pub fn load(dir: &Path) -> Result<Self> {
        let vec_path = dir.join(VECTORS_FILE);
        let meta_path = dir.join(METADATA_FILE);

        match (vec_path.exists(), meta_path.exists()) {
            (false, false) => {
                return Err(FolioError::NotFound(format!("index at {}", dir.display())))
            }
            (true, true) => {}
            _ => {
                return Err(corrupt(dir, "only one of the vector and metadata files exists"))
            }
        }

        let blob = std::fs::read(&vec_path)?;
        let metadata: Vec<Chunk> = serde_json::from_slice(&std::fs::read(&meta_path)?)
            .map_err(|e| corrupt(dir, &format!("unreadable metadata: {e}")))?;

        if blob.len() < HEADER_LEN || &blob[..8] != MAGIC {
            return Err(corrupt(dir, "bad vector file header"));
        }
        let version = read_u32(&blob[8..12]);
        if version != FORMAT_VERSION {
            return Err(corrupt(dir, &format!("unsupported format version {version}")));
        }
        let dimension = read_u32(&blob[12..16]) as usize;
        let count = read_u64(&blob[16..24]) as usize;

        let payload = &blob[HEADER_LEN..];
        if payload.len() != count * dimension * 4 {
            return Err(corrupt(
                dir,
                &format!(
                    "vector payload is {} bytes, header promises {} x {}",
                    payload.len(),
                    count,
                    dimension
                ),
            ));
        }
        if metadata.len() != count {
            return Err(corrupt(
                dir,
                &format!("{} vectors but {} metadata entries", count, metadata.len()),
            ));
        }

        let vectors = payload
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(Self {
            dimension,
            similarity_floor: DEFAULT_SIMILARITY_FLOOR,
            vectors,
            metadata,
        })
    }

    /// Whether `dir` holds a saved store
    pub fn exists(dir: &Path) -> bool {
        dir.join(VECTORS_FILE).exists() && dir.join(METADATA_FILE).exists()
    }
}

fn corrupt(dir: &Path, detail: &str) -> FolioError {
    FolioError::InvariantViolation(format!("{}: {detail}", PathBuf::from(dir).display()))
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}
