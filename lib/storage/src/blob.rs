//! On-disk format of the similarity index.
//!
//! ```text
//! magic "CSIX" | version u16 | kind u8 | reserved u8 | weights 3 x f32
//! | payload length u64 | sha256(payload) 32 bytes | bincode payload
//! ```
//!
//! All integers little-endian. The fusion weights the index was built with
//! travel in the header so the serving side can refuse a mismatch.

use anyhow::{anyhow, bail, Context, Result};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use cinesim_core::{AnnIndex, FusionWeights, IndexKind, SimilarityIndex};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::Path;

pub const INDEX_MAGIC: [u8; 4] = *b"CSIX";
pub const INDEX_VERSION: u16 = 1;
const HEADER_LEN: usize = 4 + 2 + 1 + 1 + 12 + 8 + 32;

/// Decoded blob header
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHeader {
    pub version: u16,
    pub kind: IndexKind,
    pub weights: FusionWeights,
    pub payload_len: u64,
}

fn kind_tag(kind: IndexKind) -> u8 {
    match kind {
        IndexKind::Exact => 0,
        IndexKind::Hnsw => 1,
    }
}

fn kind_from_tag(tag: u8) -> Result<IndexKind> {
    match tag {
        0 => Ok(IndexKind::Exact),
        1 => Ok(IndexKind::Hnsw),
        other => bail!("unknown index kind tag {}", other),
    }
}

pub fn encode_index(index: &SimilarityIndex, weights: FusionWeights) -> Result<Vec<u8>> {
    let payload =
        bincode::serialize(index).map_err(|e| anyhow!("Serialization error: {}", e))?;
    let checksum = Sha256::digest(&payload);

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&INDEX_MAGIC);
    out.extend_from_slice(&INDEX_VERSION.to_le_bytes());
    out.push(kind_tag(index.kind()));
    out.push(0);
    for w in [weights.embedding, weights.categorical, weights.numeric] {
        out.extend_from_slice(&w.to_le_bytes());
    }
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(&checksum);
    out.extend_from_slice(&payload);
    Ok(out)
}

pub fn decode_header(bytes: &[u8]) -> Result<IndexHeader> {
    if bytes.len() < HEADER_LEN {
        bail!("index blob truncated: {} bytes", bytes.len());
    }
    if bytes[..4] != INDEX_MAGIC {
        bail!("not a cinesim index blob (bad magic)");
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != INDEX_VERSION {
        bail!("unsupported index blob version {}", version);
    }
    let kind = kind_from_tag(bytes[6])?;

    let f32_at = |offset: usize| {
        f32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
    };
    let weights = FusionWeights {
        embedding: f32_at(8),
        categorical: f32_at(12),
        numeric: f32_at(16),
    };

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[20..28]);
    Ok(IndexHeader {
        version,
        kind,
        weights,
        payload_len: u64::from_le_bytes(len_bytes),
    })
}

pub fn decode_index(bytes: &[u8]) -> Result<(IndexHeader, SimilarityIndex)> {
    let header = decode_header(bytes)?;
    let payload = &bytes[HEADER_LEN..];
    if payload.len() as u64 != header.payload_len {
        bail!(
            "index payload is {} bytes, header says {}",
            payload.len(),
            header.payload_len
        );
    }
    let checksum = Sha256::digest(payload);
    if checksum.as_slice() != &bytes[28..HEADER_LEN] {
        bail!("index payload checksum mismatch");
    }

    let index: SimilarityIndex =
        bincode::deserialize(payload).map_err(|e| anyhow!("Deserialization error: {}", e))?;
    if index.kind() != header.kind {
        bail!(
            "index header says {} but payload holds {}",
            header.kind,
            index.kind()
        );
    }
    Ok((header, index))
}

/// Write the blob atomically (temp file + rename). Returns its size.
pub fn save_index<P: AsRef<Path>>(
    path: P,
    index: &SimilarityIndex,
    weights: FusionWeights,
) -> Result<u64> {
    let path = path.as_ref();
    let bytes = encode_index(index, weights)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| f.write_all(&bytes))
        .map_err(|e| anyhow!("writing {}: {}", path.display(), e))?;
    Ok(bytes.len() as u64)
}

pub fn load_index<P: AsRef<Path>>(path: P) -> Result<(IndexHeader, SimilarityIndex)> {
    let path = path.as_ref();
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    decode_index(&bytes).with_context(|| format!("decoding {}", path.display()))
}
