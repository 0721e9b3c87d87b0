//! Compressed binary container shared by the field cache and the snapshot
//! layer: magic bytes, a JSON header, then length-prefixed zstd sections.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{Read, Write};
use thiserror::Error;

/// zstd compression level applied to every section payload.
const COMPRESSION_LEVEL: i32 = 3;

/// Errors raised while reading or writing an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("header error: {0}")]
    Header(#[from] serde_json::Error),
    #[error("bad magic bytes")]
    BadMagic,
    #[error("truncated archive")]
    Truncated,
    #[error("section payload has unexpected length")]
    SectionLength,
}

/// Write `magic`, a JSON-encoded `header`, and each section compressed.
pub fn write_archive<W: Write, H: Serialize>(
    mut writer: W,
    magic: &[u8; 4],
    header: &H,
    sections: &[&[u8]],
) -> Result<(), ArchiveError> {
    writer.write_all(magic)?;

    let header_bytes = serde_json::to_vec(header)?;
    writer.write_all(&(header_bytes.len() as u32).to_le_bytes())?;
    writer.write_all(&header_bytes)?;

    writer.write_all(&(sections.len() as u32).to_le_bytes())?;
    for section in sections {
        let compressed = zstd::encode_all(*section, COMPRESSION_LEVEL)?;
        writer.write_all(&(compressed.len() as u64).to_le_bytes())?;
        writer.write_all(&compressed)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read an archive written by [`write_archive`], returning the decoded
/// header and the decompressed sections in order.
pub fn read_archive<R: Read, H: DeserializeOwned>(
    mut reader: R,
    magic: &[u8; 4],
) -> Result<(H, Vec<Vec<u8>>), ArchiveError> {
    let mut found = [0u8; 4];
    reader.read_exact(&mut found).map_err(|_| ArchiveError::Truncated)?;
    if &found != magic {
        return Err(ArchiveError::BadMagic);
    }

    let mut len4 = [0u8; 4];
    reader.read_exact(&mut len4).map_err(|_| ArchiveError::Truncated)?;
    let header_len = u32::from_le_bytes(len4) as usize;
    let mut header_bytes = vec![0u8; header_len];
    reader
        .read_exact(&mut header_bytes)
        .map_err(|_| ArchiveError::Truncated)?;
    let header = serde_json::from_slice(&header_bytes)?;

    reader.read_exact(&mut len4).map_err(|_| ArchiveError::Truncated)?;
    let section_count = u32::from_le_bytes(len4) as usize;

    let mut sections = Vec::with_capacity(section_count);
    for _ in 0..section_count {
        let mut len8 = [0u8; 8];
        reader.read_exact(&mut len8).map_err(|_| ArchiveError::Truncated)?;
        let compressed_len = u64::from_le_bytes(len8) as usize;
        let mut compressed = vec![0u8; compressed_len];
        reader
            .read_exact(&mut compressed)
            .map_err(|_| ArchiveError::Truncated)?;
        sections.push(zstd::decode_all(compressed.as_slice())?);
    }

    Ok((header, sections))
}

/// Encode an f32 slice as little-endian bytes.
#[must_use]
pub fn floats_to_bytes(values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode little-endian bytes produced by [`floats_to_bytes`].
pub fn floats_from_bytes(bytes: &[u8]) -> Result<Vec<f32>, ArchiveError> {
    if !bytes.len().is_multiple_of(4) {
        return Err(ArchiveError::SectionLength);
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
