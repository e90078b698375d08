//! On-disk archive of named `f32` tensors.
//!
//! Format: magic, version, tensor count, then per tensor a length-prefixed
//! name, rank, dims, and the raw little-endian payload. Archives are always
//! loaded wholesale into memory.

use anyhow::{bail, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::tensor::{Shape, Tensor};

const MAGIC: &[u8; 8] = b"BITRSTEN";
const VERSION: u32 = 1;

/// Writes named tensors to `path`, replacing any existing file.
pub fn write_archive(path: impl AsRef<Path>, entries: &[(String, Tensor)]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(MAGIC)?;
    writer.write_all(&VERSION.to_le_bytes())?;
    writer.write_all(&(entries.len() as u32).to_le_bytes())?;

    for (name, tensor) in entries {
        let name_bytes = name.as_bytes();
        writer.write_all(&(name_bytes.len() as u32).to_le_bytes())?;
        writer.write_all(name_bytes)?;

        let dims = tensor.shape().dims();
        writer.write_all(&(dims.len() as u32).to_le_bytes())?;
        for &dim in dims {
            writer.write_all(&(dim as u64).to_le_bytes())?;
        }

        writer.write_all(&((tensor.len() * 4) as u64).to_le_bytes())?;
        for &value in tensor.data() {
            writer.write_all(&value.to_le_bytes())?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Reads every tensor from `path` in stored order.
pub fn read_archive(path: impl AsRef<Path>) -> Result<Vec<(String, Tensor)>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        bail!("invalid weight archive magic header");
    }
    let version = read_u32(&mut reader)?;
    if version != VERSION {
        bail!("unsupported weight archive version {}", version);
    }

    let tensor_count = read_u32(&mut reader)? as usize;
    let mut entries = Vec::with_capacity(tensor_count);
    for _ in 0..tensor_count {
        let name_len = read_u32(&mut reader)? as usize;
        let mut name_bytes = vec![0u8; name_len];
        reader.read_exact(&mut name_bytes)?;
        let name = String::from_utf8(name_bytes)?;

        let rank = read_u32(&mut reader)? as usize;
        let mut dims = Vec::with_capacity(rank);
        for _ in 0..rank {
            dims.push(read_u64(&mut reader)? as usize);
        }

        let byte_len = read_u64(&mut reader)? as usize;
        if byte_len % 4 != 0 {
            bail!("tensor '{}' data size misaligned", name);
        }
        let mut raw = vec![0u8; byte_len];
        reader.read_exact(&mut raw)?;
        let mut data = Vec::with_capacity(byte_len / 4);
        for chunk in raw.chunks_exact(4) {
            data.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }

        entries.push((name, Tensor::from_vec(Shape::new(dims), data)?));
    }
    Ok(entries)
}

fn read_u32(reader: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(reader: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}
