//! # Storage - Master State Persistence
//!
//! One small binary file survives master restarts:
//!
//! ```text
//! version:  i16  (must be 1)
//! fitness:  f32
//! dna_size: i32
//! dna:      dna_size bytes
//! ```
//!
//! All fields little-endian, packed. A missing or corrupt file is not
//! fatal; the master logs it and starts over with empty state.

use std::fs;
use std::path::Path;

use magpie_core::{MagpieError, MagpieResult};

/// Supported state file version
pub const STATE_VERSION: i16 = 1;

/// Read `(fitness, dna)` from a state file
pub fn read_state(path: &Path) -> MagpieResult<(f32, Vec<u8>)> {
    let bytes = fs::read(path)?;
    if bytes.len() < 10 {
        return Err(MagpieError::storage(format!(
            "State file '{}' truncated ({} bytes)",
            path.display(),
            bytes.len()
        )));
    }

    let version = i16::from_le_bytes([bytes[0], bytes[1]]);
    if version != STATE_VERSION {
        return Err(MagpieError::storage(format!(
            "Unsupported file version {version}"
        )));
    }

    let fitness = f32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
    let size = i32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);
    if size < 0 || bytes.len() < 10 + size as usize {
        return Err(MagpieError::storage(format!(
            "State file '{}' declares {size} DNA bytes but holds {}",
            path.display(),
            bytes.len() - 10
        )));
    }

    Ok((fitness, bytes[10..10 + size as usize].to_vec()))
}

/// Write `(fitness, dna)` to a state file
pub fn write_state(path: &Path, fitness: f32, dna: &[u8]) -> MagpieResult<()> {
    let mut bytes = Vec::with_capacity(10 + dna.len());
    bytes.extend_from_slice(&STATE_VERSION.to_le_bytes());
    bytes.extend_from_slice(&fitness.to_le_bytes());
    bytes.extend_from_slice(&(dna.len() as i32).to_le_bytes());
    bytes.extend_from_slice(dna);
    fs::write(path, bytes)?;
    Ok(())
}
