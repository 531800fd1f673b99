use bit_vec::BitVec;
use byteorder::{ByteOrder, LittleEndian};

use ::errors::{ErrorKind, Result};


/// Potentially-visible set: one row of bits per cluster, saying which other clusters might be
/// seen from it.
#[derive(Clone, Debug)]
pub struct Visibility {
    cluster_count: usize,
    row_bytes: usize,
    bits: BitVec,
}

impl Visibility {
    /// A level without visibility data; every cluster sees every other.
    pub fn everything() -> Visibility {
        Visibility{ cluster_count: 0, row_bytes: 0, bits: BitVec::new() }
    }

    /// Parse a visdata lump: cluster count, bytes per row, then the rows.
    pub fn parse(lump: &[u8]) -> Result<Visibility> {
        if lump.is_empty() {
            return Ok(Visibility::everything());
        }
        if lump.len() < 8 {
            bail!(ErrorKind::TruncatedData("visdata header"));
        }

        let cluster_count = LittleEndian::read_i32(&lump[0..4]);
        let row_bytes = LittleEndian::read_i32(&lump[4..8]);
        if cluster_count < 0 || row_bytes < 0 {
            bail!(ErrorKind::ParseError("visdata header", 0));
        }
        let cluster_count = cluster_count as usize;
        let row_bytes = row_bytes as usize;
        let end = cluster_count.checked_mul(row_bytes)
            .and_then(|n| n.checked_add(8))
            .ok_or(ErrorKind::ParseError("visdata header", 0))?;
        let rows = lump.get(8..end).ok_or(ErrorKind::TruncatedData("visdata"))?;

        Ok(Visibility{ cluster_count, row_bytes, bits: BitVec::from_bytes(rows) })
    }

    pub fn cluster_count(&self) -> usize {
        self.cluster_count
    }

    /// Whether anything in cluster `to` might be visible from cluster `from`.  Negative clusters
    /// (the camera is outside the level) and clusters beyond the table see everything.
    pub fn is_cluster_visible(&self, from: i32, to: i32) -> bool {
        if from < 0 || to < 0 {
            return true;
        }
        let (from, to) = (from as usize, to as usize);
        if from >= self.cluster_count || to / 8 >= self.row_bytes {
            return true;
        }

        // Rows are LSB-first within each byte; BitVec numbers bits MSB-first
        let byte = from * self.row_bytes + to / 8;
        let bit = byte * 8 + (7 - (to & 7));
        self.bits.get(bit).unwrap_or(true)
    }
}
