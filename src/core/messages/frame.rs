//! Multipart framing for the TCP transport.
//!
//! A frame is a one byte part count followed by each part as a big-endian
//! `u32` length and the raw bytes.

use crate::core::error::{SimError, SimResult};

pub const MAX_PARTS: usize = 16;
pub const MAX_PART_LEN: usize = 16 * 1024 * 1024;

/// Encode `parts` into a single buffer ready for `write_all`
pub fn encode_frame<P: AsRef<[u8]>>(parts: &[P]) -> SimResult<Vec<u8>> {
    if parts.is_empty() || parts.len() > MAX_PARTS {
        return Err(SimError::Frame(format!(
            "part count {} outside 1..={}",
            parts.len(),
            MAX_PARTS
        )));
    }

    let total: usize = parts.iter().map(|p| 4 + p.as_ref().len()).sum();
    let mut buf = Vec::with_capacity(1 + total);
    buf.push(parts.len() as u8);
    for part in parts {
        let part = part.as_ref();
        if part.len() > MAX_PART_LEN {
            return Err(SimError::Frame(format!(
                "part of {} bytes exceeds limit of {}",
                part.len(),
                MAX_PART_LEN
            )));
        }
        buf.extend_from_slice(&(part.len() as u32).to_be_bytes());
        buf.extend_from_slice(part);
    }
    Ok(buf)
}

/// Incremental frame decoder.
///
/// Socket reads may stop anywhere inside a frame (read timeouts are used to
/// poll stop flags), so bytes are accumulated until a full frame is present.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pop the next complete frame, if any
    pub fn next_frame(&mut self) -> SimResult<Option<Vec<Vec<u8>>>> {
        let Some(&count) = self.buf.first() else {
            return Ok(None);
        };
        let count = count as usize;
        if count == 0 || count > MAX_PARTS {
            return Err(SimError::Frame(format!("invalid part count {}", count)));
        }

        let mut offset = 1;
        let mut spans = Vec::with_capacity(count);
        for _ in 0..count {
            if self.buf.len() < offset + 4 {
                return Ok(None);
            }
            let mut len_bytes = [0u8; 4];
            len_bytes.copy_from_slice(&self.buf[offset..offset + 4]);
            let len = u32::from_be_bytes(len_bytes) as usize;
            if len > MAX_PART_LEN {
                return Err(SimError::Frame(format!("part length {} exceeds limit", len)));
            }
            offset += 4;
            if self.buf.len() < offset + len {
                return Ok(None);
            }
            spans.push(offset..offset + len);
            offset += len;
        }

        let parts = spans.into_iter().map(|r| self.buf[r].to_vec()).collect();
        self.buf.drain(..offset);
        Ok(Some(parts))
    }
}
