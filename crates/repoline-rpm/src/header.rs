//! Low-level RPM container reading: lead, header preambles, data store
//!
//! An RPM file is a 96-byte lead, a signature header padded to an 8-byte
//! boundary, and the main metadata header, followed by the payload (which
//! this crate never reads). Both headers share one layout: a 16-byte
//! preamble, `count` 16-byte index entries and a data store, all integers
//! big-endian.

use std::collections::HashMap;
use std::io::Read;

use crate::error::RpmError;

pub const LEAD_SIZE: u64 = 96;
const LEAD_MAGIC: [u8; 4] = [0xED, 0xAB, 0xEE, 0xDB];
const HEADER_MAGIC: [u8; 4] = [0x8E, 0xAD, 0xE8, 0x01];

pub const TYPE_CHAR: u32 = 1;
pub const TYPE_INT8: u32 = 2;
pub const TYPE_INT16: u32 = 3;
pub const TYPE_INT32: u32 = 4;
pub const TYPE_INT64: u32 = 5;
pub const TYPE_STRING: u32 = 6;
pub const TYPE_BIN: u32 = 7;
pub const TYPE_STRING_ARRAY: u32 = 8;
pub const TYPE_I18NSTRING: u32 = 9;

/// Sizes from a header preamble; enough to compute section extents
/// without decoding any entries.
#[derive(Clone, Copy, Debug)]
pub struct Preamble {
    pub index_count: u32,
    pub store_size: u32,
}

impl Preamble {
    /// Bytes occupied by the whole section (preamble + index + store),
    /// unpadded.
    pub fn section_size(self) -> u64 {
        16 + u64::from(self.index_count) * 16 + u64::from(self.store_size)
    }

    /// Section size padded to the 8-byte boundary the signature header
    /// keeps between itself and the main header.
    pub fn padded_section_size(self) -> u64 {
        let size = self.section_size();
        size + (8 - size % 8) % 8
    }
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes(buf[at..at + 4].try_into().expect("4 bytes"))
}

/// Read and validate the 96-byte lead.
pub fn read_lead(reader: &mut impl Read) -> Result<(), RpmError> {
    let mut lead = [0u8; LEAD_SIZE as usize];
    reader.read_exact(&mut lead)?;
    if lead[..4] != LEAD_MAGIC {
        return Err(RpmError::BadMagic("lead"));
    }
    Ok(())
}

/// Read a header preamble, validating its magic.
pub fn read_preamble(reader: &mut impl Read, section: &'static str) -> Result<Preamble, RpmError> {
    let mut preamble = [0u8; 16];
    reader.read_exact(&mut preamble)?;
    if preamble[..4] != HEADER_MAGIC {
        return Err(RpmError::BadMagic(section));
    }
    Ok(Preamble {
        index_count: read_u32(&preamble, 8),
        store_size: read_u32(&preamble, 12),
    })
}

/// Skip a section's index and store without decoding it.
pub fn skip_section(reader: &mut impl Read, preamble: Preamble, pad: bool) -> Result<(), RpmError> {
    let size = if pad {
        preamble.padded_section_size()
    } else {
        preamble.section_size()
    } - 16;
    std::io::copy(&mut reader.take(size), &mut std::io::sink())?;
    Ok(())
}

#[derive(Clone, Copy, Debug)]
struct IndexEntry {
    kind: u32,
    offset: usize,
    count: usize,
}

/// One decoded header section: index entries keyed by tag over a shared
/// data store. Values are decoded lazily by the typed getters.
pub struct Header {
    entries: HashMap<u32, IndexEntry>,
    store: Vec<u8>,
}

impl Header {
    /// Read the index and store of a section whose preamble has already
    /// been consumed.
    pub fn read(reader: &mut impl Read, preamble: Preamble) -> Result<Self, RpmError> {
        let mut index = vec![0u8; preamble.index_count as usize * 16];
        reader.read_exact(&mut index)?;
        let mut store = vec![0u8; preamble.store_size as usize];
        reader.read_exact(&mut store)?;

        let mut entries = HashMap::with_capacity(preamble.index_count as usize);
        for raw in index.chunks_exact(16) {
            let tag = read_u32(raw, 0);
            let entry = IndexEntry {
                kind: read_u32(raw, 4),
                offset: read_u32(raw, 8) as usize,
                count: read_u32(raw, 12) as usize,
            };
            if entry.offset > store.len() {
                return Err(RpmError::BadStore(format!(
                    "tag {tag} offset {} beyond store ({} bytes)",
                    entry.offset,
                    store.len()
                )));
            }
            entries.insert(tag, entry);
        }
        Ok(Self { entries, store })
    }

    pub fn has(&self, tag: u32) -> bool {
        self.entries.contains_key(&tag)
    }

    fn entry(&self, tag: u32) -> Option<IndexEntry> {
        self.entries.get(&tag).copied()
    }

    fn nul_str_at(&self, offset: usize) -> Result<(&str, usize), RpmError> {
        let rest = &self.store[offset..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| RpmError::BadStore(format!("unterminated string at {offset}")))?;
        let s = std::str::from_utf8(&rest[..end])
            .map_err(|e| RpmError::BadStore(format!("invalid UTF-8 at {offset}: {e}")))?;
        Ok((s, offset + end + 1))
    }

    /// STRING or I18NSTRING value. I18N entries yield their first
    /// (default-locale) string.
    pub fn str_value(&self, tag: u32) -> Result<Option<&str>, RpmError> {
        match self.entry(tag) {
            Some(e) if e.kind == TYPE_STRING || e.kind == TYPE_I18NSTRING => {
                Ok(Some(self.nul_str_at(e.offset)?.0))
            }
            _ => Ok(None),
        }
    }

    /// STRING_ARRAY values; empty when the tag is absent.
    pub fn str_array(&self, tag: u32) -> Result<Vec<String>, RpmError> {
        let Some(e) = self.entry(tag) else {
            return Ok(Vec::new());
        };
        if e.kind != TYPE_STRING_ARRAY && e.kind != TYPE_I18NSTRING {
            return Ok(Vec::new());
        }
        let mut values = Vec::with_capacity(e.count);
        let mut offset = e.offset;
        for _ in 0..e.count {
            let (s, next) = self.nul_str_at(offset)?;
            values.push(s.to_string());
            offset = next;
        }
        Ok(values)
    }

    fn int_array<const W: usize>(
        &self,
        tag: u32,
        kind: u32,
        decode: impl Fn([u8; W]) -> u64,
    ) -> Result<Vec<u64>, RpmError> {
        let Some(e) = self.entry(tag) else {
            return Ok(Vec::new());
        };
        if e.kind != kind {
            return Ok(Vec::new());
        }
        let end = e.offset + e.count * W;
        if end > self.store.len() {
            return Err(RpmError::BadStore(format!(
                "tag {tag} data runs past the store"
            )));
        }
        Ok(self.store[e.offset..end]
            .chunks_exact(W)
            .map(|c| decode(c.try_into().expect("chunk width")))
            .collect())
    }

    pub fn u16_array(&self, tag: u32) -> Result<Vec<u16>, RpmError> {
        Ok(self
            .int_array::<2>(tag, TYPE_INT16, |b| u64::from(u16::from_be_bytes(b)))?
            .into_iter()
            .map(|v| v as u16)
            .collect())
    }

    pub fn u32_array(&self, tag: u32) -> Result<Vec<u32>, RpmError> {
        Ok(self
            .int_array::<4>(tag, TYPE_INT32, |b| u64::from(u32::from_be_bytes(b)))?
            .into_iter()
            .map(|v| v as u32)
            .collect())
    }

    pub fn u32_value(&self, tag: u32) -> Result<Option<u32>, RpmError> {
        Ok(self.u32_array(tag)?.first().copied())
    }

    /// INT64 value, falling back to INT32 for tags that predate the wide
    /// variants.
    pub fn u64_value(&self, tag: u32) -> Result<Option<u64>, RpmError> {
        let wide = self.int_array::<8>(tag, TYPE_INT64, u64::from_be_bytes)?;
        if let Some(v) = wide.first() {
            return Ok(Some(*v));
        }
        Ok(self.u32_value(tag)?.map(u64::from))
    }
}
