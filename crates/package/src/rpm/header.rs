use super::tags::{
    HEADER_MAGIC, TYPE_CHAR, TYPE_I18NSTRING, TYPE_INT8, TYPE_INT16, TYPE_INT32, TYPE_INT64, TYPE_STRING,
    TYPE_STRING_ARRAY,
};
use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use std::io::Read;

// Generous upper bounds; anything larger is corrupt rather than big.
const MAX_INDEX_ENTRIES: u32 = 0x0001_0000;
const MAX_STORE_SIZE: u32 = 0x1000_0000;

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    tag: u32,
    kind: u32,
    offset: u32,
    count: u32,
}

/// An rpm header structure: an index of typed entries over a data store.
#[derive(Debug)]
pub(crate) struct Header {
    index: Vec<IndexEntry>,
    store: Vec<u8>,
}

fn malformed(reason: impl Into<String>) -> ErrorKind {
    ErrorKind::MalformedHeader(reason.into())
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

impl Header {
    /// Read one header; returns it with the number of bytes it occupied.
    pub(crate) fn read(reader: &mut impl Read) -> Result<(Self, u64)> {
        let mut intro = [0u8; 16];
        reader.read_exact(&mut intro).or_raise(|| malformed("truncated header intro"))?;
        if intro[..3] != HEADER_MAGIC {
            exn::bail!(malformed("bad header magic"));
        }
        let entries = be_u32(&intro[8..12]);
        let store_size = be_u32(&intro[12..16]);
        if entries > MAX_INDEX_ENTRIES || store_size > MAX_STORE_SIZE {
            exn::bail!(malformed(format!("implausible header size ({entries} entries, {store_size} bytes)")));
        }

        let mut raw_index = vec![0u8; entries as usize * 16];
        reader.read_exact(&mut raw_index).or_raise(|| malformed("truncated header index"))?;
        let mut store = vec![0u8; store_size as usize];
        reader.read_exact(&mut store).or_raise(|| malformed("truncated header store"))?;

        let index = raw_index
            .chunks_exact(16)
            .map(|chunk| IndexEntry {
                tag: be_u32(&chunk[0..4]),
                kind: be_u32(&chunk[4..8]),
                offset: be_u32(&chunk[8..12]),
                count: be_u32(&chunk[12..16]),
            })
            .collect();
        let size = 16 + raw_index.len() as u64 + u64::from(store_size);
        Ok((Self { index, store }, size))
    }

    fn entry(&self, tag: u32) -> Option<&IndexEntry> {
        self.index.iter().find(|entry| entry.tag == tag)
    }

    pub(crate) fn contains(&self, tag: u32) -> bool {
        self.entry(tag).is_some()
    }

    fn data(&self, entry: &IndexEntry) -> Result<&[u8]> {
        self.store
            .get(entry.offset as usize..)
            .ok_or_raise(|| malformed(format!("tag {} points outside the store", entry.tag)))
    }

    /// All strings of a string, string array or i18n string entry; empty when
    /// the tag is absent.
    pub(crate) fn strings(&self, tag: u32) -> Result<Vec<String>> {
        let Some(entry) = self.entry(tag) else {
            return Ok(Vec::new());
        };
        let count = match entry.kind {
            TYPE_STRING => 1,
            TYPE_STRING_ARRAY | TYPE_I18NSTRING => entry.count as usize,
            other => exn::bail!(malformed(format!("tag {tag} has type {other}, expected a string"))),
        };
        let mut data = self.data(entry)?;
        // Every string takes at least its terminating NUL.
        if count > data.len() {
            exn::bail!(malformed(format!("tag {tag} claims {count} strings in {} bytes", data.len())));
        }
        let mut strings = Vec::with_capacity(count);
        for _ in 0..count {
            let end = data
                .iter()
                .position(|b| *b == 0)
                .ok_or_raise(|| malformed(format!("unterminated string in tag {tag}")))?;
            strings.push(String::from_utf8_lossy(&data[..end]).into_owned());
            data = &data[end + 1..];
        }
        Ok(strings)
    }

    /// The first string of an entry. Translated entries keep the untranslated
    /// (C locale) value, which rpm always stores first.
    pub(crate) fn string(&self, tag: u32) -> Result<Option<String>> {
        Ok(self.strings(tag)?.into_iter().next())
    }

    /// All integers of a numeric entry, widened; empty when the tag is absent.
    pub(crate) fn numbers(&self, tag: u32) -> Result<Vec<u64>> {
        let Some(entry) = self.entry(tag) else {
            return Ok(Vec::new());
        };
        let width = match entry.kind {
            TYPE_CHAR | TYPE_INT8 => 1,
            TYPE_INT16 => 2,
            TYPE_INT32 => 4,
            TYPE_INT64 => 8,
            other => exn::bail!(malformed(format!("tag {tag} has type {other}, expected a number"))),
        };
        let data = self.data(entry)?;
        let data = (entry.count as usize)
            .checked_mul(width)
            .and_then(|len| data.get(..len))
            .ok_or_raise(|| malformed(format!("tag {tag} overruns the store")))?;
        Ok(data
            .chunks_exact(width)
            .map(|chunk| chunk.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
            .collect())
    }

    pub(crate) fn number(&self, tag: u32) -> Result<Option<u64>> {
        Ok(self.numbers(tag)?.into_iter().next())
    }
}
