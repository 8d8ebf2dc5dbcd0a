//! AAR container archives.
//!
//! An archive starts with a 16-byte header (`AAR\0`, version, entry
//! count, offset of the first entry's data) followed by the index. The
//! index region runs from byte 12 up to the first entry's data offset;
//! each record is `u32 offset, u32 size, i32 type, cstr name` plus, in
//! version 2, a `cstr` symlink target. Version 2 additionally masks
//! every index string byte with `+0x60`.
//!
//! Compressed entries carry a secondary `ZLB\0` frame, see
//! [`crate::compression`].

use std::io::{Cursor, Read, Seek, SeekFrom};

use binrw::BinReaderExt;
use indexmap::IndexMap;
use tracing::debug;

use crate::compression::{inflate_exact, ZlbHeader, ZLB_HEADER_SIZE};
use crate::error::{Error, Result};
use crate::strings::{read_cstr, read_cstr_with};

const HEADER_SIZE: u64 = 16;
const INDEX_START: u64 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Compressed,
    Raw,
    Symlink,
}

impl EntryKind {
    fn from_raw(raw: i32) -> Result<Self> {
        match raw {
            0 => Ok(EntryKind::Compressed),
            1 => Ok(EntryKind::Raw),
            2 => Ok(EntryKind::Symlink),
            _ => Err(Error::NotImplemented("archive entry type")),
        }
    }
}

/// One directory record of an archive.
#[derive(Debug, Clone)]
pub struct Entry {
    pub offset: u32,
    pub size: u32,
    pub kind: EntryKind,
    pub name: String,
    /// Version 2 only.
    pub symlink_target: Option<String>,
}

/// An opened archive. Entry data is read lazily through the inner
/// reader; the index is held in memory.
pub struct AarArchive<R> {
    reader: R,
    version: u32,
    entries: Vec<Entry>,
    /// Lowercased name -> index into `entries`, in directory order.
    by_name: IndexMap<String, usize>,
}

impl<R: Read + Seek> AarArchive<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let mut header = [0u8; HEADER_SIZE as usize];
        reader.seek(SeekFrom::Start(0))?;
        reader
            .read_exact(&mut header)
            .map_err(|_| Error::Truncated)?;
        if &header[0..4] != b"AAR\0" {
            return Err(Error::BadMagic { expected: "AAR\0" });
        }
        let version = u32::from_le_bytes(header[4..8].try_into().unwrap());
        if version != 0 && version != 2 {
            return Err(Error::UnsupportedVersion {
                what: "AAR",
                version,
            });
        }
        let nr_entries = u32::from_le_bytes(header[8..12].try_into().unwrap());
        let first_entry_offset = u32::from_le_bytes(header[12..16].try_into().unwrap()) as u64;
        if first_entry_offset < HEADER_SIZE {
            return Err(Error::Truncated);
        }

        // The index region overlaps the last header field: the first
        // entry's own offset tells us where the directory ends.
        let mut index = vec![0u8; (first_entry_offset - INDEX_START) as usize];
        reader.seek(SeekFrom::Start(INDEX_START))?;
        reader.read_exact(&mut index).map_err(|_| Error::Truncated)?;

        let mut cursor = Cursor::new(index.as_slice());
        let mut entries = Vec::with_capacity(nr_entries as usize);
        let mut by_name = IndexMap::with_capacity(nr_entries as usize);
        for _ in 0..nr_entries {
            let offset: u32 = cursor.read_le()?;
            let size: u32 = cursor.read_le()?;
            let kind = EntryKind::from_raw(cursor.read_le::<i32>()?)?;
            let (name, symlink_target) = if version == 2 {
                let name = read_cstr_with(&mut cursor, |b| b.wrapping_sub(0x60))?;
                let target = read_cstr_with(&mut cursor, |b| b.wrapping_sub(0x60))?;
                (name, Some(target))
            } else {
                (read_cstr(&mut cursor)?, None)
            };
            by_name.insert(name.to_lowercase(), entries.len());
            entries.push(Entry {
                offset,
                size,
                kind,
                name,
                symlink_target,
            });
        }

        Ok(AarArchive {
            reader,
            version,
            entries,
            by_name,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Original-case entry names in directory order.
    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// O(1), case-insensitive.
    pub fn exists(&self, name: &str) -> bool {
        self.by_name.contains_key(&name.to_lowercase())
    }

    pub fn entry(&self, name: &str) -> Option<&Entry> {
        self.by_name
            .get(&name.to_lowercase())
            .map(|&i| &self.entries[i])
    }

    /// Load and, for compressed entries, inflate an entry's payload.
    pub fn load(&mut self, name: &str) -> Result<Vec<u8>> {
        let &index = self
            .by_name
            .get(&name.to_lowercase())
            .ok_or_else(|| Error::NotFound(name.to_owned()))?;
        let entry = self.entries[index].clone();

        match entry.kind {
            EntryKind::Raw => self.read_span(entry.offset, entry.size),
            EntryKind::Compressed => {
                let data = self.read_span(entry.offset, entry.size)?;
                let header: ZlbHeader = Cursor::new(data.as_slice()).read_le()?;
                if header.version != 0 {
                    return Err(Error::UnsupportedVersion {
                        what: "ZLB",
                        version: header.version,
                    });
                }
                if header.in_size as usize + ZLB_HEADER_SIZE != entry.size as usize {
                    return Err(Error::SizeMismatch {
                        expected: entry.size as usize,
                        actual: header.in_size as usize + ZLB_HEADER_SIZE,
                    });
                }
                debug!(
                    name = entry.name,
                    out_size = header.out_size,
                    "inflating archive entry"
                );
                inflate_exact(
                    &data[ZLB_HEADER_SIZE..ZLB_HEADER_SIZE + header.in_size as usize],
                    header.out_size as usize,
                )
            }
            EntryKind::Symlink => Err(Error::NotImplemented("symlink archive entries")),
        }
    }

    fn read_span(&mut self, offset: u32, size: u32) -> Result<Vec<u8>> {
        self.reader.seek(SeekFrom::Start(offset as u64))?;
        let mut data = vec![0u8; size as usize];
        self.reader
            .read_exact(&mut data)
            .map_err(|_| Error::Truncated)?;
        Ok(data)
    }
}
