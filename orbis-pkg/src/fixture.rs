//! Builders for synthetic packages used by the unit tests.

use std::io::{Cursor, Write};

use binrw::BinWrite;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use sha2::{Digest, Sha256};

use crate::crypto::{self, BLOCK_SIZE};
use crate::sfo::{FMT_INTEGER, FMT_TEXT, SFO_HEADER_SIZE, SFO_INDEX_SIZE, SFO_MAGIC};
use crate::structs::{
    DIGEST_SIZE, ENTRY_DESCRIPTOR_SIZE, EntryDescriptor, EntryFlag, EntryKind, PKG_HEADER_SIZE,
    PKG_MAGIC, PackageHeader, RawEntry, WellKnownEntry,
};

const NAMED_ID_BASE: u32 = 0x8000;

pub struct FixtureEntry {
    id: Option<u32>,
    name: Option<String>,
    data: Vec<u8>,
    slot: Option<u8>,
    compressed: bool,
    declared_size: Option<u64>,
}

impl FixtureEntry {
    pub fn encrypted(mut self, slot: u8) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn compressed(mut self) -> Self {
        self.compressed = true;
        self
    }

    /// Override the `uncompressed_size` written to the descriptor.
    pub fn declared_size(mut self, size: u64) -> Self {
        self.declared_size = Some(size);
        self
    }
}

pub struct PackageBuilder {
    content_id: [u8; 36],
    entries: Vec<FixtureEntry>,
}

impl PackageBuilder {
    pub fn new(content_id: &str) -> Self {
        let mut cid = [0u8; 36];
        let len = content_id.len().min(cid.len());
        cid[..len].copy_from_slice(&content_id.as_bytes()[..len]);
        Self {
            content_id: cid,
            entries: Vec::new(),
        }
    }

    pub fn file(name: &str, data: Vec<u8>) -> FixtureEntry {
        FixtureEntry {
            id: None,
            name: Some(name.to_string()),
            data,
            slot: None,
            compressed: false,
            declared_size: None,
        }
    }

    pub fn entry(mut self, entry: FixtureEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn named(self, name: &str, data: Vec<u8>) -> Self {
        self.entry(Self::file(name, data))
    }

    pub fn well_known(self, wk: WellKnownEntry, data: Vec<u8>) -> Self {
        self.entry(FixtureEntry {
            id: Some(wk.id()),
            name: None,
            ..Self::file("", data)
        })
    }

    pub fn unnamed(self, id: u32, data: Vec<u8>) -> Self {
        self.entry(FixtureEntry {
            id: Some(id),
            name: None,
            ..Self::file("", data)
        })
    }

    pub fn build(self) -> Vec<u8> {
        self.build_with(|_, _| {})
    }

    /// Build, letting `tweak` edit the header and descriptors after the data
    /// has been encrypted and hashed.
    pub fn build_with(self, tweak: impl FnOnce(&mut PackageHeader, &mut [RawEntry])) -> Vec<u8> {
        let count = self.entries.len() as u64;

        // Name table, starting with an empty string at offset 0.
        let mut names = vec![0u8];
        let mut name_offsets = Vec::new();
        for e in &self.entries {
            match &e.name {
                Some(name) => {
                    name_offsets.push(names.len() as u32);
                    names.extend_from_slice(name.as_bytes());
                    names.push(0);
                }
                None => name_offsets.push(0),
            }
        }

        let entry_table_offset = PKG_HEADER_SIZE;
        let name_table_offset = entry_table_offset + count * ENTRY_DESCRIPTOR_SIZE;
        let digest_table_offset = name_table_offset + names.len() as u64;
        let mut data_offset = align(digest_table_offset + count * DIGEST_SIZE);

        let mut header = PackageHeader {
            magic: PKG_MAGIC,
            content_type: 0x1A,
            flags: 1,
            entry_count: count as u32,
            file_size: 0,
            entry_table_offset,
            name_table_offset,
            digest_table_offset,
            name_table_size: names.len() as u32,
            content_id: self.content_id,
        };

        let mut raws = Vec::new();
        let mut digests = Vec::new();
        let mut blobs = Vec::new();

        for (index, e) in self.entries.into_iter().enumerate() {
            digests.extend_from_slice(&Sha256::digest(&e.data));

            let mut stored = if e.compressed {
                let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
                enc.write_all(&e.data).unwrap();
                enc.finish().unwrap()
            } else {
                e.data.clone()
            };

            let mut flags1 = 0;
            if e.compressed {
                flags1 |= EntryFlag::Compressed as u32;
            }
            if e.slot.is_some() {
                flags1 |= EntryFlag::Encrypted as u32;
                stored.resize(stored.len().next_multiple_of(BLOCK_SIZE), 0);
            }

            let raw = RawEntry {
                id: e.id.unwrap_or(NAMED_ID_BASE | index as u32),
                name_offset: name_offsets[index],
                flags1,
                flags2: u32::from(e.slot.unwrap_or(0)) << 12,
                data_offset,
                data_size: stored.len() as u64,
                uncompressed_size: e.declared_size.unwrap_or(e.data.len() as u64),
                reserved: 0,
            };

            if e.slot.is_some() {
                let descriptor = EntryDescriptor {
                    index,
                    raw,
                    kind: EntryKind::Named(String::new()),
                };
                let key = crypto::derive_key(&header, &descriptor).unwrap();
                crypto::encrypt_in_place(&key, &mut stored).unwrap();
            }

            data_offset = align(data_offset + stored.len() as u64);
            raws.push(raw);
            blobs.push(stored);
        }

        header.file_size = data_offset;
        tweak(&mut header, &mut raws);

        let mut out = Cursor::new(Vec::new());
        header.write(&mut out).unwrap();
        let mut out = out.into_inner();
        out.resize(PKG_HEADER_SIZE as usize, 0);

        let mut table = Cursor::new(Vec::new());
        for raw in &raws {
            raw.write(&mut table).unwrap();
        }
        out.extend_from_slice(&table.into_inner());
        out.extend_from_slice(&names);
        out.extend_from_slice(&digests);

        for (raw, blob) in raws.iter().zip(&blobs) {
            out.resize(raw.data_offset as usize, 0);
            out.extend_from_slice(blob);
        }
        out.resize(header.file_size as usize, 0);
        out
    }

    /// Flip a bit in the digest-table slot of entry `index`.
    pub fn corrupt_digest(buf: &mut [u8], index: usize) {
        let mut at = [0u8; 8];
        at.copy_from_slice(&buf[0x28..0x30]);
        let slot = u64::from_be_bytes(at) as usize + index * DIGEST_SIZE as usize;
        buf[slot] ^= 0x01;
    }
}

fn align(offset: u64) -> u64 {
    offset.next_multiple_of(BLOCK_SIZE as u64)
}

// ---------------------------------------------------------------------------
// param.sfo
// ---------------------------------------------------------------------------

pub enum SfoValue<'a> {
    Text(&'a str),
    Integer(u32),
}

/// Serialize a property block with the given properties in order.
pub fn param_sfo(props: &[(&str, SfoValue<'_>)]) -> Vec<u8> {
    let mut keys = Vec::new();
    let mut data = Vec::new();
    let mut index = Vec::new();

    for (key, value) in props {
        let key_offset = keys.len() as u16;
        keys.extend_from_slice(key.as_bytes());
        keys.push(0);

        let (fmt, bytes) = match value {
            SfoValue::Text(s) => {
                let mut b = s.as_bytes().to_vec();
                b.push(0);
                (FMT_TEXT, b)
            }
            SfoValue::Integer(v) => (FMT_INTEGER, v.to_le_bytes().to_vec()),
        };
        let len = bytes.len() as u32;
        let max_len = len.next_multiple_of(4);
        let data_offset = data.len() as u32;
        data.extend_from_slice(&bytes);
        data.resize(data.len() + (max_len - len) as usize, 0);

        index.extend_from_slice(&key_offset.to_le_bytes());
        index.extend_from_slice(&fmt.to_le_bytes());
        index.extend_from_slice(&len.to_le_bytes());
        index.extend_from_slice(&max_len.to_le_bytes());
        index.extend_from_slice(&data_offset.to_le_bytes());
    }
    keys.resize(keys.len().next_multiple_of(4), 0);

    let key_table = SFO_HEADER_SIZE as u32 + (props.len() as u64 * SFO_INDEX_SIZE) as u32;
    let data_table = key_table + keys.len() as u32;

    let mut out = Vec::new();
    out.extend_from_slice(&SFO_MAGIC.to_le_bytes());
    out.extend_from_slice(&0x0101u32.to_le_bytes());
    out.extend_from_slice(&key_table.to_le_bytes());
    out.extend_from_slice(&data_table.to_le_bytes());
    out.extend_from_slice(&(props.len() as u32).to_le_bytes());
    out.extend_from_slice(&index);
    out.extend_from_slice(&keys);
    out.extend_from_slice(&data);
    out
}
