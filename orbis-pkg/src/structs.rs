//! CNT package file format structures.
//!
//! A package has the following high-level layout. Only the entry data is
//! encrypted; the tables are plaintext.
//!
//! | Region        | Offset                | Notes                            |
//! |---------------|-----------------------|----------------------------------|
//! | Header        | `0x00`–`0x7F`         | Always plaintext                 |
//! | Entry table   | `entry_table_offset`  | `entry_count` × 0x30 bytes       |
//! | Name table    | `name_table_offset`   | NUL-terminated strings           |
//! | Digest table  | `digest_table_offset` | `entry_count` × SHA-256          |
//! | Entry data    | per descriptor        | AES-128-CBC and/or zlib          |

use core::fmt;
use std::borrow::Cow;
use std::path::PathBuf;

use binrw::{BinRead, BinWrite};
use enumflags2::{BitFlags, bitflags};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Package magic: `\x7FCNT` → `0x7F434E54` (big-endian).
pub const PKG_MAGIC: u32 = 0x7F43_4E54;

/// Size (in bytes) of the fixed header.
pub const PKG_HEADER_SIZE: u64 = 0x80;

/// Size of one descriptor in the entry table.
pub const ENTRY_DESCRIPTOR_SIZE: u64 = 0x30;

/// Size of one digest-table slot (SHA-256).
pub const DIGEST_SIZE: u64 = 32;

/// Upper bound on `entry_count` unless overridden in [`OpenOptions`](crate::OpenOptions).
pub const DEFAULT_MAX_ENTRIES: u32 = 4096;

/// Low byte of the header flags selects the encryption scheme.
pub const SCHEME_VERSION_MASK: u32 = 0xFF;

const KEY_SLOT_SHIFT: u32 = 12;
const KEY_SLOT_MASK: u32 = 0xF;

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Package header (`0x00`–`0x7F`, all big-endian).
///
/// ```text
/// 0x00  u32       magic (0x7F434E54)
/// 0x04  u32       content_type
/// 0x08  u32       flags               (scheme version in the low byte)
/// 0x0C  u32       entry_count
/// 0x10  u64       file_size
/// 0x18  u64       entry_table_offset
/// 0x20  u64       name_table_offset
/// 0x28  u64       digest_table_offset
/// 0x30  u32       name_table_size
/// 0x34  [u8;12]   (reserved)
/// 0x40  [u8;36]   content_id          (NUL-padded ASCII)
/// 0x64  [u8;28]   (reserved)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct PackageHeader {
    pub magic: u32,
    pub content_type: u32,
    pub flags: u32,
    pub entry_count: u32,
    pub file_size: u64,
    pub entry_table_offset: u64,
    pub name_table_offset: u64,
    pub digest_table_offset: u64,
    pub name_table_size: u32,
    #[brw(pad_before = 12)]
    pub content_id: [u8; 36],
}

impl PackageHeader {
    #[inline]
    pub const fn is_valid_magic(&self) -> bool {
        self.magic == PKG_MAGIC
    }

    /// Encryption scheme version used to pick the seed table.
    #[inline]
    pub const fn scheme_version(&self) -> u8 {
        (self.flags & SCHEME_VERSION_MASK) as u8
    }

    /// Content-ID as a UTF-8 `&str`, stripping trailing NULs.
    pub fn content_id_str(&self) -> &str {
        let end = self
            .content_id
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.content_id.len());
        core::str::from_utf8(&self.content_id[..end]).unwrap_or("<invalid UTF-8>")
    }

    /// The title segment of a content id such as `UP0000-CUSA00000_00-…`.
    pub fn content_title_id(&self) -> Option<&str> {
        let title = self.content_id_str().get(7..16)?;
        title
            .bytes()
            .all(|b| b.is_ascii_alphanumeric())
            .then_some(title)
    }
}

impl fmt::Display for PackageHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PackageHeader(content_id=\"{}\", content_type={:#x}, scheme={}, entries={}, \
             file_size={}, entry_table={:#x}, name_table={:#x}+{}, digests={:#x})",
            self.content_id_str(),
            self.content_type,
            self.scheme_version(),
            self.entry_count,
            self.file_size,
            self.entry_table_offset,
            self.name_table_offset,
            self.name_table_size,
            self.digest_table_offset,
        )
    }
}

// ---------------------------------------------------------------------------
// Entry descriptor
// ---------------------------------------------------------------------------

/// Bits of a descriptor's `flags1` word.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[bitflags]
#[repr(u32)]
pub enum EntryFlag {
    Compressed = 0x4000_0000,
    Encrypted = 0x8000_0000,
}

/// A single record of the entry table (48 bytes each).
///
/// ```text
/// 0x00  u32  id
/// 0x04  u32  name_offset        (relative to the name table, 0 = none)
/// 0x08  u32  flags1             (bit 31 encrypted, bit 30 compressed)
/// 0x0C  u32  flags2             (bits 12..16 key slot)
/// 0x10  u64  data_offset        (absolute)
/// 0x18  u64  data_size          (on disk)
/// 0x20  u64  uncompressed_size
/// 0x28  u64  reserved
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct RawEntry {
    pub id: u32,
    pub name_offset: u32,
    pub flags1: u32,
    pub flags2: u32,
    pub data_offset: u64,
    pub data_size: u64,
    pub uncompressed_size: u64,
    pub reserved: u64,
}

impl RawEntry {
    #[must_use]
    pub fn flags(&self) -> BitFlags<EntryFlag> {
        BitFlags::from_bits_truncate(self.flags1)
    }

    #[inline]
    pub const fn key_slot(&self) -> u8 {
        ((self.flags2 >> KEY_SLOT_SHIFT) & KEY_SLOT_MASK) as u8
    }
}

impl fmt::Display for RawEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RawEntry(id={:#06x}, name_off={:#x}, data_off={:#x}, data_sz={}, \
             size={}, flags={:#010x}/{:#010x})",
            self.id,
            self.name_offset,
            self.data_offset,
            self.data_size,
            self.uncompressed_size,
            self.flags1,
            self.flags2,
        )
    }
}

// ---------------------------------------------------------------------------
// Well-known entries
// ---------------------------------------------------------------------------

/// Entries with a fixed name and location in the extracted tree.
///
/// This is the single mapping from entry ids to on-disk layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownEntry {
    /// The property block holding the title id.
    ParamSfo,
    PlaygoChunkDat,
    PlaygoChunkSha,
    PlaygoManifest,
    PronunciationXml,
    PronunciationSig,
    Pic1,
    PubToolInfo,
    /// Save-data template icon.
    SaveDataPng,
    Icon0,
    Pic0,
    Snd0,
    ChangeInfo,
    LicenseDat,
    LicenseInfo,
    NpTitleDat,
    NpBindDat,
    /// `trophyNN.trp`, `NN` in `0..100`.
    Trophy(u8),
    /// Root-level executable.
    Executable,
}

const TROPHY_FIRST_ID: u32 = 0x1400;
const TROPHY_LAST_ID: u32 = 0x1463;

impl WellKnownEntry {
    pub const fn id(self) -> u32 {
        match self {
            Self::ParamSfo => 0x1000,
            Self::PlaygoChunkDat => 0x1001,
            Self::PlaygoChunkSha => 0x1002,
            Self::PlaygoManifest => 0x1003,
            Self::PronunciationXml => 0x1004,
            Self::PronunciationSig => 0x1005,
            Self::Pic1 => 0x1006,
            Self::PubToolInfo => 0x1007,
            Self::SaveDataPng => 0x100D,
            Self::Icon0 => 0x1200,
            Self::Pic0 => 0x1220,
            Self::Snd0 => 0x1240,
            Self::ChangeInfo => 0x1260,
            Self::LicenseDat => 0x0400,
            Self::LicenseInfo => 0x0401,
            Self::NpTitleDat => 0x0402,
            Self::NpBindDat => 0x0403,
            Self::Trophy(n) => TROPHY_FIRST_ID + n as u32,
            Self::Executable => 0x2000,
        }
    }

    pub fn file_name(self) -> Cow<'static, str> {
        Cow::Borrowed(match self {
            Self::ParamSfo => "param.sfo",
            Self::PlaygoChunkDat => "playgo-chunk.dat",
            Self::PlaygoChunkSha => "playgo-chunk.sha",
            Self::PlaygoManifest => "playgo-manifest.xml",
            Self::PronunciationXml => "pronunciation.xml",
            Self::PronunciationSig => "pronunciation.sig",
            Self::Pic1 => "pic1.png",
            Self::PubToolInfo => "pubtoolinfo.dat",
            Self::SaveDataPng => "save_data.png",
            Self::Icon0 => "icon0.png",
            Self::Pic0 => "pic0.png",
            Self::Snd0 => "snd0.at9",
            Self::ChangeInfo => "changeinfo.xml",
            Self::LicenseDat => "license.dat",
            Self::LicenseInfo => "license.info",
            Self::NpTitleDat => "nptitle.dat",
            Self::NpBindDat => "npbind.dat",
            Self::Trophy(n) => return Cow::Owned(format!("trophy{n:02}.trp")),
            Self::Executable => "eboot.bin",
        })
    }

    /// Directory relative to the extraction root (empty for the root).
    pub const fn directory(self) -> &'static str {
        match self {
            Self::Executable => "",
            Self::ChangeInfo => "sce_sys/changeinfo",
            Self::Trophy(_) => "sce_sys/trophy",
            _ => "sce_sys",
        }
    }
}

impl TryFrom<u32> for WellKnownEntry {
    type Error = u32;
    fn try_from(v: u32) -> Result<Self, u32> {
        match v {
            0x1000 => Ok(Self::ParamSfo),
            0x1001 => Ok(Self::PlaygoChunkDat),
            0x1002 => Ok(Self::PlaygoChunkSha),
            0x1003 => Ok(Self::PlaygoManifest),
            0x1004 => Ok(Self::PronunciationXml),
            0x1005 => Ok(Self::PronunciationSig),
            0x1006 => Ok(Self::Pic1),
            0x1007 => Ok(Self::PubToolInfo),
            0x100D => Ok(Self::SaveDataPng),
            0x1200 => Ok(Self::Icon0),
            0x1220 => Ok(Self::Pic0),
            0x1240 => Ok(Self::Snd0),
            0x1260 => Ok(Self::ChangeInfo),
            0x0400 => Ok(Self::LicenseDat),
            0x0401 => Ok(Self::LicenseInfo),
            0x0402 => Ok(Self::NpTitleDat),
            0x0403 => Ok(Self::NpBindDat),
            TROPHY_FIRST_ID..=TROPHY_LAST_ID => Ok(Self::Trophy((v - TROPHY_FIRST_ID) as u8)),
            0x2000 => Ok(Self::Executable),
            other => Err(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved entry
// ---------------------------------------------------------------------------

/// How an entry gets its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    WellKnown(WellKnownEntry),
    Named(String),
}

/// A descriptor together with its table index and resolved name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDescriptor {
    /// Position in the entry table (file order).
    pub index: usize,
    pub raw: RawEntry,
    pub kind: EntryKind,
}

impl EntryDescriptor {
    #[inline]
    pub const fn id(&self) -> u32 {
        self.raw.id
    }

    pub fn is_encrypted(&self) -> bool {
        self.raw.flags().contains(EntryFlag::Encrypted)
    }

    pub fn is_compressed(&self) -> bool {
        self.raw.flags().contains(EntryFlag::Compressed)
    }

    #[inline]
    pub const fn key_slot(&self) -> u8 {
        self.raw.key_slot()
    }

    pub fn name(&self) -> Cow<'_, str> {
        match &self.kind {
            EntryKind::WellKnown(wk) => wk.file_name(),
            EntryKind::Named(name) => Cow::Borrowed(name),
        }
    }

    /// Output path relative to the extraction root, before sanitizing.
    pub fn relative_path(&self) -> PathBuf {
        match &self.kind {
            EntryKind::WellKnown(wk) => PathBuf::from(wk.directory()).join(&*wk.file_name()),
            EntryKind::Named(name) => PathBuf::from(name),
        }
    }
}

impl fmt::Display for EntryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match (self.is_encrypted(), self.is_compressed()) {
            (true, true) => "enc+zlib",
            (true, false) => "enc",
            (false, true) => "zlib",
            (false, false) => "plain",
        };
        write!(
            f,
            "Entry(#{}, id={:#06x}, \"{}\", {}, size={})",
            self.index,
            self.id(),
            self.relative_path().display(),
            mode,
            self.raw.uncompressed_size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_ids_roundtrip() {
        for id in [0x1000, 0x100D, 0x1260, 0x0403, 0x1400, 0x1463, 0x2000] {
            let wk = WellKnownEntry::try_from(id).unwrap();
            assert_eq!(wk.id(), id);
        }
        assert_eq!(WellKnownEntry::try_from(0x1464), Err(0x1464));
    }

    #[test]
    fn well_known_layout() {
        let trophy = WellKnownEntry::Trophy(7);
        assert_eq!(trophy.file_name(), "trophy07.trp");
        assert_eq!(trophy.directory(), "sce_sys/trophy");
        assert_eq!(WellKnownEntry::Executable.directory(), "");

        let entry = EntryDescriptor {
            index: 0,
            raw: RawEntry {
                id: 0x1260,
                name_offset: 0,
                flags1: 0,
                flags2: 0,
                data_offset: 0,
                data_size: 0,
                uncompressed_size: 0,
                reserved: 0,
            },
            kind: EntryKind::WellKnown(WellKnownEntry::ChangeInfo),
        };
        assert_eq!(
            entry.relative_path(),
            PathBuf::from("sce_sys/changeinfo/changeinfo.xml")
        );
    }

    #[test]
    fn flag_bits() {
        let raw = RawEntry {
            id: 1,
            name_offset: 0,
            flags1: 0xC000_0000,
            flags2: 0x0000_3000,
            data_offset: 0,
            data_size: 0,
            uncompressed_size: 0,
            reserved: 0,
        };
        assert!(raw.flags().contains(EntryFlag::Encrypted | EntryFlag::Compressed));
        assert_eq!(raw.key_slot(), 3);
    }

    #[test]
    fn content_title_segment() {
        let mut content_id = [0u8; 36];
        let cid = b"UP0001-CUSA01234_00-ABCDEFGHIJKLMNOP";
        content_id.copy_from_slice(cid);
        let header = PackageHeader {
            magic: PKG_MAGIC,
            content_type: 0,
            flags: 1,
            entry_count: 0,
            file_size: 0,
            entry_table_offset: 0,
            name_table_offset: 0,
            digest_table_offset: 0,
            name_table_size: 0,
            content_id,
        };
        assert_eq!(header.content_title_id(), Some("CUSA01234"));
        assert_eq!(header.scheme_version(), 1);
    }
}
