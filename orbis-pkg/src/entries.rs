//! Entry table and name table parsing.

use std::io::Cursor;

use binrw::BinRead;

use crate::bytes::ByteReader;
use crate::error::PkgError;
use crate::structs::{
    ENTRY_DESCRIPTOR_SIZE, EntryDescriptor, EntryKind, PackageHeader, RawEntry, WellKnownEntry,
};

/// Read every descriptor in file order and resolve its name.
///
/// The header must already have been validated by
/// [`parse_header`](crate::header::parse_header), which bounds
/// `entry_count` and the table extents.
pub fn parse_entries(
    reader: &ByteReader<'_>,
    header: &PackageHeader,
) -> Result<Vec<EntryDescriptor>, PkgError> {
    let count = header.entry_count as usize;
    let table_len = u64::from(header.entry_count)
        .checked_mul(ENTRY_DESCRIPTOR_SIZE)
        .ok_or(PkgError::InvalidOffsets {
            what: "entry table",
        })?;
    let table = reader
        .read_exact(header.entry_table_offset, table_len)
        .map_err(|_| PkgError::Truncated {
            what: "entry table",
        })?;
    let names = reader
        .read_exact(
            header.name_table_offset,
            u64::from(header.name_table_size),
        )
        .map_err(|_| PkgError::Truncated { what: "name table" })?;

    let mut cursor = Cursor::new(table);
    let mut out = Vec::with_capacity(count);

    for index in 0..count {
        let raw = RawEntry::read(&mut cursor).map_err(|_| PkgError::Truncated {
            what: "entry table",
        })?;

        let end = raw
            .data_offset
            .checked_add(raw.data_size)
            .ok_or(PkgError::InvalidOffsets { what: "entry data" })?;
        if end > header.file_size {
            return Err(PkgError::InvalidOffsets { what: "entry data" });
        }

        let kind = resolve_kind(index, &raw, names)?;
        out.push(EntryDescriptor { index, raw, kind });
    }

    Ok(out)
}

fn resolve_kind(index: usize, raw: &RawEntry, names: &[u8]) -> Result<EntryKind, PkgError> {
    if let Ok(wk) = WellKnownEntry::try_from(raw.id) {
        return Ok(EntryKind::WellKnown(wk));
    }

    if raw.name_offset == 0 {
        return Ok(EntryKind::Named(format!("__unnamed_{index:04}")));
    }

    let start = raw.name_offset as usize;
    let tail = names
        .get(start..)
        .filter(|tail| !tail.is_empty())
        .ok_or(PkgError::InvalidOffsets { what: "entry name" })?;
    let len = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or(PkgError::Truncated { what: "entry name" })?;

    String::from_utf8(tail[..len].to_vec())
        .map(EntryKind::Named)
        .map_err(|_| PkgError::InvalidEntryName(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::PackageBuilder;
    use crate::header::parse_header;
    use crate::options::OpenOptions;

    fn parse(buf: &[u8]) -> Result<Vec<EntryDescriptor>, PkgError> {
        let header = parse_header(buf, &OpenOptions::default())?;
        parse_entries(&ByteReader::new(buf), &header)
    }

    #[test]
    fn resolves_names_in_file_order() {
        let buf = PackageBuilder::new("UP0001-CUSA00001_00-0000000000000000")
            .well_known(WellKnownEntry::ParamSfo, b"sfo".to_vec())
            .named("USRDIR/data.bin", b"data".to_vec())
            .unnamed(0x7777, b"x".to_vec())
            .well_known(WellKnownEntry::Trophy(0), b"trp".to_vec())
            .build();

        let entries = parse(&buf).unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].kind, EntryKind::WellKnown(WellKnownEntry::ParamSfo));
        assert_eq!(entries[1].kind, EntryKind::Named("USRDIR/data.bin".into()));
        assert_eq!(entries[2].kind, EntryKind::Named("__unnamed_0002".into()));
        assert_eq!(entries[3].name(), "trophy00.trp");
        for (i, e) in entries.iter().enumerate() {
            assert_eq!(e.index, i);
        }
    }

    #[test]
    fn keeps_duplicate_names() {
        let buf = PackageBuilder::new("UP0001-CUSA00001_00-0000000000000000")
            .named("readme.txt", b"one".to_vec())
            .named("readme.txt", b"two".to_vec())
            .build();
        let entries = parse(&buf).unwrap();
        assert_eq!(entries[0].name(), entries[1].name());
    }

    #[test]
    fn rejects_data_past_end_of_file() {
        let mut buf = PackageBuilder::new("UP0001-CUSA00001_00-0000000000000000")
            .named("a.txt", b"alpha".to_vec())
            .build();
        // data_size of descriptor 0.
        let at = 0x80 + 0x18;
        buf[at..at + 8].copy_from_slice(&u64::MAX.to_be_bytes());
        assert!(matches!(
            parse(&buf),
            Err(PkgError::InvalidOffsets { what: "entry data" })
        ));
    }

    #[test]
    fn rejects_name_outside_name_table() {
        let mut buf = PackageBuilder::new("UP0001-CUSA00001_00-0000000000000000")
            .named("a.txt", b"alpha".to_vec())
            .build();
        let at = 0x80 + 0x04;
        buf[at..at + 4].copy_from_slice(&0x1000u32.to_be_bytes());
        assert!(matches!(
            parse(&buf),
            Err(PkgError::InvalidOffsets { what: "entry name" })
        ));
    }
}
