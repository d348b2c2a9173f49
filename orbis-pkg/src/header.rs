//! Header parsing and validation.
//!
//! Every table range is checked against the file size here, before the entry
//! table parser sizes any allocation by the untrusted `entry_count`.

use std::io::Cursor;

use binrw::{BinRead, Endian};

use crate::bytes::ByteReader;
use crate::error::PkgError;
use crate::options::OpenOptions;
use crate::structs::{DIGEST_SIZE, ENTRY_DESCRIPTOR_SIZE, PKG_HEADER_SIZE, PKG_MAGIC, PackageHeader};

/// Parse and validate the fixed header at the start of `bytes`.
pub fn parse_header(bytes: &[u8], options: &OpenOptions) -> Result<PackageHeader, PkgError> {
    let reader = ByteReader::new(bytes);

    let magic = reader
        .read_u32(0, Endian::Big)
        .map_err(|_| PkgError::Truncated { what: "header" })?;
    if magic != PKG_MAGIC {
        return Err(PkgError::BadMagic { found: magic });
    }

    let raw = reader
        .read_exact(0, PKG_HEADER_SIZE)
        .map_err(|_| PkgError::Truncated { what: "header" })?;
    let header = PackageHeader::read(&mut Cursor::new(raw))
        .map_err(|_| PkgError::Truncated { what: "header" })?;

    if header.file_size > reader.len() {
        return Err(PkgError::Truncated { what: "file" });
    }

    if header.entry_count > options.max_entries {
        return Err(PkgError::TooManyEntries {
            count: header.entry_count,
            max: options.max_entries,
        });
    }

    let count = u64::from(header.entry_count);
    check_range(
        header.file_size,
        header.entry_table_offset,
        count.checked_mul(ENTRY_DESCRIPTOR_SIZE),
        "entry table",
    )?;
    check_range(
        header.file_size,
        header.name_table_offset,
        Some(u64::from(header.name_table_size)),
        "name table",
    )?;
    check_range(
        header.file_size,
        header.digest_table_offset,
        count.checked_mul(DIGEST_SIZE),
        "digest table",
    )?;

    tracing::debug!(%header, "parsed package header");

    Ok(header)
}

/// `offset` must lie in `[0, file_size)` and `offset + len` must not pass
/// the end of the file.
fn check_range(
    file_size: u64,
    offset: u64,
    len: Option<u64>,
    what: &'static str,
) -> Result<(), PkgError> {
    let err = PkgError::InvalidOffsets { what };

    if offset >= file_size {
        return Err(err);
    }
    let end = len.and_then(|len| offset.checked_add(len)).ok_or(err)?;
    if end > file_size {
        return Err(PkgError::InvalidOffsets { what });
    }
    Ok(())
}
