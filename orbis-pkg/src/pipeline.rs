//! Decrypt, decompress and verify a single entry's payload.

use std::io::Read;

use flate2::read::ZlibDecoder;
use sha2::{Digest, Sha256};

use crate::bytes::ByteReader;
use crate::crypto::{self, EntryKey};
use crate::error::EntryError;
use crate::structs::{DIGEST_SIZE, EntryDescriptor, PackageHeader};

/// AES-128-CBC decrypt `ciphertext` into a new buffer.
pub fn decrypt(ciphertext: &[u8], key: &EntryKey) -> Result<Vec<u8>, EntryError> {
    let mut buf = ciphertext.to_vec();
    crypto::decrypt_in_place(key, &mut buf)?;
    Ok(buf)
}

/// Inflate a zlib stream, refusing to produce more than `declared` bytes.
pub fn decompress(data: &[u8], declared: u64) -> Result<Vec<u8>, EntryError> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .take(declared.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(EntryError::Decompress)?;

    let actual = out.len() as u64;
    if actual > declared {
        return Err(EntryError::OverLengthDecompression { declared });
    }
    if actual < declared {
        return Err(EntryError::SizeMismatch {
            expected: declared,
            actual,
        });
    }
    Ok(out)
}

/// Compare the SHA-256 of `plaintext` against a digest-table slot.
pub fn verify(plaintext: &[u8], expected: &[u8]) -> Result<(), EntryError> {
    let digest = Sha256::digest(plaintext);
    if digest.as_slice() == expected {
        Ok(())
    } else {
        Err(EntryError::Integrity)
    }
}

/// Produce the final content of `entry`.
pub fn process_entry(
    reader: &ByteReader<'_>,
    header: &PackageHeader,
    entry: &EntryDescriptor,
    verify_digest: bool,
) -> Result<Vec<u8>, EntryError> {
    let raw = reader.read_exact(entry.raw.data_offset, entry.raw.data_size)?;
    let declared = entry.raw.uncompressed_size;

    let mut plain = if entry.is_encrypted() {
        if !entry.raw.data_size.is_multiple_of(crypto::BLOCK_SIZE as u64) {
            return Err(EntryError::Misaligned {
                size: entry.raw.data_size,
            });
        }
        let key = crypto::derive_key(header, entry)?;
        decrypt(raw, &key)?
    } else {
        raw.to_vec()
    };

    if entry.is_compressed() {
        plain = decompress(&plain, declared)?;
    } else if entry.is_encrypted() {
        // Strip the CBC padding.
        if declared > entry.raw.data_size {
            return Err(EntryError::SizeMismatch {
                expected: declared,
                actual: entry.raw.data_size,
            });
        }
        plain.truncate(declared as usize);
    } else if declared != entry.raw.data_size {
        return Err(EntryError::SizeMismatch {
            expected: declared,
            actual: entry.raw.data_size,
        });
    }

    if verify_digest {
        let slot = header.digest_table_offset + entry.index as u64 * DIGEST_SIZE;
        let expected = reader.read_exact(slot, DIGEST_SIZE)?;
        verify(&plain, expected)?;
    }

    Ok(plain)
}
