//! Key schedule and block cipher for entry data.
//!
//! Each encrypted entry is AES-128-CBC with a key and IV derived on demand:
//!
//! ```text
//! key = HMAC-SHA256(seed[scheme][slot], content_id || slot)[0..16]
//! iv  = HMAC-SHA256(key, entry_id || index || data_offset)[0..16]
//! ```
//!
//! Integers are big-endian. The IV depends on the entry's index and offset,
//! so identical plaintexts in two entries never share ciphertext blocks.

use aes::Aes128;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::digest::{Key, KeyInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::EntryError;
use crate::structs::{EntryDescriptor, PackageHeader};

type HmacSha256 = Hmac<Sha256>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes128CbcEnc = cbc::Encryptor<Aes128>;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// A seed for one `(scheme, slot)` pair.
#[derive(Debug, Clone, Copy)]
pub struct KeySeed {
    pub scheme: u8,
    pub slot: u8,
    pub seed: [u8; 32],
}

/// Publicly known key-derivation seeds, versioned by encryption scheme.
pub const KEY_SEEDS: &[KeySeed] = &[
    KeySeed {
        scheme: 1,
        slot: 0,
        seed: [
            0xF7, 0xD7, 0xD5, 0x06, 0xAB, 0xCE, 0x1D, 0xE2, 0xE7, 0x77, 0x38, 0xBC, 0x94, 0x0B,
            0x0D, 0xF2, 0xB6, 0xC3, 0x63, 0x2C, 0xB4, 0x5E, 0x98, 0xDA, 0xD5, 0x81, 0x51, 0xD8,
            0x6D, 0xD3, 0x85, 0x1D,
        ],
    },
    KeySeed {
        scheme: 1,
        slot: 1,
        seed: [
            0x5D, 0x98, 0x4F, 0xFC, 0x93, 0xB5, 0x02, 0x40, 0xCF, 0xA4, 0x4A, 0x9C, 0x35, 0xE9,
            0x6B, 0x1A, 0xB7, 0xF1, 0xCD, 0x19, 0x91, 0xB8, 0xB3, 0x54, 0x02, 0x2E, 0xFE, 0xC3,
            0xB1, 0xD2, 0x32, 0xE2,
        ],
    },
    KeySeed {
        scheme: 1,
        slot: 2,
        seed: [
            0xB8, 0x7A, 0xEF, 0xA6, 0xE5, 0x73, 0x69, 0xD1, 0x9A, 0xBF, 0xBD, 0xDC, 0x59, 0xE6,
            0x76, 0xB9, 0xBD, 0x4F, 0x98, 0x76, 0x1C, 0x69, 0xE5, 0x45, 0x47, 0xEF, 0x44, 0x8A,
            0xD8, 0xF0, 0x83, 0x18,
        ],
    },
    KeySeed {
        scheme: 1,
        slot: 3,
        seed: [
            0x46, 0x0E, 0x69, 0xF8, 0xFD, 0x78, 0x8E, 0x58, 0x25, 0xE7, 0x9A, 0x18, 0xEC, 0xE6,
            0xCF, 0x3E, 0x3F, 0x0C, 0xD8, 0x1D, 0x18, 0xB4, 0xB2, 0x91, 0x2A, 0xD7, 0x6E, 0xF4,
            0x5B, 0x27, 0x91, 0xCF,
        ],
    },
];

/// Look up the seed for `(scheme, slot)`.
pub fn seed_for(scheme: u8, slot: u8) -> Result<&'static [u8; 32], EntryError> {
    KEY_SEEDS
        .iter()
        .find(|s| s.scheme == scheme && s.slot == slot)
        .map(|s| &s.seed)
        .ok_or(EntryError::UnsupportedKeySlot { scheme, slot })
}

/// Key and IV for a single entry. Not kept beyond one decrypt call.
#[derive(Clone, PartialEq, Eq)]
pub struct EntryKey {
    pub key: [u8; 16],
    pub iv: [u8; 16],
}

impl core::fmt::Debug for EntryKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EntryKey").finish_non_exhaustive()
    }
}

/// Derive the key and IV for `entry`.
pub fn derive_key(header: &PackageHeader, entry: &EntryDescriptor) -> Result<EntryKey, EntryError> {
    let scheme = header.scheme_version();
    let slot = entry.key_slot();
    let seed = seed_for(scheme, slot)?;

    let content_key = hmac_sha256(seed, &[&header.content_id, &[slot]]);
    let mut key = [0u8; 16];
    key.copy_from_slice(&content_key[..16]);

    let iv_bytes = hmac_sha256(
        &key,
        &[
            &entry.id().to_be_bytes(),
            &(entry.index as u32).to_be_bytes(),
            &entry.raw.data_offset.to_be_bytes(),
        ],
    );
    let mut iv = [0u8; 16];
    iv.copy_from_slice(&iv_bytes[..16]);

    Ok(EntryKey { key, iv })
}

/// HMAC-SHA256 over the concatenation of `parts`.
///
/// `key` is zero-padded to the 64-byte SHA-256 block; `N` must not exceed it.
fn hmac_sha256<const N: usize>(key: &[u8; N], parts: &[&[u8]]) -> [u8; 32] {
    let mut block = Key::<HmacSha256>::default();
    block[..N].copy_from_slice(key);

    let mut mac = <HmacSha256 as KeyInit>::new(&block);
    for part in parts {
        mac.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// AES-128-CBC decrypt in-place. `data` must be a multiple of 16 bytes.
pub fn decrypt_in_place(key: &EntryKey, data: &mut [u8]) -> Result<(), EntryError> {
    ensure_aligned(data)?;
    let size = data.len() as u64;
    Aes128CbcDec::new(&key.key.into(), &key.iv.into())
        .decrypt_padded_mut::<NoPadding>(data)
        .map_err(|_| EntryError::Misaligned { size })?;
    Ok(())
}

/// AES-128-CBC encrypt in-place. `data` must be a multiple of 16 bytes.
pub fn encrypt_in_place(key: &EntryKey, data: &mut [u8]) -> Result<(), EntryError> {
    ensure_aligned(data)?;
    let len = data.len();
    Aes128CbcEnc::new(&key.key.into(), &key.iv.into())
        .encrypt_padded_mut::<NoPadding>(data, len)
        .map_err(|_| EntryError::Misaligned { size: len as u64 })?;
    Ok(())
}

fn ensure_aligned(data: &[u8]) -> Result<(), EntryError> {
    if data.len().is_multiple_of(BLOCK_SIZE) {
        Ok(())
    } else {
        Err(EntryError::Misaligned {
            size: data.len() as u64,
        })
    }
}
