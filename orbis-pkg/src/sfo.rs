//! `param.sfo` property block.
//!
//! A flat, little-endian key/value table:
//!
//! ```text
//! 0x00  u32  magic            "\0PSF"
//! 0x04  u32  version
//! 0x08  u32  key_table_offset
//! 0x0C  u32  data_table_offset
//! 0x10  u32  entry_count
//! 0x14  ...  entry_count × index record (16 bytes):
//!            u16 key_offset, u16 format, u32 len, u32 max_len, u32 data_offset
//! ```

use core::fmt;

use binrw::Endian;

use crate::bytes::ByteReader;
use crate::error::MetadataError;

/// `"\0PSF"` read as a little-endian `u32`.
pub const SFO_MAGIC: u32 = 0x4653_5000;
pub const SFO_HEADER_SIZE: u64 = 0x14;
pub const SFO_INDEX_SIZE: u64 = 0x10;

/// Text stored without a terminator.
pub const FMT_TEXT_RAW: u16 = 0x0004;
/// NUL-terminated UTF-8 text.
pub const FMT_TEXT: u16 = 0x0204;
/// 32-bit unsigned integer.
pub const FMT_INTEGER: u16 = 0x0404;

pub const KEY_TITLE_ID: &str = "TITLE_ID";
pub const KEY_TITLE: &str = "TITLE";
pub const KEY_CONTENT_ID: &str = "CONTENT_ID";
pub const KEY_APP_VER: &str = "APP_VER";
pub const KEY_CATEGORY: &str = "CATEGORY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Integer(u32),
    Text(String),
    Binary(Vec<u8>),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v:#x}"),
            Self::Text(s) => write!(f, "\"{s}\""),
            Self::Binary(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Properties in the order they appear in the block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataTable {
    properties: Vec<(String, PropertyValue)>,
}

impl MetadataTable {
    pub fn parse(bytes: &[u8]) -> Result<Self, MetadataError> {
        let reader = ByteReader::new(bytes);
        let mut header = reader.cursor(0);

        let magic = header.read_u32(Endian::Little)?;
        if magic != SFO_MAGIC {
            return Err(MetadataError::BadFormat(format!("bad magic {magic:#010x}")));
        }
        let _version = header.read_u32(Endian::Little)?;
        let key_table = u64::from(header.read_u32(Endian::Little)?);
        let data_table = u64::from(header.read_u32(Endian::Little)?);
        let count = header.read_u32(Endian::Little)?;

        // Bound the allocation by what the block can actually hold.
        let index_len = u64::from(count) * SFO_INDEX_SIZE;
        reader.read_exact(SFO_HEADER_SIZE, index_len)?;

        let mut properties = Vec::with_capacity(count as usize);
        let mut index = reader.cursor(SFO_HEADER_SIZE);

        for _ in 0..count {
            let key_offset = u64::from(index.read_u16(Endian::Little)?);
            let format = index.read_u16(Endian::Little)?;
            let len = u64::from(index.read_u32(Endian::Little)?);
            let _max_len = index.read_u32(Endian::Little)?;
            let data_offset = u64::from(index.read_u32(Endian::Little)?);

            let key = read_key(&reader, key_table + key_offset)?;
            let raw = reader.read_exact(data_table + data_offset, len)?;

            let value = match format {
                FMT_INTEGER => {
                    if len != 4 {
                        return Err(MetadataError::BadFormat(format!(
                            "integer property {key} has length {len}"
                        )));
                    }
                    PropertyValue::Integer(ByteReader::new(raw).read_u32(0, Endian::Little)?)
                }
                FMT_TEXT | FMT_TEXT_RAW => {
                    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                    let text = String::from_utf8(raw[..end].to_vec()).map_err(|_| {
                        MetadataError::BadFormat(format!("property {key} is not UTF-8"))
                    })?;
                    PropertyValue::Text(text)
                }
                _ => PropertyValue::Binary(raw.to_vec()),
            };

            properties.push((key, value));
        }

        Ok(Self { properties })
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_integer(&self, key: &str) -> Option<u32> {
        match self.get(key)? {
            PropertyValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// The required `TITLE_ID` property.
    pub fn title_id(&self) -> Result<&str, MetadataError> {
        self.get_text(KEY_TITLE_ID)
            .filter(|s| !s.is_empty())
            .ok_or(MetadataError::MissingProperty(KEY_TITLE_ID))
    }

    pub fn title(&self) -> Option<&str> {
        self.get_text(KEY_TITLE)
    }

    pub fn content_id(&self) -> Option<&str> {
        self.get_text(KEY_CONTENT_ID)
    }

    pub fn app_version(&self) -> Option<&str> {
        self.get_text(KEY_APP_VER)
    }

    pub fn category(&self) -> Option<&str> {
        self.get_text(KEY_CATEGORY)
    }
}

fn read_key(reader: &ByteReader<'_>, offset: u64) -> Result<String, MetadataError> {
    let tail = reader.read_exact(offset, reader.len().saturating_sub(offset))?;
    let end = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or(MetadataError::Truncated)?;
    String::from_utf8(tail[..end].to_vec())
        .map_err(|_| MetadataError::BadFormat("property key is not UTF-8".to_string()))
}
