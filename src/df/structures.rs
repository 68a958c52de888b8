use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::error::Result;

/// Leading payload byte of a compressed entry
pub const COMPRESSED_MARKER: u8 = 0xEC;

/// Extension (case-sensitive) of files holding a nested directory
pub const NESTED_ARCHIVE_EXTENSION: &str = "DF";

/// Which directory layout to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryKind {
    /// `u32` count followed by 40-byte [`RootEntry`] records
    Root,
    /// 16-byte [`SubArchiveHeader`] followed by 548-byte [`SubEntry`] records
    Nested,
}

/// Root archive directory record - 40 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootEntry {
    pub name: String,
    pub offset: u32,
    pub size: u32,
}

impl RootEntry {
    pub const NAME_LEN: usize = 32;
    pub const SIZE: usize = 40;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);

        let mut name = [0u8; Self::NAME_LEN];
        cursor.read_exact(&mut name)?;

        Ok(Self {
            name: decode_name(&name),
            offset: cursor.read_u32::<LittleEndian>()?,
            size: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// Nested archive header - 16 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubArchiveHeader {
    pub file_count: u32,
    /// Carried through but not needed to locate entries
    pub offset: u32,
    pub reserved: [u32; 2],
}

impl SubArchiveHeader {
    pub const SIZE: usize = 16;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);

        Ok(Self {
            file_count: cursor.read_u32::<LittleEndian>()?,
            offset: cursor.read_u32::<LittleEndian>()?,
            reserved: [
                cursor.read_u32::<LittleEndian>()?,
                cursor.read_u32::<LittleEndian>()?,
            ],
        })
    }
}

/// Nested archive directory record - 0x224 bytes
///
/// The kind tags, header tag and trailing bytes have no known meaning and are
/// kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubEntry {
    pub kind_tag1: u32,
    pub kind_tag2: u32,
    pub header_tag: [u8; 4],
    pub size: u32,
    pub name: String,
    pub global_id: u32,
    pub offset: u32,
    pub trailer: [u8; 12],
}

impl SubEntry {
    pub const NAME_LEN: usize = 0x200;
    pub const SIZE: usize = 0x224;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);

        let kind_tag1 = cursor.read_u32::<LittleEndian>()?;
        let kind_tag2 = cursor.read_u32::<LittleEndian>()?;
        let mut header_tag = [0u8; 4];
        cursor.read_exact(&mut header_tag)?;
        let size = cursor.read_u32::<LittleEndian>()?;
        let mut name = [0u8; Self::NAME_LEN];
        cursor.read_exact(&mut name)?;
        let global_id = cursor.read_u32::<LittleEndian>()?;
        let offset = cursor.read_u32::<LittleEndian>()?;
        let mut trailer = [0u8; 12];
        cursor.read_exact(&mut trailer)?;

        Ok(Self {
            kind_tag1,
            kind_tag2,
            header_tag,
            size,
            name: decode_name(&name),
            global_id,
            offset,
            trailer,
        })
    }
}

/// A decoded directory record of either layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryEntry {
    Root(RootEntry),
    Nested(SubEntry),
}

impl DirectoryEntry {
    pub fn name(&self) -> &str {
        match self {
            DirectoryEntry::Root(e) => &e.name,
            DirectoryEntry::Nested(e) => &e.name,
        }
    }

    pub fn offset(&self) -> u64 {
        match self {
            DirectoryEntry::Root(e) => e.offset as u64,
            DirectoryEntry::Nested(e) => e.offset as u64,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            DirectoryEntry::Root(e) => e.size as u64,
            DirectoryEntry::Nested(e) => e.size as u64,
        }
    }

    /// Whether the extracted file will be opened as a nested archive
    pub fn is_nested_archive(&self) -> bool {
        is_nested_archive_name(self.name())
    }
}

/// Case-sensitive `.DF` extension check on an entry name
pub fn is_nested_archive_name(name: &str) -> bool {
    name.rsplit(&['/', '\\'][..])
        .next()
        .and_then(|file| file.rsplit_once('.'))
        .is_some_and(|(stem, ext)| !stem.is_empty() && ext == NESTED_ARCHIVE_EXTENSION)
}

/// Decode a NUL-padded fixed-width name field
fn decode_name(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}
