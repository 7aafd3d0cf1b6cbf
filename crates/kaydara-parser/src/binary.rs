//! Binary FBX front end.
//!
//! Layout of a binary document:
//!
//! ```text
//! "Kaydara FBX Binary  \0" 0x1A 0x00     23 bytes
//! version                               u32
//! node record*                          until the footer
//!
//! node record:
//!   end_offset      u32 (u64 from 7500)   absolute offset past the record
//!   num_properties  u32 (u64 from 7500)
//!   property_bytes  u32 (u64 from 7500)
//!   name_len        u8
//!   name            name_len bytes
//!   property*       num_properties typed values
//!   node record*    nested records, closed by a null record
//! ```

use kaydara_core::{FbxError, FbxTree, Node, NodeId, Property, Result, SourceFormat};
use log::debug;
use miniz_oxide::inflate::decompress_to_vec_zlib;

use crate::reader::BinaryReader;

/// Magic prefix of binary documents.
pub const BINARY_MAGIC: &[u8] = b"Kaydara FBX Binary  \0";

/// Magic plus the two bytes that follow it.
const HEADER_LEN: usize = 23;

const MIN_VERSION: u32 = 6400;

/// First version with 64-bit record headers.
const WIDE_HEADER_VERSION: u32 = 7500;

/// Footer size the end-of-content check reserves.
const FOOTER_LEN: usize = 160 + 16;

/// Type tag preceding each property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeTag {
    Bool,
    Double,
    Float,
    Int,
    Long,
    Raw,
    String,
    Short,
    Array(ArrayKind),
}

/// Element type of an array property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayKind {
    Bool,
    Double,
    Float,
    Int,
    Long,
}

impl TryFrom<u8> for TypeTag {
    type Error = char;

    fn try_from(tag: u8) -> std::result::Result<Self, char> {
        Ok(match tag {
            b'C' => TypeTag::Bool,
            b'D' => TypeTag::Double,
            b'F' => TypeTag::Float,
            b'I' => TypeTag::Int,
            b'L' => TypeTag::Long,
            b'R' => TypeTag::Raw,
            b'S' => TypeTag::String,
            b'Y' => TypeTag::Short,
            b'b' | b'c' => TypeTag::Array(ArrayKind::Bool),
            b'd' => TypeTag::Array(ArrayKind::Double),
            b'f' => TypeTag::Array(ArrayKind::Float),
            b'i' => TypeTag::Array(ArrayKind::Int),
            b'l' => TypeTag::Array(ArrayKind::Long),
            other => return Err(char::from(other)),
        })
    }
}

/// Parser for binary documents.
pub struct BinaryParser<'a> {
    reader: BinaryReader<'a>,
    version: u32,
}

impl<'a> BinaryParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            reader: BinaryReader::new(data),
            version: 0,
        }
    }

    /// Parse the whole document into a tree.
    pub fn parse(mut self) -> Result<FbxTree> {
        if !self.reader_starts_with_magic() {
            return Err(FbxError::InvalidSignature {
                reason: "missing binary magic".into(),
            });
        }
        self.reader.skip(HEADER_LEN)?;
        self.version = self.reader.read_u32()?;
        if self.version < MIN_VERSION {
            return Err(FbxError::UnsupportedVersion {
                version: self.version,
                minimum: MIN_VERSION,
            });
        }
        debug!("Parsing binary FBX version {}", self.version);

        let mut tree = FbxTree::new(self.version, SourceFormat::Binary);
        while !self.end_of_content() {
            if let Some(node) = self.parse_node()? {
                tree.add(node);
            }
        }
        Ok(tree)
    }

    fn reader_starts_with_magic(&self) -> bool {
        let mut probe = self.reader.clone();
        probe
            .read_bytes(BINARY_MAGIC.len())
            .map(|bytes| bytes == BINARY_MAGIC)
            .unwrap_or(false)
    }

    fn wide_headers(&self) -> bool {
        self.version >= WIDE_HEADER_VERSION
    }

    fn record_header_len(&self) -> usize {
        if self.wide_headers() {
            25
        } else {
            13
        }
    }

    /// True once only the footer (or less than a record header) remains.
    fn end_of_content(&self) -> bool {
        let size = self.reader.len();
        let offset = self.reader.offset();
        if self.reader.remaining() < self.record_header_len() {
            return true;
        }
        if size % 16 == 0 {
            ((offset + FOOTER_LEN) & !0xf) >= size
        } else {
            offset + FOOTER_LEN >= size
        }
    }

    fn read_header_field(&mut self) -> Result<u64> {
        if self.wide_headers() {
            self.reader.read_u64()
        } else {
            self.reader.read_u32().map(u64::from)
        }
    }

    /// Parse one record. A null record (end offset 0) yields `None`.
    fn parse_node(&mut self) -> Result<Option<Node>> {
        let record_offset = self.reader.offset();
        let end_offset = self.read_header_field()?;
        let num_properties = self.read_header_field()?;
        let _property_bytes = self.read_header_field()?;
        let name_len = self.reader.read_u8()?;
        let name = self.reader.read_string(usize::from(name_len))?;

        if end_offset == 0 {
            return Ok(None);
        }

        let end = usize::try_from(end_offset)
            .ok()
            .filter(|&end| end <= self.reader.len() && end > record_offset)
            .ok_or(FbxError::InvalidEndOffset {
                offset: record_offset,
                end_offset,
                len: self.reader.len(),
            })?;

        let mut properties = Vec::new();
        for _ in 0..num_properties {
            properties.push(self.parse_property()?);
        }

        let leaf = num_properties == 1 && self.reader.offset() == end;

        let mut node = Node::new(name);
        while end > self.reader.offset() {
            if let Some(child) = self.parse_node()? {
                node.add_child(child);
            }
        }

        if !leaf {
            node.id = properties.first().and_then(Property::as_integer).map(NodeId::Int);
        }
        node.attr_name = non_empty_str(properties.get(1));
        node.attr_type = non_empty_str(properties.get(2));
        node.properties = properties;
        Ok(Some(node))
    }

    fn parse_property(&mut self) -> Result<Property> {
        let offset = self.reader.offset();
        let tag = self.reader.read_u8()?;
        let tag = TypeTag::try_from(tag)
            .map_err(|tag| FbxError::UnknownPropertyType { tag, offset })?;

        Ok(match tag {
            TypeTag::Bool => Property::Bool(self.reader.read_bool()?),
            TypeTag::Double => Property::F64(self.reader.read_f64()?),
            TypeTag::Float => Property::F32(self.reader.read_f32()?),
            TypeTag::Int => Property::I32(self.reader.read_i32()?),
            TypeTag::Long => Property::I64(self.reader.read_i64()?),
            TypeTag::Short => Property::I16(self.reader.read_i16()?),
            TypeTag::Raw => {
                let len = self.reader.read_u32()? as usize;
                Property::Raw(self.reader.read_bytes(len)?.to_vec())
            }
            TypeTag::String => {
                let len = self.reader.read_u32()? as usize;
                Property::String(self.reader.read_string(len)?)
            }
            TypeTag::Array(kind) => self.parse_array(kind)?,
        })
    }

    fn parse_array(&mut self, kind: ArrayKind) -> Result<Property> {
        let count = self.reader.read_u32()? as usize;
        let encoding = self.reader.read_u32()?;
        let compressed_len = self.reader.read_u32()? as usize;
        let offset = self.reader.offset();

        match encoding {
            0 => read_array(&mut self.reader, kind, count),
            1 => {
                let compressed = self.reader.read_bytes(compressed_len)?;
                let inflated = decompress_to_vec_zlib(compressed).map_err(|e| {
                    FbxError::Decompress {
                        offset,
                        reason: format!("{:?}", e.status),
                    }
                })?;
                read_array(&mut BinaryReader::new(&inflated), kind, count)
            }
            other => Err(FbxError::UnsupportedEncoding {
                encoding: other,
                offset,
            }),
        }
    }
}

fn read_array(reader: &mut BinaryReader<'_>, kind: ArrayKind, count: usize) -> Result<Property> {
    Ok(match kind {
        ArrayKind::Bool => Property::BoolArray(reader.read_bool_array(count)?),
        ArrayKind::Double => Property::F64Array(reader.read_f64_array(count)?),
        ArrayKind::Float => Property::F32Array(reader.read_f32_array(count)?),
        ArrayKind::Int => Property::I32Array(reader.read_i32_array(count)?),
        ArrayKind::Long => Property::I64Array(reader.read_i64_array(count)?),
    })
}

fn non_empty_str(property: Option<&Property>) -> Option<String> {
    property
        .and_then(Property::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
