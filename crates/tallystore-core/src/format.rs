//! Binary tag-tree format used for the tracker file
//!
//! A document is a single named root compound:
//! root_id(u8 = 10) + name_len(u16 BE) + name_bytes + compound_payload
//!
//! Payload layouts (all integers big-endian):
//!   Byte/Short/Int/Long/Float/Double: fixed-width value
//!   ByteArray/IntArray/LongArray:     len(i32) + elements
//!   String:                           len(u16) + UTF-8 bytes
//!   List:                             element_id(u8) + len(i32) + payloads
//!   Compound:                         (id(u8) + name + payload)* + End(0)
//!
//! The layout matches the classic NBT encoding, so files can be inspected
//! with ordinary NBT tooling once gunzipped.

use crate::error::{TrackerError, TrackerResult};

/// Maximum compound/list nesting accepted by the reader.
///
/// The reader recurses once per level. Tracker documents nest five deep
/// (root, PlayerData, player, DimEnter, entry), so this leaves headroom while
/// keeping the worst case far inside a small thread stack.
pub const MAX_DEPTH: usize = 32;

/// Tag type ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TagType {
    End = 0,
    Byte = 1,
    Short = 2,
    Int = 3,
    Long = 4,
    Float = 5,
    Double = 6,
    ByteArray = 7,
    String = 8,
    List = 9,
    Compound = 10,
    IntArray = 11,
    LongArray = 12,
}

impl TagType {
    /// Map an id byte to a tag type.
    pub fn from_id(id: u8) -> Option<Self> {
        Some(match id {
            0 => TagType::End,
            1 => TagType::Byte,
            2 => TagType::Short,
            3 => TagType::Int,
            4 => TagType::Long,
            5 => TagType::Float,
            6 => TagType::Double,
            7 => TagType::ByteArray,
            8 => TagType::String,
            9 => TagType::List,
            10 => TagType::Compound,
            11 => TagType::IntArray,
            12 => TagType::LongArray,
            _ => return None,
        })
    }

    pub fn id(self) -> u8 {
        self as u8
    }
}

/// A single typed value in the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    /// Homogeneous list; the element type is taken from the first item
    List(Vec<Tag>),
    Compound(Compound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Tag {
    pub fn tag_type(&self) -> TagType {
        match self {
            Tag::Byte(_) => TagType::Byte,
            Tag::Short(_) => TagType::Short,
            Tag::Int(_) => TagType::Int,
            Tag::Long(_) => TagType::Long,
            Tag::Float(_) => TagType::Float,
            Tag::Double(_) => TagType::Double,
            Tag::ByteArray(_) => TagType::ByteArray,
            Tag::String(_) => TagType::String,
            Tag::List(_) => TagType::List,
            Tag::Compound(_) => TagType::Compound,
            Tag::IntArray(_) => TagType::IntArray,
            Tag::LongArray(_) => TagType::LongArray,
        }
    }

    /// Read any numeric tag as an i32.
    ///
    /// Wider integers are truncated, floating point values are floored.
    /// Non-numeric tags yield `None`.
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Tag::Byte(v) => Some(v as i32),
            Tag::Short(v) => Some(v as i32),
            Tag::Int(v) => Some(v),
            Tag::Long(v) => Some(v as i32),
            Tag::Float(v) => Some(v.floor() as i32),
            Tag::Double(v) => Some(v.floor() as i32),
            _ => None,
        }
    }

    /// Read any numeric tag as an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Tag::Byte(v) => Some(v as i64),
            Tag::Short(v) => Some(v as i64),
            Tag::Int(v) => Some(v as i64),
            Tag::Long(v) => Some(v),
            Tag::Float(v) => Some(v.floor() as i64),
            Tag::Double(v) => Some(v.floor() as i64),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Tag]> {
        match self {
            Tag::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Tag::Compound(c) => Some(c),
            _ => None,
        }
    }
}

/// Named fields in insertion order. Inserting an existing name replaces
/// the value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compound {
    entries: Vec<(String, Tag)>,
}

impl Compound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a named tag.
    pub fn insert(&mut self, name: impl Into<String>, tag: Tag) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = tag,
            None => self.entries.push((name, tag)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Numeric field as i32, `None` if absent or not numeric.
    pub fn get_int(&self, name: &str) -> Option<i32> {
        self.get(name).and_then(Tag::as_i32)
    }

    /// Numeric field as i64, `None` if absent or not numeric.
    pub fn get_long(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Tag::as_i64)
    }

    pub fn get_list(&self, name: &str) -> Option<&[Tag]> {
        self.get(name).and_then(Tag::as_list)
    }

    pub fn get_compound(&self, name: &str) -> Option<&Compound> {
        self.get(name).and_then(Tag::as_compound)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tag)> {
        self.entries.iter().map(|(n, t)| (n.as_str(), t))
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Serialize `root` as an unnamed root compound, appending to `out`.
pub fn write_root(root: &Compound, out: &mut Vec<u8>) -> TrackerResult<()> {
    out.push(TagType::Compound.id());
    write_string(out, "")?;
    write_compound(out, root)
}

/// Serialize `root` into a fresh buffer.
pub fn to_bytes(root: &Compound) -> TrackerResult<Vec<u8>> {
    let mut out = Vec::new();
    write_root(root, &mut out)?;
    Ok(out)
}

fn write_string(out: &mut Vec<u8>, s: &str) -> TrackerResult<()> {
    let len = u16::try_from(s.len()).map_err(|_| TrackerError::OversizedEntry {
        entry_size: s.len() as u64,
        max_size: u16::MAX as u64,
        component: "string".to_string(),
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

fn write_len(out: &mut Vec<u8>, len: usize, component: &str) -> TrackerResult<()> {
    let len = i32::try_from(len).map_err(|_| TrackerError::OversizedEntry {
        entry_size: len as u64,
        max_size: i32::MAX as u64,
        component: component.to_string(),
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    Ok(())
}

fn write_compound(out: &mut Vec<u8>, compound: &Compound) -> TrackerResult<()> {
    for (name, tag) in compound.iter() {
        out.push(tag.tag_type().id());
        write_string(out, name)?;
        write_payload(out, tag)?;
    }
    out.push(TagType::End.id());
    Ok(())
}

fn write_payload(out: &mut Vec<u8>, tag: &Tag) -> TrackerResult<()> {
    match tag {
        Tag::Byte(v) => out.push(*v as u8),
        Tag::Short(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Long(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Float(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Double(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::ByteArray(values) => {
            write_len(out, values.len(), "array")?;
            out.extend(values.iter().map(|v| *v as u8));
        }
        Tag::String(s) => write_string(out, s)?,
        Tag::List(items) => {
            let element = items.first().map_or(TagType::End, Tag::tag_type);
            if let Some(bad) = items.iter().find(|t| t.tag_type() != element) {
                return Err(TrackerError::MixedList {
                    expected: element.id(),
                    found: bad.tag_type().id(),
                });
            }
            out.push(element.id());
            write_len(out, items.len(), "list")?;
            for item in items {
                write_payload(out, item)?;
            }
        }
        Tag::Compound(c) => write_compound(out, c)?,
        Tag::IntArray(values) => {
            write_len(out, values.len(), "array")?;
            for v in values {
                out.extend_from_slice(&v.to_be_bytes());
            }
        }
        Tag::LongArray(values) => {
            write_len(out, values.len(), "array")?;
            for v in values {
                out.extend_from_slice(&v.to_be_bytes());
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Parse a complete document and return its root compound.
///
/// The root must be a compound and must consume the whole input.
pub fn read_root(data: &[u8]) -> TrackerResult<Compound> {
    let mut reader = TagReader::new(data);
    let id = reader.read_u8()?;
    if id != TagType::Compound.id() {
        return Err(TrackerError::RootNotCompound { found: id });
    }
    let _name = reader.read_string()?;
    let root = reader.read_compound()?;

    let remaining = reader.remaining();
    if remaining != 0 {
        return Err(TrackerError::TrailingBytes { count: remaining });
    }
    Ok(root)
}

/// Bounds-checked cursor over an input buffer.
struct TagReader<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> TagReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, depth: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> TrackerResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(TrackerError::TruncatedInput {
                needed: n,
                available: self.remaining(),
                offset: self.pos,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> TrackerResult<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn read_u8(&mut self) -> TrackerResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_i16(&mut self) -> TrackerResult<i16> {
        Ok(i16::from_be_bytes(self.take_array()?))
    }

    fn read_i32(&mut self) -> TrackerResult<i32> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    fn read_i64(&mut self) -> TrackerResult<i64> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    fn read_string(&mut self) -> TrackerResult<String> {
        let len = u16::from_be_bytes(self.take_array()?) as usize;
        let offset = self.pos;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| TrackerError::InvalidString { offset })
    }

    /// Read an i32 length prefix and check that `len * element_size` bytes
    /// remain before anything is allocated.
    fn read_len(&mut self, element_size: usize) -> TrackerResult<usize> {
        let offset = self.pos;
        let length = self.read_i32()?;
        if length < 0 {
            return Err(TrackerError::NegativeLength { length, offset });
        }
        let len = length as usize;
        let needed = len.saturating_mul(element_size);
        if needed > self.remaining() {
            return Err(TrackerError::TruncatedInput {
                needed,
                available: self.remaining(),
                offset: self.pos,
            });
        }
        Ok(len)
    }

    fn enter(&mut self) -> TrackerResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(TrackerError::NestingTooDeep { limit: MAX_DEPTH });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn read_tag_type(&mut self) -> TrackerResult<TagType> {
        let offset = self.pos;
        let id = self.read_u8()?;
        TagType::from_id(id).ok_or(TrackerError::UnknownTag { id, offset })
    }

    fn read_compound(&mut self) -> TrackerResult<Compound> {
        self.enter()?;
        let mut compound = Compound::new();
        loop {
            let kind = self.read_tag_type()?;
            if kind == TagType::End {
                break;
            }
            let name = self.read_string()?;
            let tag = self.read_payload(kind)?;
            compound.insert(name, tag);
        }
        self.leave();
        Ok(compound)
    }

    fn read_list(&mut self) -> TrackerResult<Vec<Tag>> {
        self.enter()?;
        let element_offset = self.pos;
        let element = self.read_tag_type()?;
        // Every payload is at least one byte, so `len` is bounded by the input
        let len = self.read_len(1)?;
        if element == TagType::End && len > 0 {
            return Err(TrackerError::UnknownTag { id: 0, offset: element_offset });
        }
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(self.read_payload(element)?);
        }
        self.leave();
        Ok(items)
    }

    fn read_payload(&mut self, kind: TagType) -> TrackerResult<Tag> {
        Ok(match kind {
            TagType::End => {
                return Err(TrackerError::UnknownTag { id: 0, offset: self.pos });
            }
            TagType::Byte => Tag::Byte(self.read_u8()? as i8),
            TagType::Short => Tag::Short(self.read_i16()?),
            TagType::Int => Tag::Int(self.read_i32()?),
            TagType::Long => Tag::Long(self.read_i64()?),
            TagType::Float => Tag::Float(f32::from_be_bytes(self.take_array()?)),
            TagType::Double => Tag::Double(f64::from_be_bytes(self.take_array()?)),
            TagType::ByteArray => {
                let len = self.read_len(1)?;
                Tag::ByteArray(self.take(len)?.iter().map(|b| *b as i8).collect())
            }
            TagType::String => Tag::String(self.read_string()?),
            TagType::List => Tag::List(self.read_list()?),
            TagType::Compound => Tag::Compound(self.read_compound()?),
            TagType::IntArray => {
                let len = self.read_len(4)?;
                let mut values = Vec::with_capacity(len);
                for _ in 0..len {
                    values.push(self.read_i32()?);
                }
                Tag::IntArray(values)
            }
            TagType::LongArray => {
                let len = self.read_len(8)?;
                let mut values = Vec::with_capacity(len);
                for _ in 0..len {
                    values.push(self.read_i64()?);
                }
                Tag::LongArray(values)
            }
        })
    }
}
