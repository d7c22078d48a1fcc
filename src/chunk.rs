//! Shared primitives for the two chunked binary formats: a bounds-checked
//! cursor, the common chunk header, and string pool parsing.

use crate::error::{DecodeError, DecodeResult};

pub(crate) const RES_STRING_POOL_TYPE: u16 = 0x0001;

pub(crate) const NO_ENTRY_INDEX: u32 = 0xFFFF_FFFF;
const STRING_FLAG_UTF8: u32 = 0x0000_0100;

// Res_value data type tags, shared by XML attributes and table entries.
pub(crate) const TYPE_NULL: u8 = 0x00;
pub(crate) const TYPE_REFERENCE: u8 = 0x01;
pub(crate) const TYPE_ATTRIBUTE: u8 = 0x02;
pub(crate) const TYPE_STRING: u8 = 0x03;
pub(crate) const TYPE_FLOAT: u8 = 0x04;
pub(crate) const TYPE_DYNAMIC_REFERENCE: u8 = 0x07;
pub(crate) const TYPE_DYNAMIC_ATTRIBUTE: u8 = 0x08;
pub(crate) const TYPE_INT_DEC: u8 = 0x10;
pub(crate) const TYPE_INT_HEX: u8 = 0x11;
pub(crate) const TYPE_INT_BOOLEAN: u8 = 0x12;

/// Which chunked format a cursor is walking. Truncation and bounds
/// failures surface as the matching taxonomy variant.
#[derive(Clone, Copy, Debug)]
pub(crate) enum ChunkSource {
    BinaryXml,
    ResourceTable,
}

impl ChunkSource {
    pub(crate) fn err(self, msg: impl Into<String>) -> DecodeError {
        match self {
            ChunkSource::BinaryXml => DecodeError::MalformedXml(msg.into()),
            ChunkSource::ResourceTable => DecodeError::MalformedResourceTable(msg.into()),
        }
    }
}

pub(crate) struct ChunkHeader {
    pub(crate) chunk_type: u16,
    pub(crate) header_size: u16,
    pub(crate) chunk_size: u32,
    pub(crate) start: usize,
}

impl ChunkHeader {
    pub(crate) fn end(&self) -> usize {
        self.start + self.chunk_size as usize
    }
}

pub(crate) struct ChunkReader<'a> {
    data: &'a [u8],
    pos: usize,
    source: ChunkSource,
}

impl<'a> ChunkReader<'a> {
    pub(crate) fn new(data: &'a [u8], source: ChunkSource) -> Self {
        ChunkReader {
            data,
            pos: 0,
            source,
        }
    }

    pub(crate) fn source(&self) -> ChunkSource {
        self.source
    }

    pub(crate) fn data(&self) -> &'a [u8] {
        self.data
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub(crate) fn read_u8(&mut self) -> DecodeResult<u8> {
        if self.pos + 1 > self.data.len() {
            return Err(self.source.err("unexpected end of chunk stream"));
        }
        let value = self.data[self.pos];
        self.pos += 1;
        Ok(value)
    }

    pub(crate) fn read_u16(&mut self) -> DecodeResult<u16> {
        if self.pos + 2 > self.data.len() {
            return Err(self.source.err("unexpected end of chunk stream"));
        }
        let value = u16::from_le_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        Ok(value)
    }

    pub(crate) fn read_u32(&mut self) -> DecodeResult<u32> {
        if self.pos + 4 > self.data.len() {
            return Err(self.source.err("unexpected end of chunk stream"));
        }
        let value = u32::from_le_bytes([
            self.data[self.pos],
            self.data[self.pos + 1],
            self.data[self.pos + 2],
            self.data[self.pos + 3],
        ]);
        self.pos += 4;
        Ok(value)
    }

    pub(crate) fn seek(&mut self, offset: usize) -> DecodeResult<()> {
        if offset > self.data.len() {
            return Err(self.source.err("attempted to seek past end of buffer"));
        }
        self.pos = offset;
        Ok(())
    }
}

/// Reads and validates a chunk header at the cursor position. The declared
/// total size must cover the header and stay within the buffer.
pub(crate) fn read_chunk_header(reader: &mut ChunkReader<'_>) -> DecodeResult<ChunkHeader> {
    let start = reader.position();
    if reader.remaining() < 8 {
        return Err(reader.source().err("truncated chunk header"));
    }
    let chunk_type = reader.read_u16()?;
    let header_size = reader.read_u16()?;
    let chunk_size = reader.read_u32()?;
    if chunk_size < header_size as u32 || header_size < 8 {
        return Err(reader.source().err(format!(
            "invalid chunk sizing at offset {start}: header {header_size}, total {chunk_size}"
        )));
    }
    let end = start
        .checked_add(chunk_size as usize)
        .ok_or_else(|| reader.source().err("chunk size overflow"))?;
    if end > reader.data().len() {
        return Err(reader
            .source()
            .err(format!("chunk at offset {start} extends past end of buffer")));
    }
    Ok(ChunkHeader {
        chunk_type,
        header_size,
        chunk_size,
        start,
    })
}

/// An indexed, deduplicated table of strings attached to a chunk. Indices
/// are stable for the lifetime of the pool; out-of-range lookups are `None`.
#[derive(Debug)]
pub(crate) struct StringPool {
    strings: Vec<String>,
}

impl StringPool {
    pub(crate) fn empty() -> Self {
        StringPool {
            strings: Vec::new(),
        }
    }

    pub(crate) fn parse(
        reader: &mut ChunkReader<'_>,
        header: &ChunkHeader,
    ) -> DecodeResult<Self> {
        let source = reader.source();
        let string_count = reader.read_u32()? as usize;
        let style_count = reader.read_u32()? as usize;
        let flags = reader.read_u32()?;
        let strings_start = reader.read_u32()? as usize;
        let _styles_start = reader.read_u32()?;

        let is_utf8 = (flags & STRING_FLAG_UTF8) != 0;

        let chunk_end = header.end();
        if string_count > chunk_end.saturating_sub(reader.position()) / 4 {
            return Err(source.err("string pool offset array exceeds chunk bounds"));
        }

        let mut string_offsets = Vec::with_capacity(string_count);
        for _ in 0..string_count {
            string_offsets.push(reader.read_u32()? as usize);
        }

        for _ in 0..style_count {
            reader.read_u32()?; // skip style offsets
        }

        let strings_base = header.start + strings_start;
        let data = reader.data();

        let mut strings = Vec::with_capacity(string_count);
        for offset in string_offsets {
            let absolute = strings_base
                .checked_add(offset)
                .ok_or_else(|| source.err("string offset overflow"))?;
            let text = if is_utf8 {
                read_utf8_string(data, absolute, chunk_end, source)?
            } else {
                read_utf16_string(data, absolute, chunk_end, source)?
            };
            strings.push(text);
        }

        reader.seek(chunk_end)?;
        Ok(StringPool { strings })
    }

    pub(crate) fn get(&self, idx: u32) -> Option<&str> {
        if idx == NO_ENTRY_INDEX {
            return None;
        }
        self.strings.get(idx as usize).map(|s| s.as_str())
    }

    pub(crate) fn len(&self) -> usize {
        self.strings.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(|s| s.as_str())
    }
}

fn read_utf8_string(
    data: &[u8],
    offset: usize,
    limit: usize,
    source: ChunkSource,
) -> DecodeResult<String> {
    let mut cursor = offset;
    if cursor >= limit {
        return Err(source.err("string offset exceeds chunk bounds"));
    }
    let (_char_len, len_bytes) = read_utf8_length(data, cursor, limit, source)?;
    cursor += len_bytes;
    let (byte_len, byte_len_size) = read_utf8_length(data, cursor, limit, source)?;
    cursor += byte_len_size;
    if cursor + byte_len > limit {
        return Err(source.err("UTF-8 string exceeds chunk bounds"));
    }
    let slice = &data[cursor..cursor + byte_len];
    let text = std::str::from_utf8(slice).map_err(|err| source.err(err.to_string()))?;
    Ok(text.to_string())
}

fn read_utf16_string(
    data: &[u8],
    offset: usize,
    limit: usize,
    source: ChunkSource,
) -> DecodeResult<String> {
    let mut cursor = offset;
    let (char_count, header_bytes) = read_utf16_length(data, cursor, limit, source)?;
    cursor += header_bytes;
    let byte_len = char_count
        .checked_mul(2)
        .ok_or_else(|| source.err("UTF-16 length overflow"))?;
    if cursor + byte_len > limit {
        return Err(source.err("UTF-16 string exceeds chunk bounds"));
    }
    let mut units = Vec::with_capacity(char_count);
    for pair in data[cursor..cursor + byte_len].chunks_exact(2) {
        units.push(u16::from_le_bytes([pair[0], pair[1]]));
    }
    String::from_utf16(&units).map_err(|err| source.err(err.to_string()))
}

fn read_utf8_length(
    data: &[u8],
    offset: usize,
    limit: usize,
    source: ChunkSource,
) -> DecodeResult<(usize, usize)> {
    if offset >= limit || offset >= data.len() {
        return Err(source.err("invalid UTF-8 length offset"));
    }
    let first = data[offset];
    if (first & 0x80) == 0 {
        Ok((first as usize, 1))
    } else {
        if offset + 1 >= limit {
            return Err(source.err("truncated UTF-8 length"));
        }
        let second = data[offset + 1];
        let length = (((first & 0x7F) as usize) << 8) | second as usize;
        Ok((length, 2))
    }
}

fn read_utf16_length(
    data: &[u8],
    offset: usize,
    limit: usize,
    source: ChunkSource,
) -> DecodeResult<(usize, usize)> {
    if offset + 2 > limit || offset + 2 > data.len() {
        return Err(source.err("invalid UTF-16 length offset"));
    }
    let first = u16::from_le_bytes([data[offset], data[offset + 1]]);
    if (first & 0x8000) == 0 {
        Ok((first as usize, 2))
    } else {
        if offset + 4 > limit {
            return Err(source.err("truncated UTF-16 length"));
        }
        let second = u16::from_le_bytes([data[offset + 2], data[offset + 3]]);
        let length = (((first & 0x7FFF) as usize) << 16) | second as usize;
        Ok((length, 4))
    }
}
