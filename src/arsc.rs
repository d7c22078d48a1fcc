//! Decoder for the compiled resource table (`resources.arsc`) chunk
//! format, and resource-id resolution over the decoded index.

use std::collections::BTreeMap;

use bitflags::bitflags;
use log::{debug, warn};

use crate::chunk::{
    read_chunk_header, ChunkHeader, ChunkReader, ChunkSource, StringPool, RES_STRING_POOL_TYPE,
    TYPE_ATTRIBUTE, TYPE_DYNAMIC_ATTRIBUTE, TYPE_DYNAMIC_REFERENCE, TYPE_FLOAT,
    TYPE_INT_BOOLEAN, TYPE_INT_DEC, TYPE_INT_HEX, TYPE_NULL, TYPE_REFERENCE, TYPE_STRING,
};
use crate::error::{DecodeError, DecodeResult};

const RES_TABLE_TYPE: u16 = 0x0002;
const RES_TABLE_PACKAGE_TYPE: u16 = 0x0200;
const RES_TABLE_TYPE_TYPE: u16 = 0x0201;
const RES_TABLE_TYPE_SPEC_TYPE: u16 = 0x0202;

const NO_ENTRY_OFFSET: u32 = 0xFFFF_FFFF;
const NO_ENTRY_OFFSET16: u16 = 0xFFFF;

/// Reference chains are chased at most this deep before failing with
/// [`DecodeError::ReferenceCycle`].
pub const MAX_REFERENCE_DEPTH: usize = 10;

pub(crate) const DENSITY_BUCKETS: &[(u16, &str)] = &[
    (120, "ldpi"),
    (160, "mdpi"),
    (213, "tvdpi"),
    (240, "hdpi"),
    (320, "xhdpi"),
    (480, "xxhdpi"),
    (640, "xxxhdpi"),
    (0xFFFE, "anydpi"),
    (0xFFFF, "nodpi"),
];

pub(crate) fn density_value(name: &str) -> Option<u16> {
    DENSITY_BUCKETS
        .iter()
        .find(|(_, bucket)| *bucket == name)
        .map(|(value, _)| *value)
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct EntryFlags: u16 {
        /// Complex entry holding a set of name/value mappings.
        const COMPLEX = 0x0001;
        const PUBLIC = 0x0002;
        const WEAK = 0x0004;
        /// Compact entry with the data type encoded in the flags word.
        const COMPACT = 0x0008;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct TypeFlags: u8 {
        /// Offset array holds (entry id, offset) pairs for present entries only.
        const SPARSE = 0x01;
        /// Offsets are 16-bit and scaled by four.
        const OFFSET16 = 0x02;
    }
}

/// A typed value stored in a resource entry. References are never chased
/// implicitly; see [`ResourceTable::resolve_string`].
#[derive(Clone, Debug, PartialEq)]
pub enum TableValue {
    Str(String),
    Reference(u32),
    Int(i64),
    Boolean(bool),
    Hex(u32),
    Float(f32),
    /// A complex (bag) entry; only the parent reference is retained.
    Complex { parent: u32 },
    Null,
}

/// The subset of a configuration descriptor this engine keys on: density
/// and locale. Everything else in the block is skipped by declared size.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResConfig {
    pub density: u16,
    pub language: Option<String>,
    pub region: Option<String>,
}

impl ResConfig {
    fn parse(reader: &mut ChunkReader<'_>) -> DecodeResult<Self> {
        let start = reader.position();
        let size = reader.read_u32()? as usize;
        if size < 4 {
            return Err(reader
                .source()
                .err("configuration block smaller than its size field"));
        }
        let mut config = ResConfig::default();
        if size >= 16 {
            reader.read_u16()?; // mcc
            reader.read_u16()?; // mnc
            config.language = read_locale_field(reader)?;
            config.region = read_locale_field(reader)?;
            reader.read_u8()?; // orientation
            reader.read_u8()?; // touchscreen
            config.density = reader.read_u16()?;
        }
        let end = start
            .checked_add(size)
            .ok_or_else(|| reader.source().err("configuration size overflow"))?;
        reader.seek(end)?;
        Ok(config)
    }

    pub fn is_default(&self) -> bool {
        self.density == 0 && self.language.is_none() && self.region.is_none()
    }

    /// Human-readable qualifier in resource-directory style, e.g.
    /// `en-rUS-xxhdpi`. Empty for the default configuration.
    pub fn qualifier(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(language) = &self.language {
            parts.push(language.clone());
        }
        if let Some(region) = &self.region {
            parts.push(format!("r{}", region.to_ascii_uppercase()));
        }
        if self.density != 0 {
            let name = DENSITY_BUCKETS
                .iter()
                .find(|(value, _)| *value == self.density)
                .map(|(_, name)| (*name).to_string())
                .unwrap_or_else(|| format!("{}dpi", self.density));
            parts.push(name);
        }
        parts.join("-")
    }
}

fn read_locale_field(reader: &mut ChunkReader<'_>) -> DecodeResult<Option<String>> {
    let a = reader.read_u8()?;
    let b = reader.read_u8()?;
    if a == 0 || b == 0 || !a.is_ascii_alphabetic() || !b.is_ascii_alphabetic() {
        // Packed (flagged) locale forms are not expanded.
        return Ok(None);
    }
    let lowered = [a.to_ascii_lowercase(), b.to_ascii_lowercase()];
    Ok(std::str::from_utf8(&lowered).ok().map(|s| s.to_string()))
}

/// A single resource entry: its key-pool name index and typed payload.
#[derive(Clone, Debug, PartialEq)]
pub struct ResEntry {
    pub key: u32,
    pub value: TableValue,
}

/// One configuration's worth of entries for a resource type.
#[derive(Clone, Debug, PartialEq)]
pub struct ResType {
    pub type_id: u8,
    pub config: ResConfig,
    pub entries: BTreeMap<u16, ResEntry>,
}

/// A package inside the table, with its type-name and key-name pools.
#[derive(Debug)]
pub struct ResPackage {
    pub id: u8,
    pub name: String,
    type_names: StringPool,
    key_names: StringPool,
    pub types: Vec<ResType>,
}

impl ResPackage {
    /// Resolves a type id (1-based) to its name, e.g. `drawable`.
    pub fn type_name(&self, type_id: u8) -> Option<&str> {
        if type_id == 0 {
            return None;
        }
        self.type_names.get(u32::from(type_id) - 1)
    }

    /// Resolves a key-pool index to an entry name, e.g. `ic_launcher`.
    pub fn key_name(&self, index: u32) -> Option<&str> {
        self.key_names.get(index)
    }

    pub(crate) fn name_pools(&self) -> impl Iterator<Item = &str> {
        self.type_names.iter().chain(self.key_names.iter())
    }
}

/// A decoded resource table: one global string pool plus per-package
/// type/entry indices. Immutable once decoded.
#[derive(Debug)]
pub struct ResourceTable {
    global: StringPool,
    packages: Vec<ResPackage>,
}

impl ResourceTable {
    pub fn packages(&self) -> &[ResPackage] {
        &self.packages
    }

    /// Decodes a `resources.arsc` buffer.
    pub fn decode(bytes: &[u8]) -> DecodeResult<Self> {
        let mut reader = ChunkReader::new(bytes, ChunkSource::ResourceTable);
        let table_header = read_chunk_header(&mut reader)?;
        if table_header.chunk_type != RES_TABLE_TYPE {
            return Err(DecodeError::MalformedResourceTable(format!(
                "buffer does not start with a table chunk (type 0x{:04x})",
                table_header.chunk_type
            )));
        }
        let declared_packages = reader.read_u32()?;
        let table_end = table_header.end();
        reader.seek(table_header.start + table_header.header_size as usize)?;

        let mut global = StringPool::empty();
        let mut seen_global = false;
        let mut packages = Vec::new();

        while reader.position() + 8 <= table_end {
            let chunk = read_chunk_header(&mut reader)?;
            let chunk_end = chunk.end();
            if chunk_end > table_end {
                return Err(DecodeError::MalformedResourceTable(
                    "chunk extends past its parent".to_string(),
                ));
            }
            match chunk.chunk_type {
                RES_STRING_POOL_TYPE => {
                    if seen_global {
                        warn!("extra top-level string pool in resource table; skipping");
                    } else {
                        global = StringPool::parse(&mut reader, &chunk)?;
                        seen_global = true;
                        debug!("global string pool: {} strings", global.len());
                    }
                }
                RES_TABLE_PACKAGE_TYPE => {
                    packages.push(parse_package(&mut reader, &chunk, &global)?);
                }
                other => {
                    debug!("skipping resource table chunk type 0x{other:04x}");
                }
            }
            reader.seek(chunk_end)?;
        }

        if packages.len() as u32 != declared_packages {
            debug!(
                "table declared {} packages, decoded {}",
                declared_packages,
                packages.len()
            );
        }

        Ok(ResourceTable { global, packages })
    }

    /// Looks up the value for a resource id under the preferred
    /// configuration qualifier, the default configuration, or the first
    /// configuration declared for the type, in that order. The returned
    /// value may itself be a reference; it is not chased here.
    pub fn resolve(&self, id: u32, preferred_config: Option<&str>) -> DecodeResult<&TableValue> {
        let package_id = (id >> 24) as u8;
        let type_id = ((id >> 16) & 0xFF) as u8;
        let entry_id = (id & 0xFFFF) as u16;

        let package = self
            .packages
            .iter()
            .find(|pkg| pkg.id == package_id)
            .ok_or(DecodeError::ResourceNotFound(id))?;

        let candidates: Vec<&ResType> = package
            .types
            .iter()
            .filter(|ty| ty.type_id == type_id && ty.entries.contains_key(&entry_id))
            .collect();

        let chosen = if let Some(qualifier) = preferred_config {
            candidates
                .iter()
                .copied()
                .find(|ty| ty.config.qualifier() == qualifier)
        } else {
            candidates
                .iter()
                .copied()
                .find(|ty| ty.config.is_default())
                .or_else(|| candidates.first().copied())
        };

        chosen
            .and_then(|ty| ty.entries.get(&entry_id))
            .map(|entry| &entry.value)
            .ok_or(DecodeError::ResourceNotFound(id))
    }

    /// Resolves a resource id all the way to a display string, following
    /// reference values with a fixed depth bound and cycle guard.
    pub fn resolve_string(&self, id: u32) -> DecodeResult<String> {
        let mut current = id;
        let mut visited: Vec<u32> = Vec::with_capacity(MAX_REFERENCE_DEPTH);
        for _ in 0..MAX_REFERENCE_DEPTH {
            match self.resolve(current, None)? {
                TableValue::Reference(next) => {
                    if *next == 0 {
                        return Ok(String::new());
                    }
                    if visited.contains(next) || *next == current {
                        return Err(DecodeError::ReferenceCycle(id));
                    }
                    visited.push(current);
                    current = *next;
                }
                TableValue::Str(text) => return Ok(text.clone()),
                TableValue::Int(num) => return Ok(num.to_string()),
                TableValue::Boolean(flag) => return Ok(flag.to_string()),
                TableValue::Hex(value) => return Ok(format!("0x{value:x}")),
                TableValue::Float(value) => return Ok(value.to_string()),
                TableValue::Null => return Ok(String::new()),
                TableValue::Complex { .. } => return Err(DecodeError::ResourceNotFound(id)),
            }
        }
        Err(DecodeError::ReferenceCycle(id))
    }

    /// Best-effort string lookup: empty on any failure. An unresolvable
    /// id is ordinary; structural failures are logged louder.
    pub fn get_resource(&self, id: u32) -> String {
        match self.resolve_string(id) {
            Ok(text) => text,
            Err(DecodeError::ResourceNotFound(_)) => {
                debug!("resource 0x{id:08x} not present in table");
                String::new()
            }
            Err(err) => {
                warn!("resource 0x{id:08x} lookup failed: {err}");
                String::new()
            }
        }
    }

    /// All strings held by the table's pools: the global value pool and
    /// each package's type/key name pools.
    pub fn pool_strings(&self) -> impl Iterator<Item = &str> {
        self.global
            .iter()
            .chain(self.packages.iter().flat_map(ResPackage::name_pools))
    }
}

/// Composes a resource id from its (package, type, entry) parts.
pub fn res_id(package_id: u8, type_id: u8, entry_id: u16) -> u32 {
    (u32::from(package_id) << 24) | (u32::from(type_id) << 16) | u32::from(entry_id)
}

fn parse_package(
    reader: &mut ChunkReader<'_>,
    header: &ChunkHeader,
    global: &StringPool,
) -> DecodeResult<ResPackage> {
    let source = reader.source();
    let package_end = header.end();
    let id = (reader.read_u32()? & 0xFF) as u8;

    // Package name: fixed 256-byte UTF-16 field, NUL-terminated.
    let mut units = Vec::with_capacity(128);
    for _ in 0..128 {
        units.push(reader.read_u16()?);
    }
    let name_units: Vec<u16> = units.into_iter().take_while(|&unit| unit != 0).collect();
    let name =
        String::from_utf16(&name_units).map_err(|err| source.err(format!("package name: {err}")))?;

    let type_strings_offset = reader.read_u32()? as usize;
    reader.read_u32()?; // lastPublicType
    let key_strings_offset = reader.read_u32()? as usize;
    reader.read_u32()?; // lastPublicKey

    let mut cursor = header.start + header.header_size as usize;
    let type_names = match parse_package_pool(reader, header.start, type_strings_offset, package_end)? {
        Some((pool, end)) => {
            cursor = cursor.max(end);
            pool
        }
        None => StringPool::empty(),
    };
    let key_names = match parse_package_pool(reader, header.start, key_strings_offset, package_end)? {
        Some((pool, end)) => {
            cursor = cursor.max(end);
            pool
        }
        None => StringPool::empty(),
    };

    // Type and spec chunks follow the later of the two pools.
    reader.seek(cursor)?;

    let mut types = Vec::new();
    while reader.position() + 8 <= package_end {
        let chunk = read_chunk_header(reader)?;
        let chunk_end = chunk.end();
        if chunk_end > package_end {
            return Err(source.err("chunk extends past its parent package"));
        }
        match chunk.chunk_type {
            RES_TABLE_TYPE_TYPE => {
                types.push(parse_type(reader, &chunk, global)?);
            }
            RES_TABLE_TYPE_SPEC_TYPE => {
                // Spec chunks carry per-entry change masks this engine
                // does not key on.
            }
            other => {
                debug!("skipping package chunk type 0x{other:04x}");
            }
        }
        reader.seek(chunk_end)?;
    }

    debug!(
        "package 0x{id:02x} '{name}': {} type chunks, {} type names, {} key names",
        types.len(),
        type_names.len(),
        key_names.len()
    );

    Ok(ResPackage {
        id,
        name,
        type_names,
        key_names,
        types,
    })
}

fn parse_package_pool(
    reader: &mut ChunkReader<'_>,
    package_start: usize,
    offset: usize,
    package_end: usize,
) -> DecodeResult<Option<(StringPool, usize)>> {
    if offset == 0 {
        return Ok(None);
    }
    let pool_start = package_start
        .checked_add(offset)
        .ok_or_else(|| reader.source().err("package pool offset overflow"))?;
    if pool_start >= package_end {
        return Err(reader
            .source()
            .err("package pool offset outside package chunk"));
    }
    reader.seek(pool_start)?;
    let pool_header = read_chunk_header(reader)?;
    if pool_header.chunk_type != RES_STRING_POOL_TYPE {
        return Err(reader
            .source()
            .err("package pool offset does not point at a string pool"));
    }
    let end = pool_header.end();
    let pool = StringPool::parse(reader, &pool_header)?;
    Ok(Some((pool, end)))
}

fn parse_type(
    reader: &mut ChunkReader<'_>,
    header: &ChunkHeader,
    global: &StringPool,
) -> DecodeResult<ResType> {
    let source = reader.source();
    let chunk_end = header.end();

    let type_id = reader.read_u8()?;
    if type_id == 0 {
        return Err(source.err("type chunk with id 0"));
    }
    let flags = TypeFlags::from_bits_truncate(reader.read_u8()?);
    reader.read_u16()?; // reserved
    let entry_count = reader.read_u32()? as usize;
    let entries_start = reader.read_u32()? as usize;
    let config = ResConfig::parse(reader)?;

    // The offset array begins where the declared header ends.
    reader.seek(header.start + header.header_size as usize)?;

    let slot_bytes = if flags.contains(TypeFlags::OFFSET16) { 2 } else { 4 };
    if entry_count > chunk_end.saturating_sub(reader.position()) / slot_bytes {
        return Err(source.err("entry offset array exceeds chunk bounds"));
    }

    let mut offsets: Vec<(u16, usize)> = Vec::with_capacity(entry_count);
    if flags.contains(TypeFlags::SPARSE) {
        for _ in 0..entry_count {
            let packed = reader.read_u32()?;
            let entry_id = (packed & 0xFFFF) as u16;
            let offset = ((packed >> 16) as usize) * 4;
            offsets.push((entry_id, offset));
        }
    } else if flags.contains(TypeFlags::OFFSET16) {
        for entry_id in 0..entry_count {
            let offset = reader.read_u16()?;
            if offset != NO_ENTRY_OFFSET16 {
                offsets.push((entry_id as u16, offset as usize * 4));
            }
        }
    } else {
        for entry_id in 0..entry_count {
            let offset = reader.read_u32()?;
            if offset != NO_ENTRY_OFFSET {
                offsets.push((entry_id as u16, offset as usize));
            }
        }
    }

    let entries_base = header
        .start
        .checked_add(entries_start)
        .ok_or_else(|| source.err("entry start overflow"))?;

    let mut entries = BTreeMap::new();
    for (entry_id, offset) in offsets {
        let position = entries_base
            .checked_add(offset)
            .ok_or_else(|| source.err("entry offset overflow"))?;
        if position >= chunk_end {
            return Err(source.err(format!(
                "entry {entry_id} offset points outside its type chunk"
            )));
        }
        reader.seek(position)?;
        let entry = parse_entry(reader, global)?;
        entries.insert(entry_id, entry);
    }

    Ok(ResType {
        type_id,
        config,
        entries,
    })
}

fn parse_entry(reader: &mut ChunkReader<'_>, global: &StringPool) -> DecodeResult<ResEntry> {
    let first = reader.read_u16()?;
    let raw_flags = reader.read_u16()?;
    let flags = EntryFlags::from_bits_truncate(raw_flags);

    if flags.contains(EntryFlags::COMPACT) {
        // Compact layout: key in the leading word, data type in the high
        // byte of the flags word, payload immediately after.
        let data_type = (raw_flags >> 8) as u8;
        let data = reader.read_u32()?;
        return Ok(ResEntry {
            key: u32::from(first),
            value: decode_res_value(reader, global, data_type, data)?,
        });
    }

    let key = reader.read_u32()?;
    if flags.contains(EntryFlags::COMPLEX) {
        let parent = reader.read_u32()?;
        reader.read_u32()?; // pair count; bag payloads are not indexed
        return Ok(ResEntry {
            key,
            value: TableValue::Complex { parent },
        });
    }

    reader.read_u16()?; // value size
    reader.read_u8()?; // res0
    let data_type = reader.read_u8()?;
    let data = reader.read_u32()?;
    Ok(ResEntry {
        key,
        value: decode_res_value(reader, global, data_type, data)?,
    })
}

fn decode_res_value(
    reader: &ChunkReader<'_>,
    global: &StringPool,
    data_type: u8,
    data: u32,
) -> DecodeResult<TableValue> {
    Ok(match data_type {
        TYPE_NULL => TableValue::Null,
        TYPE_REFERENCE | TYPE_ATTRIBUTE | TYPE_DYNAMIC_REFERENCE | TYPE_DYNAMIC_ATTRIBUTE => {
            TableValue::Reference(data)
        }
        TYPE_STRING => {
            let text = global.get(data).ok_or_else(|| {
                reader
                    .source()
                    .err("string value references missing pool entry")
            })?;
            TableValue::Str(text.to_string())
        }
        TYPE_FLOAT => TableValue::Float(f32::from_bits(data)),
        TYPE_INT_DEC => TableValue::Int(i64::from(data as i32)),
        TYPE_INT_HEX => TableValue::Hex(data),
        TYPE_INT_BOOLEAN => TableValue::Boolean(data != 0),
        _ => TableValue::Hex(data),
    })
}
