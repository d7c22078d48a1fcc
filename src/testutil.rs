//! Test-only fixture builders: synthetic binary XML documents, resource
//! tables, and ZIP containers assembled in memory.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::axml::{XmlElement, ANDROID_NAMESPACE_URI};
use crate::chunk::{
    NO_ENTRY_INDEX, RES_STRING_POOL_TYPE, TYPE_INT_BOOLEAN, TYPE_INT_DEC, TYPE_REFERENCE,
    TYPE_STRING,
};

const RES_XML_TYPE: u16 = 0x0003;
const RES_XML_START_NAMESPACE_TYPE: u16 = 0x0100;
const RES_XML_END_NAMESPACE_TYPE: u16 = 0x0101;
const RES_XML_START_ELEMENT_TYPE: u16 = 0x0102;
const RES_XML_END_ELEMENT_TYPE: u16 = 0x0103;
const RES_XML_CDATA_TYPE: u16 = 0x0104;

const RES_TABLE_TYPE: u16 = 0x0002;
const RES_TABLE_PACKAGE_TYPE: u16 = 0x0200;
const RES_TABLE_TYPE_TYPE: u16 = 0x0201;

fn push_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn align_to_four(buf: &mut Vec<u8>) {
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
}

fn begin_chunk(buf: &mut Vec<u8>, chunk_type: u16, header_size: u16) -> usize {
    let start = buf.len();
    push_u16(buf, chunk_type);
    push_u16(buf, header_size);
    push_u32(buf, 0); // size placeholder
    start
}

fn end_chunk(buf: &mut Vec<u8>, chunk_start: usize) {
    align_to_four(buf);
    let size = (buf.len() - chunk_start) as u32;
    buf[chunk_start + 4..chunk_start + 8].copy_from_slice(&size.to_le_bytes());
}

fn write_utf16_string(buf: &mut Vec<u8>, text: &str) {
    let units: Vec<u16> = text.encode_utf16().collect();
    push_u16(buf, units.len() as u16);
    for unit in units {
        push_u16(buf, unit);
    }
    push_u16(buf, 0);
}

/// Interning UTF-16 string pool, serialized in chunk form.
struct PoolBuilder {
    strings: Vec<String>,
    indices: BTreeMap<String, u32>,
}

impl PoolBuilder {
    fn new() -> Self {
        PoolBuilder {
            strings: Vec::new(),
            indices: BTreeMap::new(),
        }
    }

    fn from_ordered(strings: &[String]) -> Self {
        let mut pool = PoolBuilder::new();
        for s in strings {
            pool.intern(s);
        }
        pool
    }

    fn intern(&mut self, value: &str) -> u32 {
        if let Some(&idx) = self.indices.get(value) {
            return idx;
        }
        let idx = self.strings.len() as u32;
        self.strings.push(value.to_string());
        self.indices.insert(value.to_string(), idx);
        idx
    }

    fn to_chunk(&self) -> Vec<u8> {
        let string_count = self.strings.len() as u32;
        let header_size = 28u16;
        let strings_start = header_size as u32 + string_count * 4;
        let mut string_data = Vec::new();
        let mut offsets = Vec::with_capacity(self.strings.len());
        for s in &self.strings {
            offsets.push(string_data.len() as u32);
            write_utf16_string(&mut string_data, s);
        }
        align_to_four(&mut string_data);

        let mut chunk = Vec::new();
        push_u16(&mut chunk, RES_STRING_POOL_TYPE);
        push_u16(&mut chunk, header_size);
        push_u32(&mut chunk, 0); // size placeholder
        push_u32(&mut chunk, string_count);
        push_u32(&mut chunk, 0); // style count
        push_u32(&mut chunk, 0); // flags (UTF-16)
        push_u32(&mut chunk, strings_start);
        push_u32(&mut chunk, 0); // stylesStart
        for offset in offsets {
            push_u32(&mut chunk, offset);
        }
        chunk.extend_from_slice(&string_data);
        let size = chunk.len() as u32;
        chunk[4..8].copy_from_slice(&size.to_le_bytes());
        chunk
    }
}

/// A standalone UTF-16 string pool chunk holding the given strings.
pub(crate) fn utf16_pool_chunk(strings: &[&str]) -> Vec<u8> {
    let mut pool = PoolBuilder::new();
    for s in strings {
        pool.intern(s);
    }
    pool.to_chunk()
}

#[derive(Clone, Copy)]
pub(crate) enum TestValue<'a> {
    Str(&'a str),
    Ref(u32),
    Int(i32),
    Bool(bool),
}

/// Emits a binary XML document chunk by chunk.
pub(crate) struct AxmlBuilder {
    pool: PoolBuilder,
    body: Vec<u8>,
}

impl AxmlBuilder {
    pub(crate) fn new() -> Self {
        AxmlBuilder {
            pool: PoolBuilder::new(),
            body: Vec::new(),
        }
    }

    pub(crate) fn start_namespace(&mut self, prefix: &str, uri: &str) {
        let prefix_idx = self.pool.intern(prefix);
        let uri_idx = self.pool.intern(uri);
        let start = begin_chunk(&mut self.body, RES_XML_START_NAMESPACE_TYPE, 24);
        push_u32(&mut self.body, 0); // line
        push_u32(&mut self.body, NO_ENTRY_INDEX); // comment
        push_u32(&mut self.body, prefix_idx);
        push_u32(&mut self.body, uri_idx);
        end_chunk(&mut self.body, start);
    }

    pub(crate) fn end_namespace(&mut self, prefix: &str, uri: &str) {
        let prefix_idx = self.pool.intern(prefix);
        let uri_idx = self.pool.intern(uri);
        let start = begin_chunk(&mut self.body, RES_XML_END_NAMESPACE_TYPE, 24);
        push_u32(&mut self.body, 0);
        push_u32(&mut self.body, NO_ENTRY_INDEX);
        push_u32(&mut self.body, prefix_idx);
        push_u32(&mut self.body, uri_idx);
        end_chunk(&mut self.body, start);
    }

    /// Attributes are (local name, namespace URI, value) triples.
    pub(crate) fn start_element(
        &mut self,
        ns_uri: Option<&str>,
        tag: &str,
        attrs: &[(&str, Option<&str>, TestValue<'_>)],
    ) {
        let ns_idx = ns_uri.map(|uri| self.pool.intern(uri)).unwrap_or(NO_ENTRY_INDEX);
        let name_idx = self.pool.intern(tag);
        let prepared: Vec<(u32, u32, u32, u8, u32)> = attrs
            .iter()
            .map(|(name, uri, value)| {
                let attr_ns = uri.map(|u| self.pool.intern(u)).unwrap_or(NO_ENTRY_INDEX);
                let attr_name = self.pool.intern(name);
                let (raw, data_type, data) = match value {
                    TestValue::Str(s) => {
                        let idx = self.pool.intern(s);
                        (idx, TYPE_STRING, idx)
                    }
                    TestValue::Ref(id) => (NO_ENTRY_INDEX, TYPE_REFERENCE, *id),
                    TestValue::Int(num) => (NO_ENTRY_INDEX, TYPE_INT_DEC, *num as u32),
                    TestValue::Bool(flag) => {
                        (NO_ENTRY_INDEX, TYPE_INT_BOOLEAN, u32::from(*flag))
                    }
                };
                (attr_ns, attr_name, raw, data_type, data)
            })
            .collect();

        let start = begin_chunk(&mut self.body, RES_XML_START_ELEMENT_TYPE, 36);
        push_u32(&mut self.body, 0); // line
        push_u32(&mut self.body, NO_ENTRY_INDEX); // comment
        push_u32(&mut self.body, ns_idx);
        push_u32(&mut self.body, name_idx);
        push_u16(&mut self.body, 20); // attributeStart
        push_u16(&mut self.body, 20); // attributeSize
        push_u16(&mut self.body, attrs.len() as u16);
        push_u16(&mut self.body, 0); // idIndex
        push_u16(&mut self.body, 0); // classIndex
        push_u16(&mut self.body, 0); // styleIndex
        for (attr_ns, attr_name, raw, data_type, data) in prepared {
            push_u32(&mut self.body, attr_ns);
            push_u32(&mut self.body, attr_name);
            push_u32(&mut self.body, raw);
            push_u16(&mut self.body, 8);
            self.body.push(0); // res0
            self.body.push(data_type);
            push_u32(&mut self.body, data);
        }
        end_chunk(&mut self.body, start);
    }

    pub(crate) fn end_element(&mut self, ns_uri: Option<&str>, tag: &str) {
        let ns_idx = ns_uri.map(|uri| self.pool.intern(uri)).unwrap_or(NO_ENTRY_INDEX);
        let name_idx = self.pool.intern(tag);
        let start = begin_chunk(&mut self.body, RES_XML_END_ELEMENT_TYPE, 24);
        push_u32(&mut self.body, 0);
        push_u32(&mut self.body, NO_ENTRY_INDEX);
        push_u32(&mut self.body, ns_idx);
        push_u32(&mut self.body, name_idx);
        end_chunk(&mut self.body, start);
    }

    pub(crate) fn cdata(&mut self, text: &str) {
        let idx = self.pool.intern(text);
        let start = begin_chunk(&mut self.body, RES_XML_CDATA_TYPE, 28);
        push_u32(&mut self.body, 0);
        push_u32(&mut self.body, NO_ENTRY_INDEX);
        push_u32(&mut self.body, idx);
        push_u16(&mut self.body, 8);
        self.body.push(0);
        self.body.push(TYPE_STRING);
        push_u32(&mut self.body, idx);
        end_chunk(&mut self.body, start);
    }

    /// An arbitrary chunk the decoder should skip by size.
    pub(crate) fn raw_chunk(&mut self, chunk_type: u16, payload: &[u8]) {
        let start = begin_chunk(&mut self.body, chunk_type, 8);
        self.body.extend_from_slice(payload);
        end_chunk(&mut self.body, start);
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let pool_chunk = self.pool.to_chunk();
        let mut document = Vec::new();
        let start = begin_chunk(&mut document, RES_XML_TYPE, 8);
        document.extend_from_slice(&pool_chunk);
        document.extend_from_slice(&self.body);
        end_chunk(&mut document, start);
        document
    }
}

/// A small but complete binary manifest: identity attributes, an
/// application with referenced label/icon, and two permissions.
pub(crate) fn manifest_fixture() -> Vec<u8> {
    let mut builder = AxmlBuilder::new();
    builder.start_namespace("android", ANDROID_NAMESPACE_URI);
    builder.start_element(
        None,
        "manifest",
        &[
            ("package", None, TestValue::Str("com.example.app")),
            ("versionName", Some(ANDROID_NAMESPACE_URI), TestValue::Str("1.2.3")),
            ("versionCode", Some(ANDROID_NAMESPACE_URI), TestValue::Int(10)),
        ],
    );
    builder.start_element(
        None,
        "application",
        &[
            ("label", Some(ANDROID_NAMESPACE_URI), TestValue::Ref(0x7f020000)),
            ("icon", Some(ANDROID_NAMESPACE_URI), TestValue::Ref(0x7f010000)),
            ("debuggable", Some(ANDROID_NAMESPACE_URI), TestValue::Bool(false)),
        ],
    );
    builder.end_element(None, "application");
    builder.start_element(
        None,
        "uses-permission",
        &[(
            "name",
            Some(ANDROID_NAMESPACE_URI),
            TestValue::Str("android.permission.INTERNET"),
        )],
    );
    builder.end_element(None, "uses-permission");
    builder.start_element(
        None,
        "uses-permission",
        &[(
            "name",
            Some(ANDROID_NAMESPACE_URI),
            TestValue::Str("android.permission.CAMERA"),
        )],
    );
    builder.end_element(None, "uses-permission");
    builder.end_element(None, "manifest");
    builder.end_namespace("android", ANDROID_NAMESPACE_URI);
    builder.build()
}

#[derive(Clone, Copy)]
pub(crate) enum TestTableValue<'a> {
    Str(&'a str),
    Ref(u32),
}

struct BuiltType {
    type_id: u8,
    density: u16,
    entries: Vec<(u16, u32, u8, u32)>,
}

/// Emits a resource table with one package and dense type chunks.
pub(crate) struct TableBuilder {
    package_id: u8,
    package_name: String,
    global: PoolBuilder,
    type_names: Vec<String>,
    key_names: PoolBuilder,
    types: Vec<BuiltType>,
}

impl TableBuilder {
    pub(crate) fn new(package_id: u8, package_name: &str) -> Self {
        TableBuilder {
            package_id,
            package_name: package_name.to_string(),
            global: PoolBuilder::new(),
            type_names: Vec::new(),
            key_names: PoolBuilder::new(),
            types: Vec::new(),
        }
    }

    /// Interns a type name, returning its 1-based type id.
    pub(crate) fn type_id(&mut self, name: &str) -> u8 {
        if let Some(pos) = self.type_names.iter().position(|n| n == name) {
            return (pos + 1) as u8;
        }
        self.type_names.push(name.to_string());
        self.type_names.len() as u8
    }

    /// Adds one configuration's entries for a type. Entries are
    /// (entry id, key name, value) triples.
    pub(crate) fn add_type(
        &mut self,
        type_id: u8,
        density: u16,
        entries: &[(u16, &str, TestTableValue<'_>)],
    ) {
        let prepared = entries
            .iter()
            .map(|(entry_id, key, value)| {
                let key_idx = self.key_names.intern(key);
                let (data_type, data) = match value {
                    TestTableValue::Str(s) => (TYPE_STRING, self.global.intern(s)),
                    TestTableValue::Ref(id) => (TYPE_REFERENCE, *id),
                };
                (*entry_id, key_idx, data_type, data)
            })
            .collect();
        self.types.push(BuiltType {
            type_id,
            density,
            entries: prepared,
        });
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let global_chunk = self.global.to_chunk();
        let type_pool_chunk = PoolBuilder::from_ordered(&self.type_names).to_chunk();
        let key_pool_chunk = self.key_names.to_chunk();

        let mut package = Vec::new();
        let package_start = begin_chunk(&mut package, RES_TABLE_PACKAGE_TYPE, 288);
        push_u32(&mut package, u32::from(self.package_id));
        let mut units: Vec<u16> = self.package_name.encode_utf16().collect();
        units.truncate(127);
        units.resize(128, 0);
        for unit in units {
            push_u16(&mut package, unit);
        }
        let type_strings_offset = 288u32;
        let key_strings_offset = type_strings_offset + type_pool_chunk.len() as u32;
        push_u32(&mut package, type_strings_offset);
        push_u32(&mut package, self.type_names.len() as u32); // lastPublicType
        push_u32(&mut package, key_strings_offset);
        push_u32(&mut package, 0); // lastPublicKey
        push_u32(&mut package, 0); // typeIdOffset
        package.extend_from_slice(&type_pool_chunk);
        package.extend_from_slice(&key_pool_chunk);
        for built in &self.types {
            package.extend_from_slice(&type_chunk(built));
        }
        end_chunk(&mut package, package_start);

        let mut table = Vec::new();
        let table_start = begin_chunk(&mut table, RES_TABLE_TYPE, 12);
        push_u32(&mut table, 1); // package count
        table.extend_from_slice(&global_chunk);
        table.extend_from_slice(&package);
        end_chunk(&mut table, table_start);
        table
    }
}

fn type_chunk(built: &BuiltType) -> Vec<u8> {
    let entry_count = built
        .entries
        .iter()
        .map(|(id, _, _, _)| usize::from(*id) + 1)
        .max()
        .unwrap_or(0);

    let mut entry_bytes = Vec::new();
    let mut offsets = vec![NO_ENTRY_INDEX; entry_count];
    for (entry_id, key_idx, data_type, data) in &built.entries {
        offsets[usize::from(*entry_id)] = entry_bytes.len() as u32;
        push_u16(&mut entry_bytes, 8); // entry header size
        push_u16(&mut entry_bytes, 0); // flags
        push_u32(&mut entry_bytes, *key_idx);
        push_u16(&mut entry_bytes, 8); // value size
        entry_bytes.push(0); // res0
        entry_bytes.push(*data_type);
        push_u32(&mut entry_bytes, *data);
    }

    let header_size = 20 + 28; // chunk + type fields + config block
    let entries_start = header_size + 4 * entry_count;

    let mut buf = Vec::new();
    let start = begin_chunk(&mut buf, RES_TABLE_TYPE_TYPE, header_size as u16);
    buf.push(built.type_id);
    buf.push(0); // flags (dense)
    push_u16(&mut buf, 0); // reserved
    push_u32(&mut buf, entry_count as u32);
    push_u32(&mut buf, entries_start as u32);
    // Config block: 28 bytes, density at its fixed slot, rest zeroed.
    push_u32(&mut buf, 28);
    push_u16(&mut buf, 0); // mcc
    push_u16(&mut buf, 0); // mnc
    buf.extend_from_slice(&[0, 0, 0, 0]); // language + country
    buf.push(0); // orientation
    buf.push(0); // touchscreen
    push_u16(&mut buf, built.density);
    buf.extend_from_slice(&[0u8; 12]);
    for offset in offsets {
        push_u32(&mut buf, offset);
    }
    buf.extend_from_slice(&entry_bytes);
    end_chunk(&mut buf, start);
    buf
}

/// A deflated ZIP archive holding the given entries, in order.
pub(crate) fn zip_fixture(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A hand-assembled stored ZIP whose central directory declares an
/// arbitrary uncompressed size for the single entry.
pub(crate) fn stored_zip_with_declared_size(
    name: &str,
    data: &[u8],
    declared_uncompressed: u32,
) -> Vec<u8> {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    let crc32 = hasher.finalize();

    let mut buf = Vec::new();
    // Local file header.
    push_u32(&mut buf, 0x04034b50);
    push_u16(&mut buf, 20); // version needed
    push_u16(&mut buf, 0); // flags
    push_u16(&mut buf, 0); // method: stored
    push_u16(&mut buf, 0); // mod time
    push_u16(&mut buf, 0); // mod date
    push_u32(&mut buf, crc32);
    push_u32(&mut buf, data.len() as u32);
    push_u32(&mut buf, declared_uncompressed);
    push_u16(&mut buf, name.len() as u16);
    push_u16(&mut buf, 0); // extra
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(data);

    // Central directory.
    let central_start = buf.len() as u32;
    push_u32(&mut buf, 0x02014b50);
    push_u16(&mut buf, 0x031E); // version made by
    push_u16(&mut buf, 20);
    push_u16(&mut buf, 0);
    push_u16(&mut buf, 0);
    push_u16(&mut buf, 0);
    push_u16(&mut buf, 0);
    push_u32(&mut buf, crc32);
    push_u32(&mut buf, data.len() as u32);
    push_u32(&mut buf, declared_uncompressed);
    push_u16(&mut buf, name.len() as u16);
    push_u16(&mut buf, 0); // extra
    push_u16(&mut buf, 0); // comment
    push_u16(&mut buf, 0); // disk
    push_u16(&mut buf, 0); // internal attrs
    push_u32(&mut buf, 0); // external attrs
    push_u32(&mut buf, 0); // local header offset
    buf.extend_from_slice(name.as_bytes());
    let central_size = buf.len() as u32 - central_start;

    // End of central directory.
    push_u32(&mut buf, 0x06054b50);
    push_u16(&mut buf, 0);
    push_u16(&mut buf, 0);
    push_u16(&mut buf, 1);
    push_u16(&mut buf, 1);
    push_u32(&mut buf, central_size);
    push_u32(&mut buf, central_start);
    push_u16(&mut buf, 0);
    buf
}

/// A complete sample package exercising every loader surface.
pub(crate) fn sample_apk() -> Vec<u8> {
    let manifest = manifest_fixture();
    let mut table = TableBuilder::new(0x7f, "com.example.app");
    let mipmap_type = table.type_id("mipmap"); // 0x7f01xxxx, matches the icon reference
    let string_type = table.type_id("string"); // 0x7f02xxxx, matches the label reference
    table.add_type(
        string_type,
        0,
        &[(0, "app_name", TestTableValue::Str("Hello App"))],
    );
    table.add_type(
        mipmap_type,
        160,
        &[(0, "ic_launcher", TestTableValue::Str("res/mipmap-mdpi/ic_launcher.png"))],
    );
    table.add_type(
        mipmap_type,
        480,
        &[(0, "ic_launcher", TestTableValue::Str("res/mipmap-xxhdpi/ic_launcher.png"))],
    );
    let arsc = table.build();
    zip_fixture(&[
        ("AndroidManifest.xml", manifest.as_slice()),
        ("resources.arsc", arsc.as_slice()),
        ("classes.dex", b"\x00padding secret_token padding\x00".as_slice()),
        ("res/mipmap-mdpi/ic_launcher.png", b"png-mdpi".as_slice()),
        ("res/mipmap-xxhdpi/ic_launcher.png", b"png-xxhdpi".as_slice()),
        (
            "assets/config.json",
            br#"{"home": "https://example.com/x"}"#.as_slice(),
        ),
        ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0".as_slice()),
    ])
}

/// Element shape recovered from serialized XML text by the reference
/// parser, for isomorphism checks.
pub(crate) struct TextNode {
    pub(crate) name: String,
    pub(crate) attrs: Vec<(String, String)>,
    pub(crate) children: Vec<TextNode>,
    pub(crate) text: Option<String>,
}

pub(crate) fn parse_text_xml(xml: &str) -> TextNode {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut stack: Vec<TextNode> = Vec::new();
    let mut root: Option<TextNode> = None;
    loop {
        match reader.read_event().unwrap() {
            Event::Start(start) => stack.push(node_from(&start)),
            Event::Empty(start) => {
                let node = node_from(&start);
                attach(node, &mut stack, &mut root);
            }
            Event::End(_) => {
                let node = stack.pop().expect("balanced elements");
                attach(node, &mut stack, &mut root);
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    let raw = text.unescape().unwrap().into_owned();
                    let trimmed = raw.trim();
                    if !trimmed.is_empty() {
                        current.text = Some(trimmed.to_string());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    root.expect("document has a root")
}

fn attach(node: TextNode, stack: &mut Vec<TextNode>, root: &mut Option<TextNode>) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    } else {
        *root = Some(node);
    }
}

fn node_from(start: &BytesStart<'_>) -> TextNode {
    let name = std::str::from_utf8(start.name().as_ref())
        .unwrap()
        .to_string();
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.unwrap();
        let key = std::str::from_utf8(attr.key.as_ref()).unwrap();
        if key == "xmlns" || key.starts_with("xmlns:") {
            continue;
        }
        attrs.push((
            key.to_string(),
            attr.unescape_value().unwrap().into_owned(),
        ));
    }
    TextNode {
        name,
        attrs,
        children: Vec::new(),
        text: None,
    }
}

/// Asserts the reparsed text tree matches the decoded tree: same tags,
/// attributes, values, order.
pub(crate) fn assert_isomorphic(element: &XmlElement, parsed: &TextNode) {
    let expected_name = match &element.namespace_prefix {
        Some(prefix) => format!("{prefix}:{}", element.tag),
        None => element.tag.clone(),
    };
    assert_eq!(parsed.name, expected_name);

    let expected_attrs: Vec<(String, String)> = element
        .attributes
        .iter()
        .map(|attr| {
            let name = match &attr.namespace_prefix {
                Some(prefix) => format!("{prefix}:{}", attr.name),
                None => attr.name.clone(),
            };
            (name, attr.value.render().into_owned())
        })
        .collect();
    assert_eq!(parsed.attrs, expected_attrs);

    assert_eq!(parsed.text, element.text);
    assert_eq!(parsed.children.len(), element.children.len());
    for (child, parsed_child) in element.children.iter().zip(&parsed.children) {
        assert_isomorphic(child, parsed_child);
    }
}
