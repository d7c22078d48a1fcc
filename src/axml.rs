//! Decoder for the Android binary XML chunk format, plus the serializer
//! that reconstructs readable XML text from the decoded tree.

use std::borrow::Cow;
use std::collections::BTreeSet;

use log::debug;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::chunk::{
    read_chunk_header, ChunkReader, ChunkSource, StringPool, RES_STRING_POOL_TYPE, TYPE_FLOAT,
    TYPE_INT_BOOLEAN, TYPE_INT_DEC, TYPE_INT_HEX, TYPE_NULL, TYPE_REFERENCE, TYPE_STRING,
};
use crate::error::{DecodeError, DecodeResult};

const RES_XML_TYPE: u16 = 0x0003;
const RES_XML_RESOURCE_MAP_TYPE: u16 = 0x0180;
const RES_XML_START_NAMESPACE_TYPE: u16 = 0x0100;
const RES_XML_END_NAMESPACE_TYPE: u16 = 0x0101;
const RES_XML_START_ELEMENT_TYPE: u16 = 0x0102;
const RES_XML_END_ELEMENT_TYPE: u16 = 0x0103;
const RES_XML_CDATA_TYPE: u16 = 0x0104;

/// Namespace URI of the `android:` attribute namespace.
pub const ANDROID_NAMESPACE_URI: &str = "http://schemas.android.com/apk/res/android";

/// Typed attribute value decoded from a (type tag, raw data) pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlValue {
    Str(String),
    Boolean(bool),
    Int(i64),
    Hex(u32),
    /// An unresolved resource id. Callers decide whether to resolve it
    /// against a resource table.
    Reference(u32),
    Null,
}

impl XmlValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            XmlValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_reference_id(&self) -> Option<u32> {
        match self {
            XmlValue::Reference(id) => Some(*id),
            _ => None,
        }
    }

    /// Human-readable rendering, as used in the reconstructed XML text.
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            XmlValue::Str(text) => Cow::Borrowed(text),
            XmlValue::Boolean(true) => Cow::Borrowed("true"),
            XmlValue::Boolean(false) => Cow::Borrowed("false"),
            XmlValue::Int(num) => Cow::Owned(num.to_string()),
            XmlValue::Hex(value) => Cow::Owned(format!("0x{value:x}")),
            XmlValue::Reference(id) => Cow::Owned(format!("@0x{id:08x}")),
            XmlValue::Null => Cow::Borrowed(""),
        }
    }
}

/// A single attribute attached to an element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlAttribute {
    pub namespace_prefix: Option<String>,
    pub namespace_uri: Option<String>,
    /// Resource id of the attribute name itself, when the document carried
    /// a resource map chunk.
    pub resource_id: Option<u32>,
    pub name: String,
    pub value: XmlValue,
}

/// An element node: tag, ordered attributes, ordered children, optional
/// CDATA text. Each node is exclusively owned by its parent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlElement {
    pub namespace_prefix: Option<String>,
    pub namespace_uri: Option<String>,
    pub tag: String,
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlElement>,
    pub text: Option<String>,
}

impl XmlElement {
    fn new(tag: impl Into<String>) -> Self {
        XmlElement {
            namespace_prefix: None,
            namespace_uri: None,
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            text: None,
        }
    }

    /// Looks up an attribute by `prefix:local` query, e.g. `android:name`.
    pub fn attribute_value(&self, name: &str) -> Option<&XmlValue> {
        let (namespace, local) = split_attribute_query(name);
        self.attributes
            .iter()
            .find(|attr| attr.name == local && attr.namespace_prefix.as_deref() == namespace)
            .map(|attr| &attr.value)
    }

    /// Looks up an attribute by namespace URI and local name.
    pub fn attribute_ns(&self, uri: &str, local: &str) -> Option<&XmlValue> {
        self.attributes
            .iter()
            .find(|attr| attr.name == local && attr.namespace_uri.as_deref() == Some(uri))
            .map(|attr| &attr.value)
    }

    /// Looks up an attribute by local name regardless of namespace.
    pub fn attribute_local(&self, local: &str) -> Option<&XmlValue> {
        self.attributes
            .iter()
            .find(|attr| attr.name == local)
            .map(|attr| &attr.value)
    }

    pub fn find_child(&self, tag: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.tag == tag)
    }

    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |child| child.tag == tag)
    }

    /// Depth-first visit of this element and all descendants.
    pub fn visit(&self, visitor: &mut impl FnMut(&XmlElement)) {
        visitor(self);
        for child in &self.children {
            child.visit(visitor);
        }
    }
}

fn split_attribute_query(name: &str) -> (Option<&str>, &str) {
    if let Some((ns, local)) = name.split_once(':') {
        (Some(ns), local)
    } else {
        (None, name)
    }
}

#[derive(Clone, Debug)]
struct NamespaceFrame {
    prefix: Option<String>,
    uri: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct NamespaceDecl {
    prefix: String,
    uri: String,
}

fn resolve_prefix(namespaces: &[NamespaceFrame], uri: Option<&str>) -> Option<String> {
    uri.and_then(|target| {
        namespaces
            .iter()
            .rev()
            .find(|frame| frame.uri.as_deref() == Some(target))
            .and_then(|frame| frame.prefix.clone())
    })
}

fn decode_value(
    strings: &StringPool,
    raw_value_idx: u32,
    data_type: u8,
    data: u32,
) -> DecodeResult<XmlValue> {
    // A present raw string takes precedence over the typed payload.
    if let Some(raw) = strings.get(raw_value_idx) {
        return Ok(XmlValue::Str(raw.to_string()));
    }

    match data_type {
        TYPE_NULL => Ok(XmlValue::Null),
        TYPE_STRING => strings
            .get(data)
            .map(|s| XmlValue::Str(s.to_string()))
            .ok_or_else(|| {
                DecodeError::MalformedXml(
                    "string value references missing pool entry".to_string(),
                )
            }),
        TYPE_REFERENCE => Ok(XmlValue::Reference(data)),
        TYPE_INT_BOOLEAN => Ok(XmlValue::Boolean(data != 0)),
        TYPE_INT_DEC => Ok(XmlValue::Int(i64::from(data as i32))),
        TYPE_INT_HEX => Ok(XmlValue::Hex(data)),
        TYPE_FLOAT => Ok(XmlValue::Str(f32::from_bits(data).to_string())),
        _ => Ok(XmlValue::Hex(data)),
    }
}

/// A decoded binary XML document. Produced by [`XmlDocument::decode`] and
/// owned by the caller; nothing in it refers back to the input buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlDocument {
    root: XmlElement,
}

impl XmlDocument {
    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    /// Decodes a binary XML chunk stream into an element tree.
    pub fn decode(bytes: &[u8]) -> DecodeResult<Self> {
        let mut reader = ChunkReader::new(bytes, ChunkSource::BinaryXml);
        let doc_header = read_chunk_header(&mut reader)?;
        if doc_header.chunk_type != RES_XML_TYPE {
            return Err(DecodeError::MalformedXml(format!(
                "document does not start with an XML chunk (type 0x{:04x})",
                doc_header.chunk_type
            )));
        }

        let doc_end = doc_header.end();
        reader.seek(doc_header.start + doc_header.header_size as usize)?;

        let mut resource_map: Vec<u32> = Vec::new();
        let mut string_pool: Option<StringPool> = None;
        let mut namespaces: Vec<NamespaceFrame> = Vec::new();
        let mut element_stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        while reader.position() < doc_end {
            let chunk = read_chunk_header(&mut reader)?;
            let chunk_end = chunk.end();
            if chunk_end > doc_end {
                return Err(DecodeError::MalformedXml(
                    "chunk extends past its parent".to_string(),
                ));
            }
            match chunk.chunk_type {
                RES_STRING_POOL_TYPE => {
                    string_pool = Some(StringPool::parse(&mut reader, &chunk)?);
                }
                RES_XML_RESOURCE_MAP_TYPE => {
                    let mut ids = Vec::new();
                    while reader.position() + 4 <= chunk_end {
                        ids.push(reader.read_u32()?);
                    }
                    resource_map = ids;
                }
                RES_XML_START_NAMESPACE_TYPE => {
                    let pool = string_pool.as_ref().ok_or_else(|| {
                        DecodeError::MalformedXml(
                            "namespace chunk encountered before string pool".to_string(),
                        )
                    })?;
                    reader.read_u32()?; // line number
                    reader.read_u32()?; // comment
                    let prefix_idx = reader.read_u32()?;
                    let uri_idx = reader.read_u32()?;
                    namespaces.push(NamespaceFrame {
                        prefix: pool.get(prefix_idx).map(|s| s.to_string()),
                        uri: pool.get(uri_idx).map(|s| s.to_string()),
                    });
                }
                RES_XML_END_NAMESPACE_TYPE => {
                    namespaces.pop();
                }
                RES_XML_START_ELEMENT_TYPE => {
                    let pool = string_pool.as_ref().ok_or_else(|| {
                        DecodeError::MalformedXml(
                            "start element encountered before string pool".to_string(),
                        )
                    })?;

                    reader.read_u32()?; // line number
                    reader.read_u32()?; // comment
                    let ns_idx = reader.read_u32()?;
                    let name_idx = reader.read_u32()?;
                    reader.read_u16()?; // attributeStart
                    reader.read_u16()?; // attributeSize
                    let attr_count = reader.read_u16()? as usize;
                    reader.read_u16()?; // idIndex
                    reader.read_u16()?; // classIndex
                    reader.read_u16()?; // styleIndex

                    let tag = pool
                        .get(name_idx)
                        .ok_or_else(|| {
                            DecodeError::MalformedXml(
                                "element references invalid string index".to_string(),
                            )
                        })?
                        .to_string();

                    let namespace_uri = pool.get(ns_idx).map(|s| s.to_string());
                    let mut element = XmlElement::new(tag);
                    element.namespace_prefix = resolve_prefix(&namespaces, namespace_uri.as_deref());
                    element.namespace_uri = namespace_uri;

                    let mut attributes = Vec::with_capacity(attr_count.min(64));
                    for _ in 0..attr_count {
                        let attr_ns_idx = reader.read_u32()?;
                        let attr_name_idx = reader.read_u32()?;
                        let raw_value_idx = reader.read_u32()?;
                        let value_size = reader.read_u16()?;
                        reader.read_u8()?; // res0
                        let data_type = reader.read_u8()?;
                        let data = reader.read_u32()?;
                        if value_size != 8 {
                            return Err(DecodeError::MalformedXml(
                                "attribute value size must be 8".to_string(),
                            ));
                        }
                        let name = pool
                            .get(attr_name_idx)
                            .ok_or_else(|| {
                                DecodeError::MalformedXml(
                                    "attribute name references invalid string index".to_string(),
                                )
                            })?
                            .to_string();
                        let namespace_uri = pool.get(attr_ns_idx).map(|s| s.to_string());
                        let namespace_prefix =
                            resolve_prefix(&namespaces, namespace_uri.as_deref());
                        let value = decode_value(pool, raw_value_idx, data_type, data)?;
                        let resource_id = resource_map
                            .get(attr_name_idx as usize)
                            .copied()
                            .filter(|id| *id != 0);
                        attributes.push(XmlAttribute {
                            namespace_prefix,
                            namespace_uri,
                            resource_id,
                            name,
                            value,
                        });
                    }
                    element.attributes = attributes;
                    element_stack.push(element);
                }
                RES_XML_END_ELEMENT_TYPE => {
                    let element = element_stack.pop().ok_or_else(|| {
                        DecodeError::MalformedXml(
                            "end element without matching start".to_string(),
                        )
                    })?;
                    if let Some(parent) = element_stack.last_mut() {
                        parent.children.push(element);
                    } else if root.is_none() {
                        root = Some(element);
                    } else {
                        return Err(DecodeError::MalformedXml(
                            "multiple root elements in document".to_string(),
                        ));
                    }
                }
                RES_XML_CDATA_TYPE => {
                    let pool = string_pool.as_ref().ok_or_else(|| {
                        DecodeError::MalformedXml(
                            "CDATA encountered before string pool".to_string(),
                        )
                    })?;
                    reader.read_u32()?; // line number
                    reader.read_u32()?; // comment
                    let data_idx = reader.read_u32()?;
                    if let Some(text) = pool.get(data_idx) {
                        if let Some(current) = element_stack.last_mut() {
                            current.text = Some(text.to_string());
                        }
                    }
                }
                other => {
                    // Unknown chunk type; skip by declared size for forward
                    // compatibility.
                    debug!("skipping unknown XML chunk type 0x{other:04x}");
                }
            }
            reader.seek(chunk_end)?;
        }

        if !element_stack.is_empty() {
            return Err(DecodeError::MalformedXml(
                "unclosed elements at end of document".to_string(),
            ));
        }

        let root = root.ok_or_else(|| {
            DecodeError::MalformedXml("document has no root element".to_string())
        })?;

        Ok(XmlDocument { root })
    }

    /// Serializes the tree back to readable XML text. Order-preserving;
    /// childless, textless elements self-close.
    pub fn to_xml_string(&self) -> DecodeResult<String> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(|err| DecodeError::MalformedXml(err.to_string()))?;
        let namespaces = collect_namespace_declarations(&self.root);
        write_element_xml(&self.root, &mut writer, &namespaces, true)?;
        String::from_utf8(writer.into_inner())
            .map_err(|err| DecodeError::MalformedXml(err.to_string()))
    }
}

fn qualified_name(prefix: Option<&str>, local: &str) -> String {
    if let Some(prefix) = prefix {
        format!("{prefix}:{local}")
    } else {
        local.to_string()
    }
}

fn collect_namespace_declarations(root: &XmlElement) -> Vec<NamespaceDecl> {
    let mut set = BTreeSet::new();
    gather_namespace_decls(root, &mut set);
    set.into_iter().collect()
}

fn gather_namespace_decls(element: &XmlElement, set: &mut BTreeSet<NamespaceDecl>) {
    if let (Some(prefix), Some(uri)) = (&element.namespace_prefix, &element.namespace_uri) {
        set.insert(NamespaceDecl {
            prefix: prefix.clone(),
            uri: uri.clone(),
        });
    }
    for attr in &element.attributes {
        if let (Some(prefix), Some(uri)) = (&attr.namespace_prefix, &attr.namespace_uri) {
            set.insert(NamespaceDecl {
                prefix: prefix.clone(),
                uri: uri.clone(),
            });
        }
    }
    for child in &element.children {
        gather_namespace_decls(child, set);
    }
}

fn write_element_xml(
    element: &XmlElement,
    writer: &mut Writer<Vec<u8>>,
    namespaces: &[NamespaceDecl],
    is_root: bool,
) -> DecodeResult<()> {
    let element_name = qualified_name(element.namespace_prefix.as_deref(), &element.tag);
    let mut attr_storage = Vec::new();
    if is_root {
        for decl in namespaces {
            let attr_name = if decl.prefix.is_empty() {
                "xmlns".to_string()
            } else {
                format!("xmlns:{}", decl.prefix)
            };
            attr_storage.push((attr_name, decl.uri.clone()));
        }
    }
    for attr in &element.attributes {
        let name = qualified_name(attr.namespace_prefix.as_deref(), &attr.name);
        attr_storage.push((name, attr.value.render().into_owned()));
    }
    let mut start = BytesStart::new(element_name.as_str());
    for (key, value) in &attr_storage {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() && element.text.is_none() {
        writer
            .write_event(Event::Empty(start))
            .map_err(|err| DecodeError::MalformedXml(err.to_string()))?;
        return Ok(());
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|err| DecodeError::MalformedXml(err.to_string()))?;
    if let Some(text) = &element.text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(|err| DecodeError::MalformedXml(err.to_string()))?;
    }
    for child in &element.children {
        write_element_xml(child, writer, namespaces, false)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element_name.as_str())))
        .map_err(|err| DecodeError::MalformedXml(err.to_string()))?;
    Ok(())
}
