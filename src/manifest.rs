//! Typed view over a decoded manifest document: package identity,
//! version, application label, and declared permissions.

use std::collections::BTreeSet;

use log::debug;
use serde::Serialize;

use crate::arsc::ResourceTable;
use crate::axml::{XmlDocument, XmlValue, ANDROID_NAMESPACE_URI};
use crate::error::{DecodeError, DecodeResult};

/// The application label as declared: either a literal string or an
/// unresolved resource reference for the caller to resolve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApplicationLabel {
    Literal(String),
    Resource(u32),
    Absent,
}

/// Serializable summary of the identity fields, for embedding layers
/// that hand results across a process or FFI boundary.
#[derive(Clone, Debug, Serialize)]
pub struct ManifestSummary {
    pub package: String,
    pub version_name: String,
    pub permissions: Vec<String>,
}

/// Read-only manifest view. Built once from a decoded [`XmlDocument`],
/// which it keeps for [`Manifest::original_xml`].
#[derive(Debug)]
pub struct Manifest {
    package: String,
    version_name: String,
    label: ApplicationLabel,
    permissions: BTreeSet<String>,
    document: XmlDocument,
}

impl Manifest {
    /// Builds the view. The document root must be a `manifest` element
    /// carrying a `package` attribute.
    pub fn from_document(document: XmlDocument) -> DecodeResult<Self> {
        let root = document.root();
        if root.tag != "manifest" {
            return Err(DecodeError::InvalidManifest(format!(
                "root element is <{}>, expected <manifest>",
                root.tag
            )));
        }
        let package = root
            .attribute_local("package")
            .and_then(XmlValue::as_str)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                DecodeError::InvalidManifest("manifest has no package attribute".to_string())
            })?
            .to_string();

        let version_name = namespaced_attr(root, "versionName")
            .and_then(XmlValue::as_str)
            .unwrap_or_default()
            .to_string();

        let label = match root
            .find_child("application")
            .and_then(|app| namespaced_attr(app, "label"))
        {
            Some(XmlValue::Str(text)) => ApplicationLabel::Literal(text.clone()),
            Some(XmlValue::Reference(id)) => ApplicationLabel::Resource(*id),
            Some(XmlValue::Null) | None => ApplicationLabel::Absent,
            Some(other) => ApplicationLabel::Literal(other.render().into_owned()),
        };

        let mut permissions = BTreeSet::new();
        for tag in ["uses-permission", "uses-permission-sdk-23"] {
            for child in root.children_named(tag) {
                if let Some(name) = namespaced_attr(child, "name").and_then(XmlValue::as_str) {
                    permissions.insert(name.to_string());
                }
            }
        }

        Ok(Manifest {
            package,
            version_name,
            label,
            permissions,
            document,
        })
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn version_name(&self) -> &str {
        &self.version_name
    }

    pub fn application_label(&self) -> &ApplicationLabel {
        &self.label
    }

    /// Fully-qualified permission names, uniqued. Display-layer prefix
    /// stripping is left to callers.
    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    /// The decoded document this view was built from.
    pub fn document(&self) -> &XmlDocument {
        &self.document
    }

    /// Readable XML reconstruction of the decoded manifest tree.
    pub fn original_xml(&self) -> DecodeResult<String> {
        self.document.to_xml_string()
    }

    /// Best-effort label resolution: literals verbatim, references via
    /// the table when present. Never fails; an unresolvable label is an
    /// empty string.
    pub fn resolve_label(&self, table: Option<&ResourceTable>) -> String {
        match &self.label {
            ApplicationLabel::Literal(text) => text.clone(),
            ApplicationLabel::Resource(id) => match table {
                Some(table) => table.get_resource(*id),
                None => {
                    debug!("label is reference 0x{id:08x} but no resource table is available");
                    String::new()
                }
            },
            ApplicationLabel::Absent => String::new(),
        }
    }

    pub fn summary(&self) -> ManifestSummary {
        ManifestSummary {
            package: self.package.clone(),
            version_name: self.version_name.clone(),
            permissions: self.permissions.iter().cloned().collect(),
        }
    }
}

/// Android-namespaced attribute lookup with a plain-name fallback; some
/// historical packers emit identity attributes without the namespace.
fn namespaced_attr<'a>(
    element: &'a crate::axml::XmlElement,
    local: &str,
) -> Option<&'a XmlValue> {
    element
        .attribute_ns(ANDROID_NAMESPACE_URI, local)
        .or_else(|| element.attribute_local(local))
}
