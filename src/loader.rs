//! The per-package orchestrator: owns the input buffer, runs the
//! heavyweight decode once, and exposes the derived views.

use log::{debug, warn};

use crate::arsc::ResourceTable;
use crate::assets::{self, ImageAsset};
use crate::axml::XmlDocument;
use crate::container::Apk;
use crate::error::{DecodeError, DecodeResult};
use crate::links;
use crate::manifest::Manifest;
use crate::search::{self, SearchMatch};

/// Default ceiling on the input buffer. Anything larger is rejected
/// before any parsing happens.
pub const MAX_PACKAGE_SIZE: usize = 50 * 1024 * 1024;

const MANIFEST_ENTRY: &str = "AndroidManifest.xml";
const RESOURCE_TABLE_ENTRY: &str = "resources.arsc";

/// Snapshot of what a `load()` produced. Borrows from the loader; all
/// referenced structures are immutable once loaded.
#[derive(Debug)]
pub struct LoadResult<'a> {
    pub manifest: Option<&'a Manifest>,
    pub resource_table: Option<&'a ResourceTable>,
    pub loaded: bool,
}

/// An image asset together with its decompressed bytes.
#[derive(Clone, Debug)]
pub struct Image {
    pub name: String,
    pub path: String,
    pub data: Vec<u8>,
}

enum State {
    Unloaded { buffer: Vec<u8> },
    Loading,
    Loaded(Box<LoadedPackage>),
    Failed(DecodeError),
}

struct LoadedPackage {
    container: Apk,
    manifest: Option<Manifest>,
    resources: Option<ResourceTable>,
}

/// Loads one package and serves queries over the decoded state.
///
/// `load()` performs the only heavyweight work and is synchronous by
/// design; callers wanting a responsive interactive path should run it
/// on a worker thread. Everything reachable afterwards is immutable, so
/// the `&self` queries are safe to call from concurrent readers.
pub struct ApkLoader {
    limit: usize,
    state: State,
}

impl ApkLoader {
    /// Wraps a raw package buffer. Nothing is decoded until `load()`.
    pub fn new(buffer: Vec<u8>) -> Self {
        Self::with_limit(buffer, MAX_PACKAGE_SIZE)
    }

    pub fn with_limit(buffer: Vec<u8>, limit: usize) -> Self {
        ApkLoader {
            limit,
            state: State::Unloaded { buffer },
        }
    }

    /// Opens the container and decodes the manifest and resource table.
    ///
    /// A package without a manifest entry still loads; a manifest or
    /// resource table that fails to decode is absorbed (logged, left
    /// absent) so the remaining views keep working. Only an unreadable
    /// or over-sized container is terminal. Calling `load()` again
    /// returns the cached outcome without re-decoding.
    pub fn load(&mut self) -> DecodeResult<LoadResult<'_>> {
        match &self.state {
            State::Loaded(_) => {
                debug!("load() on an already-loaded package");
                return Ok(self.view());
            }
            State::Failed(err) => return Err(err.clone()),
            State::Loading | State::Unloaded { .. } => {}
        }

        let State::Unloaded { buffer } = std::mem::replace(&mut self.state, State::Loading)
        else {
            return Err(DecodeError::NotAnArchive(
                "loader re-entered while a load was in progress".to_string(),
            ));
        };

        if buffer.len() > self.limit {
            let err = DecodeError::TooLarge {
                size: buffer.len(),
                limit: self.limit,
            };
            self.state = State::Failed(err.clone());
            return Err(err);
        }

        let container = match Apk::open(buffer) {
            Ok(container) => container,
            Err(err) => {
                self.state = State::Failed(err.clone());
                return Err(err);
            }
        };

        let manifest = if container.contains(MANIFEST_ENTRY) {
            match decode_manifest(&container) {
                Ok(manifest) => Some(manifest),
                Err(err) => {
                    warn!("manifest decode failed: {err}");
                    None
                }
            }
        } else {
            debug!("package has no manifest entry");
            None
        };

        let resources = if container.contains(RESOURCE_TABLE_ENTRY) {
            match decode_resources(&container) {
                Ok(table) => Some(table),
                Err(err) => {
                    warn!("resource table decode failed: {err}");
                    None
                }
            }
        } else {
            None
        };

        self.state = State::Loaded(Box::new(LoadedPackage {
            container,
            manifest,
            resources,
        }));
        Ok(self.view())
    }

    fn view(&self) -> LoadResult<'_> {
        match &self.state {
            State::Loaded(package) => LoadResult {
                manifest: package.manifest.as_ref(),
                resource_table: package.resources.as_ref(),
                loaded: true,
            },
            _ => LoadResult {
                manifest: None,
                resource_table: None,
                loaded: false,
            },
        }
    }

    pub fn loaded(&self) -> bool {
        matches!(self.state, State::Loaded(_))
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        match &self.state {
            State::Loaded(package) => package.manifest.as_ref(),
            _ => None,
        }
    }

    pub fn resource_table(&self) -> Option<&ResourceTable> {
        match &self.state {
            State::Loaded(package) => package.resources.as_ref(),
            _ => None,
        }
    }

    pub fn container(&self) -> Option<&Apk> {
        match &self.state {
            State::Loaded(package) => Some(&package.container),
            _ => None,
        }
    }

    /// Best-effort resource-to-string lookup; empty when the table is
    /// absent or the id does not resolve.
    pub fn get_resource(&self, id: u32) -> String {
        self.resource_table()
            .map(|table| table.get_resource(id))
            .unwrap_or_default()
    }

    /// The application label, resolved through the resource table when
    /// the manifest declared it as a reference.
    pub fn application_label(&self) -> String {
        self.manifest()
            .map(|manifest| manifest.resolve_label(self.resource_table()))
            .unwrap_or_default()
    }

    /// Deduplicated bitmap assets with their decompressed bytes.
    pub fn get_images(&self) -> Vec<Image> {
        let Some(container) = self.container() else {
            return Vec::new();
        };
        let mut images = Vec::new();
        for ImageAsset { name, path } in assets::list_icons(container, self.resource_table()) {
            match container.read_entry(&path) {
                Ok(data) => images.push(Image { name, path, data }),
                Err(err) => warn!("image entry '{path}' unreadable: {err}"),
            }
        }
        images
    }

    /// Deduplicated URL-shaped strings from all scanned surfaces.
    pub fn get_links(&self) -> Vec<String> {
        let Some(container) = self.container() else {
            return Vec::new();
        };
        links::list_links(container, self.resource_table(), self.manifest())
    }

    /// Literal or regex search across code and resource entries. The
    /// pattern is validated even when nothing is loaded.
    pub fn custom_search(&self, pattern: &str, is_regex: bool) -> DecodeResult<Vec<String>> {
        let Some(container) = self.container() else {
            search::compile(pattern, is_regex)?;
            return Ok(Vec::new());
        };
        let matches = search::search(container, pattern, is_regex)?;
        Ok(matches.iter().map(SearchMatch::render).collect())
    }
}

fn decode_manifest(container: &Apk) -> DecodeResult<Manifest> {
    let bytes = container.read_entry(MANIFEST_ENTRY)?;
    let document = XmlDocument::decode(&bytes)?;
    Manifest::from_document(document)
}

fn decode_resources(container: &Apk) -> DecodeResult<ResourceTable> {
    let bytes = container.read_entry(RESOURCE_TABLE_ENTRY)?;
    ResourceTable::decode(&bytes)
}
