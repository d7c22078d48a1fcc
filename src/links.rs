//! Extraction of URL-shaped strings from decoded structures and from
//! plain-text container entries.

use std::collections::BTreeSet;

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::arsc::ResourceTable;
use crate::container::Apk;
use crate::manifest::Manifest;

static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s"'<>\\]+"#).expect("URL pattern"));

const TEXT_EXTENSIONS: &[&str] = &["xml", "json", "txt", "html", "js", "properties"];

/// Collects `http`/`https` URLs from the resource table's string pools,
/// the manifest tree (attribute values and CDATA text), and plain-text
/// container entries. Deduplicated; returned in sorted order.
pub fn list_links(
    apk: &Apk,
    table: Option<&ResourceTable>,
    manifest: Option<&Manifest>,
) -> Vec<String> {
    let mut found: BTreeSet<String> = BTreeSet::new();

    if let Some(table) = table {
        for text in table.pool_strings() {
            scan_into(text, &mut found);
        }
    }

    if let Some(manifest) = manifest {
        manifest.document().root().visit(&mut |element| {
            for attr in &element.attributes {
                if let Some(text) = attr.value.as_str() {
                    scan_into(text, &mut found);
                }
            }
            if let Some(text) = &element.text {
                scan_into(text, &mut found);
            }
        });
    }

    for name in apk.entry_names().filter(|name| is_text_entry(name)) {
        match apk.read_entry(name) {
            Ok(bytes) => scan_into(&String::from_utf8_lossy(&bytes), &mut found),
            Err(err) => warn!("skipping unreadable text entry '{name}': {err}"),
        }
    }

    found.into_iter().collect()
}

fn scan_into(text: &str, found: &mut BTreeSet<String>) {
    for m in URL_PATTERN.find_iter(text) {
        found.insert(m.as_str().to_string());
    }
}

/// Plain-text candidates only: the binary manifest and anything under
/// `res/` (compiled XML) are excluded, except raw assets.
fn is_text_entry(name: &str) -> bool {
    if name == "AndroidManifest.xml" {
        return false;
    }
    if name.starts_with("res/") && !name.starts_with("res/raw/") {
        return false;
    }
    name.rsplit('.')
        .next()
        .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}
