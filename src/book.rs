use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use epub::doc::{EpubDoc, NavPoint};
use log::{debug, info};

/// One unit of source material as delivered by the EPUB container: raw
/// markup bytes plus whatever the container already knows about it. The
/// core never parses the container format itself.
#[derive(Debug, Clone)]
pub struct DocumentItem {
    pub raw_content: Vec<u8>,
    pub declared_title: Option<String>,
    pub file_name: String,
}

/// Dublin Core metadata: key to list of values, read-only after load.
pub type Metadata = BTreeMap<String, Vec<String>>;

const METADATA_KEYS: [(&str, &str); 4] = [
    ("title", "title"),
    ("author", "creator"),
    ("language", "language"),
    ("description", "description"),
];

/// An opened EPUB, reduced to the two things the reader core consumes:
/// spine-ordered document items and a metadata map.
pub struct EpubSource {
    pub items: Vec<DocumentItem>,
    pub metadata: Metadata,
}

impl EpubSource {
    pub fn open(path: &Path) -> Result<Self> {
        let mut doc: EpubDoc<BufReader<File>> =
            EpubDoc::new(path).with_context(|| format!("open EPUB {}", path.display()))?;
        info!(
            "Opened {} ({} spine items)",
            path.display(),
            doc.spine.len()
        );

        let metadata = read_metadata(&doc);
        let toc_titles = toc_title_index(&doc.toc);

        let mut items = Vec::with_capacity(doc.spine.len());
        let idrefs: Vec<String> = doc.spine.iter().map(|item| item.idref.clone()).collect();
        for idref in idrefs {
            let Some(resource) = doc.resources.get(&idref) else {
                debug!("spine item {idref} has no resource entry, skipping");
                continue;
            };
            let resource_path = resource.path.clone();
            let file_name = resource_path.to_string_lossy().into_owned();

            let Some((raw_content, _mime)) = doc.get_resource(&idref) else {
                debug!("spine item {idref} has no readable content, skipping");
                continue;
            };

            let declared_title = toc_titles.get(&normalize_href(&file_name)).cloned();
            items.push(DocumentItem {
                raw_content,
                declared_title,
                file_name,
            });
        }

        Ok(EpubSource { items, metadata })
    }
}

fn read_metadata(doc: &EpubDoc<BufReader<File>>) -> Metadata {
    let mut metadata = Metadata::new();
    for (key, dc_name) in METADATA_KEYS {
        let values: Vec<String> = doc
            .metadata
            .iter()
            .filter(|item| item.property == dc_name)
            .map(|item| item.value.clone())
            .collect();
        metadata.insert(key.to_string(), values);
    }
    metadata
}

/// Flattens the navigation tree into `normalized href -> label`, so spine
/// items can pick up the title the table of contents declares for them.
fn toc_title_index(toc: &[NavPoint]) -> BTreeMap<String, String> {
    let mut index = BTreeMap::new();
    collect_nav_labels(toc, &mut index);
    index
}

fn collect_nav_labels(points: &[NavPoint], index: &mut BTreeMap<String, String>) {
    for point in points {
        let href = point.content.to_string_lossy();
        let key = normalize_href(&href);
        index.entry(key).or_insert_with(|| point.label.trim().to_string());
        collect_nav_labels(&point.children, index);
    }
}

/// Strips fragments and leading `./` so toc hrefs and resource paths compare.
fn normalize_href(href: &str) -> String {
    let href = href.split('#').next().unwrap_or(href);
    href.trim_start_matches("./").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn normalize_href_strips_fragment_and_dot_slash() {
        assert_eq!(normalize_href("./ch1.xhtml#part2"), "ch1.xhtml");
        assert_eq!(normalize_href("text/ch2.xhtml"), "text/ch2.xhtml");
    }

    #[test]
    fn toc_index_prefers_first_label_and_recurses() {
        let toc = vec![NavPoint {
            label: "Chapter 1".to_string(),
            content: PathBuf::from("ch1.xhtml"),
            play_order: Some(1),
            children: vec![NavPoint {
                label: "Chapter 1.1".to_string(),
                content: PathBuf::from("ch1.xhtml#s1"),
                play_order: Some(2),
                children: vec![],
            }],
        }];
        let index = toc_title_index(&toc);
        // The nested entry points at the same file; the top-level label wins.
        assert_eq!(index.get("ch1.xhtml").map(String::as_str), Some("Chapter 1"));
    }
}
