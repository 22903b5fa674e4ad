//! Low-level helpers over a loaded template: page boxes, page resource
//! dictionaries, content overlays and serialization.

use std::collections::HashSet;
use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

use crate::error::Error;
use crate::geometry::PageGeometry;

// Pages trees deeper than this are treated as malformed.
const MAX_TREE_DEPTH: usize = 32;

pub fn load_template(bytes: &[u8]) -> Result<Document, Error> {
    Document::load_mem(bytes).map_err(Error::DocumentLoad)
}

/// Page object ids, zero-based page index order.
pub fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

pub fn serialize(doc: &mut Document) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

/// zlib stream suitable for `/Filter /FlateDecode`.
pub(crate) fn deflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Looks up a page attribute, following `/Parent` for inheritable keys.
fn inherited_attribute<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return doc.dereference(value).ok().map(|(_, obj)| obj);
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn box_from_array(arr: &[Object]) -> Option<PageGeometry> {
    if arr.len() != 4 {
        return None;
    }
    let mut v = [0.0f64; 4];
    for (slot, obj) in v.iter_mut().zip(arr) {
        *slot = obj.as_float().ok()? as f64;
    }
    let geometry = PageGeometry::from_box(v[0], v[1], v[2], v[3]);
    (geometry.width > 0.0 && geometry.height > 0.0).then_some(geometry)
}

/// The visible page area: CropBox when present, MediaBox otherwise, US
/// Letter when neither is usable.
pub fn page_geometry(doc: &Document, page_id: ObjectId) -> PageGeometry {
    for key in [b"CropBox".as_slice(), b"MediaBox".as_slice()] {
        if let Some(Object::Array(arr)) = inherited_attribute(doc, page_id, key)
            && let Some(geometry) = box_from_array(arr)
        {
            return geometry;
        }
    }
    log::debug!("Page {page_id:?} has no usable MediaBox, assuming US Letter");
    PageGeometry::default()
}

/// Font and XObject resource names already used on any page, so names
/// handed out for new resources never rebind existing ones.
#[derive(Debug, Default)]
pub struct ResourceNames {
    taken: HashSet<String>,
}

impl ResourceNames {
    pub fn scan(doc: &Document) -> Self {
        let mut taken = HashSet::new();
        for page_id in page_ids(doc) {
            let Some(Object::Dictionary(resources)) = inherited_attribute(doc, page_id, b"Resources") else {
                continue;
            };
            for category in [b"Font".as_slice(), b"XObject".as_slice()] {
                let Ok(entries) = resources.get(category) else {
                    continue;
                };
                if let Ok((_, Object::Dictionary(entries))) = doc.dereference(entries) {
                    taken.extend(entries.iter().map(|(key, _)| String::from_utf8_lossy(key).into_owned()));
                }
            }
        }
        Self { taken }
    }

    /// First free `<prefix><n>`, counting from 1. The name is reserved.
    pub fn next(&mut self, prefix: &str) -> String {
        let mut n = 1usize;
        loop {
            let name = format!("{prefix}{n}");
            if self.taken.insert(name.clone()) {
                return name;
            }
            n += 1;
        }
    }
}

/// Registers `target` as `/category/name` in the page's resources.
///
/// Inherited resources are copied onto the page first so the addition does
/// not leak to sibling pages. Shared (referenced) resource dictionaries are
/// edited in place.
pub fn ensure_page_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &str,
    name: &str,
    target: ObjectId,
) -> Result<(), Error> {
    // None: no own Resources, Some(None): direct dictionary, Some(Some(id)): shared
    let own = match doc.get_dictionary(page_id)?.get(b"Resources") {
        Ok(Object::Reference(id)) => Some(Some(*id)),
        Ok(Object::Dictionary(_)) => Some(None),
        _ => None,
    };
    let resources_id = match own {
        Some(id) => id,
        None => {
            let inherited = match inherited_attribute(doc, page_id, b"Resources") {
                Some(Object::Dictionary(dict)) => dict.clone(),
                _ => Dictionary::new(),
            };
            doc.get_dictionary_mut(page_id)?
                .set("Resources", Object::Dictionary(inherited));
            None
        }
    };

    let category_id = {
        let resources = match resources_id {
            Some(id) => doc.get_dictionary(id)?,
            None => doc.get_dictionary(page_id)?.get(b"Resources")?.as_dict()?,
        };
        match resources.get(category.as_bytes()) {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        }
    };
    if let Some(id) = category_id {
        doc.get_dictionary_mut(id)?.set(name, Object::Reference(target));
        return Ok(());
    }

    let resources = match resources_id {
        Some(id) => doc.get_dictionary_mut(id)?,
        None => doc
            .get_dictionary_mut(page_id)?
            .get_mut(b"Resources")?
            .as_dict_mut()?,
    };
    if let Ok(Object::Dictionary(entries)) = resources.get_mut(category.as_bytes()) {
        entries.set(name, Object::Reference(target));
        return Ok(());
    }
    let mut entries = Dictionary::new();
    entries.set(name, Object::Reference(target));
    resources.set(category, Object::Dictionary(entries));
    Ok(())
}

/// Draws `overlay` on top of the page. The existing content is wrapped in
/// `q … Q` so state it leaves behind (CTM, colors) cannot shift the overlay.
pub fn append_content(doc: &mut Document, page_id: ObjectId, overlay: &[u8]) -> Result<(), Error> {
    let current = doc.get_dictionary(page_id)?.get(b"Contents").ok().cloned();
    let existing: Vec<Object> = match current {
        Some(Object::Array(arr)) => arr,
        Some(Object::Reference(id)) => match doc.get_object(id) {
            Ok(Object::Array(arr)) => arr.clone(),
            _ => vec![Object::Reference(id)],
        },
        Some(Object::Stream(stream)) => {
            let id = doc.add_object(Object::Stream(stream));
            vec![Object::Reference(id)]
        }
        _ => Vec::new(),
    };

    let mut contents = Vec::with_capacity(existing.len() + 2);
    let mut body = Vec::with_capacity(overlay.len() + 2);
    if !existing.is_empty() {
        let open_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
        contents.push(Object::Reference(open_id));
        contents.extend(existing);
        body.extend_from_slice(b"Q\n");
    }
    body.extend_from_slice(overlay);
    let overlay_id = doc.add_object(Stream::new(
        dictionary! { "Filter" => "FlateDecode" },
        deflate(&body)?,
    ));
    contents.push(Object::Reference(overlay_id));

    doc.get_dictionary_mut(page_id)?
        .set("Contents", Object::Array(contents));
    Ok(())
}
