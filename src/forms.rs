//! AcroForm widgets of a template: enumeration and filling.

use lopdf::{Document, Object, ObjectId, decode_text_string, text_string};

use crate::error::Error;

const FIELD_FLAG_RADIO: i64 = 1 << 15;
const FIELD_FLAG_PUSHBUTTON: i64 = 1 << 16;
const DEFAULT_ON_STATE: &str = "Yes";
const MAX_FIELD_DEPTH: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WidgetKind {
    Text,
    Checkbox,
    /// Anything else (radio groups, push buttons, choices, signatures),
    /// with a short description for notices.
    Other(String),
}

/// One terminal form field and the widget annotations that show it.
#[derive(Clone, Debug)]
pub struct FormWidget {
    /// Fully qualified name (`parent.child`), trimmed.
    pub name: String,
    pub kind: WidgetKind,
    pub field_id: ObjectId,
    pub widget_ids: Vec<ObjectId>,
}

fn acroform_fields(doc: &Document) -> Vec<ObjectId> {
    let Ok(catalog) = doc.catalog() else {
        return Vec::new();
    };
    let Ok(acroform) = doc.get_dict_in_dict(catalog, b"AcroForm") else {
        return Vec::new();
    };
    let fields = match acroform.get(b"Fields") {
        Ok(obj) => doc.dereference(obj).ok().and_then(|(_, o)| o.as_array().ok()),
        Err(_) => None,
    };
    fields
        .map(|arr| arr.iter().filter_map(|o| o.as_reference().ok()).collect())
        .unwrap_or_default()
}

struct Inherited {
    name: Option<String>,
    field_type: Option<Vec<u8>>,
    flags: i64,
}

fn classify(field_type: Option<&[u8]>, flags: i64) -> WidgetKind {
    match field_type {
        Some(b"Tx") => WidgetKind::Text,
        Some(b"Btn") if flags & FIELD_FLAG_PUSHBUTTON != 0 => WidgetKind::Other("push button".into()),
        Some(b"Btn") if flags & FIELD_FLAG_RADIO != 0 => WidgetKind::Other("radio button".into()),
        Some(b"Btn") => WidgetKind::Checkbox,
        Some(other) => WidgetKind::Other(String::from_utf8_lossy(other).into_owned()),
        None => WidgetKind::Other("untyped".into()),
    }
}

fn walk(doc: &Document, id: ObjectId, parent: &Inherited, depth: usize, out: &mut Vec<FormWidget>) {
    if depth > MAX_FIELD_DEPTH {
        log::warn!("Form field tree deeper than {MAX_FIELD_DEPTH} levels, ignoring the rest");
        return;
    }
    let Ok(dict) = doc.get_dictionary(id) else {
        return;
    };

    let partial = dict.get(b"T").ok().and_then(|t| decode_text_string(t).ok());
    let name = match (&parent.name, partial) {
        (Some(p), Some(t)) => Some(format!("{p}.{t}")),
        (None, Some(t)) => Some(t),
        (p, None) => p.clone(),
    };
    let here = Inherited {
        name,
        field_type: dict
            .get(b"FT")
            .and_then(Object::as_name)
            .ok()
            .map(<[u8]>::to_vec)
            .or_else(|| parent.field_type.clone()),
        flags: dict.get(b"Ff").and_then(Object::as_i64).unwrap_or(parent.flags),
    };

    let kids: Vec<ObjectId> = dict
        .get(b"Kids")
        .and_then(Object::as_array)
        .map(|arr| arr.iter().filter_map(|o| o.as_reference().ok()).collect())
        .unwrap_or_default();
    let (child_fields, widgets): (Vec<ObjectId>, Vec<ObjectId>) = kids
        .into_iter()
        .partition(|kid| doc.get_dictionary(*kid).is_ok_and(|d| d.has(b"T")));

    for child in child_fields {
        walk(doc, child, &here, depth + 1, out);
    }
    if !widgets.is_empty() || !dict.has(b"Kids") {
        let Some(name) = here.name.as_ref().map(|n| n.trim().to_string()) else {
            return;
        };
        out.push(FormWidget {
            name,
            kind: classify(here.field_type.as_deref(), here.flags),
            field_id: id,
            widget_ids: if widgets.is_empty() { vec![id] } else { widgets },
        });
    }
}

/// All terminal fields reachable from the AcroForm, in document order.
pub fn collect_widgets(doc: &Document) -> Vec<FormWidget> {
    let root = Inherited {
        name: None,
        field_type: None,
        flags: 0,
    };
    let mut out = Vec::new();
    for id in acroform_fields(doc) {
        walk(doc, id, &root, 0, &mut out);
    }
    out
}

/// Sets `/V` and drops stale appearance streams so viewers rebuild them.
pub fn set_text(doc: &mut Document, widget: &FormWidget, text: &str) -> Result<(), Error> {
    doc.get_dictionary_mut(widget.field_id)?.set("V", text_string(text));
    for id in &widget.widget_ids {
        doc.get_dictionary_mut(*id)?.remove(b"AP");
    }
    Ok(())
}

/// The checkbox's "on" appearance name: the first normal-appearance state
/// other than `Off`.
fn on_state(doc: &Document, widget: &FormWidget) -> String {
    for id in &widget.widget_ids {
        let Ok(annot) = doc.get_dictionary(*id) else {
            continue;
        };
        let Ok(ap) = doc.get_dict_in_dict(annot, b"AP") else {
            continue;
        };
        let Ok(normal) = doc.get_dict_in_dict(ap, b"N") else {
            continue;
        };
        if let Some((key, _)) = normal.iter().find(|(key, _)| key.as_slice() != b"Off") {
            return String::from_utf8_lossy(key).into_owned();
        }
    }
    DEFAULT_ON_STATE.to_string()
}

pub fn set_checked(doc: &mut Document, widget: &FormWidget, checked: bool) -> Result<(), Error> {
    let state = if checked {
        on_state(doc, widget)
    } else {
        "Off".to_string()
    };
    doc.get_dictionary_mut(widget.field_id)?
        .set("V", Object::Name(state.clone().into_bytes()));
    for id in &widget.widget_ids {
        doc.get_dictionary_mut(*id)?
            .set("AS", Object::Name(state.clone().into_bytes()));
    }
    Ok(())
}

/// Asks viewers to regenerate field appearances from `/V`.
pub fn enable_need_appearances(doc: &mut Document) -> Result<(), Error> {
    let acroform_ref = match doc.catalog()?.get(b"AcroForm") {
        Ok(Object::Reference(id)) => Some(*id),
        Ok(_) => None,
        Err(_) => return Ok(()),
    };
    let acroform = match acroform_ref {
        Some(id) => doc.get_dictionary_mut(id)?,
        None => doc.catalog_mut()?.get_mut(b"AcroForm")?.as_dict_mut()?,
    };
    acroform.set("NeedAppearances", true);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};

    fn form_doc() -> (Document, ObjectId, ObjectId) {
        let mut doc = Document::with_version("1.7");
        let on = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let off = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let name = doc.add_object(dictionary! {
            "FT" => "Tx",
            "T" => Object::string_literal(" char_name "),
            "Subtype" => "Widget",
            "AP" => dictionary! { "N" => off },
        });
        let shield = doc.add_object(dictionary! {
            "FT" => "Btn",
            "T" => Object::string_literal("shield"),
            "Subtype" => "Widget",
            "AS" => "Off",
            "AP" => dictionary! { "N" => dictionary! { "Off" => off, "On" => on } },
        });
        let radio = doc.add_object(dictionary! {
            "FT" => "Btn",
            "Ff" => FIELD_FLAG_RADIO,
            "T" => Object::string_literal("alignment"),
        });
        let group = doc.new_object_id();
        let kid_a = doc.add_object(dictionary! { "T" => Object::string_literal("a"), "Parent" => group, "Subtype" => "Widget" });
        let kid_b = doc.add_object(dictionary! { "T" => Object::string_literal("b"), "Parent" => group, "Subtype" => "Widget" });
        doc.objects.insert(
            group,
            Object::Dictionary(dictionary! {
                "FT" => "Tx",
                "T" => Object::string_literal("skills"),
                "Kids" => vec![Object::Reference(kid_a), Object::Reference(kid_b)],
            }),
        );
        let acroform = doc.add_object(dictionary! {
            "Fields" => vec![
                Object::Reference(name),
                Object::Reference(shield),
                Object::Reference(radio),
                Object::Reference(group),
            ],
        });
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "AcroForm" => acroform });
        doc.trailer.set("Root", catalog);
        (doc, name, shield)
    }

    #[test]
    fn collects_qualified_names_and_kinds() {
        let (doc, _, _) = form_doc();
        let widgets = collect_widgets(&doc);
        let summary: Vec<(&str, &WidgetKind)> = widgets.iter().map(|w| (w.name.as_str(), &w.kind)).collect();
        assert_eq!(
            summary,
            [
                ("char_name", &WidgetKind::Text),
                ("shield", &WidgetKind::Checkbox),
                ("alignment", &WidgetKind::Other("radio button".into())),
                ("skills.a", &WidgetKind::Text),
                ("skills.b", &WidgetKind::Text),
            ]
        );
    }

    #[test]
    fn text_value_replaces_appearance() {
        let (mut doc, name_id, _) = form_doc();
        let widgets = collect_widgets(&doc);
        set_text(&mut doc, &widgets[0], "Valeros").unwrap();
        let field = doc.get_dictionary(name_id).unwrap();
        assert_eq!(field.get(b"V").unwrap().as_str().unwrap(), b"Valeros");
        assert!(!field.has(b"AP"));

        set_text(&mut doc, &widgets[0], "Ézren").unwrap();
        let v = doc.get_dictionary(name_id).unwrap().get(b"V").unwrap().clone();
        assert_eq!(decode_text_string(&v).unwrap(), "Ézren");
    }

    #[test]
    fn checkbox_uses_its_on_state() {
        let (mut doc, _, shield_id) = form_doc();
        let widgets = collect_widgets(&doc);
        set_checked(&mut doc, &widgets[1], true).unwrap();
        let field = doc.get_dictionary(shield_id).unwrap();
        assert_eq!(field.get(b"V").unwrap().as_name().unwrap(), b"On");
        assert_eq!(field.get(b"AS").unwrap().as_name().unwrap(), b"On");

        set_checked(&mut doc, &widgets[1], false).unwrap();
        let field = doc.get_dictionary(shield_id).unwrap();
        assert_eq!(field.get(b"AS").unwrap().as_name().unwrap(), b"Off");
    }

    #[test]
    fn need_appearances_is_set() {
        let (mut doc, _, _) = form_doc();
        enable_need_appearances(&mut doc).unwrap();
        let catalog = doc.catalog().unwrap();
        let acroform = doc.get_dict_in_dict(catalog, b"AcroForm").unwrap();
        assert!(acroform.get(b"NeedAppearances").unwrap().as_bool().unwrap());
    }

    #[test]
    fn documents_without_forms_have_no_widgets() {
        let mut doc = Document::with_version("1.7");
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog" });
        doc.trailer.set("Root", catalog);
        assert!(collect_widgets(&doc).is_empty());
        enable_need_appearances(&mut doc).unwrap();
    }
}
