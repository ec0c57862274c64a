//! The tagged element tree.
//!
//! Every value the codec touches is one of four node classes: a primitive, a
//! complex datatype, a backbone element (a nested structure addressable only
//! through its owner, e.g. `Patient.contact`), or a top-level resource.

use super::primitive::PrimitiveKind;

/// A primitive node: kind plus its textual value.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub kind: PrimitiveKind,
    pub value: String,
}

/// A named field of a structured node.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

/// Singleton or repeating field value, per the type tables' cardinality.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Single(Element),
    Many(Vec<Element>),
}

impl FieldValue {
    /// All elements under this field, flattening repetition.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        match self {
            FieldValue::Single(el) => std::slice::from_ref(el).iter(),
            FieldValue::Many(els) => els.iter(),
        }
    }
}

/// A structured node (complex datatype, backbone element, or resource).
///
/// `type_name` is the dispatch key: a plain name for datatypes and resources,
/// the composite `Owner.field` path for backbone elements. Field order is
/// preserved so serializations stay deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementStruct {
    pub type_name: String,
    pub fields: Vec<Field>,
}

impl ElementStruct {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.value)
    }

    pub fn push(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.push(Field {
            name: name.into(),
            value,
        });
    }
}

/// A node of the structured data model.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Primitive(Primitive),
    Complex(ElementStruct),
    Backbone(ElementStruct),
    Resource(ElementStruct),
}

impl Element {
    pub fn primitive(kind: PrimitiveKind, value: impl Into<String>) -> Self {
        Element::Primitive(Primitive {
            kind,
            value: value.into(),
        })
    }

    /// The node's type name; for primitives this is the primitive kind code.
    pub fn type_name(&self) -> &str {
        match self {
            Element::Primitive(p) => p.kind.code(),
            Element::Complex(s) | Element::Backbone(s) | Element::Resource(s) => &s.type_name,
        }
    }

    pub fn as_struct(&self) -> Option<&ElementStruct> {
        match self {
            Element::Primitive(_) => None,
            Element::Complex(s) | Element::Backbone(s) | Element::Resource(s) => Some(s),
        }
    }

    /// Child elements under a named field; empty for primitives and missing
    /// fields.
    pub fn children(&self, field: &str) -> Vec<&Element> {
        self.as_struct()
            .and_then(|s| s.field(field))
            .map(|v| v.elements().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_flatten_repetition() {
        let mut name = ElementStruct::new("HumanName");
        name.push(
            "given",
            FieldValue::Many(vec![
                Element::primitive(PrimitiveKind::String, "Ada"),
                Element::primitive(PrimitiveKind::String, "Augusta"),
            ]),
        );
        let el = Element::Complex(name);
        assert_eq!(el.children("given").len(), 2);
        assert_eq!(el.children("family").len(), 0);
        assert_eq!(el.type_name(), "HumanName");
    }

    #[test]
    fn primitive_type_name_is_kind_code() {
        let el = Element::primitive(PrimitiveKind::DateTime, "2020-01-01T00:00:00Z");
        assert_eq!(el.type_name(), "dateTime");
        assert!(el.as_struct().is_none());
    }
}
