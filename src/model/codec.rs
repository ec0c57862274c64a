//! The generic element codec.
//!
//! One codec per release converts any [`Element`] to and from the JSON wire
//! format without a hand-written function per concrete type: serialization
//! dispatches on the node's classification, deserialization on the input shape
//! plus a type descriptor resolved against the release's type table.

use serde_json::{Map, Value};

use crate::error::{Result, ServiceError};

use super::element::{Element, ElementStruct, FieldValue, Primitive};
use super::primitive::PrimitiveKind;
use super::tables::{FhirRelease, FieldShape, TypeDef, TypeKind, TypeTable};

pub struct ElementCodec {
    table: &'static TypeTable,
}

impl ElementCodec {
    pub fn new(release: FhirRelease) -> Self {
        Self {
            table: TypeTable::for_release(release),
        }
    }

    /// Serialize a node to its compact JSON form.
    ///
    /// Boolean and numeric primitives emit the unquoted token equal to their
    /// textual value; all other primitive kinds emit a quoted, escaped string.
    pub fn serialize(&self, element: &Element) -> Result<String> {
        match element {
            Element::Primitive(p) => serialize_primitive(p),
            _ => Ok(serde_json::to_string(&self.to_json(element)?)?),
        }
    }

    /// Serialize with pretty-printing, for human-facing output.
    pub fn serialize_pretty(&self, element: &Element) -> Result<String> {
        match element {
            Element::Primitive(p) => serialize_primitive(p),
            _ => Ok(serde_json::to_string_pretty(&self.to_json(element)?)?),
        }
    }

    /// Convert a node to a JSON value.
    pub fn to_json(&self, element: &Element) -> Result<Value> {
        match element {
            Element::Primitive(p) => primitive_to_json(p),
            Element::Complex(s) | Element::Backbone(s) => self.struct_to_json(s, None),
            Element::Resource(s) => self.struct_to_json(s, Some(&s.type_name)),
        }
    }

    fn struct_to_json(&self, s: &ElementStruct, resource_type: Option<&str>) -> Result<Value> {
        let mut map = Map::new();
        if let Some(rt) = resource_type {
            map.insert("resourceType".to_string(), Value::String(rt.to_string()));
        }
        for field in &s.fields {
            let value = match &field.value {
                FieldValue::Single(el) => self.to_json(el)?,
                FieldValue::Many(els) => Value::Array(
                    els.iter()
                        .map(|el| self.to_json(el))
                        .collect::<Result<Vec<_>>>()?,
                ),
            };
            map.insert(field.name.clone(), value);
        }
        Ok(Value::Object(map))
    }

    /// Parse raw JSON input into the node named by `descriptor`.
    ///
    /// Input carrying a `resourceType` parses as a resource regardless of the
    /// descriptor. A dotted descriptor resolves a nested structure by walking
    /// field declarations from the root type. Otherwise the descriptor names a
    /// datatype (or a primitive kind) directly.
    pub fn deserialize(&self, input: &str, descriptor: &str) -> Result<Element> {
        let value: Value = serde_json::from_str(input)?;

        if let Some(kind) = PrimitiveKind::from_code(descriptor) {
            return parse_primitive(kind, &value, descriptor);
        }

        let obj = value.as_object().ok_or_else(|| {
            ServiceError::InvalidInput("expected a JSON object".to_string())
        })?;

        if obj.contains_key("resourceType") {
            return self.parse_resource(obj);
        }
        if descriptor.is_empty() {
            return Err(ServiceError::InvalidInput(
                "input has no resourceType and no type descriptor was given".to_string(),
            ));
        }

        let def = self.table.resolve(descriptor)?;
        let parsed = self.parse_struct(def, obj)?;
        Ok(match def.kind {
            TypeKind::Resource => Element::Resource(parsed),
            TypeKind::Complex => Element::Complex(parsed),
            TypeKind::Backbone => Element::Backbone(parsed),
        })
    }

    fn parse_resource(&self, obj: &Map<String, Value>) -> Result<Element> {
        let rt = obj
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ServiceError::InvalidInput("resourceType must be a string".to_string())
            })?;
        let def = self
            .table
            .get(rt)
            .filter(|d| d.kind == TypeKind::Resource)
            .ok_or_else(|| ServiceError::UnsupportedElementType(rt.to_string()))?;
        Ok(Element::Resource(self.parse_struct(def, obj)?))
    }

    fn parse_struct(&self, def: &'static TypeDef, obj: &Map<String, Value>) -> Result<ElementStruct> {
        let mut out = ElementStruct::new(def.name);

        for key in obj.keys() {
            if key == "resourceType" || key.starts_with('_') {
                continue;
            }
            if !def.fields.iter().any(|f| f.name == key) {
                return Err(ServiceError::UnsupportedElementType(format!(
                    "{}.{key}",
                    def.name
                )));
            }
        }

        // Walk the table's field order so output stays canonical regardless of
        // input ordering.
        for field in def.fields {
            let Some(value) = obj.get(field.name) else {
                continue;
            };
            let path = || format!("{}.{}", def.name, field.name);
            let parsed = if field.repeats {
                let items = value
                    .as_array()
                    .ok_or_else(|| ServiceError::UnsupportedElementType(path()))?;
                FieldValue::Many(
                    items
                        .iter()
                        .map(|item| self.parse_value(field.shape, item, &path()))
                        .collect::<Result<Vec<_>>>()?,
                )
            } else {
                if value.is_array() {
                    return Err(ServiceError::UnsupportedElementType(path()));
                }
                FieldValue::Single(self.parse_value(field.shape, value, &path())?)
            };
            out.push(field.name, parsed);
        }
        Ok(out)
    }

    fn parse_value(&self, shape: FieldShape, value: &Value, path: &str) -> Result<Element> {
        match shape {
            FieldShape::Primitive(kind) => parse_primitive(kind, value, path),
            FieldShape::Complex(name) => {
                let def = self
                    .table
                    .get(name)
                    .ok_or_else(|| ServiceError::UnsupportedElementType(name.to_string()))?;
                let obj = object_of(value, path)?;
                Ok(Element::Complex(self.parse_struct(def, obj)?))
            }
            FieldShape::Backbone(name) => {
                let def = self
                    .table
                    .get(name)
                    .ok_or_else(|| ServiceError::UnsupportedElementType(name.to_string()))?;
                let obj = object_of(value, path)?;
                Ok(Element::Backbone(self.parse_struct(def, obj)?))
            }
            FieldShape::AnyResource => {
                let obj = object_of(value, path)?;
                self.parse_resource(obj)
            }
        }
    }
}

fn object_of<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| ServiceError::UnsupportedElementType(path.to_string()))
}

fn serialize_primitive(p: &Primitive) -> Result<String> {
    if p.kind.is_json_literal() {
        if !p.kind.accepts(&p.value) {
            return Err(ServiceError::InvalidInput(format!(
                "'{}' is not a valid {} value",
                p.value,
                p.kind.code()
            )));
        }
        Ok(p.value.clone())
    } else {
        Ok(serde_json::to_string(&p.value)?)
    }
}

fn primitive_to_json(p: &Primitive) -> Result<Value> {
    if !p.kind.is_json_literal() {
        return Ok(Value::String(p.value.clone()));
    }
    match p.kind {
        PrimitiveKind::Boolean => match p.value.as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            other => Err(ServiceError::InvalidInput(format!(
                "'{other}' is not a valid boolean value"
            ))),
        },
        _ => p
            .value
            .parse::<serde_json::Number>()
            .map(Value::Number)
            .map_err(|_| {
                ServiceError::InvalidInput(format!(
                    "'{}' is not a valid {} value",
                    p.value,
                    p.kind.code()
                ))
            }),
    }
}

fn parse_primitive(kind: PrimitiveKind, value: &Value, path: &str) -> Result<Element> {
    let text = match value {
        Value::Bool(b) if kind == PrimitiveKind::Boolean => b.to_string(),
        Value::Number(n) if kind.is_json_literal() && kind != PrimitiveKind::Boolean => {
            n.to_string()
        }
        Value::String(s) if !kind.is_json_literal() => s.clone(),
        _ => return Err(ServiceError::UnsupportedElementType(path.to_string())),
    };
    Ok(Element::primitive(kind, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> ElementCodec {
        ElementCodec::new(FhirRelease::R4)
    }

    #[test]
    fn literal_kinds_emit_unquoted_tokens() {
        let c = codec();
        for (kind, value) in [
            (PrimitiveKind::Boolean, "true"),
            (PrimitiveKind::Integer, "-17"),
            (PrimitiveKind::Decimal, "1.50"),
            (PrimitiveKind::UnsignedInt, "0"),
            (PrimitiveKind::PositiveInt, "12"),
        ] {
            let out = c.serialize(&Element::primitive(kind, value)).unwrap();
            assert_eq!(out, value, "{} should stay a bare token", kind.code());
        }
    }

    #[test]
    fn other_kinds_emit_quoted_escaped_strings() {
        let c = codec();
        let out = c
            .serialize(&Element::primitive(
                PrimitiveKind::String,
                "say \"hi\"\\now",
            ))
            .unwrap();
        assert_eq!(out, "\"say \\\"hi\\\"\\\\now\"");

        let date = c
            .serialize(&Element::primitive(PrimitiveKind::Date, "2020-02-02"))
            .unwrap();
        assert_eq!(date, "\"2020-02-02\"");
    }

    #[test]
    fn rejects_invalid_literal_tokens() {
        let c = codec();
        assert!(
            c.serialize(&Element::primitive(PrimitiveKind::Integer, "twelve"))
                .is_err()
        );
    }

    #[test]
    fn round_trips_each_classification() {
        let c = codec();

        // Primitive
        let prim = Element::primitive(PrimitiveKind::Decimal, "3.25");
        let back = c
            .deserialize(&c.serialize(&prim).unwrap(), "decimal")
            .unwrap();
        assert_eq!(back, prim);

        // Complex datatype
        let name = c
            .deserialize(
                r#"{"family":"Lovelace","given":["Ada","Augusta"],"use":"official"}"#,
                "HumanName",
            )
            .unwrap();
        let back = c
            .deserialize(&c.serialize(&name).unwrap(), "HumanName")
            .unwrap();
        assert_eq!(back, name);

        // Backbone element, addressed by its dotted descriptor
        let contact = c
            .deserialize(
                r#"{"gender":"female","name":{"family":"Byron"}}"#,
                "Patient.contact",
            )
            .unwrap();
        assert!(matches!(contact, Element::Backbone(_)));
        let back = c
            .deserialize(&c.serialize(&contact).unwrap(), "Patient.contact")
            .unwrap();
        assert_eq!(back, contact);

        // Resource
        let patient = c
            .deserialize(
                r#"{"resourceType":"Patient","active":true,"name":[{"family":"Lovelace"}]}"#,
                "",
            )
            .unwrap();
        assert!(matches!(patient, Element::Resource(_)));
        let back = c.deserialize(&c.serialize(&patient).unwrap(), "").unwrap();
        assert_eq!(back, patient);
    }

    #[test]
    fn resource_type_wins_over_descriptor() {
        let c = codec();
        let el = c
            .deserialize(r#"{"resourceType":"Patient","active":true}"#, "HumanName")
            .unwrap();
        assert_eq!(el.type_name(), "Patient");
    }

    #[test]
    fn unknown_types_are_unsupported() {
        let c = codec();
        let err = c.deserialize("{}", "ImaginaryType").unwrap_err();
        assert!(matches!(err, ServiceError::UnsupportedElementType(t) if t == "ImaginaryType"));

        let err = c
            .deserialize(r#"{"resourceType":"Imaginary"}"#, "")
            .unwrap_err();
        assert!(matches!(err, ServiceError::UnsupportedElementType(t) if t == "Imaginary"));

        let err = c
            .deserialize(r#"{"family":"x","nope":1}"#, "HumanName")
            .unwrap_err();
        assert!(matches!(err, ServiceError::UnsupportedElementType(t) if t == "HumanName.nope"));
    }

    #[test]
    fn cardinality_mismatch_is_rejected() {
        let c = codec();
        // given must repeat, family must not
        assert!(c.deserialize(r#"{"given":"Ada"}"#, "HumanName").is_err());
        assert!(
            c.deserialize(r#"{"family":["Lovelace"]}"#, "HumanName")
                .is_err()
        );
    }

    #[test]
    fn nested_resource_parses_inside_bundle() {
        let c = codec();
        let bundle = c
            .deserialize(
                r#"{"resourceType":"Bundle","type":"collection","entry":[{"resource":{"resourceType":"Patient","active":false}}]}"#,
                "",
            )
            .unwrap();
        let entries = bundle.children("entry");
        assert_eq!(entries.len(), 1);
        let resources = entries[0].children("resource");
        assert_eq!(resources[0].type_name(), "Patient");
    }

    #[test]
    fn serialization_uses_table_field_order() {
        let c = codec();
        let el = c
            .deserialize(r#"{"given":["Ada"],"use":"official","family":"Lovelace"}"#, "HumanName")
            .unwrap();
        let json = c.serialize(&el).unwrap();
        let use_pos = json.find("\"use\"").unwrap();
        let family_pos = json.find("\"family\"").unwrap();
        let given_pos = json.find("\"given\"").unwrap();
        assert!(use_pos < family_pos && family_pos < given_pos);
    }
}
