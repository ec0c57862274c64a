//! FHIR XML reading and writing for the element tree.
//!
//! The XML serialization is the usual FHIR shape: primitives become empty
//! elements with a `value` attribute, repeating fields become repeated tags,
//! nested resources are wrapped in their field's element, and the root carries
//! the FHIR namespace.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, Event};

use crate::error::{Result, ServiceError};

use super::element::{Element, ElementStruct, FieldValue};
use super::tables::{FhirRelease, FieldDef, FieldShape, TypeDef, TypeKind, TypeTable};

pub const FHIR_NS: &str = "http://hl7.org/fhir";

pub struct XmlCodec {
    table: &'static TypeTable,
}

impl XmlCodec {
    pub fn new(release: FhirRelease) -> Self {
        Self {
            table: TypeTable::for_release(release),
        }
    }

    /// Write a resource as indented FHIR XML.
    pub fn write(&self, element: &Element) -> Result<String> {
        let Element::Resource(root) = element else {
            return Err(ServiceError::UnsupportedElementType(
                element.type_name().to_string(),
            ));
        };

        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        let mut start = BytesStart::new(root.type_name.as_str());
        start.push_attribute(("xmlns", FHIR_NS));
        writer.write_event(Event::Start(start))?;
        self.write_fields(&mut writer, root)?;
        writer.write_event(Event::End(BytesEnd::new(root.type_name.as_str())))?;

        String::from_utf8(writer.into_inner()).map_err(|e| ServiceError::Xml(e.to_string()))
    }

    fn write_fields(&self, writer: &mut Writer<Vec<u8>>, s: &ElementStruct) -> Result<()> {
        for field in &s.fields {
            for el in field.value.elements() {
                self.write_element(writer, &field.name, el)?;
            }
        }
        Ok(())
    }

    fn write_element(&self, writer: &mut Writer<Vec<u8>>, tag: &str, el: &Element) -> Result<()> {
        match el {
            Element::Primitive(p) => {
                let mut start = BytesStart::new(tag);
                start.push_attribute(("value", p.value.as_str()));
                writer.write_event(Event::Empty(start))?;
            }
            Element::Complex(s) | Element::Backbone(s) => {
                writer.write_event(Event::Start(BytesStart::new(tag)))?;
                self.write_fields(writer, s)?;
                writer.write_event(Event::End(BytesEnd::new(tag)))?;
            }
            Element::Resource(s) => {
                writer.write_event(Event::Start(BytesStart::new(tag)))?;
                writer.write_event(Event::Start(BytesStart::new(s.type_name.as_str())))?;
                self.write_fields(writer, s)?;
                writer.write_event(Event::End(BytesEnd::new(s.type_name.as_str())))?;
                writer.write_event(Event::End(BytesEnd::new(tag)))?;
            }
        }
        Ok(())
    }

    /// Parse FHIR XML into a resource element.
    pub fn read(&self, input: &str) -> Result<Element> {
        let mut reader = Reader::from_str(input);

        let (root_name, empty) = loop {
            match reader.read_event().map_err(|e| xml_error(&reader, input, e))? {
                Event::Start(e) => break (tag_name(e.name().as_ref()), false),
                Event::Empty(e) => break (tag_name(e.name().as_ref()), true),
                Event::Text(t) => {
                    let text = t.unescape().map_err(|e| xml_error(&reader, input, e))?;
                    if !text.trim().is_empty() {
                        return Err(at_position(&reader, input, "unexpected text content"));
                    }
                }
                Event::Eof => {
                    return Err(ServiceError::Xml("document contains no element".to_string()));
                }
                _ => {}
            }
        };

        let def = self
            .table
            .get(&root_name)
            .filter(|d| d.kind == TypeKind::Resource)
            .ok_or_else(|| ServiceError::UnsupportedElementType(root_name.clone()))?;

        let parsed = if empty {
            ElementStruct::new(def.name)
        } else {
            self.read_struct(&mut reader, input, def, &root_name)?
        };
        Ok(Element::Resource(parsed))
    }

    /// Read the children of a structured element until its closing tag.
    fn read_struct(
        &self,
        reader: &mut Reader<&[u8]>,
        input: &str,
        def: &'static TypeDef,
        end_tag: &str,
    ) -> Result<ElementStruct> {
        // Accumulate repeated tags in first-seen order, then assemble per the
        // table's cardinality.
        let mut collected: Vec<(&'static FieldDef, Vec<Element>)> = Vec::new();

        loop {
            match reader.read_event().map_err(|e| xml_error(&reader, input, e))? {
                Event::Start(e) => {
                    let name = tag_name(e.name().as_ref());
                    let field = find_field(def, &name, reader, input)?;
                    let el = match field.shape {
                        FieldShape::Primitive(kind) => {
                            let value = value_attr(&e)?.ok_or_else(|| {
                                at_position(
                                    reader,
                                    input,
                                    &format!("element '{name}' has no value attribute"),
                                )
                            })?;
                            // Extensions under a primitive are tolerated and dropped.
                            skip_to_end(reader, input, &name)?;
                            Element::primitive(kind, value)
                        }
                        FieldShape::Complex(type_name) => {
                            let inner = self.lookup(type_name)?;
                            Element::Complex(self.read_struct(reader, input, inner, &name)?)
                        }
                        FieldShape::Backbone(type_name) => {
                            let inner = self.lookup(type_name)?;
                            Element::Backbone(self.read_struct(reader, input, inner, &name)?)
                        }
                        FieldShape::AnyResource => {
                            self.read_nested_resource(reader, input, &name)?
                        }
                    };
                    push_collected(&mut collected, field, el);
                }
                Event::Empty(e) => {
                    let name = tag_name(e.name().as_ref());
                    let field = find_field(def, &name, reader, input)?;
                    let el = match field.shape {
                        FieldShape::Primitive(kind) => {
                            let value = value_attr(&e)?.ok_or_else(|| {
                                at_position(
                                    reader,
                                    input,
                                    &format!("element '{name}' has no value attribute"),
                                )
                            })?;
                            Element::primitive(kind, value)
                        }
                        FieldShape::Complex(type_name) => {
                            Element::Complex(ElementStruct::new(self.lookup(type_name)?.name))
                        }
                        FieldShape::Backbone(type_name) => {
                            Element::Backbone(ElementStruct::new(self.lookup(type_name)?.name))
                        }
                        FieldShape::AnyResource => {
                            return Err(at_position(
                                reader,
                                input,
                                &format!("element '{name}' must contain a resource"),
                            ));
                        }
                    };
                    push_collected(&mut collected, field, el);
                }
                Event::End(e) => {
                    let name = tag_name(e.name().as_ref());
                    if name == end_tag {
                        break;
                    }
                    return Err(at_position(
                        reader,
                        input,
                        &format!("unexpected closing tag '{name}'"),
                    ));
                }
                Event::Text(t) => {
                    let text = t.unescape().map_err(|e| xml_error(&reader, input, e))?;
                    if !text.trim().is_empty() {
                        return Err(at_position(reader, input, "unexpected text content"));
                    }
                }
                Event::Eof => {
                    return Err(at_position(
                        reader,
                        input,
                        &format!("unexpected end of document inside '{end_tag}'"),
                    ));
                }
                _ => {}
            }
        }

        let mut out = ElementStruct::new(def.name);
        for (field, els) in collected {
            if field.repeats {
                out.push(field.name, FieldValue::Many(els));
            } else if els.len() == 1 {
                let mut els = els;
                out.push(field.name, FieldValue::Single(els.pop().expect("one element")));
            } else {
                return Err(ServiceError::Xml(format!(
                    "element '{}.{}' does not repeat",
                    def.name, field.name
                )));
            }
        }
        Ok(out)
    }

    fn read_nested_resource(
        &self,
        reader: &mut Reader<&[u8]>,
        input: &str,
        wrapper_tag: &str,
    ) -> Result<Element> {
        let resource = loop {
            match reader.read_event().map_err(|e| xml_error(&reader, input, e))? {
                Event::Start(e) => {
                    let name = tag_name(e.name().as_ref());
                    let def = self
                        .table
                        .get(&name)
                        .filter(|d| d.kind == TypeKind::Resource)
                        .ok_or_else(|| ServiceError::UnsupportedElementType(name.clone()))?;
                    break Element::Resource(self.read_struct(reader, input, def, &name)?);
                }
                Event::Text(t) => {
                    let text = t.unescape().map_err(|e| xml_error(&reader, input, e))?;
                    if !text.trim().is_empty() {
                        return Err(at_position(reader, input, "unexpected text content"));
                    }
                }
                Event::End(_) | Event::Eof => {
                    return Err(at_position(
                        reader,
                        input,
                        &format!("expected a resource inside '{wrapper_tag}'"),
                    ));
                }
                _ => {}
            }
        };

        // Consume the wrapper's closing tag.
        loop {
            match reader.read_event().map_err(|e| xml_error(&reader, input, e))? {
                Event::End(e) if tag_name(e.name().as_ref()) == wrapper_tag => break,
                Event::Text(t) if t.unescape().map_or(true, |s| s.trim().is_empty()) => {}
                Event::Eof => {
                    return Err(at_position(
                        reader,
                        input,
                        &format!("unexpected end of document inside '{wrapper_tag}'"),
                    ));
                }
                _ => {
                    return Err(at_position(
                        reader,
                        input,
                        &format!("'{wrapper_tag}' must contain exactly one resource"),
                    ));
                }
            }
        }
        Ok(resource)
    }

    fn lookup(&self, name: &str) -> Result<&'static TypeDef> {
        self.table
            .get(name)
            .ok_or_else(|| ServiceError::UnsupportedElementType(name.to_string()))
    }
}

fn find_field(
    def: &'static TypeDef,
    name: &str,
    reader: &Reader<&[u8]>,
    input: &str,
) -> Result<&'static FieldDef> {
    def.fields.iter().find(|f| f.name == name).ok_or_else(|| {
        at_position(reader, input, &format!("unknown element '{}.{name}'", def.name))
    })
}

fn push_collected(
    collected: &mut Vec<(&'static FieldDef, Vec<Element>)>,
    field: &'static FieldDef,
    el: Element,
) {
    if let Some((_, els)) = collected
        .iter_mut()
        .find(|(f, _)| std::ptr::eq(*f, field))
    {
        els.push(el);
    } else {
        collected.push((field, vec![el]));
    }
}

fn value_attr(e: &BytesStart) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| ServiceError::Xml(err.to_string()))?;
        if attr.key.as_ref() == b"value" {
            let value = attr
                .unescape_value()
                .map_err(|err| ServiceError::Xml(err.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn skip_to_end(reader: &mut Reader<&[u8]>, input: &str, tag: &str) -> Result<()> {
    let mut depth = 0usize;
    loop {
        match reader.read_event().map_err(|e| xml_error(&reader, input, e))? {
            Event::Start(_) => depth += 1,
            Event::End(e) => {
                if depth == 0 {
                    if tag_name(e.name().as_ref()) == tag {
                        return Ok(());
                    }
                    return Err(at_position(
                        reader,
                        input,
                        &format!("mismatched closing tag for '{tag}'"),
                    ));
                }
                depth -= 1;
            }
            Event::Eof => {
                return Err(at_position(
                    reader,
                    input,
                    &format!("unexpected end of document inside '{tag}'"),
                ));
            }
            _ => {}
        }
    }
}

fn tag_name(raw: &[u8]) -> String {
    let local = raw.rsplit(|b| *b == b':').next().unwrap_or(raw);
    String::from_utf8_lossy(local).into_owned()
}

/// Line and column of a byte offset, 1-based.
pub fn offset_position(input: &str, offset: usize) -> (i64, i64) {
    let offset = offset.min(input.len());
    let prefix = &input[..offset];
    let line = prefix.bytes().filter(|b| *b == b'\n').count() as i64 + 1;
    let column = prefix
        .bytes()
        .rev()
        .take_while(|b| *b != b'\n')
        .count() as i64
        + 1;
    (line, column)
}

fn at_position(reader: &Reader<&[u8]>, input: &str, message: &str) -> ServiceError {
    let (line, column) = offset_position(input, reader.buffer_position() as usize);
    ServiceError::Xml(format!("{message} (line {line}, column {column})"))
}

fn xml_error(reader: &Reader<&[u8]>, input: &str, err: impl std::fmt::Display) -> ServiceError {
    at_position(reader, input, &err.to_string())
}
