//! The structured data model: a closed, compile-time description of the FHIR
//! types this service can encode, decode, and walk.
//!
//! The model deliberately avoids any name-string reflection. Dispatch happens
//! over the tagged [`Element`] tree and the static per-release type tables.

pub mod codec;
pub mod element;
pub mod primitive;
pub mod tables;
pub mod xml;

pub use codec::ElementCodec;
pub use element::{Element, ElementStruct, Field, FieldValue};
pub use primitive::PrimitiveKind;
pub use tables::{FhirRelease, FieldDef, FieldShape, TypeDef, TypeKind, TypeTable};
