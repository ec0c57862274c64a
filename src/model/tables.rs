//! Compile-time type tables for the supported FHIR releases.
//!
//! These tables replace name-string reflection with an enumerated, closed set
//! of type definitions per release. Each definition lists its fields with
//! shape, cardinality, and whether the field is required, which is everything
//! the codec, the XML reader, and the structural validator need.
//!
//! The releases share most datatype definitions; where a release genuinely
//! differs (STU3 `Patient.animal`, STU3 `Observation.context` vs later
//! `Observation.encounter`, R5 `Observation.triggeredBy`, the R5 change of
//! `Bundle.link.relation` to a code) it gets its own definition.

use crate::error::ServiceError;

use super::primitive::PrimitiveKind;

/// Supported schema releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FhirRelease {
    Stu3,
    R4,
    R5,
}

impl FhirRelease {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "STU3" => Some(Self::Stu3),
            "R4" => Some(Self::R4),
            "R5" => Some(Self::R5),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Stu3 => "STU3",
            Self::R4 => "R4",
            Self::R5 => "R5",
        }
    }

    pub fn all() -> [Self; 3] {
        [Self::Stu3, Self::R4, Self::R5]
    }
}

/// Classification of a type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Resource,
    Complex,
    Backbone,
}

/// Shape of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    Primitive(PrimitiveKind),
    Complex(&'static str),
    Backbone(&'static str),
    /// An inline resource of any type, e.g. `Bundle.entry.resource`.
    AnyResource,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub shape: FieldShape,
    pub repeats: bool,
    pub required: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct TypeDef {
    pub name: &'static str,
    pub kind: TypeKind,
    pub fields: &'static [FieldDef],
}

const fn opt(name: &'static str, shape: FieldShape) -> FieldDef {
    FieldDef {
        name,
        shape,
        repeats: false,
        required: false,
    }
}

const fn req(name: &'static str, shape: FieldShape) -> FieldDef {
    FieldDef {
        name,
        shape,
        repeats: false,
        required: true,
    }
}

const fn many(name: &'static str, shape: FieldShape) -> FieldDef {
    FieldDef {
        name,
        shape,
        repeats: true,
        required: false,
    }
}

const fn many_req(name: &'static str, shape: FieldShape) -> FieldDef {
    FieldDef {
        name,
        shape,
        repeats: true,
        required: true,
    }
}

use self::FieldShape::{AnyResource, Backbone, Complex, Primitive};
use super::primitive::PrimitiveKind as P;

// Datatypes shared by every release.

const PERIOD: TypeDef = TypeDef {
    name: "Period",
    kind: TypeKind::Complex,
    fields: &[
        opt("start", Primitive(P::DateTime)),
        opt("end", Primitive(P::DateTime)),
    ],
};

const CODING: TypeDef = TypeDef {
    name: "Coding",
    kind: TypeKind::Complex,
    fields: &[
        opt("system", Primitive(P::Uri)),
        opt("version", Primitive(P::String)),
        opt("code", Primitive(P::Code)),
        opt("display", Primitive(P::String)),
        opt("userSelected", Primitive(P::Boolean)),
    ],
};

const CODEABLE_CONCEPT: TypeDef = TypeDef {
    name: "CodeableConcept",
    kind: TypeKind::Complex,
    fields: &[
        many("coding", Complex("Coding")),
        opt("text", Primitive(P::String)),
    ],
};

const IDENTIFIER: TypeDef = TypeDef {
    name: "Identifier",
    kind: TypeKind::Complex,
    fields: &[
        opt("use", Primitive(P::Code)),
        opt("type", Complex("CodeableConcept")),
        opt("system", Primitive(P::Uri)),
        opt("value", Primitive(P::String)),
        opt("period", Complex("Period")),
    ],
};

const HUMAN_NAME: TypeDef = TypeDef {
    name: "HumanName",
    kind: TypeKind::Complex,
    fields: &[
        opt("use", Primitive(P::Code)),
        opt("text", Primitive(P::String)),
        opt("family", Primitive(P::String)),
        many("given", Primitive(P::String)),
        many("prefix", Primitive(P::String)),
        many("suffix", Primitive(P::String)),
        opt("period", Complex("Period")),
    ],
};

const QUANTITY: TypeDef = TypeDef {
    name: "Quantity",
    kind: TypeKind::Complex,
    fields: &[
        opt("value", Primitive(P::Decimal)),
        opt("comparator", Primitive(P::Code)),
        opt("unit", Primitive(P::String)),
        opt("system", Primitive(P::Uri)),
        opt("code", Primitive(P::Code)),
    ],
};

const CONTACT_POINT: TypeDef = TypeDef {
    name: "ContactPoint",
    kind: TypeKind::Complex,
    fields: &[
        opt("system", Primitive(P::Code)),
        opt("value", Primitive(P::String)),
        opt("use", Primitive(P::Code)),
        opt("rank", Primitive(P::PositiveInt)),
        opt("period", Complex("Period")),
    ],
};

const ADDRESS: TypeDef = TypeDef {
    name: "Address",
    kind: TypeKind::Complex,
    fields: &[
        opt("use", Primitive(P::Code)),
        opt("type", Primitive(P::Code)),
        opt("text", Primitive(P::String)),
        many("line", Primitive(P::String)),
        opt("city", Primitive(P::String)),
        opt("district", Primitive(P::String)),
        opt("state", Primitive(P::String)),
        opt("postalCode", Primitive(P::String)),
        opt("country", Primitive(P::String)),
        opt("period", Complex("Period")),
    ],
};

const ELEMENT_DEFINITION: TypeDef = TypeDef {
    name: "ElementDefinition",
    kind: TypeKind::Complex,
    fields: &[
        req("path", Primitive(P::String)),
        opt("sliceName", Primitive(P::String)),
        opt("short", Primitive(P::String)),
        opt("definition", Primitive(P::Markdown)),
        opt("min", Primitive(P::UnsignedInt)),
        opt("max", Primitive(P::String)),
    ],
};

// Datatypes with release deltas.

const REFERENCE_STU3: TypeDef = TypeDef {
    name: "Reference",
    kind: TypeKind::Complex,
    fields: &[
        opt("reference", Primitive(P::String)),
        opt("identifier", Complex("Identifier")),
        opt("display", Primitive(P::String)),
    ],
};

const REFERENCE_R4: TypeDef = TypeDef {
    name: "Reference",
    kind: TypeKind::Complex,
    fields: &[
        opt("reference", Primitive(P::String)),
        opt("type", Primitive(P::Uri)),
        opt("identifier", Complex("Identifier")),
        opt("display", Primitive(P::String)),
    ],
};

const META_STU3: TypeDef = TypeDef {
    name: "Meta",
    kind: TypeKind::Complex,
    fields: &[
        opt("versionId", Primitive(P::Id)),
        opt("lastUpdated", Primitive(P::Instant)),
        many("profile", Primitive(P::Uri)),
        many("security", Complex("Coding")),
        many("tag", Complex("Coding")),
    ],
};

const META_R4: TypeDef = TypeDef {
    name: "Meta",
    kind: TypeKind::Complex,
    fields: &[
        opt("versionId", Primitive(P::Id)),
        opt("lastUpdated", Primitive(P::Instant)),
        opt("source", Primitive(P::Uri)),
        many("profile", Primitive(P::Canonical)),
        many("security", Complex("Coding")),
        many("tag", Complex("Coding")),
    ],
};

// Patient.

const PATIENT_CONTACT: TypeDef = TypeDef {
    name: "Patient.contact",
    kind: TypeKind::Backbone,
    fields: &[
        many("relationship", Complex("CodeableConcept")),
        opt("name", Complex("HumanName")),
        many("telecom", Complex("ContactPoint")),
        opt("address", Complex("Address")),
        opt("gender", Primitive(P::Code)),
        opt("organization", Complex("Reference")),
        opt("period", Complex("Period")),
    ],
};

const PATIENT_COMMUNICATION: TypeDef = TypeDef {
    name: "Patient.communication",
    kind: TypeKind::Backbone,
    fields: &[
        req("language", Complex("CodeableConcept")),
        opt("preferred", Primitive(P::Boolean)),
    ],
};

// STU3 only; later releases dropped it.
const PATIENT_ANIMAL: TypeDef = TypeDef {
    name: "Patient.animal",
    kind: TypeKind::Backbone,
    fields: &[
        req("species", Complex("CodeableConcept")),
        opt("breed", Complex("CodeableConcept")),
        opt("genderStatus", Complex("CodeableConcept")),
    ],
};

const PATIENT_COMMON: &[FieldDef] = &[
    opt("id", Primitive(P::Id)),
    opt("meta", Complex("Meta")),
    opt("language", Primitive(P::Code)),
    many("identifier", Complex("Identifier")),
    opt("active", Primitive(P::Boolean)),
    many("name", Complex("HumanName")),
    many("telecom", Complex("ContactPoint")),
    opt("gender", Primitive(P::Code)),
    opt("birthDate", Primitive(P::Date)),
    opt("deceasedBoolean", Primitive(P::Boolean)),
    opt("deceasedDateTime", Primitive(P::DateTime)),
    many("address", Complex("Address")),
    opt("maritalStatus", Complex("CodeableConcept")),
    opt("multipleBirthBoolean", Primitive(P::Boolean)),
    opt("multipleBirthInteger", Primitive(P::Integer)),
    many("contact", Backbone("Patient.contact")),
    many("communication", Backbone("Patient.communication")),
    many("generalPractitioner", Complex("Reference")),
    opt("managingOrganization", Complex("Reference")),
];

const PATIENT_STU3: TypeDef = TypeDef {
    name: "Patient",
    kind: TypeKind::Resource,
    fields: &[
        opt("id", Primitive(P::Id)),
        opt("meta", Complex("Meta")),
        opt("language", Primitive(P::Code)),
        many("identifier", Complex("Identifier")),
        opt("active", Primitive(P::Boolean)),
        many("name", Complex("HumanName")),
        many("telecom", Complex("ContactPoint")),
        opt("gender", Primitive(P::Code)),
        opt("birthDate", Primitive(P::Date)),
        opt("deceasedBoolean", Primitive(P::Boolean)),
        opt("deceasedDateTime", Primitive(P::DateTime)),
        many("address", Complex("Address")),
        opt("maritalStatus", Complex("CodeableConcept")),
        opt("multipleBirthBoolean", Primitive(P::Boolean)),
        opt("multipleBirthInteger", Primitive(P::Integer)),
        opt("animal", Backbone("Patient.animal")),
        many("contact", Backbone("Patient.contact")),
        many("communication", Backbone("Patient.communication")),
        many("generalPractitioner", Complex("Reference")),
        opt("managingOrganization", Complex("Reference")),
    ],
};

const PATIENT_R4: TypeDef = TypeDef {
    name: "Patient",
    kind: TypeKind::Resource,
    fields: PATIENT_COMMON,
};

// Observation.

const OBSERVATION_REFERENCE_RANGE: TypeDef = TypeDef {
    name: "Observation.referenceRange",
    kind: TypeKind::Backbone,
    fields: &[
        opt("low", Complex("Quantity")),
        opt("high", Complex("Quantity")),
        opt("type", Complex("CodeableConcept")),
        many("appliesTo", Complex("CodeableConcept")),
        opt("text", Primitive(P::String)),
    ],
};

const OBSERVATION_COMPONENT_STU3: TypeDef = TypeDef {
    name: "Observation.component",
    kind: TypeKind::Backbone,
    fields: &[
        req("code", Complex("CodeableConcept")),
        opt("valueQuantity", Complex("Quantity")),
        opt("valueCodeableConcept", Complex("CodeableConcept")),
        opt("valueString", Primitive(P::String)),
        opt("dataAbsentReason", Complex("CodeableConcept")),
        opt("interpretation", Complex("CodeableConcept")),
    ],
};

const OBSERVATION_COMPONENT_R4: TypeDef = TypeDef {
    name: "Observation.component",
    kind: TypeKind::Backbone,
    fields: &[
        req("code", Complex("CodeableConcept")),
        opt("valueQuantity", Complex("Quantity")),
        opt("valueCodeableConcept", Complex("CodeableConcept")),
        opt("valueString", Primitive(P::String)),
        opt("valueBoolean", Primitive(P::Boolean)),
        opt("valueInteger", Primitive(P::Integer)),
        opt("dataAbsentReason", Complex("CodeableConcept")),
        many("interpretation", Complex("CodeableConcept")),
    ],
};

const OBSERVATION_TRIGGERED_BY: TypeDef = TypeDef {
    name: "Observation.triggeredBy",
    kind: TypeKind::Backbone,
    fields: &[
        req("observation", Complex("Reference")),
        req("type", Primitive(P::Code)),
        opt("reason", Primitive(P::String)),
    ],
};

const OBSERVATION_STU3: TypeDef = TypeDef {
    name: "Observation",
    kind: TypeKind::Resource,
    fields: &[
        opt("id", Primitive(P::Id)),
        opt("meta", Complex("Meta")),
        opt("language", Primitive(P::Code)),
        many("identifier", Complex("Identifier")),
        many("basedOn", Complex("Reference")),
        req("status", Primitive(P::Code)),
        many("category", Complex("CodeableConcept")),
        req("code", Complex("CodeableConcept")),
        opt("subject", Complex("Reference")),
        opt("context", Complex("Reference")),
        opt("effectiveDateTime", Primitive(P::DateTime)),
        opt("effectivePeriod", Complex("Period")),
        opt("issued", Primitive(P::Instant)),
        many("performer", Complex("Reference")),
        opt("valueQuantity", Complex("Quantity")),
        opt("valueCodeableConcept", Complex("CodeableConcept")),
        opt("valueString", Primitive(P::String)),
        opt("dataAbsentReason", Complex("CodeableConcept")),
        opt("interpretation", Complex("CodeableConcept")),
        opt("bodySite", Complex("CodeableConcept")),
        opt("method", Complex("CodeableConcept")),
        many("referenceRange", Backbone("Observation.referenceRange")),
        many("component", Backbone("Observation.component")),
    ],
};

const OBSERVATION_R4: TypeDef = TypeDef {
    name: "Observation",
    kind: TypeKind::Resource,
    fields: &[
        opt("id", Primitive(P::Id)),
        opt("meta", Complex("Meta")),
        opt("language", Primitive(P::Code)),
        many("identifier", Complex("Identifier")),
        many("basedOn", Complex("Reference")),
        req("status", Primitive(P::Code)),
        many("category", Complex("CodeableConcept")),
        req("code", Complex("CodeableConcept")),
        opt("subject", Complex("Reference")),
        opt("encounter", Complex("Reference")),
        opt("effectiveDateTime", Primitive(P::DateTime)),
        opt("effectivePeriod", Complex("Period")),
        opt("issued", Primitive(P::Instant)),
        many("performer", Complex("Reference")),
        opt("valueQuantity", Complex("Quantity")),
        opt("valueCodeableConcept", Complex("CodeableConcept")),
        opt("valueString", Primitive(P::String)),
        opt("valueBoolean", Primitive(P::Boolean)),
        opt("valueInteger", Primitive(P::Integer)),
        opt("dataAbsentReason", Complex("CodeableConcept")),
        many("interpretation", Complex("CodeableConcept")),
        opt("bodySite", Complex("CodeableConcept")),
        opt("method", Complex("CodeableConcept")),
        many("referenceRange", Backbone("Observation.referenceRange")),
        many("component", Backbone("Observation.component")),
    ],
};

const OBSERVATION_R5: TypeDef = TypeDef {
    name: "Observation",
    kind: TypeKind::Resource,
    fields: &[
        opt("id", Primitive(P::Id)),
        opt("meta", Complex("Meta")),
        opt("language", Primitive(P::Code)),
        many("identifier", Complex("Identifier")),
        many("basedOn", Complex("Reference")),
        many("triggeredBy", Backbone("Observation.triggeredBy")),
        req("status", Primitive(P::Code)),
        many("category", Complex("CodeableConcept")),
        req("code", Complex("CodeableConcept")),
        opt("subject", Complex("Reference")),
        opt("encounter", Complex("Reference")),
        opt("effectiveDateTime", Primitive(P::DateTime)),
        opt("effectivePeriod", Complex("Period")),
        opt("issued", Primitive(P::Instant)),
        many("performer", Complex("Reference")),
        opt("valueQuantity", Complex("Quantity")),
        opt("valueCodeableConcept", Complex("CodeableConcept")),
        opt("valueString", Primitive(P::String)),
        opt("valueBoolean", Primitive(P::Boolean)),
        opt("valueInteger", Primitive(P::Integer)),
        opt("dataAbsentReason", Complex("CodeableConcept")),
        many("interpretation", Complex("CodeableConcept")),
        opt("bodySite", Complex("CodeableConcept")),
        opt("bodyStructure", Complex("Reference")),
        opt("method", Complex("CodeableConcept")),
        many("referenceRange", Backbone("Observation.referenceRange")),
        many("component", Backbone("Observation.component")),
    ],
};

// Bundle.

const BUNDLE_LINK: TypeDef = TypeDef {
    name: "Bundle.link",
    kind: TypeKind::Backbone,
    fields: &[
        req("relation", Primitive(P::String)),
        req("url", Primitive(P::Uri)),
    ],
};

const BUNDLE_LINK_R5: TypeDef = TypeDef {
    name: "Bundle.link",
    kind: TypeKind::Backbone,
    fields: &[
        req("relation", Primitive(P::Code)),
        req("url", Primitive(P::Uri)),
    ],
};

const BUNDLE_ENTRY_REQUEST: TypeDef = TypeDef {
    name: "Bundle.entry.request",
    kind: TypeKind::Backbone,
    fields: &[
        req("method", Primitive(P::Code)),
        req("url", Primitive(P::Uri)),
    ],
};

const BUNDLE_ENTRY: TypeDef = TypeDef {
    name: "Bundle.entry",
    kind: TypeKind::Backbone,
    fields: &[
        opt("fullUrl", Primitive(P::Uri)),
        opt("resource", AnyResource),
        opt("request", Backbone("Bundle.entry.request")),
    ],
};

const BUNDLE_STU3: TypeDef = TypeDef {
    name: "Bundle",
    kind: TypeKind::Resource,
    fields: &[
        opt("id", Primitive(P::Id)),
        opt("meta", Complex("Meta")),
        opt("language", Primitive(P::Code)),
        opt("identifier", Complex("Identifier")),
        req("type", Primitive(P::Code)),
        opt("total", Primitive(P::UnsignedInt)),
        many("link", Backbone("Bundle.link")),
        many("entry", Backbone("Bundle.entry")),
    ],
};

const BUNDLE_R4: TypeDef = TypeDef {
    name: "Bundle",
    kind: TypeKind::Resource,
    fields: &[
        opt("id", Primitive(P::Id)),
        opt("meta", Complex("Meta")),
        opt("language", Primitive(P::Code)),
        opt("identifier", Complex("Identifier")),
        req("type", Primitive(P::Code)),
        opt("timestamp", Primitive(P::Instant)),
        opt("total", Primitive(P::UnsignedInt)),
        many("link", Backbone("Bundle.link")),
        many("entry", Backbone("Bundle.entry")),
    ],
};

// OperationOutcome.

const OPERATION_OUTCOME_ISSUE: TypeDef = TypeDef {
    name: "OperationOutcome.issue",
    kind: TypeKind::Backbone,
    fields: &[
        req("severity", Primitive(P::Code)),
        req("code", Primitive(P::Code)),
        opt("details", Complex("CodeableConcept")),
        opt("diagnostics", Primitive(P::String)),
        many("location", Primitive(P::String)),
        many("expression", Primitive(P::String)),
    ],
};

const OPERATION_OUTCOME: TypeDef = TypeDef {
    name: "OperationOutcome",
    kind: TypeKind::Resource,
    fields: &[
        opt("id", Primitive(P::Id)),
        opt("meta", Complex("Meta")),
        opt("language", Primitive(P::Code)),
        many_req("issue", Backbone("OperationOutcome.issue")),
    ],
};

// CodeSystem.

const CODE_SYSTEM_CONCEPT: TypeDef = TypeDef {
    name: "CodeSystem.concept",
    kind: TypeKind::Backbone,
    fields: &[
        req("code", Primitive(P::Code)),
        opt("display", Primitive(P::String)),
        opt("definition", Primitive(P::String)),
        many("concept", Backbone("CodeSystem.concept")),
    ],
};

const CODE_SYSTEM: TypeDef = TypeDef {
    name: "CodeSystem",
    kind: TypeKind::Resource,
    fields: &[
        opt("id", Primitive(P::Id)),
        opt("meta", Complex("Meta")),
        opt("language", Primitive(P::Code)),
        opt("url", Primitive(P::Uri)),
        many("identifier", Complex("Identifier")),
        opt("version", Primitive(P::String)),
        opt("name", Primitive(P::String)),
        opt("title", Primitive(P::String)),
        req("status", Primitive(P::Code)),
        opt("experimental", Primitive(P::Boolean)),
        req("content", Primitive(P::Code)),
        many("concept", Backbone("CodeSystem.concept")),
    ],
};

// StructureDefinition.

const SD_SNAPSHOT: TypeDef = TypeDef {
    name: "StructureDefinition.snapshot",
    kind: TypeKind::Backbone,
    fields: &[many_req("element", Complex("ElementDefinition"))],
};

const SD_DIFFERENTIAL: TypeDef = TypeDef {
    name: "StructureDefinition.differential",
    kind: TypeKind::Backbone,
    fields: &[many_req("element", Complex("ElementDefinition"))],
};

const STRUCTURE_DEFINITION_STU3: TypeDef = TypeDef {
    name: "StructureDefinition",
    kind: TypeKind::Resource,
    fields: &[
        opt("id", Primitive(P::Id)),
        opt("meta", Complex("Meta")),
        opt("language", Primitive(P::Code)),
        req("url", Primitive(P::Uri)),
        opt("version", Primitive(P::String)),
        req("name", Primitive(P::String)),
        opt("title", Primitive(P::String)),
        req("status", Primitive(P::Code)),
        opt("date", Primitive(P::DateTime)),
        opt("publisher", Primitive(P::String)),
        opt("description", Primitive(P::Markdown)),
        req("kind", Primitive(P::Code)),
        req("abstract", Primitive(P::Boolean)),
        req("type", Primitive(P::Code)),
        opt("baseDefinition", Primitive(P::Uri)),
        opt("derivation", Primitive(P::Code)),
        opt("snapshot", Backbone("StructureDefinition.snapshot")),
        opt("differential", Backbone("StructureDefinition.differential")),
    ],
};

const STRUCTURE_DEFINITION_R4: TypeDef = TypeDef {
    name: "StructureDefinition",
    kind: TypeKind::Resource,
    fields: &[
        opt("id", Primitive(P::Id)),
        opt("meta", Complex("Meta")),
        opt("language", Primitive(P::Code)),
        req("url", Primitive(P::Uri)),
        opt("version", Primitive(P::String)),
        req("name", Primitive(P::String)),
        opt("title", Primitive(P::String)),
        req("status", Primitive(P::Code)),
        opt("date", Primitive(P::DateTime)),
        opt("publisher", Primitive(P::String)),
        opt("description", Primitive(P::Markdown)),
        req("kind", Primitive(P::Code)),
        req("abstract", Primitive(P::Boolean)),
        req("type", Primitive(P::Uri)),
        opt("baseDefinition", Primitive(P::Canonical)),
        opt("derivation", Primitive(P::Code)),
        opt("snapshot", Backbone("StructureDefinition.snapshot")),
        opt("differential", Backbone("StructureDefinition.differential")),
    ],
};

const STU3_DEFS: &[TypeDef] = &[
    PERIOD,
    CODING,
    CODEABLE_CONCEPT,
    IDENTIFIER,
    HUMAN_NAME,
    QUANTITY,
    CONTACT_POINT,
    ADDRESS,
    ELEMENT_DEFINITION,
    REFERENCE_STU3,
    META_STU3,
    PATIENT_STU3,
    PATIENT_CONTACT,
    PATIENT_COMMUNICATION,
    PATIENT_ANIMAL,
    OBSERVATION_STU3,
    OBSERVATION_REFERENCE_RANGE,
    OBSERVATION_COMPONENT_STU3,
    BUNDLE_STU3,
    BUNDLE_LINK,
    BUNDLE_ENTRY,
    BUNDLE_ENTRY_REQUEST,
    OPERATION_OUTCOME,
    OPERATION_OUTCOME_ISSUE,
    CODE_SYSTEM,
    CODE_SYSTEM_CONCEPT,
    STRUCTURE_DEFINITION_STU3,
    SD_SNAPSHOT,
    SD_DIFFERENTIAL,
];

const R4_DEFS: &[TypeDef] = &[
    PERIOD,
    CODING,
    CODEABLE_CONCEPT,
    IDENTIFIER,
    HUMAN_NAME,
    QUANTITY,
    CONTACT_POINT,
    ADDRESS,
    ELEMENT_DEFINITION,
    REFERENCE_R4,
    META_R4,
    PATIENT_R4,
    PATIENT_CONTACT,
    PATIENT_COMMUNICATION,
    OBSERVATION_R4,
    OBSERVATION_REFERENCE_RANGE,
    OBSERVATION_COMPONENT_R4,
    BUNDLE_R4,
    BUNDLE_LINK,
    BUNDLE_ENTRY,
    BUNDLE_ENTRY_REQUEST,
    OPERATION_OUTCOME,
    OPERATION_OUTCOME_ISSUE,
    CODE_SYSTEM,
    CODE_SYSTEM_CONCEPT,
    STRUCTURE_DEFINITION_R4,
    SD_SNAPSHOT,
    SD_DIFFERENTIAL,
];

const R5_DEFS: &[TypeDef] = &[
    PERIOD,
    CODING,
    CODEABLE_CONCEPT,
    IDENTIFIER,
    HUMAN_NAME,
    QUANTITY,
    CONTACT_POINT,
    ADDRESS,
    ELEMENT_DEFINITION,
    REFERENCE_R4,
    META_R4,
    PATIENT_R4,
    PATIENT_CONTACT,
    PATIENT_COMMUNICATION,
    OBSERVATION_R5,
    OBSERVATION_REFERENCE_RANGE,
    OBSERVATION_COMPONENT_R4,
    OBSERVATION_TRIGGERED_BY,
    BUNDLE_R4,
    BUNDLE_LINK_R5,
    BUNDLE_ENTRY,
    BUNDLE_ENTRY_REQUEST,
    OPERATION_OUTCOME,
    OPERATION_OUTCOME_ISSUE,
    CODE_SYSTEM,
    CODE_SYSTEM_CONCEPT,
    STRUCTURE_DEFINITION_R4,
    SD_SNAPSHOT,
    SD_DIFFERENTIAL,
];

static TABLE_STU3: TypeTable = TypeTable {
    release: FhirRelease::Stu3,
    defs: STU3_DEFS,
};
static TABLE_R4: TypeTable = TypeTable {
    release: FhirRelease::R4,
    defs: R4_DEFS,
};
static TABLE_R5: TypeTable = TypeTable {
    release: FhirRelease::R5,
    defs: R5_DEFS,
};

/// The type table for one release.
#[derive(Debug)]
pub struct TypeTable {
    pub release: FhirRelease,
    defs: &'static [TypeDef],
}

impl TypeTable {
    pub fn for_release(release: FhirRelease) -> &'static TypeTable {
        match release {
            FhirRelease::Stu3 => &TABLE_STU3,
            FhirRelease::R4 => &TABLE_R4,
            FhirRelease::R5 => &TABLE_R5,
        }
    }

    pub fn get(&self, name: &str) -> Option<&'static TypeDef> {
        self.defs.iter().find(|d| d.name == name)
    }

    /// Resolve a type descriptor to a definition.
    ///
    /// A plain name looks up a resource or datatype directly. A dotted
    /// descriptor walks field declarations from the root type; walking
    /// through a repeating field resolves the list's element type.
    pub fn resolve(&self, descriptor: &str) -> Result<&'static TypeDef, ServiceError> {
        let unsupported = || ServiceError::UnsupportedElementType(descriptor.to_string());

        if !descriptor.contains('.') {
            return self.get(descriptor).ok_or_else(unsupported);
        }

        let mut parts = descriptor.split('.');
        let root = parts.next().unwrap_or_default();
        let mut def = self.get(root).ok_or_else(unsupported)?;
        for part in parts {
            let field = def
                .fields
                .iter()
                .find(|f| f.name == part)
                .ok_or_else(unsupported)?;
            def = match field.shape {
                FieldShape::Complex(name) | FieldShape::Backbone(name) => {
                    self.get(name).ok_or_else(unsupported)?
                }
                FieldShape::Primitive(_) | FieldShape::AnyResource => return Err(unsupported()),
            };
        }
        Ok(def)
    }

    /// Names of the top-level resource types in this release.
    pub fn resource_names(&self) -> Vec<&'static str> {
        self.defs
            .iter()
            .filter(|d| d.kind == TypeKind::Resource)
            .map(|d| d.name)
            .collect()
    }

    /// Canonical URLs of the base structure definitions in this release.
    pub fn base_structure_urls(&self) -> Vec<String> {
        self.defs
            .iter()
            .filter(|d| d.kind != TypeKind::Backbone)
            .map(|d| format!("http://hl7.org/fhir/StructureDefinition/{}", d.name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_deltas_are_present() {
        let stu3 = TypeTable::for_release(FhirRelease::Stu3);
        let r4 = TypeTable::for_release(FhirRelease::R4);
        let r5 = TypeTable::for_release(FhirRelease::R5);

        assert!(stu3.get("Patient").unwrap().fields.iter().any(|f| f.name == "animal"));
        assert!(!r4.get("Patient").unwrap().fields.iter().any(|f| f.name == "animal"));

        assert!(stu3.get("Observation").unwrap().fields.iter().any(|f| f.name == "context"));
        assert!(r4.get("Observation").unwrap().fields.iter().any(|f| f.name == "encounter"));
        assert!(r5.get("Observation").unwrap().fields.iter().any(|f| f.name == "triggeredBy"));

        let link_relation = |t: &TypeTable| {
            t.get("Bundle.link")
                .unwrap()
                .fields
                .iter()
                .find(|f| f.name == "relation")
                .unwrap()
                .shape
        };
        assert_eq!(link_relation(r4), FieldShape::Primitive(PrimitiveKind::String));
        assert_eq!(link_relation(r5), FieldShape::Primitive(PrimitiveKind::Code));
    }

    #[test]
    fn resolves_dotted_descriptors() {
        let table = TypeTable::for_release(FhirRelease::R4);
        let contact = table.resolve("Patient.contact").unwrap();
        assert_eq!(contact.kind, TypeKind::Backbone);

        // Walks through a repeating field into the list's element type.
        let request = table.resolve("Bundle.entry.request").unwrap();
        assert_eq!(request.name, "Bundle.entry.request");

        assert!(table.resolve("Patient.nonexistent").is_err());
        assert!(table.resolve("Patient.birthDate").is_err());
        assert!(table.resolve("NotAType").is_err());
    }

    #[test]
    fn resource_names_are_enumerable() {
        let names = TypeTable::for_release(FhirRelease::R4).resource_names();
        assert!(names.contains(&"Patient"));
        assert!(names.contains(&"OperationOutcome"));
        assert!(!names.contains(&"HumanName"));
    }

    #[test]
    fn every_field_shape_resolves() {
        for release in FhirRelease::all() {
            let table = TypeTable::for_release(release);
            for def in table.defs {
                for field in def.fields {
                    match field.shape {
                        FieldShape::Complex(name) | FieldShape::Backbone(name) => {
                            assert!(
                                table.get(name).is_some(),
                                "{} field {} points at missing type {name}",
                                def.name,
                                field.name
                            );
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}
