//! The format transcoder facade: JSON ⇄ XML across the supported releases.

use crate::diagnostics::Diagnostics;
use crate::model::xml::XmlCodec;
use crate::model::{ElementCodec, FhirRelease};

/// Conversion direction, as passed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Json2Xml,
    Xml2Json,
}

impl Direction {
    fn from_param(param: &str) -> Option<Self> {
        match param {
            "JSON2XML" => Some(Self::Json2Xml),
            "XML2JSON" => Some(Self::Xml2Json),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Json2Xml => "JSON2XML",
            Self::Xml2Json => "XML2JSON",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json2Xml => "application/fhir+xml",
            Self::Xml2Json => "application/fhir+json",
        }
    }
}

/// A successful conversion: the target serialization plus its content type.
#[derive(Debug)]
pub struct Converted {
    pub content_type: &'static str,
    pub body: String,
}

#[derive(Default)]
pub struct ConversionService;

impl ConversionService {
    pub fn new() -> Self {
        Self
    }

    /// Transcode a document between serializations.
    ///
    /// Both parameters are validated before any parsing happens; a missing or
    /// invalid value yields a single-ERROR outcome immediately. Parse
    /// failures against malformed input are likewise reported as outcomes,
    /// never as errors.
    pub fn transform(
        &self,
        body: &str,
        direction: Option<&str>,
        fhir_version: Option<&str>,
    ) -> Result<Converted, Diagnostics> {
        let Some(direction) = direction.and_then(Direction::from_param) else {
            return Err(Diagnostics::input_error(
                "Missing or invalid parameter 'direction', must be JSON2XML or XML2JSON",
            ));
        };
        let Some(release) = fhir_version.and_then(FhirRelease::from_code) else {
            return Err(Diagnostics::input_error(
                "Missing or invalid parameter 'fhir_version', must be one of STU3, R4 or R5",
            ));
        };

        let codec = ElementCodec::new(release);
        let xml = XmlCodec::new(release);
        let result = match direction {
            Direction::Json2Xml => codec
                .deserialize(body, "")
                .and_then(|element| xml.write(&element)),
            Direction::Xml2Json => xml
                .read(body)
                .and_then(|element| codec.serialize_pretty(&element)),
        };

        match result {
            Ok(output) if output.trim().is_empty() => Err(Diagnostics::input_error(format!(
                "Transformation produced no output for direction {} and version {}",
                direction.code(),
                release.code()
            ))),
            Ok(output) => Ok(Converted {
                content_type: direction.content_type(),
                body: output,
            }),
            Err(err) => Err(Diagnostics::input_error(format!(
                "Transformation error: {err}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;

    const PATIENT_JSON: &str =
        r#"{"resourceType":"Patient","active":true,"name":[{"family":"Lovelace"}]}"#;

    #[test]
    fn invalid_parameters_fail_before_parsing() {
        let service = ConversionService::new();

        // The body is unparseable in either format; an invalid direction must
        // win without the parser ever seeing it.
        let outcome = service
            .transform("%% not a document %%", Some("SIDEWAYS"), Some("R4"))
            .unwrap_err();
        assert_eq!(outcome.issue.len(), 1);
        assert_eq!(outcome.issue[0].severity, Severity::Error);
        assert!(outcome.issue[0].message().contains("'direction'"));

        let outcome = service
            .transform("%% not a document %%", Some("JSON2XML"), None)
            .unwrap_err();
        assert!(outcome.issue[0].message().contains("'fhir_version'"));

        let outcome = service
            .transform("%% not a document %%", None, None)
            .unwrap_err();
        assert!(outcome.issue[0].message().contains("'direction'"));
    }

    #[test]
    fn converts_json_to_xml_and_back() {
        let service = ConversionService::new();

        let xml = service
            .transform(PATIENT_JSON, Some("JSON2XML"), Some("R4"))
            .unwrap();
        assert_eq!(xml.content_type, "application/fhir+xml");
        assert!(xml.body.starts_with("<Patient"));
        assert!(xml.body.contains("<family value=\"Lovelace\"/>"));

        let json = service
            .transform(&xml.body, Some("XML2JSON"), Some("R4"))
            .unwrap();
        assert_eq!(json.content_type, "application/fhir+json");
        let value: serde_json::Value = serde_json::from_str(&json.body).unwrap();
        assert_eq!(value["resourceType"], "Patient");
        assert_eq!(value["name"][0]["family"], "Lovelace");
        // pretty-printed output
        assert!(json.body.contains('\n'));
    }

    #[test]
    fn release_selection_matters() {
        let service = ConversionService::new();
        let stu3_patient =
            r#"{"resourceType":"Patient","animal":{"species":{"text":"cat"}}}"#;

        assert!(
            service
                .transform(stu3_patient, Some("JSON2XML"), Some("STU3"))
                .is_ok()
        );
        // The same document is invalid under R4, where Patient.animal is gone.
        let outcome = service
            .transform(stu3_patient, Some("JSON2XML"), Some("R4"))
            .unwrap_err();
        assert!(outcome.issue[0].message().contains("Transformation error"));
    }

    #[test]
    fn malformed_input_becomes_an_outcome() {
        let service = ConversionService::new();
        let outcome = service
            .transform("{broken json", Some("JSON2XML"), Some("R4"))
            .unwrap_err();
        assert_eq!(outcome.issue[0].severity, Severity::Error);
        assert!(outcome.issue[0].message().contains("Transformation error"));

        let outcome = service
            .transform("<Patient><oops", Some("XML2JSON"), Some("R5"))
            .unwrap_err();
        assert!(outcome.issue[0].message().contains("Transformation error"));
    }
}
