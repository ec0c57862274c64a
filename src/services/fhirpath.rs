//! The path evaluation facade.
//!
//! Evaluates a dotted path expression against a parsed document root and
//! returns the whole result set as one tagged JSON array, each entry a
//! `{type, value}` pair so heterogeneous results stay self-describing.

use serde_json::{Value, json};

use crate::diagnostics::Diagnostics;
use crate::model::{Element, ElementCodec, FhirRelease};

/// One step of a path expression: a field name with an optional index.
#[derive(Debug, Clone, PartialEq)]
struct Segment {
    name: String,
    index: Option<usize>,
}

/// A parsed path expression: dotted identifiers with optional `[n]` indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpression {
    segments: Vec<Segment>,
}

impl PathExpression {
    pub fn parse(path: &str) -> Result<Self, String> {
        if path.trim().is_empty() {
            return Err("path expression is empty".to_string());
        }
        let mut segments = Vec::new();
        for raw in path.split('.') {
            let raw = raw.trim();
            let (name, index) = match raw.split_once('[') {
                Some((name, rest)) => {
                    let digits = rest.strip_suffix(']').ok_or_else(|| {
                        format!("invalid index in path segment '{raw}'")
                    })?;
                    let index = digits
                        .parse::<usize>()
                        .map_err(|_| format!("invalid index in path segment '{raw}'"))?;
                    (name, Some(index))
                }
                None => (raw, None),
            };
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(format!("invalid path segment '{raw}'"));
            }
            segments.push(Segment {
                name: name.to_string(),
                index,
            });
        }
        Ok(Self { segments })
    }

    /// All elements selected by this expression. A path that matches nothing
    /// yields an empty vector.
    pub fn evaluate<'a>(&self, root: &'a Element) -> Vec<&'a Element> {
        let mut nodes: Vec<&Element> = vec![root];
        let mut segments = self.segments.as_slice();

        // A leading segment naming the root type selects the root itself.
        if let Some(first) = segments.first() {
            if first.index.is_none() && first.name == root.type_name() {
                segments = &segments[1..];
            }
        }

        for segment in segments {
            let mut next: Vec<&Element> = Vec::new();
            for node in nodes {
                next.extend(node.children(&segment.name));
            }
            nodes = match segment.index {
                Some(index) => next.get(index).map(|el| vec![*el]).unwrap_or_default(),
                None => next,
            };
            if nodes.is_empty() {
                break;
            }
        }
        nodes
    }
}

pub struct FhirPathService {
    release: FhirRelease,
}

impl FhirPathService {
    pub fn new(release: FhirRelease) -> Self {
        Self { release }
    }

    /// Evaluate `path` against a document body, fully realizing the result
    /// sequence before returning it.
    pub fn evaluate(
        &self,
        body: &str,
        path: Option<&str>,
        type_descriptor: Option<&str>,
    ) -> Result<Value, Diagnostics> {
        let Some(path) = path.filter(|p| !p.trim().is_empty()) else {
            return Err(Diagnostics::input_error("Missing parameter 'path'"));
        };
        let expression =
            PathExpression::parse(path).map_err(|err| Diagnostics::input_error(err))?;

        let codec = ElementCodec::new(self.release);
        let root = codec
            .deserialize(body, type_descriptor.unwrap_or_default())
            .map_err(|err| Diagnostics::input_error(err.to_string()))?;

        let mut results = Vec::new();
        for element in expression.evaluate(&root) {
            let value = codec
                .to_json(element)
                .map_err(|err| Diagnostics::input_error(err.to_string()))?;
            results.push(json!({
                "type": element.type_name(),
                "value": value,
            }));
        }
        Ok(Value::Array(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATIENT: &str = r#"{
        "resourceType": "Patient",
        "active": true,
        "name": [
            {"family": "Lovelace", "given": ["Ada", "Augusta"]},
            {"family": "Byron"}
        ]
    }"#;

    fn service() -> FhirPathService {
        FhirPathService::new(FhirRelease::R4)
    }

    #[test]
    fn collects_all_matches_with_type_tags() {
        let results = service()
            .evaluate(PATIENT, Some("Patient.name.given"), None)
            .unwrap();
        assert_eq!(
            results,
            json!([
                {"type": "string", "value": "Ada"},
                {"type": "string", "value": "Augusta"},
            ])
        );
    }

    #[test]
    fn heterogeneous_results_stay_self_describing() {
        let results = service().evaluate(PATIENT, Some("name"), None).unwrap();
        let array = results.as_array().unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array[0]["type"], "HumanName");
        assert_eq!(array[0]["value"]["family"], "Lovelace");
    }

    #[test]
    fn missing_paths_yield_an_empty_array() {
        let results = service()
            .evaluate(PATIENT, Some("Patient.foo"), None)
            .unwrap();
        assert_eq!(results, json!([]));
    }

    #[test]
    fn indexing_selects_one_element() {
        let results = service()
            .evaluate(PATIENT, Some("name[1].family"), None)
            .unwrap();
        assert_eq!(results, json!([{"type": "string", "value": "Byron"}]));

        let out_of_range = service()
            .evaluate(PATIENT, Some("name[9].family"), None)
            .unwrap();
        assert_eq!(out_of_range, json!([]));
    }

    #[test]
    fn evaluates_against_datatypes_via_descriptor() {
        let results = service()
            .evaluate(
                r#"{"family":"Lovelace","given":["Ada"]}"#,
                Some("given"),
                Some("HumanName"),
            )
            .unwrap();
        assert_eq!(results, json!([{"type": "string", "value": "Ada"}]));
    }

    #[test]
    fn missing_path_parameter_is_a_client_error() {
        let outcome = service().evaluate(PATIENT, None, None).unwrap_err();
        assert!(outcome.issue[0].message().contains("'path'"));

        let outcome = service()
            .evaluate(PATIENT, Some("na me"), None)
            .unwrap_err();
        assert!(outcome.issue[0].message().contains("invalid path segment"));
    }

    #[test]
    fn unparseable_bodies_are_client_errors() {
        let outcome = service()
            .evaluate("{nope", Some("Patient.name"), None)
            .unwrap_err();
        assert_eq!(outcome.issue.len(), 1);
    }
}
