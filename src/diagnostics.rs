//! Uniform diagnostic documents.
//!
//! Every failure in this service, whether a bad query parameter, a malformed
//! resource, or an engine crash, is reported as an OperationOutcome-shaped
//! document so clients only ever deal with one error shape.

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

const LINE_EXTENSION: &str = "http://hl7.org/fhir/StructureDefinition/operationoutcome-issue-line";
const COL_EXTENSION: &str = "http://hl7.org/fhir/StructureDefinition/operationoutcome-issue-col";
const SOURCE_EXTENSION: &str =
    "http://hl7.org/fhir/StructureDefinition/operationoutcome-issue-source";

/// Source tag reported on issues that were raised by this service rather than
/// by the rule engine.
pub const ISSUE_SOURCE: &str = "ValidationService";

/// Issue severity, ordered from worst to mildest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Fatal,
    Error,
    Warning,
    Information,
}

/// Issue kind tags, a subset of the FHIR issue-type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    Structure,
    Invalid,
    Required,
    NotFound,
    CodeInvalid,
    Processing,
    Exception,
    Informational,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueDetails {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueExtension {
    pub url: String,
    #[serde(rename = "valueInteger", skip_serializing_if = "Option::is_none")]
    pub value_integer: Option<i64>,
    #[serde(rename = "valueCode", skip_serializing_if = "Option::is_none")]
    pub value_code: Option<String>,
}

/// A single diagnostic issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub code: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<IssueDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        rename = "extension"
    )]
    pub extensions: Vec<IssueExtension>,
}

impl Issue {
    pub fn new(severity: Severity, code: IssueKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            severity,
            code,
            details: Some(IssueDetails {
                text: message.clone(),
            }),
            diagnostics: Some(message),
            extensions: Vec::new(),
        }
    }

    /// Attach a positional `(line, column, source)` triple.
    pub fn at(mut self, line: i64, column: i64, source: &str) -> Self {
        self.extensions = vec![
            IssueExtension {
                url: LINE_EXTENSION.to_string(),
                value_integer: Some(line),
                value_code: None,
            },
            IssueExtension {
                url: COL_EXTENSION.to_string(),
                value_integer: Some(column),
                value_code: None,
            },
            IssueExtension {
                url: SOURCE_EXTENSION.to_string(),
                value_integer: None,
                value_code: Some(source.to_string()),
            },
        ];
        self
    }

    pub fn message(&self) -> &str {
        self.diagnostics.as_deref().unwrap_or_default()
    }
}

/// An ordered collection of issues, serialized as a FHIR OperationOutcome.
///
/// An empty issue list is reserved for success; every failing code path adds
/// at least one issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    #[serde(rename = "resourceType", default = "outcome_resource_type")]
    resource_type: String,
    #[serde(default)]
    pub issue: Vec<Issue>,
}

fn outcome_resource_type() -> String {
    "OperationOutcome".to_string()
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::success()
    }
}

impl Diagnostics {
    /// A clean outcome with no issues.
    pub fn success() -> Self {
        Self {
            resource_type: outcome_resource_type(),
            issue: Vec::new(),
        }
    }

    pub fn from_issues(issue: Vec<Issue>) -> Self {
        Self {
            resource_type: outcome_resource_type(),
            issue,
        }
    }

    /// A single-issue outcome carrying the default positional placeholder.
    pub fn single(severity: Severity, kind: IssueKind, message: impl Into<String>) -> Self {
        Self::from_issues(vec![
            Issue::new(severity, kind, message).at(1, 1, ISSUE_SOURCE),
        ])
    }

    /// The single-ERROR outcome used for client input problems.
    pub fn input_error(message: impl Into<String>) -> Self {
        Self::single(Severity::Error, IssueKind::Structure, message)
    }

    /// The single-FATAL outcome used when a collaborator failure is caught at
    /// a facade boundary.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::single(Severity::Fatal, IssueKind::Exception, message)
    }

    pub fn from_error(err: &ServiceError) -> Self {
        let kind = match err {
            ServiceError::PackageNotFound { .. } => IssueKind::NotFound,
            ServiceError::Engine(_) | ServiceError::Internal(_) => IssueKind::Exception,
            _ => IssueKind::Structure,
        };
        Self::single(err.severity(), kind, err.to_string())
    }

    pub fn push(&mut self, issue: Issue) {
        self.issue.push(issue);
    }

    pub fn is_success(&self) -> bool {
        self.issue.is_empty()
    }

    /// Worst severity present, if any issue exists.
    pub fn worst_severity(&self) -> Option<Severity> {
        [
            Severity::Fatal,
            Severity::Error,
            Severity::Warning,
            Severity::Information,
        ]
        .into_iter()
        .find(|s| self.issue.iter().any(|i| i.severity == *s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_operation_outcome() {
        let outcome = Diagnostics::input_error("missing parameter 'path'");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["resourceType"], "OperationOutcome");
        assert_eq!(json["issue"][0]["severity"], "error");
        assert_eq!(json["issue"][0]["code"], "structure");
        assert_eq!(
            json["issue"][0]["details"]["text"],
            "missing parameter 'path'"
        );
        assert_eq!(json["issue"][0]["extension"][0]["valueInteger"], 1);
        assert_eq!(
            json["issue"][0]["extension"][2]["valueCode"],
            ISSUE_SOURCE
        );
    }

    #[test]
    fn empty_outcome_is_success() {
        assert!(Diagnostics::success().is_success());
        assert!(!Diagnostics::fatal("boom").is_success());
    }

    #[test]
    fn worst_severity_orders_fatal_first() {
        let mut outcome = Diagnostics::success();
        assert_eq!(outcome.worst_severity(), None);
        outcome.push(Issue::new(Severity::Warning, IssueKind::Invalid, "w"));
        outcome.push(Issue::new(Severity::Fatal, IssueKind::Exception, "f"));
        assert_eq!(outcome.worst_severity(), Some(Severity::Fatal));
    }

    #[test]
    fn round_trips_through_json() {
        let outcome = Diagnostics::fatal("engine failure");
        let json = serde_json::to_string(&outcome).unwrap();
        let parsed: Diagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, outcome);
    }
}
