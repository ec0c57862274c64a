//! The default rule engine: structural and cardinality checking against the
//! compile-time type tables plus whatever definition resources have been
//! loaded, with an inline terminology check against loaded code systems.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::diagnostics::{Diagnostics, ISSUE_SOURCE, Issue, IssueKind, Severity};
use crate::model::tables::{FhirRelease, FieldShape, TypeDef, TypeKind, TypeTable};
use crate::model::xml::XmlCodec;
use crate::model::{ElementCodec, PrimitiveKind};

use super::{EngineError, EngineResult, EngineSettings, GuideInfo, RuleEngine, WireFormat};

/// Keys the structural walk accepts on any element without validating their
/// content.
const OPAQUE_KEYS: &[&str] = &["extension", "modifierExtension", "text", "contained"];

/// A loaded profile, reduced to what the structural checker uses.
#[derive(Debug, Clone)]
pub struct ProfileDefinition {
    pub url: String,
    pub type_name: Option<String>,
    pub version: Option<String>,
    /// Dotted paths, relative to the root type, that the profile requires.
    pub required: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SdResource {
    url: Option<String>,
    #[serde(rename = "type")]
    type_name: Option<String>,
    version: Option<String>,
    snapshot: Option<SdElements>,
    differential: Option<SdElements>,
}

#[derive(Debug, Default, Deserialize)]
struct SdElements {
    #[serde(default)]
    element: Vec<SdElement>,
}

#[derive(Debug, Deserialize)]
struct SdElement {
    path: String,
    #[serde(default)]
    min: Option<u32>,
}

impl ProfileDefinition {
    fn from_value(value: &Value) -> EngineResult<Self> {
        let sd: SdResource = serde_json::from_value(value.clone())?;
        let url = sd
            .url
            .ok_or_else(|| EngineError::new("StructureDefinition has no url"))?;

        let elements = sd
            .snapshot
            .or(sd.differential)
            .unwrap_or_default()
            .element;
        let mut required: Vec<String> = elements
            .iter()
            .filter(|el| el.min.unwrap_or(0) >= 1)
            .filter_map(|el| {
                el.path
                    .split_once('.')
                    .map(|(_, relative)| relative.to_string())
            })
            .collect();
        required.sort();
        required.dedup();

        Ok(Self {
            url,
            type_name: sd.type_name,
            version: sd.version,
            required,
        })
    }
}

#[derive(Default)]
struct EngineState {
    /// Loaded profiles by canonical URL.
    profiles: BTreeMap<String, ProfileDefinition>,
    /// system URL -> code -> preferred display
    code_systems: HashMap<String, HashMap<String, Option<String>>>,
    guides: Vec<GuideInfo>,
}

pub struct SchemaEngine {
    release: FhirRelease,
    table: &'static TypeTable,
    settings: EngineSettings,
    state: std::sync::RwLock<EngineState>,
}

impl SchemaEngine {
    pub fn new(release: FhirRelease, settings: EngineSettings) -> Self {
        if let Some(url) = &settings.tx_server {
            info!(tx_server = %url, "external terminology service configured");
        }
        Self {
            release,
            table: TypeTable::for_release(release),
            settings,
            state: std::sync::RwLock::new(EngineState::default()),
        }
    }

    /// Ingest a parsed definition resource. Unknown resource types are
    /// accepted and ignored.
    fn ingest_value(&self, value: &Value) -> EngineResult<bool> {
        let Some(resource_type) = value.get("resourceType").and_then(Value::as_str) else {
            return Ok(false);
        };
        match resource_type {
            "StructureDefinition" => {
                let profile = ProfileDefinition::from_value(value)?;
                debug!(url = %profile.url, "profile loaded");
                let mut state = self.state.write().expect("engine state lock");
                state.profiles.insert(profile.url.clone(), profile);
                Ok(true)
            }
            "CodeSystem" => {
                let Some(url) = value.get("url").and_then(Value::as_str) else {
                    return Err(EngineError::new("CodeSystem has no url"));
                };
                let mut codes = HashMap::new();
                collect_concepts(value.get("concept"), &mut codes);
                debug!(url = %url, codes = codes.len(), "code system loaded");
                let mut state = self.state.write().expect("engine state lock");
                state.code_systems.insert(url.to_string(), codes);
                Ok(true)
            }
            "ImplementationGuide" => {
                let package_id = value
                    .get("packageId")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if package_id.is_empty() {
                    return Ok(false);
                }
                let version = value
                    .get("version")
                    .and_then(Value::as_str)
                    .unwrap_or("current")
                    .to_string();
                self.register_guide(GuideInfo {
                    package_id,
                    version,
                });
                Ok(true)
            }
            other => {
                debug!(resource_type = other, "resource type ignored by the engine");
                Ok(false)
            }
        }
    }

    fn register_guide(&self, guide: GuideInfo) {
        let mut state = self.state.write().expect("engine state lock");
        if !state.guides.contains(&guide) {
            state.guides.push(guide);
        }
    }

    fn ingest_dir(&self, dir: &Path) -> EngineResult<usize> {
        let mut count = 0;
        let mut stack = vec![dir.to_path_buf()];
        while let Some(current) = stack.pop() {
            for entry in std::fs::read_dir(&current)? {
                let entry = entry?;
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                if name.starts_with('.') || name == "package.json" || !name.ends_with(".json") {
                    continue;
                }
                let bytes = std::fs::read(&path)?;
                match serde_json::from_slice::<Value>(&bytes) {
                    Ok(value) => match self.ingest_value(&value) {
                        Ok(true) => count += 1,
                        Ok(false) => {}
                        Err(err) => {
                            warn!(file = %path.display(), error = %err, "definition skipped")
                        }
                    },
                    Err(err) => warn!(file = %path.display(), error = %err, "file is not JSON"),
                }
            }
        }
        Ok(count)
    }

    /// Parse a body into a JSON value for the structural walk, reporting parse
    /// failures as issues.
    fn parse_body(&self, text: &str, format: WireFormat, issues: &mut Vec<Issue>) -> Option<Value> {
        match format {
            WireFormat::Json => match serde_json::from_str::<Value>(text) {
                Ok(value) => Some(value),
                Err(err) => {
                    let (line, column) = (err.line() as i64, err.column() as i64);
                    issues.push(
                        Issue::new(
                            Severity::Error,
                            IssueKind::Structure,
                            format!("Invalid JSON content: {err}"),
                        )
                        .at(line.max(1), column.max(1), ISSUE_SOURCE),
                    );
                    None
                }
            },
            WireFormat::Xml => {
                let xml = XmlCodec::new(self.release);
                match xml.read(text) {
                    Ok(element) => match ElementCodec::new(self.release).to_json(&element) {
                        Ok(value) => Some(value),
                        Err(err) => {
                            issues.push(
                                Issue::new(Severity::Error, IssueKind::Structure, err.to_string())
                                    .at(1, 1, ISSUE_SOURCE),
                            );
                            None
                        }
                    },
                    Err(err) => {
                        issues.push(
                            Issue::new(
                                Severity::Error,
                                IssueKind::Structure,
                                format!("Invalid XML content: {err}"),
                            )
                            .at(1, 1, ISSUE_SOURCE),
                        );
                        None
                    }
                }
            }
        }
    }

    fn check_resource(&self, value: &Value, issues: &mut Vec<Issue>, state: &EngineState) {
        let Some(obj) = value.as_object() else {
            issues.push(error_issue(
                IssueKind::Structure,
                "resource body must be a JSON object",
            ));
            return;
        };
        let Some(resource_type) = obj.get("resourceType").and_then(Value::as_str) else {
            issues.push(error_issue(
                IssueKind::Structure,
                "resource has no resourceType",
            ));
            return;
        };
        let Some(def) = self
            .table
            .get(resource_type)
            .filter(|d| d.kind == TypeKind::Resource)
        else {
            issues.push(error_issue(
                IssueKind::Structure,
                format!("Unknown resource type '{resource_type}'"),
            ));
            return;
        };
        self.check_struct(def, obj, resource_type, issues, state);
    }

    fn check_struct(
        &self,
        def: &'static TypeDef,
        obj: &Map<String, Value>,
        path: &str,
        issues: &mut Vec<Issue>,
        state: &EngineState,
    ) {
        for (key, value) in obj {
            if key == "resourceType" && def.kind == TypeKind::Resource {
                continue;
            }
            if key.starts_with('_') || OPAQUE_KEYS.contains(&key.as_str()) {
                continue;
            }
            let Some(field) = def.fields.iter().find(|f| f.name == *key) else {
                issues.push(error_issue(
                    IssueKind::Structure,
                    format!("Unknown element '{path}.{key}'"),
                ));
                continue;
            };
            if field.repeats {
                match value.as_array() {
                    Some(items) => {
                        for (i, item) in items.iter().enumerate() {
                            self.check_field(
                                field.shape,
                                item,
                                &format!("{path}.{key}[{i}]"),
                                issues,
                                state,
                            );
                        }
                    }
                    None => issues.push(error_issue(
                        IssueKind::Structure,
                        format!("'{path}.{key}' must be an array"),
                    )),
                }
            } else if value.is_array() {
                issues.push(error_issue(
                    IssueKind::Structure,
                    format!("'{path}.{key}' must not repeat"),
                ));
            } else {
                self.check_field(field.shape, value, &format!("{path}.{key}"), issues, state);
            }
        }

        for field in def.fields {
            if field.required && !obj.contains_key(field.name) {
                issues.push(error_issue(
                    IssueKind::Required,
                    format!("{path}.{}: minimum required = 1, but only found 0", field.name),
                ));
            }
        }
    }

    fn check_field(
        &self,
        shape: FieldShape,
        value: &Value,
        path: &str,
        issues: &mut Vec<Issue>,
        state: &EngineState,
    ) {
        match shape {
            FieldShape::Primitive(kind) => check_primitive(kind, value, path, issues),
            FieldShape::Complex(name) | FieldShape::Backbone(name) => {
                let Some(obj) = value.as_object() else {
                    issues.push(error_issue(
                        IssueKind::Structure,
                        format!("'{path}' must be an object"),
                    ));
                    return;
                };
                if let Some(inner) = self.table.get(name) {
                    self.check_struct(inner, obj, path, issues, state);
                }
                if name == "Coding" {
                    self.check_coding(obj, path, issues, state);
                }
            }
            FieldShape::AnyResource => self.check_resource(value, issues, state),
        }
    }

    fn check_coding(
        &self,
        obj: &Map<String, Value>,
        path: &str,
        issues: &mut Vec<Issue>,
        state: &EngineState,
    ) {
        if !self.settings.terminology_enabled {
            return;
        }
        let (Some(system), Some(code)) = (
            obj.get("system").and_then(Value::as_str),
            obj.get("code").and_then(Value::as_str),
        ) else {
            return;
        };

        let Some(codes) = state.code_systems.get(system) else {
            match &self.settings.tx_server {
                Some(url) => issues.push(Issue::new(
                    Severity::Information,
                    IssueKind::Informational,
                    format!(
                        "CodeSystem '{system}' is not loaded; '{code}' at {path} was left to the terminology server {url}"
                    ),
                )),
                None => issues.push(Issue::new(
                    Severity::Warning,
                    IssueKind::CodeInvalid,
                    format!(
                        "CodeSystem '{system}' is not loaded, so code '{code}' at {path} was not validated"
                    ),
                )),
            }
            return;
        };

        match codes.get(code) {
            None => issues.push(error_issue(
                IssueKind::CodeInvalid,
                format!("Unknown code '{code}' in code system '{system}' at {path}"),
            )),
            Some(expected_display) => {
                if let (Some(expected), Some(given)) = (
                    expected_display.as_deref(),
                    obj.get("display").and_then(Value::as_str),
                ) {
                    if expected != given {
                        let severity = if self.settings.display_issues_are_warnings {
                            Severity::Warning
                        } else {
                            Severity::Error
                        };
                        issues.push(Issue::new(
                            severity,
                            IssueKind::Invalid,
                            format!(
                                "Wrong display '{given}' for code '{system}#{code}' at {path}, should be '{expected}'"
                            ),
                        ));
                    }
                }
            }
        }
    }

    fn apply_profile(
        &self,
        url: &str,
        value: &Value,
        issues: &mut Vec<Issue>,
        state: &EngineState,
    ) {
        let Some(profile) = state.profiles.get(url) else {
            issues.push(error_issue(
                IssueKind::NotFound,
                format!("Profile '{url}' has not been loaded"),
            ));
            return;
        };
        let resource_type = value
            .get("resourceType")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if let Some(expected) = &profile.type_name {
            if expected != resource_type {
                issues.push(error_issue(
                    IssueKind::Invalid,
                    format!("Profile '{url}' applies to {expected}, not {resource_type}"),
                ));
                return;
            }
        }
        for required in &profile.required {
            if !value_has_path(value, required) {
                issues.push(error_issue(
                    IssueKind::Required,
                    format!("{resource_type}.{required}: required by profile '{url}' but missing"),
                ));
            }
        }
    }
}

#[async_trait]
impl RuleEngine for SchemaEngine {
    async fn ingest_package(&self, dir: &Path, guide: GuideInfo) -> EngineResult<usize> {
        let count = self.ingest_dir(dir)?;
        info!(
            package = %guide.package_id,
            version = %guide.version,
            definitions = count,
            "package ingested"
        );
        self.register_guide(guide);
        Ok(count)
    }

    async fn ingest_profile_dir(&self, dir: &Path) -> EngineResult<usize> {
        if !dir.exists() {
            warn!(dir = %dir.display(), "profile directory does not exist, skipping");
            return Ok(0);
        }
        let count = self.ingest_dir(dir)?;
        info!(dir = %dir.display(), definitions = count, "startup artifacts ingested");
        Ok(count)
    }

    fn ingest_resource(&self, bytes: &[u8]) -> EngineResult<()> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| EngineError::new("definition resource is not valid UTF-8"))?;
        let value = match WireFormat::detect(bytes) {
            WireFormat::Json => serde_json::from_str::<Value>(text)?,
            WireFormat::Xml => {
                let element = XmlCodec::new(self.release)
                    .read(text)
                    .map_err(|e| EngineError::new(e.to_string()))?;
                ElementCodec::new(self.release)
                    .to_json(&element)
                    .map_err(|e| EngineError::new(e.to_string()))?
            }
        };
        self.ingest_value(&value)?;
        Ok(())
    }

    fn validate(
        &self,
        resource: &[u8],
        format: WireFormat,
        profiles: &[String],
    ) -> EngineResult<Diagnostics> {
        let text = std::str::from_utf8(resource)
            .map_err(|_| EngineError::new("resource body is not valid UTF-8"))?;

        let mut issues = Vec::new();
        let Some(value) = self.parse_body(text, format, &mut issues) else {
            return Ok(Diagnostics::from_issues(issues));
        };

        let state = self.state.read().expect("engine state lock");
        self.check_resource(&value, &mut issues, &state);
        for url in profiles {
            self.apply_profile(url, &value, &mut issues, &state);
        }
        Ok(Diagnostics::from_issues(issues))
    }

    fn resource_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .table
            .resource_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn structure_urls(&self) -> Vec<String> {
        let state = self.state.read().expect("engine state lock");
        let mut urls: BTreeSet<String> = self.table.base_structure_urls().into_iter().collect();
        urls.extend(state.profiles.keys().cloned());
        urls.into_iter().collect()
    }

    fn guides(&self) -> Vec<GuideInfo> {
        self.state.read().expect("engine state lock").guides.clone()
    }

    fn version(&self) -> String {
        format!("schema-engine/{} ({})", env!("CARGO_PKG_VERSION"), self.release.code())
    }
}

fn error_issue(kind: IssueKind, message: impl Into<String>) -> Issue {
    Issue::new(Severity::Error, kind, message)
}

fn check_primitive(kind: PrimitiveKind, value: &Value, path: &str, issues: &mut Vec<Issue>) {
    let text = match (kind, value) {
        (PrimitiveKind::Boolean, Value::Bool(b)) => b.to_string(),
        (k, Value::Number(n)) if k.is_json_literal() && k != PrimitiveKind::Boolean => {
            n.to_string()
        }
        (k, Value::String(s)) if !k.is_json_literal() => s.clone(),
        _ => {
            issues.push(error_issue(
                IssueKind::Structure,
                format!("'{path}' has the wrong JSON type for {}", kind.code()),
            ));
            return;
        }
    };
    if !kind.accepts(&text) {
        issues.push(error_issue(
            IssueKind::Invalid,
            format!("'{text}' is not a valid {} value at {path}", kind.code()),
        ));
    }
}

fn collect_concepts(concepts: Option<&Value>, out: &mut HashMap<String, Option<String>>) {
    let Some(items) = concepts.and_then(Value::as_array) else {
        return;
    };
    for item in items {
        if let Some(code) = item.get("code").and_then(Value::as_str) {
            let display = item
                .get("display")
                .and_then(Value::as_str)
                .map(str::to_string);
            out.insert(code.to_string(), display);
        }
        collect_concepts(item.get("concept"), out);
    }
}

/// Walk a dotted path through a JSON value, flattening arrays; true when at
/// least one node exists at the end.
fn value_has_path(value: &Value, path: &str) -> bool {
    let mut current = vec![value];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for node in current {
            let candidates = match node {
                Value::Array(items) => items.iter().collect::<Vec<_>>(),
                other => vec![other],
            };
            for candidate in candidates {
                if let Some(found) = candidate.get(segment) {
                    match found {
                        Value::Array(items) => next.extend(items.iter()),
                        other => next.push(other),
                    }
                }
            }
        }
        if next.is_empty() {
            return false;
        }
        current = next;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SchemaEngine {
        SchemaEngine::new(FhirRelease::R4, EngineSettings::default())
    }

    fn validate_json(engine: &SchemaEngine, body: &str, profiles: &[String]) -> Diagnostics {
        engine
            .validate(body.as_bytes(), WireFormat::Json, profiles)
            .unwrap()
    }

    #[test]
    fn clean_resource_validates_with_no_issues() {
        let outcome = validate_json(
            &engine(),
            r#"{"resourceType":"Patient","active":true,"birthDate":"1815-12-10","name":[{"family":"Lovelace"}]}"#,
            &[],
        );
        assert!(outcome.is_success(), "{:?}", outcome.issue);
    }

    #[test]
    fn reports_unknown_elements_and_bad_primitives() {
        let outcome = validate_json(
            &engine(),
            r#"{"resourceType":"Patient","wingspan":3,"birthDate":"tomorrow"}"#,
            &[],
        );
        let messages: Vec<&str> = outcome.issue.iter().map(|i| i.message()).collect();
        assert!(messages.iter().any(|m| m.contains("Patient.wingspan")));
        assert!(messages.iter().any(|m| m.contains("'tomorrow' is not a valid date")));
    }

    #[test]
    fn reports_missing_required_fields() {
        let outcome = validate_json(
            &engine(),
            r#"{"resourceType":"Observation","code":{"text":"bp"}}"#,
            &[],
        );
        assert!(
            outcome
                .issue
                .iter()
                .any(|i| i.code == IssueKind::Required
                    && i.message().contains("Observation.status"))
        );
    }

    #[test]
    fn reports_cardinality_mismatches() {
        let outcome = validate_json(
            &engine(),
            r#"{"resourceType":"Patient","name":{"family":"Lovelace"}}"#,
            &[],
        );
        assert!(
            outcome
                .issue
                .iter()
                .any(|i| i.message().contains("'Patient.name' must be an array"))
        );
    }

    #[test]
    fn corrupt_json_yields_positional_error() {
        let outcome = validate_json(&engine(), "{\"resourceType\": \"Patient\",\n  !!!", &[]);
        assert_eq!(outcome.issue.len(), 1);
        let issue = &outcome.issue[0];
        assert_eq!(issue.severity, Severity::Error);
        assert!(issue.extensions.iter().any(|e| e.value_integer == Some(2)));
    }

    #[test]
    fn validates_xml_bodies() {
        let body = "<Patient xmlns=\"http://hl7.org/fhir\"><active value=\"true\"/></Patient>";
        let outcome = engine()
            .validate(body.as_bytes(), WireFormat::Xml, &[])
            .unwrap();
        assert!(outcome.is_success(), "{:?}", outcome.issue);
    }

    #[test]
    fn unknown_profile_is_reported() {
        let outcome = validate_json(
            &engine(),
            r#"{"resourceType":"Patient"}"#,
            &["http://example.org/StructureDefinition/nope".to_string()],
        );
        assert!(
            outcome
                .issue
                .iter()
                .any(|i| i.code == IssueKind::NotFound && i.message().contains("nope"))
        );
    }

    #[test]
    fn profile_required_paths_are_enforced() {
        let e = engine();
        e.ingest_resource(
            br#"{"resourceType":"StructureDefinition","url":"http://example.org/sd/pat","name":"Pat","status":"active","kind":"resource","abstract":false,"type":"Patient","differential":{"element":[{"path":"Patient.birthDate","min":1}]}}"#,
        )
        .unwrap();

        let profile = vec!["http://example.org/sd/pat".to_string()];
        let bad = validate_json(&e, r#"{"resourceType":"Patient"}"#, &profile);
        assert!(
            bad.issue
                .iter()
                .any(|i| i.code == IssueKind::Required && i.message().contains("birthDate"))
        );

        let good = validate_json(
            &e,
            r#"{"resourceType":"Patient","birthDate":"1815-12-10"}"#,
            &profile,
        );
        assert!(good.is_success(), "{:?}", good.issue);

        let wrong_type = validate_json(&e, r#"{"resourceType":"Observation","status":"final","code":{"text":"x"}}"#, &profile);
        assert!(
            wrong_type
                .issue
                .iter()
                .any(|i| i.message().contains("applies to Patient"))
        );
    }

    #[test]
    fn terminology_checks_follow_settings() {
        let e = engine();
        e.ingest_resource(
            br#"{"resourceType":"CodeSystem","url":"http://example.org/cs","status":"active","content":"complete","concept":[{"code":"ok","display":"All good"}]}"#,
        )
        .unwrap();

        let body = |code: &str, display: &str| {
            format!(
                r#"{{"resourceType":"Observation","status":"final","code":{{"coding":[{{"system":"http://example.org/cs","code":"{code}","display":"{display}"}}]}}}}"#
            )
        };

        let bad_code = validate_json(&e, &body("nope", "x"), &[]);
        assert!(
            bad_code
                .issue
                .iter()
                .any(|i| i.code == IssueKind::CodeInvalid && i.severity == Severity::Error)
        );

        let bad_display = validate_json(&e, &body("ok", "All wrong"), &[]);
        assert!(
            bad_display
                .issue
                .iter()
                .any(|i| i.severity == Severity::Error && i.message().contains("Wrong display"))
        );

        // Same mismatch demoted to a warning by the flag.
        let warn_engine = SchemaEngine::new(
            FhirRelease::R4,
            EngineSettings {
                display_issues_are_warnings: true,
                ..EngineSettings::default()
            },
        );
        warn_engine
            .ingest_resource(
                br#"{"resourceType":"CodeSystem","url":"http://example.org/cs","status":"active","content":"complete","concept":[{"code":"ok","display":"All good"}]}"#,
            )
            .unwrap();
        let demoted = warn_engine
            .validate(body("ok", "All wrong").as_bytes(), WireFormat::Json, &[])
            .unwrap();
        assert!(
            demoted
                .issue
                .iter()
                .any(|i| i.severity == Severity::Warning && i.message().contains("Wrong display"))
        );

        // And disabled entirely.
        let off_engine = SchemaEngine::new(
            FhirRelease::R4,
            EngineSettings {
                terminology_enabled: false,
                ..EngineSettings::default()
            },
        );
        let silent = off_engine
            .validate(body("nope", "x").as_bytes(), WireFormat::Json, &[])
            .unwrap();
        assert!(silent.is_success(), "{:?}", silent.issue);
    }

    #[test]
    fn guides_come_from_implementation_guides() {
        let e = engine();
        e.ingest_resource(
            br#"{"resourceType":"ImplementationGuide","packageId":"example.ig","version":"1.2.3","url":"http://example.org/ig"}"#,
        )
        .unwrap();
        assert_eq!(
            e.guides(),
            vec![GuideInfo {
                package_id: "example.ig".to_string(),
                version: "1.2.3".to_string()
            }]
        );
    }

    #[test]
    fn structure_urls_include_base_and_loaded() {
        let e = engine();
        e.ingest_resource(
            br#"{"resourceType":"StructureDefinition","url":"http://example.org/sd/pat","type":"Patient"}"#,
        )
        .unwrap();
        let urls = e.structure_urls();
        assert!(urls.contains(&"http://hl7.org/fhir/StructureDefinition/Patient".to_string()));
        assert!(urls.contains(&"http://example.org/sd/pat".to_string()));
        let mut sorted = urls.clone();
        sorted.sort();
        assert_eq!(urls, sorted);
    }

    #[test]
    fn value_has_path_flattens_arrays() {
        let value: Value = serde_json::from_str(
            r#"{"name":[{"given":["Ada"]},{"family":"Byron"}],"active":true}"#,
        )
        .unwrap();
        assert!(value_has_path(&value, "name.given"));
        assert!(value_has_path(&value, "name.family"));
        assert!(value_has_path(&value, "active"));
        assert!(!value_has_path(&value, "name.suffix"));
    }
}
