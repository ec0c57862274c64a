//! Environment-driven service configuration.

use std::path::PathBuf;

use clap::Args;

use crate::engine::EngineSettings;
use crate::model::FhirRelease;

/// Service configuration, resolved from flags or environment variables.
#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    /// Port to listen on
    #[arg(long, env = "VALIDATOR_PORT", default_value_t = 4567)]
    pub port: u16,

    /// External terminology service URL
    #[arg(long, env = "TX_SERVER_URL", default_value = "http://tx.fhir.org")]
    pub tx_server: String,

    /// Disable terminology checking entirely
    #[arg(long, env = "DISABLE_TX")]
    pub disable_tx: bool,

    /// Report display-text mismatches as warnings instead of errors
    #[arg(long, env = "DISPLAY_ISSUES_ARE_WARNINGS")]
    pub display_issues_are_warnings: bool,

    /// Directory of definition resources ingested at startup
    #[arg(long, env = "IG_DIRECTORY", default_value = "./igs")]
    pub ig_directory: PathBuf,

    /// npm-style FHIR package registry
    #[arg(long, env = "PACKAGE_REGISTRY_URL", default_value = "https://packages.fhir.org")]
    pub package_registry_url: url::Url,

    /// Package download cache directory (defaults to the user cache dir)
    #[arg(long, env = "PACKAGE_CACHE_DIR")]
    pub package_cache_dir: Option<PathBuf>,

    /// FHIR release the engine validates against
    #[arg(long, env = "FHIR_RELEASE", default_value = "R4", value_parser = parse_release)]
    pub release: FhirRelease,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4567,
            tx_server: "http://tx.fhir.org".to_string(),
            disable_tx: false,
            display_issues_are_warnings: false,
            ig_directory: PathBuf::from("./igs"),
            package_registry_url: url::Url::parse("https://packages.fhir.org")
                .expect("default registry URL"),
            package_cache_dir: None,
            release: FhirRelease::R4,
        }
    }
}

impl ServerConfig {
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            terminology_enabled: !self.disable_tx,
            tx_server: (!self.disable_tx).then(|| self.tx_server.clone()),
            display_issues_are_warnings: self.display_issues_are_warnings,
        }
    }

    /// The package download cache directory, created on demand by the source.
    pub fn package_cache_dir(&self) -> PathBuf {
        self.package_cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .map(|dir| dir.join("fhir-validator-server").join("packages"))
                .unwrap_or_else(|| PathBuf::from(".package-cache"))
        })
    }
}

fn parse_release(value: &str) -> Result<FhirRelease, String> {
    FhirRelease::from_code(&value.to_uppercase())
        .ok_or_else(|| format!("unknown FHIR release '{value}', expected STU3, R4, or R5"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_environment() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 4567);
        assert_eq!(config.tx_server, "http://tx.fhir.org");
        assert_eq!(config.release, FhirRelease::R4);

        let settings = config.engine_settings();
        assert!(settings.terminology_enabled);
        assert_eq!(settings.tx_server.as_deref(), Some("http://tx.fhir.org"));
    }

    #[test]
    fn disable_tx_clears_the_terminology_server() {
        let config = ServerConfig {
            disable_tx: true,
            ..ServerConfig::default()
        };
        let settings = config.engine_settings();
        assert!(!settings.terminology_enabled);
        assert_eq!(settings.tx_server, None);
    }

    #[test]
    fn release_parser_accepts_known_codes() {
        assert_eq!(parse_release("r5"), Ok(FhirRelease::R5));
        assert_eq!(parse_release("STU3"), Ok(FhirRelease::Stu3));
        assert!(parse_release("R6").is_err());
    }
}
