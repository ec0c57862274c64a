//! The validation facade.
//!
//! Wraps the rule engine's `validate` so that no failure, not even a panic,
//! escapes to the transport layer: callers always receive a well-formed
//! diagnostic document.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::error;

use crate::diagnostics::Diagnostics;
use crate::engine::{RuleEngine, WireFormat};

pub struct ValidationService {
    engine: Arc<dyn RuleEngine>,
}

impl ValidationService {
    pub fn new(engine: Arc<dyn RuleEngine>) -> Self {
        Self { engine }
    }

    /// Validate a resource body against the given profile URLs.
    ///
    /// The wire format is detected from the body bytes. An empty profile list
    /// validates against the resource's base type only. Engine failures and
    /// panics become a single FATAL issue.
    pub fn validate(&self, resource: &[u8], profiles: &[String]) -> Diagnostics {
        let format = WireFormat::detect(resource);
        let result = catch_unwind(AssertUnwindSafe(|| {
            self.engine.validate(resource, format, profiles)
        }));
        match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                error!(error = %err, "rule engine failed during validation");
                Diagnostics::fatal(err.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic);
                error!(panic = %message, "rule engine panicked during validation");
                Diagnostics::fatal(format!("Internal validator failure: {message}"))
            }
        }
    }

    /// Load a single profile resource into the engine. Engine failures are
    /// reported as a FATAL diagnostic document, not an error.
    pub fn load_profile(&self, bytes: &[u8]) -> Result<(), Diagnostics> {
        self.engine.ingest_resource(bytes).map_err(|err| {
            error!(error = %err, "rule engine failed to load profile");
            Diagnostics::fatal(err.to_string())
        })
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "unknown panic".to_string()
    }
}
