//! Service layer: the facades between the HTTP handlers and the engine,
//! registry, and codecs.

pub mod app_state;
pub mod conversion;
pub mod fhirpath;
pub mod validation;

pub use app_state::AppState;
pub use conversion::{ConversionService, Converted};
pub use fhirpath::FhirPathService;
pub use validation::ValidationService;
