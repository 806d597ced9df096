mod backend;
pub mod backends;
mod dispatch;
pub mod preprocess;
mod registry;
mod result;

pub use backend::{InferenceBackend, InferenceCapability};
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use dispatch::{Completion, Dispatcher};
pub use registry::BackendRegistry;
pub use result::{Classification, Detection, InferenceOutcome, NormalizedRect};
