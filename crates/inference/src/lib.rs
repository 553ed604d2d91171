#![recursion_limit = "256"]

pub mod driver;
pub mod factory;
pub mod submission;

#[cfg(feature = "backend-wgpu")]
pub type InferenceBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type InferenceBackend = burn_ndarray::NdArray<f32>;

pub use driver::{prediction_path, run_inference, submission_path, InferenceSummary, Predictor};
pub use factory::{InferenceFactory, InferenceSettings, ModelLoadError};
pub use submission::SubmissionWriter;

pub mod prelude {
    pub use crate::driver::{run_inference, Predictor};
    pub use crate::factory::{InferenceFactory, InferenceSettings};
    pub use crate::InferenceBackend;
}
