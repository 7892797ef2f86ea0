pub mod pipeline;
pub mod types;

pub use pipeline::{ClassifyPipeline, TempImage};
pub use types::{ClassifyOptions, ClassifyOutcome, ClassifyStage, ClassifyStatus, EndpointInfo};
