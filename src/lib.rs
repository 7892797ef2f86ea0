pub mod config;
pub mod scoring;
pub mod image;
pub mod classify;
pub mod web;
pub mod utils;

// 重新导出主要类型
pub use config::Config;
pub use classify::ClassifyOutcome;
pub use scoring::decoder::{ClassificationResult, Label};
pub use utils::error::ClassifyError;

pub type Result<T> = std::result::Result<T, ClassifyError>;
