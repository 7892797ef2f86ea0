pub mod loader;
pub mod encoder;

pub use loader::ImageLoader;
pub use encoder::{FeatureEncoder, FeatureVector};
