pub mod client;
pub mod decoder;
pub mod manager;

pub use client::ScoringClient;
pub use decoder::{ClassificationResult, Label, ResponseDecoder};
pub use manager::{ScoringManager, EndpointStats};

// Re-export convenience functions from manager
pub use manager::{get_client, health_check, get_endpoint_stats};
