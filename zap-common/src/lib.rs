pub mod errors;
pub mod hex_bytes;
pub mod models;
pub mod simulation;
pub mod snapshot;
pub mod traits;
pub mod zap;

// Re-export Bytes
pub use hex_bytes::Bytes;
