pub mod cctp;

pub use cctp::{CctpBridge, CctpConfig};
