pub mod client;
pub mod normalize;
pub mod sources;
pub mod types;

pub use client::{UpstreamClient, UpstreamError};
pub use sources::Source;
