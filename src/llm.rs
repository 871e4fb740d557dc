//! Together inference client: reply generation, post-processing, and
//! best-effort illustration.

pub mod client;
pub mod image;
pub mod postprocess;

pub use client::TogetherClient;
