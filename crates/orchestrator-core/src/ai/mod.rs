//! AI-bridge support types: token accounting shared by the `LlmClient` seam
//! across the catalog/engine/app layers.

pub mod tokens;
