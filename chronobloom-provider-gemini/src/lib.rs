#![deny(missing_docs)]
//! Gemini prediction service for chronobloom.
//!
//! Implements [`chronobloom_types::PredictionService`] over the Generative
//! Language API `generateContent` endpoint. The prompt goes out as a single
//! user turn; the first candidate's text comes back unmodified.

pub mod client;
mod error;
pub mod types;

pub use client::{DEFAULT_MODEL, Gemini};
