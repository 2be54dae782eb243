//! Barney: a retrieval-augmented wine recommendation service.
//!
//! A question is embedded, matched against an Azure AI Search index of wine
//! reviews, and the best passage is handed to an Azure OpenAI chat deployment
//! together with the conversation so far.

pub mod api;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod llm;
pub mod models;
pub mod search;
pub mod services;
