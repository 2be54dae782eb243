mod api;

pub use api::EmbeddingApiClient;
