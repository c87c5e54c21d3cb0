//! HTTP adapters for the external collaborators
//!
//! Concrete `SearchClient` and `SentimentClient` implementations over
//! reqwest. The pipeline only ever sees the traits; these adapters are the
//! production wiring.

pub mod search_http;
pub mod sentiment_http;

pub use search_http::HttpSearchClient;
pub use sentiment_http::HttpSentimentClient;
