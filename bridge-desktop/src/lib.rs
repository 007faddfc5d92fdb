//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for server and desktop hosts.
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, with connection pooling, rustls TLS and an
//!   optional transport-level retry policy
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use bridge_traits::{HttpClient, RetryPolicy};
//! use std::time::Duration;
//!
//! let http_client = ReqwestHttpClient::builder()
//!     .timeout(Duration::from_secs(30))
//!     .retry_policy(RetryPolicy::single_attempt())
//!     .build()?;
//! ```

mod http;

pub use http::{ReqwestHttpClient, ReqwestHttpClientBuilder};
