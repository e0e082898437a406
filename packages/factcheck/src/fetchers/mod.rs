//! HTTP fetch implementations.

pub mod http;

pub use http::ReqwestFetcher;
