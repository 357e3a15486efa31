//! HTTP client utilities shared by the calendar and chat adapters.

pub mod client;

pub use client::{ensure_success, HttpClient, HttpClientBuilder};
