//! # hopnet
//!
//! The request-execution core of an HTTP API client.
//!
//! `hopnet` takes one logical request, drives it through as many physical
//! exchanges as its redirects need, and hands back a single record of what
//! happened: the final request and response, every followed redirect, HAR
//! timings and byte counts. The structure follows Chromium's net stack at a
//! much smaller scale.
//!
//! ## Features
//!
//! - **Redirects**: 301/302/303 method downgrade, loop detection, hop limit
//! - **Cookies**: `Set-Cookie` of a redirect forwarded to the next hop
//! - **Decoding**: gzip, deflate and brotli bodies
//! - **Timing**: blocked/dns/connect/ssl/send/wait/receive per hop
//! - **Transport**: HTTP/1.1 over TCP or BoringSSL, HTTP proxies and tunnels,
//!   client certificates, or any custom [`TransportConnector`](socket::TransportConnector)
//! - **Cancellation**: `abort()` or a `CancellationToken`, at any point
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hopnet::http::Request;
//! use hopnet::urlrequest::{RequestEngine, RequestOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let options = RequestOptions::new().default_headers(true);
//!     let engine = RequestEngine::new(Request::get("https://example.com"), options).unwrap();
//!     match engine.send().await {
//!         Ok(log) => println!("{} redirects", log.redirects.len()),
//!         Err(e) => println!("failed: {} ({})", e.message, e.code),
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error codes and engine states
//! - [`cookies`] - Cookie parsing and redirect carry-over
//! - [`http`] - Headers, request/response records, decoding, timing, redirects
//! - [`socket`] - Transport seam, connect job, proxy and TLS
//! - [`urlrequest`] - Options, observers and the request engine

pub mod base;
pub mod cookies;
pub mod http;
pub mod socket;
pub mod urlrequest;
