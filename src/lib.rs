//! qserv: a configurable static file server.
//!
//! Requests pass a fixed pipeline of policies (rate limiting, IP access
//! control, basic auth, CORS) before being resolved to files under the root
//! directory and served with cache validation and optional gzip.

pub mod cli;
pub mod config;
pub mod handler;
pub mod http;
pub mod logger;
pub mod security;
pub mod server;
