//! Request handler module
//!
//! Responsible for the request pipeline and the business logic behind it:
//! path resolution, static files, directory listings and error pages.

pub mod errors;
pub mod listing;
pub mod pipeline;
pub mod resolve;
pub mod static_files;

// Re-export main entry point
pub use pipeline::{handle_request, RequestContext, Termination};
pub use resolve::{PathResolver, ResolvedEntity};
