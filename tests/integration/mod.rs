//! Integration tests for camwatch
//!
//! These run real shell processes, real coordination files and a local HTTP
//! readiness endpoint through the public library API.

pub mod helpers;
pub mod lifecycle;
pub mod retention;
