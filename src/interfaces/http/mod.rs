//! HTTP REST API
//!
//! - `common`: response envelope, error mapping, validated JSON
//! - `middleware`: JWT authentication (bearer header or session cookie)
//! - `modules`: handlers grouped by resource
//! - `router`: route table and Swagger documentation

pub mod common;
pub mod middleware;
pub mod modules;
pub mod router;

pub use router::{create_api_router, ApiDoc, AppState};
