//! Authentication module: login, logout, current operator

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
