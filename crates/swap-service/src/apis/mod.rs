//! HTTP handlers, one module per route group.

pub mod proxy;
pub mod session;
pub mod siwe;
pub mod tokens;
