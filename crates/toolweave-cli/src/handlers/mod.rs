//! Command handlers.

pub mod call;
pub mod serve;
pub mod tools;
pub mod validate;
