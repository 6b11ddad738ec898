//! HTTP request handlers.

pub(crate) mod blog;
pub(crate) mod search;
