//! Request middleware applied ahead of every route.

pub(crate) mod rate_limit;
pub(crate) mod redirect;
