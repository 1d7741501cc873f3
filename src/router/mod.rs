//! HTTP routes.
pub mod create;
pub mod status;
pub mod users;

#[cfg(test)]
pub(crate) use tests::*;
