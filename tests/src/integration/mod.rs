//! Integration tests across connector-core and connector-runtime.

pub mod support;

mod directory;
mod install;
mod lifecycle;
mod subscriptions;
