//! Preview dispatch: classification, rendering strategies and handle lifecycle.

pub mod category;
pub mod classify;
pub mod handles;
pub mod render;
pub mod session;
pub mod source;
