//! Request Handlers
//!
//! `methods` holds the write entry points; `subscriptions` holds the read
//! channels and their relevance filtering.

pub mod methods;
pub mod subscriptions;
