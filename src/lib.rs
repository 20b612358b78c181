//! Trolley
//!
//! Trolley is the cart state reconciliation core of a storefront client: a
//! single in-memory cart routed transparently between a device-local store
//! (anonymous session) and the authoritative remote cart service
//! (authenticated session), with a one-shot merge of the local cart into the
//! server cart when a session signs in.

pub mod catalog;
pub mod errors;
pub mod events;
pub mod models;
pub mod remote;
pub mod service;
pub mod session;
pub mod storage;
