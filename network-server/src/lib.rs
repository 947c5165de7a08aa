//! Network reconciliation server.
//!
//! Keeps a link–node transport network consistent after its links have been
//! edited: node ids are re-derived from geometry, split links are detected
//! and apportioned, and every transit and project route is rebuilt onto the
//! surviving links.

pub mod domain;
pub mod reconcile;
pub mod routing;
pub mod spatial;
pub mod store;
pub mod web;
