//! # Workset Testkit
//!
//! A small entity model and builders shared by the scenario tests: a
//! `Site` with self-referential parent/children, a one-to-one `Probe`,
//! one-to-many/many-to-one `Tank`s, a many-to-many feed relation, and a
//! keyed `properties` collection. Together they exercise every
//! relationship shape the coordinator manages.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod fixtures;

pub use fixtures::{test_session, test_store, Probe, Site, Tank};
