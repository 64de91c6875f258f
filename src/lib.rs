//! electrix
//! --------
//! Account and identity core for the electrix contracting dashboard: Chilean RUT
//! handling, login against the hosted auth service, and account provisioning that
//! never replaces the operator's own session.

pub mod error;
pub mod rut;
pub mod model;
pub mod identity;
pub mod store;
pub mod provisioning;
pub mod backend;
pub mod config;
pub mod server;
