//! Gatehouse - role and permission authorization engine
//!
//! Decides per request whether an authenticated principal may run an
//! operation, based on a role -> permission graph held in a relational store.
//! It exposes all modules for testing purposes.

pub mod authz;
pub mod entities;
pub mod errors;
pub mod settings;
pub mod storage;
pub mod web;
