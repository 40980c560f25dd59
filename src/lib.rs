//! Smart Bookmarks: sync layer of a personal bookmark manager.
//!
//! Keeps each tab's in-memory bookmark list consistent with a remote store
//! and with the other tabs of the same origin: optimistic local updates,
//! a user-scoped change subscription that triggers refetches, and a
//! cross-tab broadcaster with a shared-storage fallback.
//!
//! This library crate exposes all modules for use by the RPC binary and
//! integration tests.

pub mod app;
pub mod database;
pub mod managers;
pub mod platform;
pub mod rpc_handler;
pub mod services;
pub mod types;
