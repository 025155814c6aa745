//! Domain services used by HTTP and websocket routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence so route handlers can
//! stay focused on protocol translation and auth plumbing. Services that
//! mutate project data publish feed events once their writes commit.

pub mod auth;
pub mod comment;
pub mod feed;
pub mod filter;
pub mod issue;
pub mod project;
pub mod rebalance;
pub mod session;
