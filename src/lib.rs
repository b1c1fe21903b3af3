//! siteproxy - browse registered websites through a same-origin rewriting proxy
//!
//! Pages are fetched from the origin, their anchors rewritten to stay inside
//! the proxy, and the bytes moved are tallied per user and site.

pub mod config;
pub mod db;
pub mod error;
pub mod proxy;
pub mod web;
