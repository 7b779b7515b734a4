//! Lenspost library.
//!
//! A photo-sharing social backend built from nine independent concepts
//! (authenticating, posting, commenting, liking, badging, reporting,
//! blurring, friending, sessioning), each owning its own collection, with
//! all cross-concept behavior composed by the web routing layer.

pub mod auth;
pub mod concepts;
pub mod config;
pub mod db;
pub mod error;
pub mod web;
