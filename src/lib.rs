//! Session state machine and polling engine for server-backed code generation.
//!
//! A [`session::Session`] owns one conversation with a remote
//! [`protocol::GenerationService`]. Each message runs one generation: start,
//! poll until terminal ([`poller`]), fetch the result archive and turn it into
//! file-change records ([`reconcile`]).

pub mod cassette;
pub mod commands;
pub mod config;
pub mod display;
pub mod error;
pub mod poller;
pub mod protocol;
pub mod reconcile;
pub mod session;
pub mod workspace;
pub mod writer;
