//! An abstraction layer for different LLMs.
//!
//! This crate establishes an unified protocol for the orchestrator to talk
//! to various chat-completion backends, so that agents can seamlessly switch
//! between them without modifying the core codebase.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to. Conversation state is
//! not part of the protocol: every request carries the full message list,
//! and the provider is expected to behave like a stateless object.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
