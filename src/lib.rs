//! A host/engine abstraction layer for driving text-to-speech backends over
//! a line-oriented stdio protocol.
//!
//! Two sides share the [`protocol`] module: a [`host::Session`] spawns and
//! drives an engine subprocess, and a [`stub::EngineStub`] is what that
//! subprocess links against to implement the other end. A backend author
//! only needs to implement [`stub::Backend`] and call
//! [`stub::run_engine_main`]; an application only needs [`host::Session`].

pub mod host;
pub mod protocol;
pub mod stub;
