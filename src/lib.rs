//! Stable symbol pointers and navigation requests for markdown documents.
//!
//! A [`symbol::Symbol`] is a header or link label at one document revision.
//! [`pointer::Pointer`]s re-find a symbol after edits, reparses and renames,
//! first by mapping its range through the document's edit log and then by
//! searching for the nearest node with the same anchor.
//! [`navigation::NavigationRequest`]s describe where a caret should go and
//! refuse to exist when that place does not.
//!
//! All tree access happens under a [`workspace::ReadGuard`]. Long scans give
//! up with [`workspace::Cancelled`] when a writer is waiting and are retried
//! from scratch.

pub mod config;
pub mod error;
pub mod factory;
pub mod navigation;
pub mod pointer;
pub mod project;
pub mod range;
pub mod runtime;
pub mod symbol;
pub mod tree;
pub mod usage;
pub mod workspace;
