//! A small dependency injection container with request scopes.
//!
//! Bindings are registered on a [`Binder`], usually through [`Module`]s, and frozen into an
//! [`Injector`]. Values are resolved through a [`Resolver`], which may carry the
//! [`RequestScope`] of the request being served.
#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::must_use_candidate)]

#[macro_use]
pub(crate) mod macros;

pub mod binder;
pub mod erased;
pub mod error;
pub mod injector;
pub mod key;
pub mod scope;
pub mod store;

pub use binder::{Binder, Injectable, Module};
pub use erased::Erased;
pub use error::{Error, Result};
pub use injector::{Dependencies, Injector, Resolver};
pub use key::Key;
pub use scope::{RequestScope, ResetGuard, Scope, SingletonScope};
