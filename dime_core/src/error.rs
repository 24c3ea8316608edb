//! Error types.

use std::error::Error as StdError;
use std::sync::Arc;

use crate::key::Key;

/// [`Error`] is an error that can be raised while resolving a binding.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Nothing is bound to the key.
    Unbound(Key),
    /// The binding only lives inside a request, but no request scope was supplied.
    OutsideRequest(Key),
    /// The binding is a request local, but the host did not provide it to the scope.
    MissingLocal(Key),
    /// A provider asked, directly or indirectly, for the key it is producing.
    ///
    /// The path lists the keys being resolved, ending with the key that closed the cycle.
    Cycle(Vec<Key>),
    /// A scope or provider produced a value of another type than the one requested.
    TypeMismatch { expected: Key, found: Key },
    Other(Arc<dyn StdError + Send + Sync + 'static>),
}

impl Error {
    pub fn unbound<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self::Unbound(Key::of::<T>())
    }

    pub fn other<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self::Other(Arc::from(err.into()))
    }

    pub const fn is_unbound(&self) -> bool {
        matches!(self, Self::Unbound(_))
    }

    pub fn is_unbound_for<T>(&self) -> bool
    where
        T: ?Sized + 'static,
    {
        matches!(self, Self::Unbound(key) if key.is::<T>())
    }

    pub const fn is_outside_request(&self) -> bool {
        matches!(self, Self::OutsideRequest(_))
    }

    pub const fn is_missing_local(&self) -> bool {
        matches!(self, Self::MissingLocal(_))
    }

    pub const fn is_cycle(&self) -> bool {
        matches!(self, Self::Cycle(_))
    }

    pub const fn is_other(&self) -> bool {
        matches!(self, Self::Other(_))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unbound(key) => write!(f, "type `{key}` is not bound"),
            Self::OutsideRequest(key) => {
                write!(f, "type `{key}` is request scoped but no request is active")
            }
            Self::MissingLocal(key) => {
                write!(f, "type `{key}` was not provided to the current request")
            }
            Self::Cycle(path) => {
                f.write_str("cyclic dependency: ")?;
                for (i, key) in path.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" -> ")?;
                    }
                    write!(f, "`{key}`")?;
                }
                Ok(())
            }
            Self::TypeMismatch { expected, found } => {
                write!(f, "expected a value of type `{expected}`, found `{found}`")
            }
            Self::Other(error) => std::fmt::Display::fmt(error, f),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Other(error) => Some(&**error),
            _ => None,
        }
    }
}

/// [`Result`] is an alias to [`core::result::Result`] with [`Error`] as the
/// default error type.
pub type Result<T, E = Error> = core::result::Result<T, E>;
