//! Function Identity Module
//!
//! Derives the stable namespace used to scope cached results and version
//! tokens for a memoized callable, optionally combined with the identity
//! of the instance it is bound to.

use std::fmt;

use crate::error::{CacheError, Result};
use crate::memo::args::Signature;

// == Cache Identity ==
/// Capability a type can implement to define its own cache identity.
///
/// Two receivers with equal identity share cache entries; receivers with
/// differing identity get independent entries. The identity must be stable
/// across the lifetime of the cached data (a user id, not a heap address).
pub trait CacheIdentity {
    /// Returns the identity token used in cache namespaces and keys.
    fn cache_identity(&self) -> String;
}

// == Receiver ==
/// The bound receiver of a memoized method call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receiver {
    /// A bound instance, carrying its identity token
    Instance(String),
    /// A class/type reference, carrying the type name
    Class(String),
}

impl Receiver {
    /// Builds an instance receiver from a type implementing the explicit
    /// identity capability.
    pub fn instance<T: CacheIdentity + ?Sized>(obj: &T) -> Self {
        Receiver::Instance(obj.cache_identity())
    }

    /// Builds an instance receiver from a type's textual representation.
    ///
    /// This is the fallback for types without a [`CacheIdentity`]
    /// implementation; the explicit capability takes precedence when both
    /// are available.
    pub fn instance_repr<T: fmt::Debug + ?Sized>(obj: &T) -> Self {
        Receiver::Instance(format!("{:?}", obj))
    }

    /// Builds a class receiver from a type name.
    pub fn class(name: impl Into<String>) -> Self {
        Receiver::Class(name.into())
    }

    /// Returns the identity token carried by the receiver.
    pub(crate) fn token(&self) -> &str {
        match self {
            Receiver::Instance(token) => token,
            Receiver::Class(name) => name,
        }
    }
}

// == Function Name ==
/// The static identity of a memoized callable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnName {
    /// Module path of the callable
    module: String,
    /// Qualified name within the module ("func" or "Type.method")
    qualname: String,
}

impl FnName {
    /// Creates a function identity from a module path and qualified name.
    pub fn new(module: impl Into<String>, qualname: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            qualname: qualname.into(),
        }
    }

    /// Returns the sanitized `module.qualname` namespace.
    pub fn namespace(&self) -> String {
        sanitize(&format!("{}.{}", self.module, self.qualname))
    }
}

// == Sanitization ==
/// Strips control characters and whitespace so the namespace is a legal
/// part of a composite cache key. Only letters, digits, `_` and `.` are
/// retained.
pub(crate) fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
        .collect()
}

// == Namespace Derivation ==
/// Derives the function namespace and, when the callable is bound to an
/// instance, the instance namespace.
///
/// # Errors
/// A signature whose first parameter is `cls` requires a class receiver:
/// anything else is a usage error, because classmethod-style memoization
/// needs the class reference to compute the right scope.
pub(crate) fn function_namespace(
    name: &FnName,
    signature: &Signature,
    receiver: Option<&Receiver>,
) -> Result<(String, Option<String>)> {
    let namespace = name.namespace();

    let instance_namespace = match signature.first_param() {
        Some("cls") => {
            match receiver {
                Some(Receiver::Class(_)) => {}
                _ => {
                    return Err(CacheError::Usage(
                        "memoizing a classmethod-style callable requires the class \
                         as the receiver"
                            .to_string(),
                    ))
                }
            }
            // The class identity participates in the key, not the namespace
            None
        }
        Some("self") => receiver.map(|r| {
            sanitize(&format!(
                "{}.{}.{}",
                name.module, name.qualname, r.token()
            ))
        }),
        _ => None,
    };

    Ok((namespace, instance_namespace))
}
