//! Argument Canonicalization Module
//!
//! Normalizes mixed positional/named call arguments onto a function's
//! declared parameter order, so every spelling of the same call produces
//! the same canonical form and therefore the same cache key.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{CacheError, Result};
use crate::memo::identity::Receiver;

// == Signature ==
/// The declared parameters of a memoized callable, in order.
///
/// A first parameter named `self` or `cls` marks a receiver-taking
/// callable; its value is supplied through [`CallArgs::with_receiver`]
/// rather than as a positional argument.
#[derive(Debug, Clone)]
pub struct Signature {
    params: Vec<Param>,
}

#[derive(Debug, Clone)]
struct Param {
    name: String,
    default: Option<Value>,
}

impl Signature {
    /// Creates a signature from parameter names in declaration order.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            params: names
                .into_iter()
                .map(|name| Param {
                    name: name.into(),
                    default: None,
                })
                .collect(),
        }
    }

    /// Declares a default value for a named parameter.
    ///
    /// Has no effect if the parameter is not declared.
    pub fn with_default(mut self, name: &str, value: impl Into<Value>) -> Self {
        if let Some(param) = self.params.iter_mut().find(|p| p.name == name) {
            param.default = Some(value.into());
        }
        self
    }

    /// Returns the name of the first declared parameter.
    pub(crate) fn first_param(&self) -> Option<&str> {
        self.params.first().map(|p| p.name.as_str())
    }
}

// == Call Args ==
/// The arguments of one memoized call: positional values, named values
/// and, for bound methods, the receiver.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    positional: Vec<Value>,
    named: BTreeMap<String, Value>,
    receiver: Option<Receiver>,
}

impl CallArgs {
    /// Creates an empty argument set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Adds a named argument.
    pub fn named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    /// Attaches the bound receiver of the call.
    pub fn with_receiver(mut self, receiver: Receiver) -> Self {
        self.receiver = Some(receiver);
        self
    }

    /// Returns the attached receiver, if any.
    pub fn receiver(&self) -> Option<&Receiver> {
        self.receiver.as_ref()
    }

    /// Returns the positional argument values in call order.
    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    /// Returns the named argument values, sorted by name.
    pub fn named_args(&self) -> &BTreeMap<String, Value> {
        &self.named
    }

    /// Whether the set carries no argument values (a receiver may still
    /// be attached).
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

// == Canonicalization ==
/// Maps supplied arguments onto the declared parameter order.
///
/// Named arguments bind to their declared parameter; remaining positional
/// values fill the leftover slots in order; unsupplied parameters fall
/// back to their declared default, else JSON null. A leading `self`/`cls`
/// parameter is replaced by the receiver identity. Excess positional
/// values are appended in call order; excess named values are returned
/// sorted by name.
///
/// # Errors
/// Fails fast when the signature declares a receiver parameter but the
/// call supplies none, or when a `cls` parameter is given a non-class
/// receiver, rather than silently producing a wrong key.
pub(crate) fn canonicalize(
    signature: &Signature,
    args: &CallArgs,
) -> Result<(Vec<Value>, BTreeMap<String, Value>)> {
    let mut ordered = Vec::with_capacity(signature.params.len());
    let mut remaining = args.named.clone();
    let mut pos_idx = 0;

    for (i, param) in signature.params.iter().enumerate() {
        if i == 0 && (param.name == "self" || param.name == "cls") {
            let receiver = args.receiver.as_ref().ok_or_else(|| {
                CacheError::Usage(format!(
                    "signature declares `{}` but the call carries no receiver",
                    param.name
                ))
            })?;
            if param.name == "cls" && !matches!(receiver, Receiver::Class(_)) {
                return Err(CacheError::Usage(
                    "memoizing a classmethod-style callable requires the class \
                     as the receiver"
                        .to_string(),
                ));
            }
            ordered.push(Value::String(receiver.token().to_string()));
            continue;
        }

        let value = if let Some(named) = remaining.remove(&param.name) {
            named
        } else if pos_idx < args.positional.len() {
            let value = args.positional[pos_idx].clone();
            pos_idx += 1;
            value
        } else if let Some(default) = &param.default {
            default.clone()
        } else {
            Value::Null
        };
        ordered.push(value);
    }

    // Variadic tail: excess positional values keep their call order
    ordered.extend(args.positional[pos_idx..].iter().cloned());

    Ok((ordered, remaining))
}
