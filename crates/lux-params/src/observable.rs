// SPDX-License-Identifier: Apache-2.0
//! Modified-flag wrapper and the whole-object update protocol.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Marker trait for parameter objects: serde-round-trippable value bags with
/// a stable endpoint name.
pub trait ParamObject:
    Serialize + DeserializeOwned + Default + Clone + PartialEq + Send + 'static
{
    /// Endpoint name this object is bound to (e.g. `camera`).
    fn endpoint() -> &'static str;
}

/// Failure while applying a remote update to a parameter object.
#[derive(Debug, Error)]
pub enum ParamError {
    /// The payload did not deserialize into the object's shape.
    #[error("deserialization failed: {0}")]
    Parse(#[from] serde_json::Error),
    /// The pre-update predicate rejected the parsed payload.
    #[error("validation rejected the update")]
    Rejected,
}

/// A parameter object plus its modified flag.
///
/// Mutation always goes through [`Observable::apply`] or
/// [`Observable::with_mut`]; both set the modified flag. The owner clears it
/// with [`Observable::clear_modified`] after notifying observers.
#[derive(Debug, Default)]
pub struct Observable<T> {
    value: T,
    modified: bool,
}

impl<T: ParamObject> Observable<T> {
    /// Wrap an initial value with the flag cleared.
    pub fn new(value: T) -> Self {
        Self {
            value,
            modified: false,
        }
    }

    /// Read access to the current value.
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Serialize the current state into a structured parameter map.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.value).unwrap_or(Value::Null)
    }

    /// Whether the value changed since the flag was last cleared.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Clear the modified flag. Called by the owner once observers saw the
    /// change.
    pub fn clear_modified(&mut self) {
        self.modified = false;
    }

    /// Mutate in place and set the modified flag.
    pub fn with_mut(&mut self, f: impl FnOnce(&mut T)) {
        f(&mut self.value);
        self.modified = true;
    }

    /// Apply a whole-object remote update.
    ///
    /// The payload is first parsed into a scratch copy and run through
    /// `predicate`; only if both succeed is the live value replaced. A
    /// rejected update leaves the current state untouched and the modified
    /// flag unchanged.
    pub fn apply(
        &mut self,
        payload: &Value,
        predicate: impl FnOnce(&T) -> bool,
    ) -> Result<(), ParamError> {
        let scratch: T = serde_json::from_value(payload.clone())?;
        if !predicate(&scratch) {
            return Err(ParamError::Rejected);
        }
        self.value = scratch;
        self.modified = true;
        Ok(())
    }
}
