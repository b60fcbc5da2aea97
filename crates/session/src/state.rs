use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Prefix of keys shared by every session of an app.
pub const KEY_PREFIX_APP: &str = "app:";
/// Prefix of keys shared by every session of a user.
pub const KEY_PREFIX_USER: &str = "user:";
/// Prefix of keys that live for one invocation and are never stored.
pub const KEY_PREFIX_TEMP: &str = "temp:";

/// A plain key-value view of session state.
pub type StateMap = BTreeMap<String, Value>;

/// Session state that remembers what changed.
///
/// Every [`State::set`] is recorded in a delta, which the runner attaches
/// to the event that caused the change. Storage applies deltas, it never
/// replaces state wholesale.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct State {
    values: StateMap,
    delta: StateMap,
}

impl State {
    /// Creates a state with initial values and an empty delta.
    #[inline]
    pub fn new(values: StateMap) -> Self {
        Self {
            values,
            delta: StateMap::new(),
        }
    }

    /// Returns the raw value of `key`.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns the value of `key` converted to `T`.
    ///
    /// A value that doesn't have the expected shape is treated as missing.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.values.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!("state key `{key}` has an unexpected shape: {err}");
                None
            }
        }
    }

    /// Returns `true` if `key` is present.
    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Sets `key` and records the change in the delta.
    pub fn set<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) {
        let key = key.into();
        let value = value.into();
        self.delta.insert(key.clone(), value.clone());
        self.values.insert(key, value);
    }

    /// Serializes `value` and sets it under `key`.
    pub fn set_serialized<K, V>(
        &mut self,
        key: K,
        value: &V,
    ) -> Result<(), serde_json::Error>
    where
        K: Into<String>,
        V: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value)?;
        self.set(key, value);
        Ok(())
    }

    /// Applies changes that were already recorded elsewhere, without
    /// touching the delta.
    pub fn apply_delta(&mut self, delta: &StateMap) {
        for (key, value) in delta {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Returns all values.
    #[inline]
    pub fn values(&self) -> &StateMap {
        &self.values
    }

    /// Returns the changes since creation or the last
    /// [`State::take_delta`].
    #[inline]
    pub fn delta(&self) -> &StateMap {
        &self.delta
    }

    /// Moves the recorded changes out.
    #[inline]
    pub fn take_delta(&mut self) -> StateMap {
        std::mem::take(&mut self.delta)
    }
}

/// A state delta split by scope, with `temp:` keys dropped and the
/// `app:`/`user:` prefixes stripped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScopedDelta {
    /// Changes to app-wide state.
    pub app: StateMap,
    /// Changes to user-wide state.
    pub user: StateMap,
    /// Changes to the session itself.
    pub session: StateMap,
}

impl ScopedDelta {
    /// Splits a delta by key prefix.
    pub fn split(delta: &StateMap) -> Self {
        let mut scoped = Self::default();
        for (key, value) in delta {
            if let Some(key) = key.strip_prefix(KEY_PREFIX_APP) {
                scoped.app.insert(key.to_owned(), value.clone());
            } else if let Some(key) = key.strip_prefix(KEY_PREFIX_USER) {
                scoped.user.insert(key.to_owned(), value.clone());
            } else if !key.starts_with(KEY_PREFIX_TEMP) {
                scoped.session.insert(key.clone(), value.clone());
            }
        }
        scoped
    }
}

/// Builds the state a session sees: its own keys plus the shared app and
/// user keys under their prefixes.
pub(crate) fn merge_scopes(
    app: &StateMap,
    user: &StateMap,
    session: &StateMap,
) -> StateMap {
    let mut merged = session.clone();
    for (key, value) in app {
        merged.insert(format!("{KEY_PREFIX_APP}{key}"), value.clone());
    }
    for (key, value) in user {
        merged.insert(format!("{KEY_PREFIX_USER}{key}"), value.clone());
    }
    merged
}

/// Drops `temp:` keys from a delta.
pub(crate) fn strip_temp(delta: &mut StateMap) {
    delta.retain(|key, _| !key.starts_with(KEY_PREFIX_TEMP));
}
