//! Application configuration.

use std::collections::BTreeMap;
use std::ffi::OsString;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// A flat key-value configuration, bound in the injector as a singleton.
///
/// Keys are conventionally upper case, e.g. `DB_CONNECTION_STRING`. A fresh configuration holds
/// the defaults `DEBUG = false` and `TESTING = false`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config(BTreeMap<String, Value>);

fn unicode_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
}

impl Default for Config {
    fn default() -> Self {
        let mut values = BTreeMap::new();
        values.insert("DEBUG".to_owned(), Value::Bool(false));
        values.insert("TESTING".to_owned(), Value::Bool(false));
        Self(values)
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads every `{prefix}_KEY` environment variable into a configuration.
    ///
    /// See [`from_prefixed_vars`](Self::from_prefixed_vars) for how values are interpreted.
    /// Variables whose name or value is not valid Unicode are skipped.
    pub fn from_prefixed_env(prefix: &str) -> Self {
        Self::from_prefixed_vars(prefix, unicode_vars(std::env::vars_os()))
    }

    /// Reads every `{prefix}_KEY` pair of `vars` into a configuration, on top of the defaults.
    ///
    /// Each value is parsed as JSON so that `true` or `30` keep their type; anything that is not
    /// valid JSON is kept as a string.
    pub fn from_prefixed_vars<I, K, V>(prefix: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let prefix = format!("{prefix}_");
        let mut config = Self::default();
        for (name, raw) in vars {
            let Some(key) = name.as_ref().strip_prefix(&prefix) else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            let raw = raw.into();
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            config.insert(key, value);
        }
        config
    }

    /// Sets `key`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Merges `values` into the configuration; later values win.
    pub fn update<I, K, V>(&mut self, values: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in values {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Deserializes the value of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingSetting`] if `key` is not set, and [`Error::InvalidSetting`] if
    /// its value does not deserialize into `T`.
    pub fn get_as<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let value = self
            .get(key)
            .ok_or_else(|| Error::MissingSetting(key.to_owned()))?;
        T::deserialize(value).map_err(|source| Error::InvalidSetting {
            key: key.to_owned(),
            source,
        })
    }

    /// Returns the value of `key` if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns `true` when `DEBUG` is set to `true`.
    pub fn is_debug(&self) -> bool {
        self.get("DEBUG").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for Config {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<K, V> Extend<(K, V)> for Config
where
    K: Into<String>,
    V: Into<Value>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.update(iter);
    }
}
