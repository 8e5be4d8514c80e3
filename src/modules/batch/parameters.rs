use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::{AppError, Result};

/// Parameter added by [`RequestedAtIncrementer`]
pub const REQUESTED_AT: &str = "requestedAt";

/// Format of the `requestedAt` value (local time, nanosecond precision)
const REQUESTED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9f";

/// Ordered job parameters.
///
/// Two launches with equal parameters address the same job instance, see
/// [`JobParameters::identity_key`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobParameters(BTreeMap<String, String>);

impl JobParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Parse a parameter, `Ok(None)` when absent
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|e| {
                    AppError::Validation(format!("Invalid job parameter {}='{}': {}", key, raw, e))
                })
            })
            .transpose()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical `k=v&k=v` form, keys in order
    pub fn identity_key(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Build from `key=value` strings as given on the command line
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut params = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                AppError::Validation(format!("Job parameter '{}' must be key=value", pair))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(AppError::Validation(format!(
                    "Job parameter '{}' has an empty key",
                    pair
                )));
            }
            params.insert(key, value.trim());
        }
        Ok(params)
    }
}

impl From<BTreeMap<String, String>> for JobParameters {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl From<JobParameters> for BTreeMap<String, String> {
    fn from(params: JobParameters) -> Self {
        params.0
    }
}

impl fmt::Display for JobParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.identity_key().replace('&', ", "))
    }
}

/// Derives the parameters of the next run from the requested ones
pub trait JobParametersIncrementer: Send + Sync {
    fn next(&self, params: JobParameters) -> JobParameters;
}

/// Adds `requestedAt` when the caller did not supply one, so repeated
/// launches of the same job become distinct instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestedAtIncrementer;

impl JobParametersIncrementer for RequestedAtIncrementer {
    fn next(&self, mut params: JobParameters) -> JobParameters {
        if !params.contains(REQUESTED_AT) {
            let now = chrono::Local::now().format(REQUESTED_AT_FORMAT).to_string();
            params.insert(REQUESTED_AT, now);
        }
        params
    }
}
