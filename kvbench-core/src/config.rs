use crate::constants::*;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use thiserror::Error;

/// The four kinds of store operation a session can benchmark.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    /// Single-key write (`SET`)
    Set,
    /// Single-key read (`GET`)
    Get,
    /// Hash-field write (`HSET`)
    HSet,
    /// Hash-field read (`HGET`)
    HGet,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [
        OperationKind::Set,
        OperationKind::Get,
        OperationKind::HSet,
        OperationKind::HGet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Set => "SET",
            OperationKind::Get => "GET",
            OperationKind::HSet => "HSET",
            OperationKind::HGet => "HGET",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown operation type: {0}")]
pub struct UnknownOperation(pub String);

impl FromStr for OperationKind {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "set" => Ok(OperationKind::Set),
            "get" => Ok(OperationKind::Get),
            "hset" => Ok(OperationKind::HSet),
            "hget" => Ok(OperationKind::HGet),
            _ => Err(UnknownOperation(s.to_string())),
        }
    }
}

/// A loosely-typed numeric field as it arrives from a caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Int(i64),
    Float(f64),
    Text(String),
    /// Booleans, objects, arrays. Accepted here so validation can report them.
    #[serde(skip_serializing)]
    Other(IgnoredAny),
}

impl RawNumber {
    fn coerce(&self) -> Option<i64> {
        match self {
            RawNumber::Int(v) => Some(*v),
            RawNumber::Float(v) if v.is_finite() && v.fract() == 0. => Some(*v as i64),
            RawNumber::Float(_) => None,
            RawNumber::Text(s) => s.trim().parse().ok(),
            RawNumber::Other(_) => None,
        }
    }
}

impl From<i64> for RawNumber {
    fn from(v: i64) -> Self {
        RawNumber::Int(v)
    }
}

impl From<&str> for RawNumber {
    fn from(v: &str) -> Self {
        RawNumber::Text(v.to_string())
    }
}

/// Caller-supplied configuration before validation. Every field is optional
/// and missing fields take their documented default.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawConfig {
    pub host: Option<String>,
    pub port: Option<RawNumber>,
    pub password: Option<String>,
    pub database: Option<RawNumber>,
    pub test_duration: Option<RawNumber>,
    pub concurrency: Option<RawNumber>,
    pub key_size: Option<RawNumber>,
    pub value_size: Option<RawNumber>,
    pub test_types: Option<Vec<String>>,
}

/// Every problem found in a [`RawConfig`]. Never partial: a config either
/// validates completely or yields this full list.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid configuration: {}", .0.join("; "))]
pub struct ValidationErrors(pub Vec<String>);

impl ValidationErrors {
    pub fn errors(&self) -> &[String] {
        &self.0
    }
}

/// Normalized, validated benchmark configuration.
///
/// Only obtainable through [`RawConfig::validate`] (or [`Default`]), so every
/// numeric field is within bounds and the operation list is non-empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchConfig {
    host: String,
    port: u16,
    #[serde(skip_serializing)]
    password: Option<String>,
    database: u8,
    test_duration: u32,
    concurrency: u32,
    key_size: usize,
    value_size: usize,
    test_types: Vec<OperationKind>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            password: None,
            database: DEFAULT_DATABASE,
            test_duration: DEFAULT_TEST_DURATION_SECS,
            concurrency: DEFAULT_CONCURRENCY,
            key_size: DEFAULT_KEY_SIZE,
            value_size: DEFAULT_VALUE_SIZE,
            test_types: OperationKind::ALL.to_vec(),
        }
    }
}

impl BenchConfig {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn database(&self) -> u8 {
        self.database
    }

    /// Test duration in seconds. Only used to derive the iteration budget.
    pub fn test_duration(&self) -> u32 {
        self.test_duration
    }

    /// Advisory only. Operations are always issued one at a time.
    pub fn concurrency(&self) -> u32 {
        self.concurrency
    }

    pub fn key_size(&self) -> usize {
        self.key_size
    }

    pub fn value_size(&self) -> usize {
        self.value_size
    }

    pub fn test_types(&self) -> &[OperationKind] {
        &self.test_types
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Total iterations for the whole session.
    pub fn total_iterations(&self) -> u64 {
        u64::from(self.test_duration) * ITERATIONS_PER_SECOND
    }

    /// Iterations per operation type. The remainder of the floor division is dropped.
    pub fn iterations_per_operation(&self) -> u64 {
        self.total_iterations() / self.test_types.len().max(1) as u64
    }
}

impl RawConfig {
    /// Validate and normalize. Pure: no side effects, no partial results.
    pub fn validate(&self) -> Result<BenchConfig, ValidationErrors> {
        let mut errors = vec![];

        let host = match self.host.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_HOST.to_string(),
            Some(host) => host.to_string(),
        };

        let port = field(&mut errors, "port", &self.port, PORT_RANGE, DEFAULT_PORT.into());
        let database = field(
            &mut errors,
            "database",
            &self.database,
            DATABASE_RANGE,
            DEFAULT_DATABASE.into(),
        );
        let test_duration = field(
            &mut errors,
            "testDuration",
            &self.test_duration,
            TEST_DURATION_RANGE,
            DEFAULT_TEST_DURATION_SECS.into(),
        );
        let concurrency = field(
            &mut errors,
            "concurrency",
            &self.concurrency,
            CONCURRENCY_RANGE,
            DEFAULT_CONCURRENCY.into(),
        );
        let key_size = field(
            &mut errors,
            "keySize",
            &self.key_size,
            KEY_SIZE_RANGE,
            DEFAULT_KEY_SIZE as i64,
        );
        let value_size = field(
            &mut errors,
            "valueSize",
            &self.value_size,
            VALUE_SIZE_RANGE,
            DEFAULT_VALUE_SIZE as i64,
        );

        let test_types = match &self.test_types {
            None => OperationKind::ALL.to_vec(),
            Some(names) if names.is_empty() => {
                errors.push("at least one test operation type must be selected".to_string());
                vec![]
            }
            Some(names) => {
                let mut kinds = Vec::with_capacity(names.len());
                for name in names {
                    match name.parse::<OperationKind>() {
                        Ok(kind) if !kinds.contains(&kind) => kinds.push(kind),
                        Ok(_) => {}
                        Err(err) => errors.push(err.to_string()),
                    }
                }
                kinds
            }
        };

        if !errors.is_empty() {
            return Err(ValidationErrors(errors));
        }

        // NOTE: Range checks above guarantee these conversions succeed.
        Ok(BenchConfig {
            host,
            port: port as u16,
            password: self.password.clone().filter(|p| !p.is_empty()),
            database: database as u8,
            test_duration: test_duration as u32,
            concurrency: concurrency as u32,
            key_size: key_size as usize,
            value_size: value_size as usize,
            test_types,
        })
    }
}

fn field(
    errors: &mut Vec<String>,
    name: &str,
    raw: &Option<RawNumber>,
    range: RangeInclusive<i64>,
    default: i64,
) -> i64 {
    let Some(raw) = raw else {
        return default;
    };

    match raw.coerce() {
        Some(value) if range.contains(&value) => value,
        Some(value) => {
            errors.push(format!(
                "{name} must be between {} and {} (got {value})",
                range.start(),
                range.end()
            ));
            default
        }
        None => {
            match raw {
                RawNumber::Other(_) => errors.push(format!("{name} must be a number")),
                _ => errors.push(format!("{name} must be a number (got {raw:?})")),
            }
            default
        }
    }
}
