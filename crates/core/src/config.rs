//! Core runtime configuration.
//!
//! [`CoreConfig`] is resolved once at process startup and then turned into a
//! [`ConversionEngine`]; conversions never read process-wide environment variables, which keeps
//! concurrent conversions and test harnesses consistent. Per-call switches live in
//! [`ConvertOptions`].

use crate::engine::ConversionEngine;
use crate::{ConfigError, ConfigResult};
use chrono::{FixedOffset, Offset, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use terminology::{
    CodeSystemTable, SnapshotBackend, TerminologyResolver, DEFAULT_LOOKUP_TIMEOUT,
};

/// Options for one conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Check emitted codes against the terminology backend (informational diagnostics only).
    pub validate_terminology: bool,
    /// Offset applied to timestamps that carry a time but no zone.
    pub default_offset: FixedOffset,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            validate_terminology: false,
            default_offset: utc(),
        }
    }
}

impl ConvertOptions {
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate_terminology = validate;
        self
    }

    pub fn with_default_offset(mut self, offset: FixedOffset) -> Self {
        self.default_offset = offset;
        self
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    terminology_snapshot: Option<PathBuf>,
    lookup_timeout: Duration,
    default_offset: FixedOffset,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            terminology_snapshot: None,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            default_offset: utc(),
        }
    }
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(
        terminology_snapshot: Option<PathBuf>,
        lookup_timeout: Duration,
        default_offset: FixedOffset,
    ) -> ConfigResult<Self> {
        if lookup_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "lookup_timeout",
                reason: "must be greater than zero".into(),
            });
        }

        Ok(Self {
            terminology_snapshot,
            lookup_timeout,
            default_offset,
        })
    }

    pub fn terminology_snapshot(&self) -> Option<&Path> {
        self.terminology_snapshot.as_deref()
    }

    pub fn lookup_timeout(&self) -> Duration {
        self.lookup_timeout
    }

    pub fn default_offset(&self) -> FixedOffset {
        self.default_offset
    }

    /// Options carrying the configured default offset.
    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions::default().with_default_offset(self.default_offset)
    }

    /// Builds an engine over the built-in code-system table, backed by the snapshot if one is
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Terminology`] if the snapshot cannot be read or parsed.
    pub fn build_engine(&self) -> ConfigResult<ConversionEngine> {
        let mut resolver = TerminologyResolver::new(CodeSystemTable::builtin());
        if let Some(path) = &self.terminology_snapshot {
            let backend = SnapshotBackend::from_file(path)?;
            tracing::info!(
                path = %path.display(),
                systems = backend.systems().count(),
                "terminology snapshot loaded"
            );
            resolver = resolver.with_backend(Arc::new(backend), self.lookup_timeout);
        }
        Ok(ConversionEngine::new(Arc::new(resolver)))
    }
}

pub(crate) fn utc() -> FixedOffset {
    Utc.fix()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the lookup timeout (milliseconds) from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_LOOKUP_TIMEOUT`].
pub fn lookup_timeout_from_env_value(value: Option<String>) -> ConfigResult<Duration> {
    let Some(value) = non_blank(value) else {
        return Ok(DEFAULT_LOOKUP_TIMEOUT);
    };
    let millis = value
        .parse::<u64>()
        .map_err(|err| ConfigError::InvalidValue {
            name: "lookup timeout",
            reason: format!("'{value}' is not a number of milliseconds: {err}"),
        })?;
    if millis == 0 {
        return Err(ConfigError::InvalidValue {
            name: "lookup timeout",
            reason: "must be greater than zero".into(),
        });
    }
    Ok(Duration::from_millis(millis))
}

/// Parse the default UTC offset from an optional string value.
///
/// Accepts `Z`, `+HH:MM` and `+HHMM`. If `value` is `None` or empty/whitespace, returns UTC.
pub fn utc_offset_from_env_value(value: Option<String>) -> ConfigResult<FixedOffset> {
    let Some(value) = non_blank(value) else {
        return Ok(utc());
    };
    if value.eq_ignore_ascii_case("z") {
        return Ok(utc());
    }
    hl7::datetime::parse_offset(&value).ok_or_else(|| ConfigError::InvalidValue {
        name: "default UTC offset",
        reason: format!("'{value}' is not an offset like +02:00"),
    })
}

/// Parse the terminology snapshot path from an optional string value.
///
/// If `value` is `None` or empty/whitespace, there is no snapshot. Otherwise it must name an
/// existing regular file.
pub fn snapshot_path_from_env_value(value: Option<String>) -> ConfigResult<Option<PathBuf>> {
    let Some(value) = non_blank(value) else {
        return Ok(None);
    };
    let path = PathBuf::from(value);
    if !path.is_file() {
        return Err(ConfigError::InvalidValue {
            name: "terminology snapshot",
            reason: format!("{} is not a file", path.display()),
        });
    }
    Ok(Some(path))
}
