//! Configuration: retry policy, connection parameters, and the `resql.toml` file
//!
//! Nothing here reads process state on its own. The CLI loads a file, overlays
//! environment variables it passes in explicitly, and hands the resulting
//! values to the executor's constructor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "resql.toml";

/// Environment variable names understood by [`ResqlConfig::apply_env`].
pub mod env {
    /// Server host name or IP
    pub const HOST: &str = "DB_HOST";
    /// Server TCP port
    pub const PORT: &str = "DB_PORT";
    /// Login user
    pub const USER: &str = "DB_USER";
    /// Login password
    pub const PASSWORD: &str = "DB_PASSWORD";
    /// Default schema
    pub const DATABASE: &str = "DB_NAME";
    /// Connection character set
    pub const CHARSET: &str = "DB_CHARSET";
    /// Retry bound
    pub const MAX_ATTEMPTS: &str = "DB_MAX_ATTEMPTS";
    /// First backoff delay in milliseconds
    pub const BASE_DELAY_MS: &str = "DB_BASE_DELAY_MS";
    /// Backoff ceiling in milliseconds
    pub const MAX_DELAY_MS: &str = "DB_MAX_DELAY_MS";
}

// ============================================================================
// Retry Policy
// ============================================================================

/// Bounded exponential backoff policy for one executor.
///
/// Attempt `i` (0-based) that fails transiently is followed by a sleep of
/// `base_delay * 2^i`, capped at `max_delay` when one is set.
///
/// # Example
/// ```
/// use resql_core::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new()
///     .with_max_attempts(3)
///     .with_base_delay(Duration::from_millis(100))
///     .with_max_delay(Duration::from_millis(300));
///
/// assert_eq!(policy.delay_for(2), Duration::from_millis(300));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first (must be at least 1)
    pub max_attempts: u32,
    /// Delay after the first failed attempt (must be non-zero)
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Some(Duration::from_secs(2)),
        }
    }
}

impl RetryPolicy {
    /// Create a RetryPolicy with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Set the total number of attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the base delay for exponential backoff
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Set the delay ceiling
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Remove the delay ceiling
    pub fn without_max_delay(mut self) -> Self {
        self.max_delay = None;
        self
    }

    /// Check the invariants: at least one attempt, a non-zero base delay, and
    /// a ceiling no lower than the base delay.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::config("max_attempts must be at least 1"));
        }
        if self.base_delay.is_zero() {
            return Err(Error::config("base_delay must be greater than zero"));
        }
        if let Some(max) = self.max_delay {
            if max < self.base_delay {
                return Err(Error::config(format!(
                    "max_delay ({:?}) must not be less than base_delay ({:?})",
                    max, self.base_delay
                )));
            }
        }
        Ok(())
    }

    /// Backoff delay after the failed attempt with 0-based index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        // 2^31 already saturates any realistic base delay
        let multiplier = 1u32 << attempt.min(31);
        let delay = self.base_delay.saturating_mul(multiplier);
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }

    /// The full delay schedule a caller can observe before exhaustion:
    /// one delay for each attempt except the last.
    pub fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts.saturating_sub(1)).map(move |attempt| self.delay_for(attempt))
    }
}

/// File/env representation of a [`RetryPolicy`], in milliseconds.
///
/// Omitted fields take the [`Default`] values whether or not the `[retry]`
/// table is present. `max_delay_ms = 0` means no ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First backoff delay in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Backoff ceiling in milliseconds; `None` (written as `0`) for no ceiling
    #[serde(default = "default_max_delay_ms", with = "ceiling_ms")]
    pub max_delay_ms: Option<u64>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> Option<u64> {
    Some(2000)
}

/// `0` on disk is "no ceiling", so the absent-field default stays distinct.
mod ceiling_ms {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.unwrap_or(0))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        let ms = u64::deserialize(deserializer)?;
        Ok((ms > 0).then_some(ms))
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetrySettings {
    /// Convert to a validated [`RetryPolicy`]
    pub fn to_policy(&self) -> Result<RetryPolicy> {
        let policy = RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: self.max_delay_ms.map(Duration::from_millis),
        };
        policy.validate()?;
        Ok(policy)
    }
}

// ============================================================================
// Connection Parameters
// ============================================================================

/// How the executor decides whether a handle can be reused after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LivenessCheck {
    /// Trust the connection's own open/closed flag
    #[default]
    Flag,
    /// Also issue a ping before reusing a handle that saw a transient failure
    Ping,
}

/// Parameters a connection provider needs to open a handle.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Server host name or IP address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server TCP port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Login user
    #[serde(default = "default_user")]
    pub user: String,
    /// Login password
    #[serde(default)]
    pub password: String,
    /// Default schema, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Connection character set
    #[serde(default = "default_charset")]
    pub charset: String,
    /// Connect timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3306
}

fn default_user() -> String {
    "root".to_string()
}

fn default_charset() -> String {
    "utf8mb4".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: String::new(),
            database: None,
            charset: default_charset(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl ConnectionConfig {
    /// Connect timeout as a Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// `user@host:port/database`, without the password
    pub fn display_target(&self) -> String {
        match &self.database {
            Some(db) => format!("{}@{}:{}/{}", self.user, self.host, self.port, db),
            None => format!("{}@{}:{}", self.user, self.host, self.port),
        }
    }

    /// Check that host, user and charset are present
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("connection host must not be empty"));
        }
        if self.user.trim().is_empty() {
            return Err(Error::config("connection user must not be empty"));
        }
        if self.charset.trim().is_empty() {
            return Err(Error::config("connection charset must not be empty"));
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("charset", &self.charset)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .finish()
    }
}

// ============================================================================
// Config File
// ============================================================================

/// Top-level configuration loaded from `resql.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResqlConfig {
    /// Connection parameters
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Retry settings
    #[serde(default)]
    pub retry: RetrySettings,
    /// Handle reuse check
    #[serde(default)]
    pub liveness: LivenessCheck,
}

impl ResqlConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# resql configuration
#
# Environment variables DB_HOST, DB_PORT, DB_USER, DB_PASSWORD, DB_NAME,
# DB_CHARSET, DB_MAX_ATTEMPTS, DB_BASE_DELAY_MS and DB_MAX_DELAY_MS
# override the values below.

# How to decide whether a connection can be reused after a failure:
#   "flag" = trust the driver's open/closed state (default)
#   "ping" = also ping the server before reuse
liveness = "flag"

[connection]
host = "127.0.0.1"
port = 3306
user = "root"
password = ""
# database = "analytics"
charset = "utf8mb4"
connect_timeout_ms = 5000

[retry]
# Total attempts including the first one
max_attempts = 3
# Delay after the first failure; doubles after each further failure
base_delay_ms = 100
# Ceiling for any single delay (0 = no ceiling)
max_delay_ms = 2000
"#
    }

    /// Parse config from TOML text and validate it.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ResqlConfig = toml::from_str(content)
            .map_err(|e| Error::config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Io {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config { reason } => Error::Config {
                reason: format!("{}: {}", path.display(), reason),
            },
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `true` if the file was created.
    pub fn write_default_if_missing(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        std::fs::write(path, Self::default_toml()).map_err(|e| Error::Io {
            reason: format!("failed to write config file '{}': {}", path.display(), e),
        })?;
        Ok(true)
    }

    /// Overlay `DB_*` variables from the given pairs.
    ///
    /// Unknown keys are ignored. A numeric variable that does not parse is a
    /// config error rather than a silent fallback. `DB_MAX_DELAY_MS` set to an
    /// empty string or `0` removes the ceiling.
    pub fn apply_env<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let value: String = value.into();
            match key.as_ref() {
                env::HOST => self.connection.host = value,
                env::PORT => self.connection.port = parse_env(env::PORT, &value)?,
                env::USER => self.connection.user = value,
                env::PASSWORD => self.connection.password = value,
                env::DATABASE => {
                    self.connection.database = if value.is_empty() { None } else { Some(value) }
                }
                env::CHARSET => self.connection.charset = value,
                env::MAX_ATTEMPTS => {
                    self.retry.max_attempts = parse_env(env::MAX_ATTEMPTS, &value)?
                }
                env::BASE_DELAY_MS => {
                    self.retry.base_delay_ms = parse_env(env::BASE_DELAY_MS, &value)?
                }
                env::MAX_DELAY_MS => {
                    self.retry.max_delay_ms = if value.is_empty() {
                        None
                    } else {
                        let ms: u64 = parse_env(env::MAX_DELAY_MS, &value)?;
                        (ms > 0).then_some(ms)
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Validate connection parameters and the retry policy
    pub fn validate(&self) -> Result<()> {
        self.connection.validate()?;
        self.retry.to_policy()?;
        Ok(())
    }

    /// The validated retry policy
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        self.retry.to_policy()
    }

    /// Serialize this config to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("failed to serialize config: {}", e)))
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::config(format!("{}='{}': {}", name, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    // ========================================================================
    // Retry Policy
    // ========================================================================

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, ms(100));
        assert_eq!(policy.max_delay, Some(ms(2000)));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_retry_policy_builder() {
        let policy = RetryPolicy::new()
            .with_max_attempts(5)
            .with_base_delay(ms(20))
            .with_max_delay(ms(200));

        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, ms(20));
        assert_eq!(policy.max_delay, Some(ms(200)));
        assert_eq!(RetryPolicy::no_retry().max_attempts, 1);
        assert_eq!(policy.without_max_delay().max_delay, None);
    }

    #[test]
    fn test_retry_policy_validation() {
        assert!(RetryPolicy::new().with_max_attempts(0).validate().is_err());
        assert!(RetryPolicy::new().with_base_delay(Duration::ZERO).validate().is_err());
        assert!(RetryPolicy::new()
            .with_base_delay(ms(500))
            .with_max_delay(ms(100))
            .validate()
            .is_err());
        assert!(RetryPolicy::new()
            .with_base_delay(ms(100))
            .with_max_delay(ms(100))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_delay_uncapped() {
        let policy = RetryPolicy::new().with_base_delay(ms(100)).without_max_delay();
        assert_eq!(policy.delay_for(0), ms(100));
        assert_eq!(policy.delay_for(1), ms(200));
        assert_eq!(policy.delay_for(2), ms(400));
    }

    #[test]
    fn test_delay_capped() {
        let policy = RetryPolicy::new()
            .with_base_delay(ms(100))
            .with_max_delay(ms(300));
        assert_eq!(policy.delay_for(0), ms(100));
        assert_eq!(policy.delay_for(1), ms(200));
        assert_eq!(policy.delay_for(2), ms(300));
        assert_eq!(policy.delay_for(3), ms(300));
    }

    #[test]
    fn test_delay_does_not_overflow() {
        let policy = RetryPolicy::new()
            .with_base_delay(Duration::from_secs(u64::MAX / 2))
            .without_max_delay();
        assert_eq!(policy.delay_for(1000), Duration::MAX);
    }

    #[test]
    fn test_schedule_has_one_delay_per_retry() {
        let policy = RetryPolicy::new()
            .with_max_attempts(4)
            .with_base_delay(ms(10))
            .without_max_delay();
        assert_eq!(
            policy.schedule().collect::<Vec<_>>(),
            vec![ms(10), ms(20), ms(40)]
        );
        assert_eq!(RetryPolicy::no_retry().schedule().count(), 0);
    }

    proptest! {
        #[test]
        fn prop_delay_monotone_and_capped(
            base in 1u64..10_000,
            cap_extra in 0u64..100_000,
            attempt in 0u32..64,
        ) {
            let cap = base + cap_extra;
            let policy = RetryPolicy::new()
                .with_base_delay(ms(base))
                .with_max_delay(ms(cap));
            let d = policy.delay_for(attempt);
            prop_assert!(d <= ms(cap));
            prop_assert!(d >= ms(base));
            prop_assert!(policy.delay_for(attempt + 1) >= d);
        }
    }

    // ========================================================================
    // Config File
    // ========================================================================

    #[test]
    fn test_default_toml_parses_to_default() {
        let config = ResqlConfig::from_toml_str(ResqlConfig::default_toml()).unwrap();
        assert_eq!(config, ResqlConfig::default());
        assert_eq!(config.retry_policy().unwrap(), RetryPolicy::default());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = ResqlConfig::from_toml_str(
            r#"
            liveness = "ping"
            [connection]
            host = "db.internal"
            database = "analytics"
            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.connection.host, "db.internal");
        assert_eq!(config.connection.port, 3306);
        assert_eq!(config.connection.database.as_deref(), Some("analytics"));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 100);
        assert_eq!(config.retry.max_delay_ms, Some(2000));
        assert_eq!(config.liveness, LivenessCheck::Ping);
    }

    #[test]
    fn test_ceiling_default_does_not_depend_on_retry_table() {
        let absent = ResqlConfig::from_toml_str("[connection]\nhost = \"db\"\n").unwrap();
        let present = ResqlConfig::from_toml_str("[retry]\nmax_attempts = 4\n").unwrap();
        assert_eq!(absent.retry_policy().unwrap().max_delay, Some(ms(2000)));
        assert_eq!(present.retry_policy().unwrap().max_delay, Some(ms(2000)));

        let uncapped = ResqlConfig::from_toml_str("[retry]\nmax_delay_ms = 0\n").unwrap();
        assert_eq!(uncapped.retry_policy().unwrap().max_delay, None);

        // No ceiling survives a write/read cycle
        let reparsed = ResqlConfig::from_toml_str(&uncapped.to_toml().unwrap()).unwrap();
        assert_eq!(reparsed.retry.max_delay_ms, None);
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let err = ResqlConfig::from_toml_str("[retry]\nmax_attempts = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        let err = ResqlConfig::from_toml_str("liveness = \"sometimes\"").unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        assert!(ResqlConfig::write_default_if_missing(&path).unwrap());
        assert!(!ResqlConfig::write_default_if_missing(&path).unwrap());
        let loaded = ResqlConfig::from_file(&path).unwrap();
        assert_eq!(loaded, ResqlConfig::default());

        let mut custom = loaded;
        custom.connection.port = 3307;
        std::fs::write(&path, custom.to_toml().unwrap()).unwrap();
        assert_eq!(ResqlConfig::from_file(&path).unwrap().connection.port, 3307);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = ResqlConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_env_overlay() {
        let mut config = ResqlConfig::default();
        config
            .apply_env(vec![
                ("DB_HOST", "10.0.0.5"),
                ("DB_PORT", "3310"),
                ("DB_USER", "report"),
                ("DB_PASSWORD", "s3cret"),
                ("DB_NAME", "sales"),
                ("DB_MAX_ATTEMPTS", "4"),
                ("DB_BASE_DELAY_MS", "50"),
                ("DB_MAX_DELAY_MS", ""),
                ("HOME", "/root"),
            ])
            .unwrap();

        assert_eq!(config.connection.host, "10.0.0.5");
        assert_eq!(config.connection.port, 3310);
        assert_eq!(config.connection.user, "report");
        assert_eq!(config.connection.password, "s3cret");
        assert_eq!(config.connection.database.as_deref(), Some("sales"));
        let policy = config.retry_policy().unwrap();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.base_delay, ms(50));
        assert_eq!(policy.max_delay, None);
    }

    #[test]
    fn test_env_overlay_rejects_bad_numbers() {
        let mut config = ResqlConfig::default();
        let err = config.apply_env(vec![("DB_PORT", "mysql")]).unwrap_err();
        assert!(err.to_string().contains("DB_PORT"));
    }

    #[test]
    fn test_password_redacted_in_debug() {
        let config = ConnectionConfig {
            password: "hunter2".to_string(),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
        assert_eq!(config.display_target(), "root@127.0.0.1:3306");
    }

    #[test]
    fn test_connection_validation() {
        let mut config = ConnectionConfig::default();
        assert!(config.validate().is_ok());
        config.host = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
