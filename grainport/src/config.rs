//! System configuration for [`ActorSystem`](crate::system::ActorSystem).
//!
//! Separates compile-time settings for the endpoint program
//! ([`CompileOptions`]) from runtime settings of the embedded host
//! (idle timeout, collection interval).

use std::time::Duration;

/// Default idle timeout before an activation is collected.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Options for compiling the synthesized endpoint program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Escalate warnings to errors.
    pub warnings_as_errors: bool,
}

/// Configuration for an actor system.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use grainport::config::SystemConfig;
///
/// let config = SystemConfig::builder()
///     .idle_timeout(Duration::from_secs(30))
///     .collection_interval(Duration::from_secs(5))
///     .warnings_as_errors(true)
///     .build();
///
/// assert_eq!(config.idle_timeout(), Duration::from_secs(30));
/// assert!(config.compile().warnings_as_errors);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemConfig {
    idle_timeout: Duration,
    collection_interval: Option<Duration>,
    compile: CompileOptions,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            collection_interval: None,
            compile: CompileOptions::default(),
        }
    }
}

impl SystemConfig {
    /// Start building a system configuration.
    pub fn builder() -> SystemConfigBuilder {
        SystemConfigBuilder::default()
    }

    /// How long an activation may stay idle before it is collected.
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Period of the background idle collector, if enabled.
    ///
    /// `None` means idle activations are only collected when
    /// [`LocalHost::collect_idle`](crate::hosting::LocalHost::collect_idle)
    /// is called explicitly.
    pub fn collection_interval(&self) -> Option<Duration> {
        self.collection_interval
    }

    /// Options for the endpoint compiler.
    pub fn compile(&self) -> CompileOptions {
        self.compile
    }
}

/// Builder for [`SystemConfig`].
#[derive(Debug, Clone, Default)]
pub struct SystemConfigBuilder {
    idle_timeout: Option<Duration>,
    collection_interval: Option<Duration>,
    compile: CompileOptions,
}

impl SystemConfigBuilder {
    /// Set the idle timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Enable the background idle collector with this period.
    pub fn collection_interval(mut self, interval: Duration) -> Self {
        self.collection_interval = Some(interval);
        self
    }

    /// Escalate compiler warnings to errors.
    pub fn warnings_as_errors(mut self, enabled: bool) -> Self {
        self.compile.warnings_as_errors = enabled;
        self
    }

    /// Build the configuration (infallible).
    pub fn build(self) -> SystemConfig {
        SystemConfig {
            idle_timeout: self.idle_timeout.unwrap_or(DEFAULT_IDLE_TIMEOUT),
            collection_interval: self.collection_interval,
            compile: self.compile,
        }
    }
}
