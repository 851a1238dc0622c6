//! # Leak detector configuration.
//!
//! [`LeakDetectorConfig`] holds the grace periods scheduled checks use by
//! default and the switch that turns reports into warnings.
//!
//! ## Environment
//! [`LeakDetectorConfig::from_env`] reads `DISABLE_LEAK_DETECTION`. A value of
//! `yes` or `true` (case-insensitive) disables detection; anything else, or an
//! unset variable, leaves it enabled.

use std::time::Duration;

/// Default time an object is given to deallocate before it is reported.
pub const DEFAULT_DEALLOCATION_GRACE: Duration = Duration::from_secs(1);

/// Default time a view is given to disappear before it is reported.
pub const DEFAULT_VIEW_DISAPPEAR_GRACE: Duration = Duration::from_secs(5);

/// Environment variable read by [`LeakDetectorConfig::from_env`].
pub const DISABLE_LEAK_DETECTION_ENV: &str = "DISABLE_LEAK_DETECTION";

/// Configuration for a [`LeakDetector`](crate::LeakDetector).
///
/// ## Field semantics
/// - `disabled`: checks still run and are counted in the status stream, but
///   a failed check is logged at `warn` and not broadcast on
///   [`leaks`](crate::LeakDetector::leaks)
/// - `deallocation_grace`: grace period routers and presentable interactors
///   pass to `expect_deallocate`
/// - `view_disappear_grace`: grace period viewable routers pass to
///   `expect_view_disappear`
/// - `fail_on_unobserved_leak`: a report that nothing observes on
///   [`leaks`](crate::LeakDetector::leaks) is kept and raised as a panic by
///   [`assert_no_leaks`](crate::LeakDetector::assert_no_leaks) or when the
///   detector drops. On by default in debug builds
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeakDetectorConfig {
    /// Downgrade leak reports to warnings.
    pub disabled: bool,

    /// Grace period for deallocation checks.
    pub deallocation_grace: Duration,

    /// Grace period for view disappearance checks.
    pub view_disappear_grace: Duration,

    /// Turn leak reports nobody observed into a panic.
    pub fail_on_unobserved_leak: bool,
}

impl LeakDetectorConfig {
    /// Default configuration with `disabled` taken from the environment.
    pub fn from_env() -> Self {
        let disabled = std::env::var(DISABLE_LEAK_DETECTION_ENV)
            .map(|value| parse_disabled(&value))
            .unwrap_or(false);
        Self {
            disabled,
            ..Self::default()
        }
    }

    /// Same configuration with unobserved leaks kept as warnings only.
    pub fn lenient(mut self) -> Self {
        self.fail_on_unobserved_leak = false;
        self
    }

    /// Same configuration with detection disabled.
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

impl Default for LeakDetectorConfig {
    /// Enabled, with [`DEFAULT_DEALLOCATION_GRACE`] and
    /// [`DEFAULT_VIEW_DISAPPEAR_GRACE`]. Unobserved leaks are fatal in debug
    /// builds.
    fn default() -> Self {
        Self {
            disabled: false,
            deallocation_grace: DEFAULT_DEALLOCATION_GRACE,
            view_disappear_grace: DEFAULT_VIEW_DISAPPEAR_GRACE,
            fail_on_unobserved_leak: cfg!(debug_assertions),
        }
    }
}

fn parse_disabled(value: &str) -> bool {
    let value = value.trim();
    value.eq_ignore_ascii_case("yes") || value.eq_ignore_ascii_case("true")
}
