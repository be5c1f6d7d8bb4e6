//! Extension points.
//!
//! Every point where the runtime runs a hook chain. The points the
//! core itself drives form a closed vocabulary; plugins may introduce
//! their own through [`ExtensionPoint::Custom`].
//!
//! Points are categorized as "before" (can rewrite/reject the
//! operation), "after" (observe or rewrite the result), or "on"
//! (notification).

use crate::HookError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named hook-chain execution site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ExtensionPoint {
    // ── System ───────────────────────────────────────────────
    /// `Runtime::initialize()`; hooks validate global configuration.
    SystemInit,
    /// `Runtime::shutdown()`, before plugins are stopped.
    SystemShutdown,
    /// Reported runtime-level error.
    SystemError,

    // ── Task ─────────────────────────────────────────────────
    /// Before the first handler attempt; may rewrite the input.
    TaskBeforeExecution,
    /// After a successful attempt; may rewrite the result.
    TaskAfterExecution,
    /// After a permanent task failure.
    TaskError,

    // ── Process ──────────────────────────────────────────────
    /// Before a process instance is created; may rewrite `data`.
    ProcessBeforeCreate,
    /// After the instance is built, before it is stored.
    ProcessAfterCreate,
    /// Before exit/entry actions run; may rewrite `payload`.
    ProcessBeforeTransition,
    /// After the new state is set, before it is committed.
    ProcessAfterTransition,

    // ── Event ────────────────────────────────────────────────
    /// Before subscriber dispatch; may rewrite or reject the event.
    EventBeforePublish,
    /// After dispatch and persistence.
    EventAfterPublish,
    /// Once per replay, before stored events are read.
    EventBeforeReplay,

    /// Plugin-defined point, written `category:name`.
    Custom(String),
}

impl ExtensionPoint {
    /// The points the core drives, in lifecycle order.
    pub const BUILTIN: &'static [ExtensionPoint] = &[
        Self::SystemInit,
        Self::SystemShutdown,
        Self::SystemError,
        Self::TaskBeforeExecution,
        Self::TaskAfterExecution,
        Self::TaskError,
        Self::ProcessBeforeCreate,
        Self::ProcessAfterCreate,
        Self::ProcessBeforeTransition,
        Self::ProcessAfterTransition,
        Self::EventBeforePublish,
        Self::EventAfterPublish,
        Self::EventBeforeReplay,
    ];

    /// Creates a plugin-defined point after validating its name.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::InvalidPointName`] unless `name` has the
    /// form `category:name` with both parts non-empty.
    pub fn custom(name: impl Into<String>) -> Result<Self, HookError> {
        let name = name.into();
        name.parse()
    }

    /// Returns `true` if this is a "before" point (can rewrite/reject).
    #[must_use]
    pub fn is_before(&self) -> bool {
        matches!(
            self,
            Self::TaskBeforeExecution
                | Self::ProcessBeforeCreate
                | Self::ProcessBeforeTransition
                | Self::EventBeforePublish
                | Self::EventBeforeReplay
        )
    }

    /// Returns `true` if this is an "after" point.
    #[must_use]
    pub fn is_after(&self) -> bool {
        matches!(
            self,
            Self::TaskAfterExecution
                | Self::ProcessAfterCreate
                | Self::ProcessAfterTransition
                | Self::EventAfterPublish
        )
    }

    /// Returns `true` for notification points (neither before nor after).
    #[must_use]
    pub fn is_notification(&self) -> bool {
        !self.is_before() && !self.is_after()
    }

    /// Returns `true` if this point is part of the core vocabulary.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }

    /// Returns the canonical string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::SystemInit => "system:init",
            Self::SystemShutdown => "system:shutdown",
            Self::SystemError => "system:error",
            Self::TaskBeforeExecution => "task:beforeExecution",
            Self::TaskAfterExecution => "task:afterExecution",
            Self::TaskError => "task:error",
            Self::ProcessBeforeCreate => "process:beforeCreate",
            Self::ProcessAfterCreate => "process:afterCreate",
            Self::ProcessBeforeTransition => "process:beforeTransition",
            Self::ProcessAfterTransition => "process:afterTransition",
            Self::EventBeforePublish => "event:beforePublish",
            Self::EventAfterPublish => "event:afterPublish",
            Self::EventBeforeReplay => "event:beforeReplay",
            Self::Custom(name) => name,
        }
    }
}

impl FromStr for ExtensionPoint {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(point) = Self::BUILTIN.iter().find(|p| p.as_str() == s) {
            return Ok(point.clone());
        }
        match s.split_once(':') {
            Some((category, name))
                if !category.is_empty() && !name.is_empty() && !name.contains(':') =>
            {
                Ok(Self::Custom(s.to_string()))
            }
            _ => Err(HookError::InvalidPointName(s.to_string())),
        }
    }
}

impl TryFrom<String> for ExtensionPoint {
    type Error = HookError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExtensionPoint> for String {
    fn from(point: ExtensionPoint) -> Self {
        match point {
            ExtensionPoint::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for ExtensionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_count() {
        assert_eq!(ExtensionPoint::BUILTIN.len(), 13);
    }

    #[test]
    fn from_str_roundtrip_builtin() {
        for point in ExtensionPoint::BUILTIN {
            let s = point.to_string();
            let parsed: ExtensionPoint = s.parse().unwrap_or_else(|e| {
                panic!("Failed to parse '{s}': {e}");
            });
            assert_eq!(&parsed, point, "roundtrip failed for {s}");
        }
    }

    #[test]
    fn unknown_category_name_becomes_custom() {
        let point: ExtensionPoint = "metrics:flush".parse().expect("valid custom point");
        assert_eq!(point, ExtensionPoint::Custom("metrics:flush".into()));
        assert!(!point.is_builtin());
        assert!(point.is_notification());
    }

    #[test]
    fn malformed_names_rejected() {
        for bad in ["", "nocolon", ":name", "category:", "a:b:c"] {
            let result = bad.parse::<ExtensionPoint>();
            assert!(
                matches!(result, Err(HookError::InvalidPointName(_))),
                "'{bad}' should be rejected"
            );
        }
    }

    #[test]
    fn every_builtin_is_exactly_one_category() {
        for point in ExtensionPoint::BUILTIN {
            let cats = [point.is_before(), point.is_after(), point.is_notification()];
            let count = cats.iter().filter(|&&v| v).count();
            assert_eq!(count, 1, "{point} should be in exactly 1 category");
        }
    }

    #[test]
    fn notification_points() {
        assert!(ExtensionPoint::SystemInit.is_notification());
        assert!(ExtensionPoint::SystemShutdown.is_notification());
        assert!(ExtensionPoint::TaskError.is_notification());
    }

    #[test]
    fn serde_as_plain_string() {
        let json = serde_json::to_value(ExtensionPoint::TaskBeforeExecution)
            .expect("point should serialize");
        assert_eq!(json, serde_json::json!("task:beforeExecution"));

        let custom: ExtensionPoint =
            serde_json::from_value(serde_json::json!("audit:record")).expect("custom point");
        assert_eq!(custom.as_str(), "audit:record");

        let bad = serde_json::from_value::<ExtensionPoint>(serde_json::json!("bogus"));
        assert!(bad.is_err());
    }
}
