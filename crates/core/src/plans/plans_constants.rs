//! Plan family profiles.

use serde::{Deserialize, Serialize};

/// Retention for long-lived sessions (60 days).
pub const MAIN_RETENTION_SECS: i64 = 60 * 60 * 24 * 60;

/// Retention for ephemeral review links (72 hours).
pub const REVIEW_RETENTION_SECS: i64 = 60 * 60 * 72;

/// Tables a plan family may be stored in.
pub const PLAN_TABLES: [&str; 2] = ["plan_sessions", "review_sessions"];

/// Independently retained document families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanFamily {
    Main,
    Review,
}

/// Everything that differs between families. The mechanics are shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanFamilyConfig {
    pub family: PlanFamily,
    pub table_name: &'static str,
    pub retention_secs: i64,
    /// Keep the pre-replacement document in `prev_plan_json`.
    pub retains_previous: bool,
    pub cookie_name: &'static str,
    pub allows_reset: bool,
}

impl PlanFamilyConfig {
    pub const fn main() -> Self {
        Self {
            family: PlanFamily::Main,
            table_name: "plan_sessions",
            retention_secs: MAIN_RETENTION_SECS,
            retains_previous: true,
            cookie_name: "pp_session",
            allows_reset: false,
        }
    }

    pub const fn review() -> Self {
        Self {
            family: PlanFamily::Review,
            table_name: "review_sessions",
            retention_secs: REVIEW_RETENTION_SECS,
            retains_previous: false,
            cookie_name: "pp_review",
            allows_reset: true,
        }
    }

    pub fn for_family(family: PlanFamily) -> Self {
        match family {
            PlanFamily::Main => Self::main(),
            PlanFamily::Review => Self::review(),
        }
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.retention_secs)
    }

    /// Cookie `Max-Age` tracks the retention window.
    pub fn cookie_max_age_secs(&self) -> i64 {
        self.retention_secs
    }
}
