//! Date windows ("scopes").
//!
//! A scope names the window a task or a persisted artifact belongs to. It is
//! rendered as `"AllDates"` or `"YYYYMMDD-YYYYMMDD"` and that string prefixes
//! every window artifact name.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TdtError;

const DATE_FORMAT: &str = "%Y%m%d";
const ALL_DATES: &str = "AllDates";

/// A date window, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// Every date
    AllDates,
    /// Dates between `begin` and `end`
    Range {
        /// First day
        begin: NaiveDate,
        /// Last day
        end: NaiveDate,
    },
}

impl Scope {
    /// Build a range scope, swapping bounds given in reverse.
    pub fn range(begin: NaiveDate, end: NaiveDate) -> Self {
        if begin <= end {
            Scope::Range { begin, end }
        } else {
            Scope::Range {
                begin: end,
                end: begin,
            }
        }
    }

    /// First day, if bounded.
    pub fn begin(&self) -> Option<NaiveDate> {
        match self {
            Scope::AllDates => None,
            Scope::Range { begin, .. } => Some(*begin),
        }
    }

    /// Last day, if bounded.
    pub fn end(&self) -> Option<NaiveDate> {
        match self {
            Scope::AllDates => None,
            Scope::Range { end, .. } => Some(*end),
        }
    }

    /// Whether `date` falls inside the window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        match self {
            Scope::AllDates => true,
            Scope::Range { begin, end } => *begin <= date && date <= *end,
        }
    }

    /// Whether this window lies entirely inside the `task` scope.
    ///
    /// An `AllDates` task accepts every window; an `AllDates` window only
    /// belongs to an `AllDates` task.
    pub fn is_in_scope(&self, task: &Scope) -> bool {
        match (self, task) {
            (_, Scope::AllDates) => true,
            (Scope::AllDates, Scope::Range { .. }) => false,
            (Scope::Range { begin, end }, Scope::Range { begin: tb, end: te }) => {
                tb <= begin && end <= te
            }
        }
    }

    /// Oldest date a rescanned document may carry: `begin - limit_days`.
    pub fn limit_date(&self, limit_days: u32) -> Option<NaiveDate> {
        self.begin()
            .map(|b| b - Duration::days(i64::from(limit_days)))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::AllDates => f.write_str(ALL_DATES),
            Scope::Range { begin, end } => write!(
                f,
                "{}-{}",
                begin.format(DATE_FORMAT),
                end.format(DATE_FORMAT)
            ),
        }
    }
}

impl FromStr for Scope {
    type Err = TdtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == ALL_DATES {
            return Ok(Scope::AllDates);
        }
        let (begin, end) = s
            .split_once('-')
            .ok_or_else(|| TdtError::InvalidInput(format!("Invalid scope: {}", s)))?;
        let parse = |part: &str| {
            NaiveDate::parse_from_str(part, DATE_FORMAT)
                .map_err(|e| TdtError::InvalidInput(format!("Invalid scope {}: {}", s, e)))
        };
        Ok(Scope::range(parse(begin)?, parse(end)?))
    }
}

impl Serialize for Scope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScopeVisitor;

        impl Visitor<'_> for ScopeVisitor {
            type Value = Scope;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("\"AllDates\" or \"YYYYMMDD-YYYYMMDD\"")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Scope, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(ScopeVisitor)
    }
}
