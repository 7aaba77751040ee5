//! Filter and sort over the owned task mapping.

use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::{ParseEnumError, Task, TaskStatus};

/// Available orderings of the derived view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    /// High to low; equal ranks keep their relative order.
    Priority,
    /// Earliest first; undated tasks after every dated one.
    DueDate,
}

impl SortKey {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Priority => "priority",
            Self::DueDate => "due-date",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "priority" => Ok(Self::Priority),
            "due-date" | "due_date" | "duedate" | "due" => Ok(Self::DueDate),
            _ => Err(ParseEnumError {
                expected: "sort key",
                got: s.to_string(),
            }),
        }
    }
}

/// The two independent view parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewParams {
    pub filter: Option<TaskStatus>,
    pub sort: Option<SortKey>,
}

/// Parse a status filter where `all` (or nothing) means no filter.
///
/// # Errors
///
/// Returns [`ParseEnumError`] for anything that is neither `all` nor a
/// task status.
pub fn parse_filter(raw: &str) -> Result<Option<TaskStatus>, ParseEnumError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    trimmed.parse().map(Some)
}

/// Filter then sort `tasks`. The input order is the tie-breaker.
pub fn derive<'a>(tasks: impl IntoIterator<Item = &'a Task>, params: &ViewParams) -> Vec<&'a Task> {
    let mut view: Vec<&Task> = tasks
        .into_iter()
        .filter(|task| params.filter.is_none_or(|status| task.status == status))
        .collect();

    match params.sort {
        Some(SortKey::Priority) => view.sort_by_key(|task| Reverse(task.priority.rank())),
        Some(SortKey::DueDate) => view.sort_by_key(|task| (task.due_date.is_none(), task.due_date)),
        None => {}
    }
    view
}
