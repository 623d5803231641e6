use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored in place of a date when a task has no due date.
pub const NO_DUE_DATE: &str = "No due date";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DueDate {
    #[default]
    Unset,
    On(NaiveDate),
}

impl DueDate {
    pub fn on(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self::On)
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Self::On(date) => Some(*date),
            Self::Unset => None,
        }
    }

    /// Encoded form used in stored documents.
    pub fn as_stored(&self) -> String {
        match self {
            Self::On(date) => date.format(DATE_FORMAT).to_string(),
            Self::Unset => NO_DUE_DATE.to_string(),
        }
    }
}

impl fmt::Display for DueDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_stored())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid due date {0:?}, expected YYYY-MM-DD")]
pub struct InvalidDueDate(pub String);

impl FromStr for DueDate {
    type Err = InvalidDueDate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == NO_DUE_DATE {
            return Ok(Self::Unset);
        }
        NaiveDate::parse_from_str(s, DATE_FORMAT)
            .map(Self::On)
            .map_err(|_| InvalidDueDate(s.to_string()))
    }
}

impl Serialize for DueDate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_stored())
    }
}

impl<'de> Deserialize<'de> for DueDate {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A persisted to-do item. Visible only to `owner_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub description: String,
    pub due_date: DueDate,
    pub is_finished: bool,
    pub owner_id: String,
}

impl Task {
    /// A new unfinished task with a freshly minted id.
    pub fn new(name: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            id: mint_task_id(),
            name: name.into(),
            description: String::new(),
            due_date: DueDate::Unset,
            is_finished: false,
            owner_id: owner_id.into(),
        }
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        if self.is_finished {
            return false;
        }
        self.due_date.date().is_some_and(|due| due < today)
    }
}

pub fn mint_task_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_date_parses_iso_and_sentinels() {
        assert_eq!("2024-05-01".parse::<DueDate>(), Ok(DueDate::on(2024, 5, 1).unwrap()));
        assert_eq!("".parse::<DueDate>(), Ok(DueDate::Unset));
        assert_eq!(NO_DUE_DATE.parse::<DueDate>(), Ok(DueDate::Unset));
        assert!("05/01/2024".parse::<DueDate>().is_err());
    }

    #[test]
    fn stored_due_date_only_accepts_the_sentinel() {
        assert_eq!(
            "none".parse::<DueDate>(),
            Err(InvalidDueDate("none".to_string()))
        );
        assert!(serde_json::from_str::<DueDate>(r#""None""#).is_err());
        assert_eq!(
            serde_json::from_str::<DueDate>(r#""No due date""#).unwrap(),
            DueDate::Unset
        );
    }

    #[test]
    fn invalid_due_date_message() {
        let err = "someday".parse::<DueDate>().unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"invalid due date "someday", expected YYYY-MM-DD"#
        );
    }

    #[test]
    fn due_date_stored_form() {
        assert_eq!(DueDate::on(2024, 5, 1).unwrap().as_stored(), "2024-05-01");
        assert_eq!(DueDate::Unset.as_stored(), NO_DUE_DATE);
    }

    #[test]
    fn new_task_is_unfinished_with_unique_id() {
        let a = Task::new("Buy milk", "u1");
        let b = Task::new("Buy milk", "u1");
        assert!(!a.is_finished);
        assert!(!a.id.is_empty());
        assert_ne!(a.id, b.id);
        assert_eq!(a.owner_id, "u1");
        assert_eq!(a.due_date, DueDate::Unset);
    }

    #[test]
    fn overdue_only_when_unfinished_and_past() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let mut task = Task::new("Buy milk", "u1");
        assert!(!task.is_overdue(today));

        task.due_date = DueDate::on(2024, 5, 1).unwrap();
        assert!(task.is_overdue(today));

        task.is_finished = true;
        assert!(!task.is_overdue(today));
    }
}
