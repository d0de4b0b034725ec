use std::fmt;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Shared progress vocabulary for goals and process goals. Any state is
/// reachable from any other; only values outside this set are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Progress {
    #[default]
    NotStarted,
    InProgress,
    GoodProgress,
    ExcellentProgress,
    Completed,
}

impl Progress {
    pub fn as_str(&self) -> &'static str {
        match self {
            Progress::NotStarted => "not_started",
            Progress::InProgress => "in_progress",
            Progress::GoodProgress => "good_progress",
            Progress::ExcellentProgress => "excellent_progress",
            Progress::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, AppError> {
        match s {
            "not_started" => Ok(Progress::NotStarted),
            "in_progress" => Ok(Progress::InProgress),
            "good_progress" => Ok(Progress::GoodProgress),
            "excellent_progress" => Ok(Progress::ExcellentProgress),
            "completed" => Ok(Progress::Completed),
            _ => Err(AppError::Validation(format!("Invalid progress value: {}", s))),
        }
    }

    pub fn percentage(&self) -> i64 {
        match self {
            Progress::NotStarted => 0,
            Progress::InProgress => 25,
            Progress::GoodProgress => 50,
            Progress::ExcellentProgress => 75,
            Progress::Completed => 100,
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalArea {
    Physical,
    #[default]
    Technical,
    Tactical,
    Mental,
}

impl GoalArea {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalArea::Physical => "physical",
            GoalArea::Technical => "technical",
            GoalArea::Tactical => "tactical",
            GoalArea::Mental => "mental",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, AppError> {
        match s {
            "physical" => Ok(GoalArea::Physical),
            "technical" => Ok(GoalArea::Technical),
            "tactical" => Ok(GoalArea::Tactical),
            "mental" => Ok(GoalArea::Mental),
            _ => Err(AppError::Validation(format!("Invalid goal area: {}", s))),
        }
    }
}

impl fmt::Display for GoalArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    ShortTerm,
    #[default]
    MediumTerm,
    LongTerm,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::ShortTerm => "short_term",
            Timeframe::MediumTerm => "medium_term",
            Timeframe::LongTerm => "long_term",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, AppError> {
        match s {
            "short_term" => Ok(Timeframe::ShortTerm),
            "medium_term" => Ok(Timeframe::MediumTerm),
            "long_term" => Ok(Timeframe::LongTerm),
            _ => Err(AppError::Validation(format!("Invalid timeframe: {}", s))),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A completed goal is never overdue, regardless of its target date.
pub fn is_overdue(target_date: Option<NaiveDate>, progress: Progress) -> bool {
    match target_date {
        Some(date) => progress != Progress::Completed && date < Utc::now().date_naive(),
        None => false,
    }
}

/// Completion percentage of a goal with `total` process goals, `completed` of
/// which are done. Falls back to the goal's own progress percentage when it
/// has no process goals. Integer truncation.
pub fn completion_percentage(own_progress: Progress, total: i64, completed: i64) -> i64 {
    if total == 0 {
        own_progress.percentage()
    } else {
        completed * 100 / total
    }
}

/// A goal auto-completes once it has process goals and all of them are done.
pub fn should_auto_complete(total: i64, completed: i64) -> bool {
    total > 0 && completed == total
}
