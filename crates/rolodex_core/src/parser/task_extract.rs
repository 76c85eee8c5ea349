//! Line-oriented extraction of tasks from a contact note.
//!
//! # Responsibility
//! - Turn `@todo` lines of a free-text note into [`Task`] values.
//!
//! # Invariants
//! - Each line is handled independently; nothing carries over.
//! - Output order follows input line order.
//! - A line that cannot yield a due date yields an urgent task instead.
//!
//! Line grammar:
//!
//! ```text
//! @todo <description>                       -> urgent task
//! @todo <description> @date dd/mm/yyyy ...  -> task due on that day
//! ```

use crate::model::date::Date;
use crate::model::task::Task;
use crate::model::NO_OWNER;
use once_cell::sync::Lazy;
use regex::Regex;

/// Marker opening a task line.
pub const TASK_MARKER: &str = "@todo";
/// Marker announcing the due-date tag inside a task line.
pub const DATE_MARKER: &str = "@date";
/// Width of the `dd/mm/yyyy` tag.
const DATE_TAG_WIDTH: usize = 10;

static DATE_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{2}/\d{2}/\d{4}$").expect("valid date tag regex"));

/// Extracts one task per `@todo` line, in line order.
///
/// Returned tasks are unpersisted and unowned.
pub fn extract_tasks(text: &str) -> Vec<Task> {
    text.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<Task> {
    let rest = line.strip_prefix(TASK_MARKER)?;
    let rest = rest.strip_prefix(' ').unwrap_or(rest);

    let task = match split_dated(rest) {
        Some((description, date)) => Task::new(NO_OWNER, description, date),
        None => Task::urgent(NO_OWNER, rest),
    };
    Some(task)
}

/// Splits `<description> @date <tag>` when the tag names a real day.
fn split_dated(rest: &str) -> Option<(&str, Date)> {
    let marker_at = rest.find(DATE_MARKER)?;
    let tag_start = marker_at + DATE_MARKER.len() + 1;
    let tag = rest.get(tag_start..tag_start + DATE_TAG_WIDTH)?;
    if !DATE_TAG_RE.is_match(tag) {
        return None;
    }
    let date = Date::parse_compact(tag).ok()?;
    Some((&rest[..marker_at], date))
}
