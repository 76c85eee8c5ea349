//! String sanitizing for store writes and lightweight date validation.
//!
//! # Invariants
//! - `unescape_from_store(escape_for_store(s))` equals `s` with every CR and
//!   SUB (`\x1A`) character removed.
//! - Escaping is applied exactly once per write; loads always unescape.

use crate::model::date::Date;

const ESCAPED: [char; 3] = ['\\', '\'', '"'];
const STRIPPED: [char; 2] = ['\r', '\x1A'];

/// Backslash-escapes `\`, `'` and `"`, and drops CR and SUB characters.
pub fn escape_for_store(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if STRIPPED.contains(&ch) {
            continue;
        }
        if ESCAPED.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Reverses [`escape_for_store`]; unknown escape sequences are kept verbatim.
pub fn unescape_from_store(value: &str) -> String {
    let mut plain = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.peek().copied().filter(|next| ESCAPED.contains(next)) {
                plain.push(next);
                chars.next();
                continue;
            }
        }
        plain.push(ch);
    }
    plain
}

/// Accepts exactly-ten-character `dd/mm/yyyy` strings naming a real day.
pub fn check_for_date(value: &str) -> Option<Date> {
    if value.len() != 10 {
        return None;
    }
    Date::parse_compact(value).ok()
}
