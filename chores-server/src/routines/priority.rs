//! Sort key for free-text deadline labels ("morning", "14:30", "8pm", ...).

use std::sync::LazyLock;

use regex::Regex;

/// Named times of day, in match order. Substring matching walks this list
/// front to back, so the order is part of the behavior.
const NAMED_PRIORITIES: [(&str, i32); 9] = [
    ("morning", 10),
    ("breakfast", 20),
    ("noon", 30),
    ("lunch", 40),
    ("afternoon", 50),
    ("evening", 60),
    ("dinner", 70),
    ("night", 80),
    ("bedtime", 90),
];

/// Labels that resolve to nothing sort after everything else.
pub const UNKNOWN_PRIORITY: i32 = 1000;

static CLOCK_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})[:.]?(\d{2})?\s*(am|pm)?").expect("clock time pattern is valid")
});

/// Maps a deadline label to a sortable integer; lower sorts first.
///
/// Resolution order, case-insensitive: exact named time, then the first named
/// time contained in the label, then a clock time (`8`, `8:15`, `14.30`,
/// `8pm`, `12am`) as minutes since midnight, else [`UNKNOWN_PRIORITY`].
pub fn time_of_day_priority(label: &str) -> i32 {
    let label = label.to_lowercase();

    if let Some((_, p)) = NAMED_PRIORITIES.iter().find(|(name, _)| *name == label) {
        return *p;
    }
    if let Some((_, p)) = NAMED_PRIORITIES
        .iter()
        .find(|(name, _)| label.contains(name))
    {
        return *p;
    }

    let Some(caps) = CLOCK_TIME.captures(&label) else {
        return UNKNOWN_PRIORITY;
    };
    // At most two digits each, so these parses cannot fail.
    let mut hour: i32 = caps[1].parse().unwrap_or(0);
    let minutes: i32 = caps
        .get(2)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    match caps.get(3).map(|m| m.as_str()) {
        Some("pm") if hour < 12 => hour += 12,
        Some("am") if hour == 12 => hour = 0,
        _ => {}
    }
    hour * 60 + minutes
}
