//! Statistics report for `--show-stats`
//!
//! Remote figures come from whatever the remote tier reports (the REST
//! service fills in most of them); anything missing prints as `N/A`.

use serde_json::Value;
use tidycache_cache::CacheStats;
use tidycache_core::Settings;

/// Placeholder for unavailable figures
pub const NOT_AVAILABLE: &str = "N/A";

type Formatter = fn(&Settings, &CacheStats) -> Option<String>;

const ENTRIES: &[(&str, Formatter)] = &[
    ("Server host", |o, _| o.rest.as_ref().map(|r| r.host.clone())),
    ("Server port", |o, _| o.rest.as_ref().map(|r| r.port.to_string())),
    ("Long-term hit rate", |_, s| rate(s, "remote", "total_hit_rate")),
    ("Hit rate", |_, s| rate(s, "remote", "hit_rate")),
    ("Hit count", |_, s| count(s, "remote", "hit_count")),
    ("Miss count", |_, s| count(s, "remote", "miss_count")),
    ("Miss rate", |_, s| rate(s, "remote", "miss_rate")),
    ("Max hash age", |_, s| {
        max_key(s, "remote", "age_days_histogram").map(|days| format!("{days} days"))
    }),
    ("Max hash hits", |_, s| {
        max_key(s, "remote", "hit_count_histogram").map(|hits| hits.to_string())
    }),
    ("Cache size", |_, s| whole(s, "remote", "saved_size_bytes").map(format_bytes)),
    ("Cached hashes", |_, s| count(s, "remote", "cached_count")),
    ("Cleaned hashes", |_, s| count(s, "remote", "cleaned_count")),
    ("Cleaned ago", |_, s| whole(s, "remote", "cleaned_seconds_ago").map(format_time)),
    ("Saved ago", |_, s| whole(s, "remote", "saved_seconds_ago").map(format_time)),
    ("Uptime", |_, s| whole(s, "remote", "uptime_seconds").map(format_time)),
    ("Hit rate (local)", |_, s| rate(s, "local", "hit_rate")),
    ("Hit count (local)", |_, s| count(s, "local", "hit_count")),
    ("Miss count (local)", |_, s| count(s, "local", "miss_count")),
    ("Miss rate (local)", |_, s| rate(s, "local", "miss_rate")),
    ("Cached hashes (local)", |_, s| count(s, "local", "cached_count")),
];

/// Render the aligned `label: value` report, one entry per line.
#[must_use]
pub fn render_report(settings: &Settings, stats: &CacheStats) -> String {
    let width = ENTRIES.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    let mut out = String::new();
    for (label, format) in ENTRIES {
        let value = format(settings, stats).unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let padding = " ".repeat(width - label.len());
        out.push_str(&format!("{label}: {padding} {value}\n"));
    }
    out
}

/// Render `stats` as compact JSON for `--print-stats`.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_json(stats: &CacheStats) -> serde_json::Result<String> {
    serde_json::to_string(stats)
}

/// Byte count with a coarse unit.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 10_000 {
        format!("{bytes} B")
    } else if bytes < 10_000_000 {
        format!("{} kB", bytes / 1000)
    } else {
        format!("{} MB", bytes / 1_000_000)
    }
}

/// Duration in seconds as its two largest units.
#[must_use]
pub fn format_time(secs: u64) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;
    const WEEK: u64 = 7 * DAY;

    if secs < MINUTE {
        format!("{secs} seconds")
    } else if secs < HOUR {
        format!("{} minutes {} seconds", secs / MINUTE, secs % MINUTE)
    } else if secs < DAY {
        format!("{} hours {} minutes", secs / HOUR, (secs / MINUTE) % 60)
    } else if secs < WEEK {
        format!("{} days {} hours", secs / DAY, (secs / HOUR) % 24)
    } else if (secs / DAY) % 7 == 0 {
        format!("{} weeks", secs / WEEK)
    } else {
        format!("{} weeks {} days", secs / WEEK, (secs / DAY) % 7)
    }
}

fn field(stats: &CacheStats, tier: &str, key: &str) -> Option<Value> {
    stats.get_stats(tier)?.get(key).cloned()
}

/// Non-negative number, truncated to an integer
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole(stats: &CacheStats, tier: &str, key: &str) -> Option<u64> {
    let value = field(stats, tier, key)?;
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v as u64)
    })
}

fn count(stats: &CacheStats, tier: &str, key: &str) -> Option<String> {
    whole(stats, tier, key).map(|n| n.to_string())
}

fn rate(stats: &CacheStats, tier: &str, key: &str) -> Option<String> {
    let value = field(stats, tier, key)?.as_f64()?;
    Some(format!("{:.1} %", value * 100.0))
}

/// Largest numeric key of a histogram object
fn max_key(stats: &CacheStats, tier: &str, key: &str) -> Option<i64> {
    match field(stats, tier, key)? {
        Value::Object(histogram) => histogram.keys().filter_map(|k| k.parse().ok()).max(),
        _ => None,
    }
}
