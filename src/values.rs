//! Lenient scalar extraction from upstream JSON. The API serves several
//! numeric metrics as strings ("12.4"), so every coercion accepts either
//! representation.

use serde_json::Value;

pub fn as_u64_any(v: &Value) -> Option<u64> {
    if let Some(n) = v.as_u64() {
        return Some(n);
    }
    v.as_str()?.trim().parse::<u64>().ok()
}

pub fn as_u32_any(v: &Value) -> Option<u32> {
    let n = as_u64_any(v)?;
    u32::try_from(n).ok()
}

pub fn as_i64_any(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    v.as_str()?.trim().parse::<i64>().ok()
}

pub fn as_f64_any(v: &Value) -> Option<f64> {
    if let Some(n) = v.as_f64() {
        return Some(n);
    }
    v.as_str()?.trim().parse::<f64>().ok()
}

/// Integer stat with the "absent means did not play" default.
pub fn stat_i64(stats: &Value, key: &str) -> i64 {
    stats.get(key).and_then(as_i64_any).unwrap_or(0)
}

/// Float stat with the "absent means did not play" default.
pub fn stat_f64(stats: &Value, key: &str) -> f64 {
    stats.get(key).and_then(as_f64_any).unwrap_or(0.0)
}

/// Boolean stat; absence means false, never null.
pub fn stat_bool(stats: &Value, key: &str) -> bool {
    stats.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}
