//! Environment variable parsing shared by every `from_env()` constructor.
//!
//! Unset or unparseable values fall back to the default. Values outside the
//! accepted range are clamped with a WARN log.

use std::fmt::Display;
use std::str::FromStr;

/// Parse `name`, falling back to `default` when unset or unparseable.
pub fn env_parse<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
{
    match std::env::var(name) {
        Ok(raw) => parse_or_default(name, &raw, default),
        Err(_) => default,
    }
}

/// Parse `name` and clamp it into `min..=max`.
pub fn env_clamped<T>(name: &str, default: T, min: T, max: T) -> T
where
    T: FromStr + Display + PartialOrd + Copy,
{
    clamp_logged(name, env_parse(name, default), min, max)
}

/// Parse a boolean flag (`true/false`, `1/0`, `yes/no`, `on/off`).
pub fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                tracing::warn!(variable = name, value = %raw, default, "Unparseable flag, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_or_default<T>(name: &str, raw: &str, default: T) -> T
where
    T: FromStr + Display,
{
    match raw.trim().parse::<T>() {
        Ok(v) => v,
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, default = %default, "Unparseable value, using default");
            default
        }
    }
}

/// Clamp `value` into `min..=max`, logging when it had to move.
pub fn clamp_logged<T>(name: &str, value: T, min: T, max: T) -> T
where
    T: Display + PartialOrd + Copy,
{
    let clamped = if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    };
    if clamped != value {
        tracing::warn!(
            variable = name,
            value = %value,
            clamped = %clamped,
            "Configuration value out of range, clamped"
        );
    }
    clamped
}
