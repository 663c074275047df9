//! Configuration validation.
//!
//! Every key is checked before any data is loaded, so a bad config fails
//! fast with the section and key that caused it.

use crate::domain::error::AllocatorError;
use crate::domain::leverage::RiskTarget;
use crate::domain::universe::parse_tickers;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), AllocatorError> {
    validate_data_dir(config)?;
    validate_numbers(config)?;
    validate_dates(config)?;
    validate_tickers(config)?;
    validate_weight_bounds(config)?;
    validate_risk_free_rate(config)?;
    parse_target(config)?;
    validate_optimizer(config)?;
    validate_report(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> AllocatorError {
    AllocatorError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

const FLOAT_KEYS: [(&str, &str); 9] = [
    ("portfolio", "min_weight"),
    ("portfolio", "max_weight"),
    ("portfolio", "risk_free_rate"),
    ("target", "value"),
    ("optimizer", "var_confidence"),
    ("optimizer", "max_vol_leverage"),
    ("optimizer", "max_var_leverage"),
    ("optimizer", "scoring_tolerance"),
    ("optimizer", "final_tolerance"),
];

const INT_KEYS: [(&str, &str); 4] = [
    ("optimizer", "short_history_rows"),
    ("optimizer", "max_iterations"),
    ("report", "frontier_samples"),
    ("report", "recent_rows"),
];

/// Numeric keys that are present must parse; typed getters would otherwise
/// fall back to their defaults without a trace.
fn validate_numbers(config: &dyn ConfigPort) -> Result<(), AllocatorError> {
    let raw = |section: &str, key: &str| {
        config
            .get_string(section, key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    for (section, key) in FLOAT_KEYS {
        if let Some(value) = raw(section, key) {
            if !value.parse::<f64>().is_ok_and(f64::is_finite) {
                return Err(invalid(section, key, format!("'{value}' is not a number")));
            }
        }
    }
    for (section, key) in INT_KEYS {
        if let Some(value) = raw(section, key) {
            if value.parse::<i64>().is_err() {
                return Err(invalid(section, key, format!("'{value}' is not an integer")));
            }
        }
    }
    Ok(())
}

fn validate_data_dir(config: &dyn ConfigPort) -> Result<(), AllocatorError> {
    match config.get_string("data", "dir") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(AllocatorError::ConfigMissing {
            section: "data".to_string(),
            key: "dir".to_string(),
        }),
    }
}

/// Optional `YYYY-MM-DD` date under `[data]`.
pub fn parse_optional_date(
    config: &dyn ConfigPort,
    key: &str,
) -> Result<Option<NaiveDate>, AllocatorError> {
    match config.get_string("data", key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| invalid("data", key, format!("invalid {key} format, expected YYYY-MM-DD"))),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), AllocatorError> {
    let start = parse_optional_date(config, "start_date")?;
    let end = parse_optional_date(config, "end_date")?;
    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(invalid("data", "start_date", "start_date must be before end_date"));
        }
    }
    Ok(())
}

fn validate_tickers(config: &dyn ConfigPort) -> Result<(), AllocatorError> {
    match config.get_string("portfolio", "tickers") {
        Some(s) if !s.trim().is_empty() => {
            parse_tickers(&s)?;
            Ok(())
        }
        _ => Err(AllocatorError::ConfigMissing {
            section: "portfolio".to_string(),
            key: "tickers".to_string(),
        }),
    }
}

fn validate_weight_bounds(config: &dyn ConfigPort) -> Result<(), AllocatorError> {
    let min = config.get_double("portfolio", "min_weight", 0.0);
    let max = config.get_double("portfolio", "max_weight", 100.0);
    if !(0.0..=100.0).contains(&min) {
        return Err(invalid("portfolio", "min_weight", "min_weight must be between 0 and 100"));
    }
    if !(0.0..=100.0).contains(&max) {
        return Err(invalid("portfolio", "max_weight", "max_weight must be between 0 and 100"));
    }
    if min > max {
        return Err(invalid("portfolio", "min_weight", "min_weight must not exceed max_weight"));
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), AllocatorError> {
    let value = config.get_double("portfolio", "risk_free_rate", 0.0);
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "portfolio",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

/// Reads `[target]`. Volatility values are annual percentages and come back
/// as fractions; VaR values stay daily percentages.
pub fn parse_target(config: &dyn ConfigPort) -> Result<Option<RiskTarget>, AllocatorError> {
    let mode = config
        .get_string("target", "mode")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| "none".to_string());
    if mode == "none" || mode.is_empty() {
        return Ok(None);
    }

    let value = config.get_double("target", "value", 0.0);
    if value <= 0.0 {
        return Err(invalid("target", "value", "target value must be positive"));
    }
    match mode.as_str() {
        "volatility" => Ok(Some(RiskTarget::Volatility(value / 100.0))),
        "var" => Ok(Some(RiskTarget::Var(value))),
        other => Err(invalid(
            "target",
            "mode",
            format!("unknown target mode '{other}', expected none, volatility or var"),
        )),
    }
}

/// Comma separated lookback windows, each a positive row count.
pub fn parse_windows(input: &str) -> Result<Vec<usize>, AllocatorError> {
    let mut windows = Vec::new();
    for token in input.split(',') {
        let window: usize = token
            .trim()
            .parse()
            .map_err(|_| invalid("optimizer", "windows", format!("invalid window '{}'", token.trim())))?;
        if window == 0 {
            return Err(invalid("optimizer", "windows", "windows must be positive"));
        }
        windows.push(window);
    }
    Ok(windows)
}

fn validate_optimizer(config: &dyn ConfigPort) -> Result<(), AllocatorError> {
    if let Some(s) = config.get_string("optimizer", "windows") {
        parse_windows(&s)?;
    }
    if config.get_int("optimizer", "short_history_rows", 200) < 1 {
        return Err(invalid("optimizer", "short_history_rows", "short_history_rows must be at least 1"));
    }
    let confidence = config.get_double("optimizer", "var_confidence", 0.95);
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(invalid("optimizer", "var_confidence", "var_confidence must be between 0 and 1"));
    }
    for key in ["max_vol_leverage", "max_var_leverage"] {
        if config.get_double("optimizer", key, 1.0) < 1.0 {
            return Err(invalid("optimizer", key, format!("{key} must be at least 1")));
        }
    }
    for key in ["scoring_tolerance", "final_tolerance"] {
        if config.get_double("optimizer", key, 1e-6) <= 0.0 {
            return Err(invalid("optimizer", key, format!("{key} must be positive")));
        }
    }
    if config.get_int("optimizer", "max_iterations", 1000) < 1 {
        return Err(invalid("optimizer", "max_iterations", "max_iterations must be at least 1"));
    }
    Ok(())
}

fn validate_report(config: &dyn ConfigPort) -> Result<(), AllocatorError> {
    if config.get_int("report", "frontier_samples", 200) < 0 {
        return Err(invalid("report", "frontier_samples", "frontier_samples must be non-negative"));
    }
    if config.get_int("report", "recent_rows", 5) < 1 {
        return Err(invalid("report", "recent_rows", "recent_rows must be at least 1"));
    }
    Ok(())
}
