use anyhow::{Result, bail};

/// Parses a `-H "Name: Value"` argument into a (name, value) pair.
pub(crate) fn parse_header_arg(raw: &str) -> Result<(String, String), String> {
    let Some((name, value)) = raw.split_once(':') else {
        return Err(format!("expected \"Name: Value\", got '{raw}'"));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header name is empty in '{raw}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

pub(crate) fn ensure_backoff(backoff: f64) -> Result<()> {
    if !backoff.is_finite() || backoff < 0.0 {
        bail!("Invalid backoff {backoff}: expected a non-negative number of seconds");
    }
    Ok(())
}
