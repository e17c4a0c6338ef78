//! Human duration parsing for manual time logs.

use anyhow::{bail, Context, Result};
use regex::Regex;

/// Parse a duration like `45`, `45m`, `2h`, `1h30m`, or `1h 30m`
/// into whole minutes. Zero is rejected - a log must carry time.
pub fn parse_minutes(input: &str) -> Result<u32> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        bail!("empty duration");
    }

    let total = if let Ok(minutes) = trimmed.parse::<u32>() {
        minutes
    } else {
        let re = Regex::new(r"^(?:(\d+)\s*h)?\s*(?:(\d+)\s*m)?$")?;
        let caps = re
            .captures(trimmed)
            .with_context(|| format!("unrecognized duration '{}'", input))?;
        let hours: u32 = caps
            .get(1)
            .map(|m| m.as_str().parse())
            .transpose()?
            .unwrap_or(0);
        let minutes: u32 = caps
            .get(2)
            .map(|m| m.as_str().parse())
            .transpose()?
            .unwrap_or(0);
        hours * 60 + minutes
    };

    if total == 0 {
        bail!("duration must be at least one minute");
    }
    Ok(total)
}
