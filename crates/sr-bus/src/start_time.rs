use chrono::NaiveDateTime;

const WALL_CLOCK_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a `start-time` CLI value: either epoch milliseconds, or a UTC
/// wall-clock string in `YYYY-MM-DD HH:MM:SS`.
pub fn parse_start_time(raw: &str) -> anyhow::Result<i64> {
    let s = raw.trim();
    if s.chars().all(|c| c.is_ascii_digit()) && !s.is_empty() {
        return s.parse::<i64>().map_err(Into::into);
    }
    let naive = NaiveDateTime::parse_from_str(s, WALL_CLOCK_FMT)
        .map_err(|e| anyhow::anyhow!("invalid start-time '{s}': {e}"))?;
    Ok(naive.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_epoch_millis() {
        assert_eq!(parse_start_time("1700000000000").unwrap(), 1_700_000_000_000);
    }

    #[test]
    fn parses_wall_clock_utc() {
        let ms = parse_start_time("2023-11-14 22:13:20").unwrap();
        assert_eq!(ms, 1_700_000_000_000);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_start_time("not-a-time").is_err());
    }
}
