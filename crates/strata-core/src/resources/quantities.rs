use crate::error::{Result, StrataError};

/// Parse a Kubernetes quantity string into milli-units.
///
/// Milli-units keep capacity arithmetic exact at the granularity the
/// admission comparison needs: "200m" CPU parses to 200, "1" CPU to 1000,
/// "128Mi" memory to 128 * 1024 * 1024 * 1000. Binary (Ki/Mi/Gi/Ti) and
/// decimal (k/M/G/T) suffixes are supported, plus bare integers and
/// fractional core counts ("0.5").
pub fn parse_quantity(s: &str) -> Result<i64> {
    let s = s.trim();
    if s.is_empty() {
        return Err(StrataError::invalid_quantity(s, "empty quantity"));
    }

    if let Some(m) = s.strip_suffix('m') {
        // Already milli (e.g. millicores)
        return m
            .parse::<i64>()
            .map_err(|e| StrataError::invalid_quantity(s, e.to_string()));
    }

    let binary = [
        ("Ki", 1024i64),
        ("Mi", 1024 * 1024),
        ("Gi", 1024 * 1024 * 1024),
        ("Ti", 1024 * 1024 * 1024 * 1024),
    ];
    for (suffix, mult) in binary {
        if let Some(num) = s.strip_suffix(suffix) {
            let v = num
                .parse::<i64>()
                .map_err(|e| StrataError::invalid_quantity(s, e.to_string()))?;
            return Ok(v * mult * 1000);
        }
    }

    let decimal = [
        ("k", 1_000i64),
        ("M", 1_000_000),
        ("G", 1_000_000_000),
        ("T", 1_000_000_000_000),
    ];
    for (suffix, mult) in decimal {
        if let Some(num) = s.strip_suffix(suffix) {
            let v = num
                .parse::<i64>()
                .map_err(|e| StrataError::invalid_quantity(s, e.to_string()))?;
            return Ok(v * mult * 1000);
        }
    }

    if let Ok(v) = s.parse::<i64>() {
        return Ok(v * 1000);
    }

    // Fractional values, e.g. "0.5" CPU cores
    if let Ok(v) = s.parse::<f64>() {
        return Ok((v * 1000.0) as i64);
    }

    Err(StrataError::invalid_quantity(s, "unrecognized format"))
}

/// Format a milli-unit value back into a plain quantity string for logs.
///
/// Whole units print without a suffix; anything else keeps the "m" suffix.
pub fn format_milli(milli: i64) -> String {
    if milli % 1000 == 0 {
        format!("{}", milli / 1000)
    } else {
        format!("{}m", milli)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_forms() {
        assert_eq!(parse_quantity("1").unwrap(), 1000);
        assert_eq!(parse_quantity("2").unwrap(), 2000);
        assert_eq!(parse_quantity("0.5").unwrap(), 500);
        assert_eq!(parse_quantity("100m").unwrap(), 100);
        assert_eq!(parse_quantity("1500m").unwrap(), 1500);
    }

    #[test]
    fn test_parse_memory_forms() {
        assert_eq!(parse_quantity("1024").unwrap(), 1024 * 1000);
        assert_eq!(parse_quantity("1Ki").unwrap(), 1024 * 1000);
        assert_eq!(parse_quantity("128Mi").unwrap(), 128 * 1024 * 1024 * 1000);
        assert_eq!(
            parse_quantity("2Gi").unwrap(),
            2 * 1024 * 1024 * 1024 * 1000
        );
        assert_eq!(parse_quantity("1k").unwrap(), 1_000_000);
        assert_eq!(parse_quantity("1G").unwrap(), 1_000_000_000_000);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_quantity("").is_err());
        assert!(parse_quantity("12x").is_err());
        assert!(parse_quantity("Mi").is_err());
    }

    #[test]
    fn test_format_milli() {
        assert_eq!(format_milli(2000), "2");
        assert_eq!(format_milli(200), "200m");
    }
}
