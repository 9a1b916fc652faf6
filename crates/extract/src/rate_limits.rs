use catalog_common::types::RateLimitRow;
use regex::Regex;

/// Parse a free-form multiline rate-limit string into structured fields.
///
/// Accepts the scraped forms `30 RPM`, `RPM: 30`, `14.4K RPD`, and
/// `1,000 TPM`; unparsed fields stay `None`. `parseable` is true when at
/// least one field was recognized.
pub fn parse_rate_limits(raw: &str, human_readable_name: &str, provider: &str) -> RateLimitRow {
    let mut row = RateLimitRow {
        human_readable_name: human_readable_name.to_string(),
        inference_provider: provider.to_string(),
        rpm: None,
        rpd: None,
        tpm: None,
        tpd: None,
        raw_string: raw.to_string(),
        parseable: false,
    };

    let value_unit =
        Regex::new(r"(?i)^([\d,\.]+)\s*([KM])?\s*(RPM|RPD|TPM|TPD)$").expect("value-unit pattern");
    let unit_value =
        Regex::new(r"(?i)^(RPM|RPD|TPM|TPD)\s*[:=]\s*([\d,\.]+)\s*([KM])?$").expect("unit-value pattern");

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line == "-" {
            continue;
        }

        let parsed = if let Some(captures) = value_unit.captures(line) {
            parse_count(&captures[1], captures.get(2).map(|m| m.as_str()))
                .map(|v| (captures[3].to_uppercase(), v))
        } else if let Some(captures) = unit_value.captures(line) {
            parse_count(&captures[2], captures.get(3).map(|m| m.as_str()))
                .map(|v| (captures[1].to_uppercase(), v))
        } else {
            None
        };

        if let Some((unit, value)) = parsed {
            match unit.as_str() {
                "RPM" => row.rpm = Some(value),
                "RPD" => row.rpd = Some(value),
                "TPM" => row.tpm = Some(value),
                "TPD" => row.tpd = Some(value),
                _ => {}
            }
            row.parseable = true;
        }
    }

    row
}

fn parse_count(digits: &str, suffix: Option<&str>) -> Option<i64> {
    let cleaned = digits.replace(',', "");
    let base: f64 = cleaned.parse().ok()?;
    let multiplier = match suffix.map(|s| s.to_uppercase()) {
        Some(s) if s == "K" => 1_000.0,
        Some(s) if s == "M" => 1_000_000.0,
        _ => 1.0,
    };
    Some((base * multiplier) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_lines() {
        let row = parse_rate_limits("30 RPM\n14,400 RPD\n6,000 TPM", "Llama 3.1 8B", "Groq");
        assert_eq!(row.rpm, Some(30));
        assert_eq!(row.rpd, Some(14_400));
        assert_eq!(row.tpm, Some(6_000));
        assert_eq!(row.tpd, None);
        assert!(row.parseable);
    }

    #[test]
    fn test_labeled_lines_and_suffixes() {
        let row = parse_rate_limits("RPM: 30\nTPD: 500K\n14.4K RPD", "Whisper Large V3", "Groq");
        assert_eq!(row.rpm, Some(30));
        assert_eq!(row.tpd, Some(500_000));
        assert_eq!(row.rpd, Some(14_400));
        assert!(row.parseable);
    }

    #[test]
    fn test_unparseable() {
        let row = parse_rate_limits("Varies by account tier", "Gemini 2.5 Flash", "Google");
        assert!(!row.parseable);
        assert_eq!(row.raw_string, "Varies by account tier");
        assert_eq!(row.rpm, None);
    }

    #[test]
    fn test_dash_lines_ignored() {
        let row = parse_rate_limits("-\n30 RPM\n-", "Model", "Groq");
        assert_eq!(row.rpm, Some(30));
        assert!(row.parseable);
    }
}
