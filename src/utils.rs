use chrono::{DateTime, Utc};
use url::Url;

const SLUG_PATH_MAX_LEN: usize = 50;

/// File-name slug for a capture: normalized hostname plus sanitized path,
/// suffixed with a millisecond timestamp so repeated captures of the same
/// URL never collide. Invalid URLs fall back to a placeholder name.
pub fn generate_slug(url: &str, when: DateTime<Utc>) -> String {
    let timestamp = when.timestamp_millis();

    let Ok(parsed) = Url::parse(url) else {
        return format!("invalid_url_{timestamp}");
    };
    let Some(host) = parsed.host_str() else {
        return format!("invalid_url_{timestamp}");
    };

    let hostname = host.strip_prefix("www.").unwrap_or(host);

    let path: String = parsed
        .path()
        .trim_end_matches('/')
        .replace('/', "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(SLUG_PATH_MAX_LEN)
        .collect();

    if path.is_empty() {
        format!("{hostname}_{timestamp}")
    } else {
        format!("{hostname}_{path}_{timestamp}")
    }
}

/// Directory name for a capture: the URL's hostname with a leading "www."
/// stripped. Invalid URLs share a fixed placeholder directory.
pub fn domain_directory(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|host| host.to_string()))
        .map(|host| {
            host.strip_prefix("www.")
                .map(|stripped| stripped.to_string())
                .unwrap_or(host)
        })
        .unwrap_or_else(|| "invalid_domain".to_string())
}

pub fn validate_url(url: &str) -> Result<Url, url::ParseError> {
    let parsed = Url::parse(url)?;

    // Ensure it's HTTP or HTTPS
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(url::ParseError::InvalidPort),
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn test_generate_slug_host_only() {
        assert_eq!(
            generate_slug("https://www.example.com", at(1700000000000)),
            "example.com_1700000000000"
        );
        assert_eq!(
            generate_slug("https://example.com/", at(1700000000000)),
            "example.com_1700000000000"
        );
    }

    #[test]
    fn test_generate_slug_with_path() {
        assert_eq!(
            generate_slug("https://example.com/docs/intro", at(42)),
            "example.com__docs_intro_42"
        );
    }

    #[test]
    fn test_generate_slug_strips_trailing_slash() {
        assert_eq!(
            generate_slug("https://example.com/docs/", at(42)),
            generate_slug("https://example.com/docs", at(42))
        );
    }

    #[test]
    fn test_generate_slug_sanitizes_and_truncates() {
        let slug = generate_slug(
            "https://example.com/a%20b/c?query=1#frag",
            at(7),
        );
        assert!(slug.starts_with("example.com_"));
        assert!(slug.ends_with("_7"));
        assert!(!slug.contains('%'));
        assert!(!slug.contains('?'));

        let long_path = format!("https://example.com/{}", "x".repeat(200));
        let slug = generate_slug(&long_path, at(7));
        // hostname + sanitized path (bounded) + timestamp suffix
        assert!(slug.len() <= "example.com".len() + 1 + SLUG_PATH_MAX_LEN + "_7".len());
    }

    #[test]
    fn test_generate_slug_unique_across_captures() {
        let first = generate_slug("https://example.com", at(1));
        let second = generate_slug("https://example.com", at(2));
        assert_ne!(first, second);
    }

    #[test]
    fn test_generate_slug_invalid_url() {
        assert_eq!(generate_slug("not a url", at(9)), "invalid_url_9");
    }

    #[test]
    fn test_domain_directory() {
        assert_eq!(domain_directory("https://www.example.com/path"), "example.com");
        assert_eq!(domain_directory("https://sub.example.com"), "sub.example.com");
        assert_eq!(domain_directory("not a url"), "invalid_domain");
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com").is_ok());
        assert!(validate_url("http://example.com").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("invalid-url").is_err());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }
}
