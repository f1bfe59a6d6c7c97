//! Shared utility functions used across multiple modules.

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Render a weight with the two decimal places used for display and rows.
pub fn format_weight(weight: f64) -> String {
    format!("{weight:.2}")
}

/// Build the base URL of a Wi-Fi scale from the operator-entered address.
///
/// Bare hosts (`192.168.1.100`, `scale.local:8080`) are reached over plain
/// HTTP; an explicit scheme is kept as entered.
pub fn scale_base_url(address: &str) -> Option<String> {
    let address = normalize_text_option(Some(address.to_string()))?;
    let address = address.trim_end_matches('/');
    if is_http_url(address) {
        Some(address.to_string())
    } else {
        Some(format!("http://{address}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_option_rejects_empty() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some("   ".to_string())), None);
    }

    #[test]
    fn normalize_text_option_trims_value() {
        assert_eq!(
            normalize_text_option(Some(" https://example.com ".to_string())),
            Some("https://example.com".to_string())
        );
    }

    #[test]
    fn is_http_url_accepts_valid_schemes() {
        assert!(is_http_url("http://localhost"));
        assert!(is_http_url("https://example.com"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("example.com"));
    }

    #[test]
    fn format_weight_uses_two_decimals() {
        assert_eq!(format_weight(42.5), "42.50");
        assert_eq!(format_weight(0.0), "0.00");
        assert_eq!(format_weight(10.005_1), "10.01");
    }

    #[test]
    fn scale_base_url_adds_http_scheme_for_bare_hosts() {
        assert_eq!(
            scale_base_url(" 192.168.1.100 ").as_deref(),
            Some("http://192.168.1.100")
        );
        assert_eq!(
            scale_base_url("http://127.0.0.1:9000/").as_deref(),
            Some("http://127.0.0.1:9000")
        );
        assert_eq!(scale_base_url("  "), None);
    }
}
