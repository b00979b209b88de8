//! URL feature extraction for the local classifier.
//!
//! Column order and counting rules must match what the model artifact was
//! trained on.

use serde::Serialize;

/// Feature names in model input order.
pub const FEATURE_NAMES: [&str; 5] = [
    "url_length",
    "hostname_length",
    "num_dots",
    "num_hyphens",
    "is_https",
];

pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeatureVector {
    pub url_length: usize,
    pub hostname_length: usize,
    pub num_dots: usize,
    pub num_hyphens: usize,
    pub is_https: u8,
}

impl FeatureVector {
    /// Model input row, ordered as [`FEATURE_NAMES`].
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.url_length as f64,
            self.hostname_length as f64,
            self.num_dots as f64,
            self.num_hyphens as f64,
            f64::from(self.is_https),
        ]
    }
}

/// Derive the feature vector for a raw URL. Never fails; input without an
/// authority component simply yields `hostname_length = 0`.
pub fn extract(url: &str) -> FeatureVector {
    FeatureVector {
        url_length: url.chars().count(),
        hostname_length: authority(url).chars().count(),
        num_dots: url.matches('.').count(),
        num_hyphens: url.matches('-').count(),
        is_https: u8::from(url.starts_with("https")),
    }
}

/// Authority component (`userinfo@host:port`) kept verbatim, as the training
/// pipeline saw it: no case folding, no default-port stripping.
fn authority(url: &str) -> String {
    let cleaned: String = url
        .trim_start_matches(|c: char| c <= ' ')
        .chars()
        .filter(|c| !matches!(c, '\t' | '\r' | '\n'))
        .collect();

    let rest = match split_scheme(&cleaned) {
        Some((_, rest)) => rest,
        None => cleaned.as_str(),
    };

    match rest.strip_prefix("//") {
        Some(after) => {
            let end = after.find(['/', '?', '#']).unwrap_or(after.len());
            after[..end].to_string()
        }
        None => String::new(),
    }
}

fn split_scheme(url: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = url.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        Some((scheme, rest))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_https_url() {
        let v = extract("https://phish-site.example.com/login");
        assert_eq!(v.url_length, 36);
        assert_eq!(v.hostname_length, 22);
        assert_eq!(v.num_dots, 2);
        assert_eq!(v.num_hyphens, 1);
        assert_eq!(v.is_https, 1);
    }

    #[test]
    fn missing_scheme_has_no_hostname() {
        let v = extract("example.com/path");
        assert_eq!(v.hostname_length, 0);
        assert_eq!(v.url_length, 16);
        assert_eq!(v.num_dots, 1);
        assert_eq!(v.is_https, 0);
    }

    #[test]
    fn authority_keeps_port_and_userinfo() {
        let v = extract("http://user@Example.COM:8080/a?b#c");
        assert_eq!(v.hostname_length, "user@Example.COM:8080".len());
        assert_eq!(v.is_https, 0);
    }

    #[test]
    fn authority_stops_at_query_and_fragment() {
        assert_eq!(extract("https://a.b?x=1").hostname_length, 3);
        assert_eq!(extract("https://a.b#frag").hostname_length, 3);
        assert_eq!(extract("//cdn.example.net/x").hostname_length, 15);
    }

    #[test]
    fn is_https_is_a_raw_prefix_check() {
        assert_eq!(extract("HTTPS://example.com").is_https, 0);
        assert_eq!(extract("https-mirror.example").is_https, 1);
    }

    #[test]
    fn lengths_count_characters_not_bytes() {
        let v = extract("http://bücher.de");
        assert_eq!(v.url_length, 16);
        assert_eq!(v.hostname_length, 9);
    }

    #[test]
    fn garbage_degrades_gracefully() {
        let v = extract("::::");
        assert_eq!(v.hostname_length, 0);
        assert_eq!(v.url_length, 4);
        let empty = extract("");
        assert_eq!(empty, extract(""));
        assert_eq!(empty.to_array(), [0.0; FEATURE_COUNT]);
    }

    #[test]
    fn extraction_is_deterministic() {
        for url in [
            "https://phish-site.example.com/login",
            "ftp://files.example.org:21/pub",
            "not a url at all",
            "\t https://x.y",
        ] {
            assert_eq!(extract(url), extract(url));
        }
    }

    #[test]
    fn row_follows_schema_order() {
        let row = extract("https://a-b.c").to_array();
        assert_eq!(row, [13.0, 5.0, 1.0, 1.0, 1.0]);
    }
}
