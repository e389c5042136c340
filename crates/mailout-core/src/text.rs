//! Text helpers shared by the admin and mailout flows

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static NON_MACHINE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9_.]+").unwrap());

static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

// Root-relative href/src attributes on links and images
static RELATIVE_URL_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(<(?:a|img)\b[^>]*?\b(?:href|src)\s*=\s*)(["'])(/[^"']*)(["'])"#).unwrap()
});

/// Convert a display name into a machine name usable as an id
///
/// Lowercases the text and replaces every run of characters outside
/// `[a-z0-9_.]` with a single underscore.
pub fn machine_name(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    NON_MACHINE_CHARS.replace_all(&lowered, "_").into_owned()
}

/// Decode the HTML entities a CMS leaves in plain-text titles
pub fn decode_html_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Escape text for inclusion in HTML markup
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Loose shape check of an email address: `local@domain.tld`, no whitespace
pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Rewrite root-relative link and image URLs against `base_url`
///
/// Email clients have no page origin to resolve `/path` against, so every
/// `href="/..."` and `src="/..."` gets the site's scheme and host prepended.
/// Protocol-relative URLs (`//cdn...`) are left alone.
pub fn absolutize_urls(html: &str, base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.is_empty() {
        return html.to_string();
    }

    RELATIVE_URL_ATTR
        .replace_all(html, |caps: &Captures| {
            let url = &caps[3];
            if url.starts_with("//") {
                caps[0].to_string()
            } else {
                format!("{}{}{}{}{}", &caps[1], &caps[2], base, url, &caps[4])
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_name() {
        assert_eq!(machine_name("My Account!"), "my_account_");
        assert_eq!(machine_name("Main  Newsletter"), "main_newsletter");
        assert_eq!(machine_name("v2.list_id"), "v2.list_id");
    }

    #[test]
    fn test_decode_html_entities() {
        assert_eq!(decode_html_entities("Tom &amp; Jerry&#039;s &quot;Show&quot;"), "Tom & Jerry's \"Show\"");
        // Decoding happens once only
        assert_eq!(decode_html_entities("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("a@b.com"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_absolutize_urls() {
        let html = r#"<p><a class="x" href="/news/1">Read</a> <img src='/files/a.png' /> <a href="https://other.org/x">o</a> <img src="//cdn.example.com/b.png"/></p>"#;
        let out = absolutize_urls(html, "https://example.com/");

        assert!(out.contains(r#"href="https://example.com/news/1""#));
        assert!(out.contains("src='https://example.com/files/a.png'"));
        assert!(out.contains(r#"href="https://other.org/x""#));
        assert!(out.contains(r#"src="//cdn.example.com/b.png""#));
    }

    #[test]
    fn test_absolutize_urls_without_base_is_noop() {
        let html = r#"<a href="/x">x</a>"#;
        assert_eq!(absolutize_urls(html, ""), html);
    }
}
