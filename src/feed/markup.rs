//! Best-effort image discovery in feed markup.
//!
//! These are two text patterns, not an HTML parser. They miss images written
//! in unusual ways (unquoted attributes, `content` before `property`, srcset
//! only) and that is acceptable: a miss just moves the resolver on to its
//! next fallback.

use std::sync::OnceLock;

use regex::Regex;

static IMG_SRC: OnceLock<Option<Regex>> = OnceLock::new();
static OG_IMAGE: OnceLock<Option<Regex>> = OnceLock::new();

fn img_src_re() -> Option<&'static Regex> {
    IMG_SRC
        .get_or_init(|| Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["']"#).ok())
        .as_ref()
}

fn og_image_re() -> Option<&'static Regex> {
    OG_IMAGE
        .get_or_init(|| Regex::new(r#"(?i)og:image["']?\s+content=["']([^"']+)["']"#).ok())
        .as_ref()
}

/// `src` of the first `<img>` tag.
pub fn first_img_src(markup: &str) -> Option<String> {
    capture(img_src_re()?, markup)
}

/// `content` of an Open Graph `og:image` meta tag.
pub fn og_image(markup: &str) -> Option<String> {
    capture(og_image_re()?, markup)
}

fn capture(re: &Regex, markup: &str) -> Option<String> {
    re.captures(markup)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_first_img_src() {
        let html = r#"<p>Intro</p><IMG class="hero" SRC='https://cdn.example.com/a.png'><img src="https://cdn.example.com/b.png">"#;
        assert_eq!(
            first_img_src(html).as_deref(),
            Some("https://cdn.example.com/a.png")
        );
    }

    #[test]
    fn img_without_src_is_ignored() {
        assert_eq!(first_img_src(r#"<img alt="nothing">"#), None);
        assert_eq!(first_img_src("plain text, no tags"), None);
    }

    #[test]
    fn finds_og_image_meta() {
        let html = r#"<meta property="og:image" content="https://example.com/og.jpg" />"#;
        assert_eq!(og_image(html).as_deref(), Some("https://example.com/og.jpg"));
    }

    #[test]
    fn og_image_with_content_first_is_missed() {
        // Attribute order the pattern does not cover.
        let html = r#"<meta content="https://example.com/og.jpg" property="og:image">"#;
        assert_eq!(og_image(html), None);
    }
}
