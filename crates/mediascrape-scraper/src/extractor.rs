//! HTML media extraction.
//!
//! Candidates come from a fixed set of locations:
//!
//! | Element | Attribute | Type |
//! |---------|-----------|------|
//! | `<img>` | `src` | image |
//! | `<source>` | first `srcset` candidate | image |
//! | `<meta property/name="og:image">` | `content` | image |
//! | `<video>` | `src` | video |
//! | `<source type="video/*">` | `src` | video |
//! | `<meta property/name="og:video">` | `content` | video |
//!
//! Each candidate is resolved against the page URL. `data:` URLs and
//! unresolvable values are dropped. The result is deduplicated on
//! `(type, url)` and keeps first-seen order.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace};
use url::Url;

use mediascrape_core::{ExtractedMedia, MediaType};

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid static CSS selector")
}

static IMG_SRC: Lazy<Selector> = Lazy::new(|| selector("img[src]"));
static SOURCE_SRCSET: Lazy<Selector> = Lazy::new(|| selector("source[srcset]"));
static OG_IMAGE: Lazy<Selector> =
    Lazy::new(|| selector(r#"meta[property="og:image"], meta[name="og:image"]"#));
static VIDEO_SRC: Lazy<Selector> = Lazy::new(|| selector("video[src]"));
static SOURCE_SRC_TYPED: Lazy<Selector> = Lazy::new(|| selector("source[src][type]"));
static OG_VIDEO: Lazy<Selector> =
    Lazy::new(|| selector(r#"meta[property="og:video"], meta[name="og:video"]"#));

/// Extract deduplicated media references from `html` served at `page_url`.
pub fn extract_media(html: &str, page_url: &str) -> Vec<ExtractedMedia> {
    let base = match Url::parse(page_url) {
        Ok(base) => base,
        Err(e) => {
            debug!(source_url = page_url, error = %e, "Unparseable page url, nothing extracted");
            return Vec::new();
        }
    };

    let document = Html::parse_document(html);
    let mut collector = Collector::new(&base);

    for el in document.select(&IMG_SRC) {
        collector.push(MediaType::Image, el.value().attr("src"));
    }
    for el in document.select(&SOURCE_SRCSET) {
        collector.push(MediaType::Image, el.value().attr("srcset").and_then(first_srcset_candidate));
    }
    for el in document.select(&OG_IMAGE) {
        collector.push(MediaType::Image, el.value().attr("content"));
    }
    for el in document.select(&VIDEO_SRC) {
        collector.push(MediaType::Video, el.value().attr("src"));
    }
    for el in document.select(&SOURCE_SRC_TYPED).filter(is_video_source) {
        collector.push(MediaType::Video, el.value().attr("src"));
    }
    for el in document.select(&OG_VIDEO) {
        collector.push(MediaType::Video, el.value().attr("content"));
    }

    collector.finish()
}

/// First URL of a srcset: text before the first comma, up to the first space.
fn first_srcset_candidate(srcset: &str) -> Option<&str> {
    srcset
        .split(',')
        .next()
        .map(str::trim)
        .and_then(|c| c.split(' ').next())
        .filter(|c| !c.is_empty())
}

fn is_video_source(el: &ElementRef<'_>) -> bool {
    el.value()
        .attr("type")
        .map(|t| t.trim().to_ascii_lowercase().starts_with("video/"))
        .unwrap_or(false)
}

/// Resolve a raw attribute value against the page URL.
fn resolve(base: &Url, raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    match base.join(value) {
        Ok(url) if url.scheme() == "data" => None,
        Ok(url) => Some(url.to_string()),
        Err(e) => {
            trace!(value, error = %e, "Dropping unresolvable media url");
            None
        }
    }
}

struct Collector<'a> {
    base: &'a Url,
    seen: HashSet<(MediaType, String)>,
    out: Vec<ExtractedMedia>,
}

impl<'a> Collector<'a> {
    fn new(base: &'a Url) -> Self {
        Self {
            base,
            seen: HashSet::new(),
            out: Vec::new(),
        }
    }

    fn push(&mut self, media_type: MediaType, raw: Option<&str>) {
        let Some(url) = raw.and_then(|r| resolve(self.base, r)) else {
            return;
        };
        if self.seen.insert((media_type, url.clone())) {
            self.out.push(ExtractedMedia::new(media_type, url));
        }
    }

    fn finish(self) -> Vec<ExtractedMedia> {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(url: &str) -> ExtractedMedia {
        ExtractedMedia::new(MediaType::Image, url)
    }

    fn video(url: &str) -> ExtractedMedia {
        ExtractedMedia::new(MediaType::Video, url)
    }

    #[test]
    fn test_duplicates_across_locations_collapse() {
        let html = r#"<img src="a.png"><img src="a.png"><meta property="og:image" content="a.png">"#;
        let media = extract_media(html, "https://x.test/p");
        assert_eq!(media, vec![image("https://x.test/a.png")]);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let html = r#"<img src="/1.png"><video src="v.mp4"></video>"#;
        let first = extract_media(html, "https://x.test/dir/page");
        let second = extract_media(html, "https://x.test/dir/page");
        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![image("https://x.test/1.png"), video("https://x.test/dir/v.mp4")]
        );
    }

    #[test]
    fn test_srcset_uses_first_candidate_only() {
        let html = r#"<picture><source srcset="small.jpg 480w, large.jpg 1080w"></picture>"#;
        let media = extract_media(html, "https://x.test/");
        assert_eq!(media, vec![image("https://x.test/small.jpg")]);
    }

    #[test]
    fn test_source_with_video_type_case_insensitive() {
        let html = r#"
            <video>
              <source src="clip.webm" type="VIDEO/webm">
              <source src="track.mp3" type="audio/mpeg">
            </video>"#;
        let media = extract_media(html, "https://x.test/");
        assert_eq!(media, vec![video("https://x.test/clip.webm")]);
    }

    #[test]
    fn test_og_meta_property_and_name() {
        let html = r#"
            <head>
              <meta name="og:image" content="https://cdn.test/cover.jpg">
              <meta property="og:video" content="//cdn.test/trailer.mp4">
              <meta property="og:title" content="ignored">
            </head>"#;
        let media = extract_media(html, "https://x.test/");
        assert_eq!(
            media,
            vec![
                image("https://cdn.test/cover.jpg"),
                video("https://cdn.test/trailer.mp4")
            ]
        );
    }

    #[test]
    fn test_same_url_as_image_and_video_is_kept_twice() {
        let html = r#"<img src="m"><video src="m"></video>"#;
        let media = extract_media(html, "https://x.test/");
        assert_eq!(media, vec![image("https://x.test/m"), video("https://x.test/m")]);
    }

    #[test]
    fn test_data_urls_and_empty_values_are_dropped() {
        let html = r#"
            <img src="data:image/png;base64,AAAA">
            <img src="  DATA:image/gif;base64,BBBB">
            <img src="">
            <img src="   ">
            <source srcset="">
            <img src="ok.png">"#;
        let media = extract_media(html, "https://x.test/");
        assert_eq!(media, vec![image("https://x.test/ok.png")]);
    }

    #[test]
    fn test_unresolvable_values_are_dropped() {
        let html = r#"<img src="http://[::1"><img src="fine.gif">"#;
        let media = extract_media(html, "https://x.test/");
        assert_eq!(media, vec![image("https://x.test/fine.gif")]);
    }

    #[test]
    fn test_no_media_and_malformed_html() {
        assert!(extract_media("<p>hello</p>", "https://x.test/").is_empty());
        assert!(extract_media("", "https://x.test/").is_empty());
        let media = extract_media("<div><img src=broken.png<p>", "https://x.test/");
        assert!(media.len() <= 1);
    }

    #[test]
    fn test_first_srcset_candidate() {
        assert_eq!(first_srcset_candidate("a.jpg 1x, b.jpg 2x"), Some("a.jpg"));
        assert_eq!(first_srcset_candidate("  a.jpg  "), Some("a.jpg"));
        assert_eq!(first_srcset_candidate(""), None);
        assert_eq!(first_srcset_candidate(", b.jpg"), None);
    }
}
