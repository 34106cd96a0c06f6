use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::model::Category;

/// CMS rendition suffix embedded before the extension, e.g.
/// `photo.2e16d0ba.fill-343x225.jpg`.
static RENDITION_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<stem>.*?)\.[a-f0-9]{8}\.[\w-]+(?P<ext>\.\w+)$").expect("rendition regex")
});

/// Assign a category by ordered substring rules; first match wins.
pub fn categorize(filename: &str, url: &str) -> Category {
    let name = filename.to_lowercase();
    let url = url.to_lowercase();

    if name.contains("logo") || url.contains("logo") {
        Category::Logos
    } else if name.contains("banner") || name.contains("header") {
        Category::Banners
    } else if name.contains("fact") {
        Category::FactCards
    } else if name.contains("post") || name.contains("card") {
        Category::PostCards
    } else {
        Category::General
    }
}

/// Last path segment of `url` with any rendition suffix removed.
pub fn filename_from_url(url: &str) -> String {
    let raw = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segs| segs.next_back().map(str::to_string))
            .unwrap_or_default(),
        Err(_) => {
            let path = url.split(['?', '#']).next().unwrap_or(url);
            path.rsplit('/').next().unwrap_or(path).to_string()
        }
    };
    strip_rendition_suffix(&raw)
}

pub fn strip_rendition_suffix(filename: &str) -> String {
    RENDITION_SUFFIX
        .replace(filename, "${stem}${ext}")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_rules() {
        assert_eq!(categorize("cash-matters-logo-white.png", "https://cdn/x"), Category::Logos);
        assert_eq!(categorize("assets-header.png", "https://cdn/x"), Category::Banners);
        assert_eq!(categorize("we-support-cash-banner.png", "https://cdn/x"), Category::Banners);
        assert_eq!(categorize("key-fact-2120.png", "https://cdn/x"), Category::FactCards);
        assert_eq!(categorize("blog-post-1.jpg", "https://cdn/x"), Category::PostCards);
        assert_eq!(categorize("share-card.jpg", "https://cdn/x"), Category::PostCards);
        assert_eq!(categorize("random.png", "https://cdn/x"), Category::General);
    }

    #[test]
    fn first_match_wins() {
        assert_eq!(categorize("logo-banner.png", ""), Category::Logos);
        assert_eq!(categorize("header-fact.png", ""), Category::Banners);
        assert_eq!(categorize("fact-card.png", ""), Category::FactCards);
    }

    #[test]
    fn logo_in_url_path_counts() {
        assert_eq!(
            categorize("white.png", "https://cdn/media/logos/white.png"),
            Category::Logos
        );
        // only the logo rule looks at the URL
        assert_eq!(
            categorize("white.png", "https://cdn/media/banners/white.png"),
            Category::General
        );
    }

    #[test]
    fn case_insensitive_and_deterministic() {
        assert_eq!(categorize("LOGO.PNG", ""), Category::Logos);
        assert_eq!(categorize("x.png", "y"), categorize("x.png", "y"));
    }

    #[test]
    fn filename_strips_rendition_suffix() {
        assert_eq!(
            filename_from_url("https://cdn/media/images/photo.2e16d0ba.fill-343x225.jpg"),
            "photo.jpg"
        );
        assert_eq!(
            filename_from_url("https://cdn/media/original_images/assets-header.png"),
            "assets-header.png"
        );
        assert_eq!(
            filename_from_url(
                "https://cdn/media/images/world-global-1140x750.width-1660.jpegquality-80.jpg"
            ),
            "world-global-1140x750.width-1660.jpegquality-80.jpg"
        );
    }

    #[test]
    fn filename_is_stable_across_renditions() {
        let a = filename_from_url("https://cdn/media/images/card.1a2b3c4d.fill-343x225.png");
        let b = filename_from_url("https://cdn/media/images/card.deadbeef.width-800.png");
        assert_eq!(a, "card.png");
        assert_eq!(a, b);
    }
}
