use crate::types::ImageSummary;
use crate::EngineError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Where a filter pattern must sit inside an image reference.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    #[default]
    Anywhere,
    Prefix,
    Suffix,
    Exact,
}

impl FromStr for Anchor {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "anywhere" => Ok(Anchor::Anywhere),
            "prefix" => Ok(Anchor::Prefix),
            "suffix" => Ok(Anchor::Suffix),
            "exact" => Ok(Anchor::Exact),
            other => Err(EngineError::InvalidArgument(format!(
                "unknown anchor '{other}' (expected anywhere, prefix, suffix or exact)"
            ))),
        }
    }
}

/// Case-sensitive name predicate over image references.
///
/// An image matches when any of its `name:tag` references matches. The empty
/// pattern matches every image, dangling ones included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageFilter {
    pub pattern: String,
    pub anchor: Anchor,
}

impl ImageFilter {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            anchor: Anchor::Anywhere,
        }
    }

    #[must_use]
    pub fn anchored(mut self, anchor: Anchor) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }

    pub fn matches_name(&self, name: &str) -> bool {
        let p = self.pattern.as_str();
        match self.anchor {
            Anchor::Anywhere => name.contains(p),
            Anchor::Prefix => name.starts_with(p),
            Anchor::Suffix => name.ends_with(p),
            Anchor::Exact => name == p,
        }
    }

    pub fn matches(&self, image: &ImageSummary) -> bool {
        self.is_empty() || image.repo_tags.iter().any(|t| self.matches_name(t))
    }

    /// Keep matching images, preserving engine order.
    pub fn apply(&self, images: Vec<ImageSummary>) -> Vec<ImageSummary> {
        if self.is_empty() {
            return images;
        }
        images.into_iter().filter(|i| self.matches(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(id: &str, tags: &[&str]) -> ImageSummary {
        ImageSummary {
            id: id.to_owned(),
            repo_tags: tags.iter().map(|t| (*t).to_owned()).collect(),
            size: 0,
            created_at: None,
        }
    }

    #[test]
    fn substring_matches_anywhere() {
        let f = ImageFilter::new("ginx");
        assert!(f.matches(&image("sha256:1", &["nginx:latest"])));
        assert!(!f.matches(&image("sha256:2", &["redis:7"])));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let f = ImageFilter::new("Nginx");
        assert!(!f.matches(&image("sha256:1", &["nginx:latest"])));
    }

    #[test]
    fn any_tag_is_enough() {
        let f = ImageFilter::new("stable");
        assert!(f.matches(&image("sha256:1", &["nginx:latest", "nginx:stable"])));
    }

    #[test]
    fn anchors() {
        let img = image("sha256:1", &["library/nginx:1.27"]);
        assert!(ImageFilter::new("library/").anchored(Anchor::Prefix).matches(&img));
        assert!(!ImageFilter::new("nginx").anchored(Anchor::Prefix).matches(&img));
        assert!(ImageFilter::new(":1.27").anchored(Anchor::Suffix).matches(&img));
        assert!(!ImageFilter::new("nginx").anchored(Anchor::Exact).matches(&img));
        assert!(ImageFilter::new("library/nginx:1.27")
            .anchored(Anchor::Exact)
            .matches(&img));
    }

    #[test]
    fn empty_pattern_keeps_everything_including_dangling() {
        let images = vec![image("sha256:1", &["nginx:latest"]), image("sha256:2", &[])];
        let kept = ImageFilter::default().apply(images.clone());
        assert_eq!(kept, images);
    }

    #[test]
    fn dangling_images_never_match_a_pattern() {
        assert!(!ImageFilter::new("x").matches(&image("sha256:2", &[])));
    }

    #[test]
    fn anchor_parsing() {
        assert_eq!("".parse::<Anchor>().unwrap(), Anchor::Anywhere);
        assert_eq!("prefix".parse::<Anchor>().unwrap(), Anchor::Prefix);
        assert!("middle".parse::<Anchor>().is_err());
    }
}
