//! Supported UI locales.

/// A locale the site is served under, as its first path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    En,
    #[default]
    ZhCn,
}

impl Locale {
    pub const ALL: [Self; 2] = [Self::En, Self::ZhCn];

    /// Parse a path segment. Matching is exact apart from ASCII case.
    #[must_use]
    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(segment))
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::ZhCn => "zh-CN",
        }
    }

    pub(crate) fn site_title(self) -> &'static str {
        match self {
            Self::En => "Path of Exile Community",
            Self::ZhCn => "流放之路 交流站",
        }
    }

    pub(crate) fn empty_feed(self) -> &'static str {
        match self {
            Self::En => "No posts yet.",
            Self::ZhCn => "暂无帖子。",
        }
    }

    pub(crate) fn feed_unavailable(self) -> &'static str {
        match self {
            Self::En => "The feed is unavailable right now. Please try again.",
            Self::ZhCn => "暂时无法加载帖子，请稍后重试。",
        }
    }

    pub(crate) fn unsupported_post(self) -> &'static str {
        match self {
            Self::En => "This post can't be previewed here.",
            Self::ZhCn => "此帖子暂不支持预览。",
        }
    }

    pub(crate) fn more(self) -> &'static str {
        match self {
            Self::En => "More",
            Self::ZhCn => "更多",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_segment() {
        assert_eq!(Locale::from_segment("en"), Some(Locale::En));
        assert_eq!(Locale::from_segment("zh-CN"), Some(Locale::ZhCn));
        assert_eq!(Locale::from_segment("zh-cn"), Some(Locale::ZhCn));
        assert_eq!(Locale::from_segment("fr"), None);
        assert_eq!(Locale::default(), Locale::ZhCn);
    }
}
