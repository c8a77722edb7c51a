use robotstxt::DefaultMatcher;

/// A robots.txt body, matched on demand
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    content: String,
    allow_all: bool,
}

impl ParsedRobots {
    /// Wraps raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Permits every URL
    ///
    /// Used when a site has no robots.txt or it cannot be fetched.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    /// Checks if a URL is allowed for the given user agent token
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL or path (e.g. "/parishes?state=MA")
    /// * `user_agent` - Product token of the crawler (e.g. "Vespers")
    ///
    /// # Returns
    ///
    /// * `true` - If the URL may be fetched
    /// * `false` - If a matching group disallows it
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.allow_all || self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        let robots = ParsedRobots::allow_all();
        assert!(robots.is_allowed("/parishes", "Vespers"));
    }

    #[test]
    fn test_disallow_directory_listing() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /directory");
        assert!(robots.is_allowed("https://example.org/", "Vespers"));
        assert!(!robots.is_allowed("https://example.org/directory", "Vespers"));
        assert!(!robots.is_allowed("https://example.org/directory/ma", "Vespers"));
    }

    #[test]
    fn test_allow_overrides_disallow() {
        let robots =
            ParsedRobots::from_content("User-agent: *\nDisallow: /private\nAllow: /private/parishes");
        assert!(!robots.is_allowed("/private", "Vespers"));
        assert!(robots.is_allowed("/private/parishes", "Vespers"));
    }

    #[test]
    fn test_agent_specific_group() {
        let robots = ParsedRobots::from_content("User-agent: Vespers\nDisallow: /\n\nUser-agent: *\nAllow: /");
        assert!(!robots.is_allowed("/parishes", "Vespers"));
        assert!(robots.is_allowed("/parishes", "OtherBot"));
    }

    #[test]
    fn test_garbage_allows() {
        let robots = ParsedRobots::from_content("<html>not robots</html>");
        assert!(robots.is_allowed("/parishes", "Vespers"));
    }
}
