//! Round-robin probe endpoint selection.

/// Connectivity-check URLs used when no custom list is set.
pub const DEFAULT_ENDPOINTS: [&str; 4] = [
    "https://www.google.com/generate_204",
    "https://www.apple.com/library/test/success.html",
    "https://clients3.google.com/generate_204",
    "https://captive.apple.com/hotspot-detect.html",
];

/// Cycles through probe endpoints so no single service takes every check.
#[derive(Debug, Clone)]
pub struct EndpointRotator {
    defaults: Vec<String>,
    custom: Vec<String>,
    index: usize,
}

impl Default for EndpointRotator {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINTS.iter().map(ToString::to_string).collect())
    }
}

impl EndpointRotator {
    #[must_use]
    pub fn new(defaults: Vec<String>) -> Self {
        Self {
            defaults,
            custom: Vec::new(),
            index: 0,
        }
    }

    /// The list currently in rotation: the custom list if set, else the defaults.
    #[must_use]
    pub fn endpoints(&self) -> &[String] {
        if self.custom.is_empty() {
            &self.defaults
        } else {
            &self.custom
        }
    }

    #[must_use]
    pub fn custom(&self) -> &[String] {
        &self.custom
    }

    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Next endpoint in rotation. `None` only if both lists are empty.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<String> {
        let list = self.endpoints();
        if list.is_empty() {
            return None;
        }
        let endpoint = list[self.index % list.len()].clone();
        self.index = self.index.wrapping_add(1);
        Some(endpoint)
    }

    /// Replace the custom list (empty restores the defaults) and restart rotation.
    pub fn set_custom(&mut self, endpoints: Vec<String>) {
        self.custom = endpoints;
        self.index = 0;
    }
}
