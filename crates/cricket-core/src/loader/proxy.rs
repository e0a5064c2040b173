use std::sync::atomic::{AtomicUsize, Ordering};

/// Rewrites `target` to go through a relay proxy.
///
/// The template's `{url}` placeholder receives the percent-encoded target; a
/// template without a placeholder gets the encoded target appended.
pub fn proxied_url(template: &str, target: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
    if template.contains("{url}") {
        template.replace("{url}", &encoded)
    } else {
        format!("{template}{encoded}")
    }
}

/// Round-robin over a fixed list of proxy templates.
///
/// Each call to [`ProxyRotation::variants`] starts one template further along,
/// so a proxy that keeps failing does not always eat the first attempt.
#[derive(Debug, Default)]
pub struct ProxyRotation {
    templates: Vec<String>,
    cursor: AtomicUsize,
}

impl ProxyRotation {
    pub fn new(templates: Vec<String>) -> Self {
        Self {
            templates,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Proxied forms of `target`, in this call's rotation order.
    pub fn variants(&self, target: &str) -> Vec<String> {
        let n = self.templates.len();
        if n == 0 {
            return Vec::new();
        }
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % n;
        (0..n)
            .map(|i| proxied_url(&self.templates[(start + i) % n], target))
            .collect()
    }
}
