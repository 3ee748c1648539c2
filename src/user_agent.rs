//! Shared User-Agent string for server requests.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://crates.io/crates/archive-client";

/// Default User-Agent for every request issued by the client.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("archive-client/{version} (+{PROJECT_UA_URL})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_version_and_url() {
        let ua = default_user_agent();
        assert!(ua.contains(PROJECT_UA_URL), "UA must contain project URL: {ua}");
        assert_eq!(
            Some(env!("CARGO_PKG_VERSION")),
            ua.strip_prefix("archive-client/")
                .and_then(|s| s.split(' ').next()),
            "UA must contain crate version"
        );
    }
}
