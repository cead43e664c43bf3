//! Shared User-Agent string for crawl sessions.
//!
//! Several portals refuse obvious bot agents outright, so the session presents
//! a current desktop browser string and appends the tool name and project URL.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/calls-harvester";

/// Browser token the crawl session presents.
const BROWSER_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// User-Agent sent by every crawl session.
#[must_use]
pub(crate) fn crawler_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("{BROWSER_UA} calls-harvester/{version} (+{PROJECT_UA_URL})")
}
