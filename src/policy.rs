//! TTL policy resolution. The only place cache lifetimes and rate-limit
//! windows are decided; handlers and adapters never hardcode durations.

use crate::registry;

/// Tokens whose metrics move fast enough to justify a short cache window.
const FAST_TOKENS: &[&str] = &["eth", "link", "vbnt", "bnt"];

const FAST_SECONDS: u64 = 10;
const STANDARD_SECONDS: u64 = 60;

/// Requests allowed per rate-limit window, for every class.
const WINDOW_QUOTA: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    Fast,
    Standard,
    Unsupported,
}

impl TokenClass {
    /// Cache lifetime in seconds. Unsupported identifiers never get a TTL.
    pub fn cache_secs(self) -> Option<u64> {
        match self {
            TokenClass::Fast => Some(FAST_SECONDS),
            TokenClass::Standard => Some(STANDARD_SECONDS),
            TokenClass::Unsupported => None,
        }
    }

    /// Rate-limit window in seconds. Unsupported identifiers are still
    /// rate-limited, at the standard window.
    pub fn limit_window_secs(self) -> u64 {
        match self {
            TokenClass::Fast => FAST_SECONDS,
            TokenClass::Standard | TokenClass::Unsupported => STANDARD_SECONDS,
        }
    }

    pub fn quota(self) -> u32 {
        WINDOW_QUOTA
    }
}

/// Resolve a token symbol to its policy class. Case-sensitive exact match
/// against the fast list, then the contract registry.
pub fn resolve_class(identifier: &str) -> TokenClass {
    if FAST_TOKENS.contains(&identifier) {
        TokenClass::Fast
    } else if registry::is_known_token(identifier) {
        TokenClass::Standard
    } else {
        TokenClass::Unsupported
    }
}

/// Scraped rankings accept arbitrary project names, so they always settle
/// on the standard window rather than going through the token registry.
pub fn ranking_class() -> TokenClass {
    TokenClass::Standard
}
