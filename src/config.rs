//! Runtime configuration from environment variables (RESTABLE_* namespace).

use crate::reflect::PkPolicy;

/// API-wide tunables, read once at startup and shared behind the app state.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Default page size for collection GETs.
    pub per_page_default: u32,
    /// Hard cap for the `per_page` query parameter.
    pub per_page_max: u32,
    /// When set, string equality uses upper() on both sides and wildcard
    /// matching uses ILIKE.
    pub case_insensitive: bool,
    /// Policy for tables reflected without a primary key.
    pub pk_policy: PkPolicy,
    /// Optional absolute prefix for Location headers (e.g. "https://api.example.com").
    pub base_url: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            per_page_default: 20,
            per_page_max: 100,
            case_insensitive: false,
            pk_policy: PkPolicy::Reject,
            base_url: None,
        }
    }
}

impl ApiConfig {
    /// Read configuration from RESTABLE_* environment variables, falling back
    /// to defaults. Unparseable values fall back rather than abort; the PK
    /// policy is the exception since a typo there silently changing a
    /// schema-mutation setting is not acceptable.
    pub fn from_env() -> Self {
        let defaults = ApiConfig::default();
        ApiConfig {
            per_page_default: env_u32("RESTABLE_PER_PAGE", defaults.per_page_default),
            per_page_max: env_u32("RESTABLE_PER_PAGE_MAX", defaults.per_page_max),
            case_insensitive: env_bool("RESTABLE_CASE_INSENSITIVE"),
            pk_policy: match std::env::var("RESTABLE_PK_POLICY").ok().as_deref() {
                None | Some("reject") => PkPolicy::Reject,
                Some("skip") => PkPolicy::Skip,
                Some("synthesize") => PkPolicy::Synthesize,
                Some(other) => {
                    tracing::warn!(value = %other, "unknown RESTABLE_PK_POLICY, using 'reject'");
                    PkPolicy::Reject
                }
            },
            base_url: std::env::var("RESTABLE_BASE_URL").ok().filter(|s| !s.is_empty()),
        }
    }

    /// Clamp a requested page size to the configured bounds.
    pub fn clamp_per_page(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.per_page_default)
            .clamp(1, self.per_page_max)
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_page_is_clamped_to_the_configured_cap() {
        let config = ApiConfig::default();
        assert_eq!(config.clamp_per_page(None), 20);
        assert_eq!(config.clamp_per_page(Some(5)), 5);
        assert_eq!(config.clamp_per_page(Some(10_000)), 100);
        assert_eq!(config.clamp_per_page(Some(0)), 1);
    }
}
