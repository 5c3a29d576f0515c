//! Hostname shape check for policy domains

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Dot-separated labels of 1-63 alphanumerics/hyphens, no leading or
    // trailing hyphen, at least two labels.
    static ref DOMAIN_NAME: Regex = Regex::new(
        r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z0-9][a-zA-Z0-9-]{0,61}[a-zA-Z0-9]$"
    )
    .unwrap();
}

/// Maximum length of a full domain name
pub const MAX_DOMAIN_LENGTH: usize = 253;

/// Whether `domain` looks like a valid hostname
pub fn is_valid_domain_name(domain: &str) -> bool {
    !domain.is_empty() && domain.len() <= MAX_DOMAIN_LENGTH && DOMAIN_NAME.is_match(domain)
}
