//! Public URL slugs
//!
//! Slugs are lowercase ASCII words joined by single hyphens. A fixed set of
//! words that collide with application routes never resolve publicly.

use once_cell::sync::Lazy;
use rand::{distributions::Alphanumeric, Rng};
use regex::Regex;
use scholar_common::{Error, Result};

pub const RESERVED_SLUGS: [&str; 19] = [
    "api", "admin", "login", "logout", "register", "dashboard", "forms", "events", "students",
    "users", "settings", "preview", "public", "static", "assets", "health", "auth", "new", "edit",
];

pub const MIN_SLUG_LEN: usize = 3;
pub const MAX_SLUG_LEN: usize = 80;

const SUFFIX_LEN: usize = 6;
const MAX_BASE_LEN: usize = 40;

static SLUG_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug regex compiles"));

pub fn is_reserved(slug: &str) -> bool {
    let slug = slug.trim().to_ascii_lowercase();
    RESERVED_SLUGS.contains(&slug.as_str())
}

/// Canonicalise and validate a user-chosen slug
pub fn validate(raw: &str) -> Result<String> {
    let slug = raw.trim().to_ascii_lowercase();
    if slug.len() < MIN_SLUG_LEN || slug.len() > MAX_SLUG_LEN {
        return Err(Error::validation(format!(
            "slug must be between {} and {} characters",
            MIN_SLUG_LEN, MAX_SLUG_LEN
        )));
    }
    if !SLUG_SHAPE.is_match(&slug) {
        return Err(Error::validation(
            "slug may only contain lowercase letters, digits and single hyphens",
        ));
    }
    if is_reserved(&slug) {
        return Err(Error::validation(format!("slug '{}' is reserved", slug)));
    }
    Ok(slug)
}

/// Lowercase hyphenated form of `name`, at most `MAX_BASE_LEN` characters
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.truncate(MAX_BASE_LEN);
    slug.trim_end_matches('-').to_string()
}

/// Slug derived from the form name plus a short random suffix
pub fn generate(name: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();

    let base = slugify(name);
    if base.is_empty() {
        format!("form-{}", suffix)
    } else {
        format!("{}-{}", base, suffix)
    }
}
