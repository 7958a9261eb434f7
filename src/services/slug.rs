//! Slug generation and validation

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::{ServiceError, ServiceResult};

/// Lowercase words joined by single hyphens. Non-ASCII letters are allowed.
static SLUG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{Ll}\p{Lo}\p{Lm}\p{M}\p{Nd}]+(?:-[\p{Ll}\p{Lo}\p{Lm}\p{M}\p{Nd}]+)*$")
        .expect("valid slug regex")
});

/// One character a slug word may contain
static SLUG_CHAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{Ll}\p{Lo}\p{Lm}\p{M}\p{Nd}]$").expect("valid slug char regex")
});

/// Longest slug the schema stores
pub const MAX_SLUG_LENGTH: usize = 100;

fn is_slug_char(c: char) -> bool {
    let mut buf = [0u8; 4];
    SLUG_CHAR_RE.is_match(c.encode_utf8(&mut buf))
}

/// Generate a URL-friendly slug from a title.
///
/// The title is lowercased, every character that cannot appear in a slug
/// word becomes a hyphen, and hyphen runs collapse. Slugs longer than
/// `MAX_SLUG_LENGTH` are cut back to the last whole word that fits.
pub fn generate_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut prev_hyphen = false;
    for c in title.to_lowercase().chars() {
        if is_slug_char(c) {
            slug.push(c);
            prev_hyphen = false;
        } else if !prev_hyphen && !slug.is_empty() {
            slug.push('-');
            prev_hyphen = true;
        }
    }

    truncate_slug(slug.trim_end_matches('-'))
}

fn truncate_slug(slug: &str) -> String {
    let Some((cut, next)) = slug.char_indices().nth(MAX_SLUG_LENGTH) else {
        return slug.to_string();
    };
    let head = &slug[..cut];
    if next == '-' {
        return head.to_string();
    }
    match head.rfind('-') {
        Some(boundary) => head[..boundary].to_string(),
        // one long word
        None => head.to_string(),
    }
}

pub fn is_valid_slug(slug: &str) -> bool {
    slug.chars().count() <= MAX_SLUG_LENGTH && SLUG_RE.is_match(slug)
}

/// Use `provided` when non-blank, otherwise derive a slug from `source`.
/// Either way the result must be a valid slug.
pub fn resolve_slug(provided: &str, source: &str) -> ServiceResult<String> {
    let slug = if provided.trim().is_empty() {
        generate_slug(source)
    } else {
        provided.trim().to_string()
    };

    if slug.is_empty() {
        return Err(ServiceError::validation(
            "Cannot derive a slug; provide one explicitly",
        ));
    }
    if !is_valid_slug(&slug) {
        return Err(ServiceError::validation(format!("Invalid slug: {}", slug)));
    }
    Ok(slug)
}
