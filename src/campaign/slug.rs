//! Human-readable page slugs for campaign landing pages.
//!
//! Allocation probes the campaign store and is not atomic with the insert
//! that follows it: two concurrent allocators may both hand out the same
//! slug. The unique index on `page_slug` catches that at insert time and
//! `manager::create_campaign` allocates again.

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::database::Database;
use crate::error::Error;

pub const FALLBACK_SLUG: &str = "campaign";
pub const MAX_NUMBERED_SUFFIXES: u32 = 100;
const RANDOM_SUFFIX_LENGTH: usize = 6;

/// Lowercases `text` and collapses every run of non-alphanumeric characters
/// into a single `-`, trimming separators from both ends.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    if slug.is_empty() {
        return FALLBACK_SLUG.to_string();
    }

    slug
}

#[tracing::instrument(skip(db))]
pub async fn allocate(db: &dyn Database, candidate_text: &str) -> Result<String, Error> {
    let base = slugify(candidate_text);

    if is_free(db, &base).await? {
        return Ok(base);
    }

    for suffix in 1..=MAX_NUMBERED_SUFFIXES {
        let candidate = format!("{}-{}", base, suffix);
        if is_free(db, &candidate).await? {
            return Ok(candidate);
        }
    }

    tracing::warn!(
        base = %base,
        "numbered slug suffixes exhausted, falling back to a random suffix"
    );

    loop {
        let candidate = format!("{}-{}", base, random_suffix());
        if is_free(db, &candidate).await? {
            return Ok(candidate);
        }
    }
}

async fn is_free(db: &dyn Database, candidate: &str) -> Result<bool, Error> {
    let existing = db.campaigns().fetch_campaign_by_slug(candidate).await?;

    Ok(existing.is_none())
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SUFFIX_LENGTH)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::manager::tests::campaign_with_slug;
    use crate::database::test::MockDatabase;

    #[test]
    fn slugify_normalizes_text() {
        assert_eq!(slugify("Oak Street Storm Damage"), "oak-street-storm-damage");
        assert_eq!(slugify("  --Hail!! & Wind--  "), "hail-wind");
        assert_eq!(slugify("Roof_2024/Spring"), "roof-2024-spring");
        assert_eq!(slugify("ÉLM Street"), "lm-street");
    }

    #[test]
    fn slugify_falls_back_for_degenerate_input() {
        assert_eq!(slugify(""), "campaign");
        assert_eq!(slugify("   "), "campaign");
        assert_eq!(slugify("!!!"), "campaign");
    }

    #[tokio::test]
    async fn allocate_returns_base_slug_when_free() {
        let db = MockDatabase::new();

        let slug = allocate(&db, "Oak Street Storm Damage").await.unwrap();

        assert_eq!(slug, "oak-street-storm-damage");
    }

    #[tokio::test]
    async fn allocate_appends_first_free_suffix() {
        let db = MockDatabase::new();
        db.campaigns.put(campaign_with_slug("oak-street-storm-damage"));
        db.campaigns.put(campaign_with_slug("oak-street-storm-damage-1"));

        let slug = allocate(&db, "Oak Street Storm Damage").await.unwrap();

        assert_eq!(slug, "oak-street-storm-damage-2");
    }

    #[tokio::test]
    async fn allocate_uses_random_suffix_after_cap() {
        let db = MockDatabase::new();
        db.campaigns.put(campaign_with_slug("campaign"));
        for suffix in 1..=MAX_NUMBERED_SUFFIXES {
            db.campaigns
                .put(campaign_with_slug(&format!("campaign-{}", suffix)));
        }

        let slug = allocate(&db, "").await.unwrap();

        let suffix = slug.strip_prefix("campaign-").unwrap();
        assert_eq!(suffix.len(), RANDOM_SUFFIX_LENGTH);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn concurrent_allocators_can_observe_the_same_slug() {
        let db = MockDatabase::new();

        let (first, second) = futures::join!(
            allocate(&db, "Maple Ave Hail"),
            allocate(&db, "Maple Ave Hail")
        );

        // without an insert in between both probes see the slug as free
        assert_eq!(first.unwrap(), "maple-ave-hail");
        assert_eq!(second.unwrap(), "maple-ave-hail");
    }
}
