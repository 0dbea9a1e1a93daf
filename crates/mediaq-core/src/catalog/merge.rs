//! Merge a catalog listing into the local recording cache.

use std::collections::{BTreeMap, BTreeSet};

use super::RecordingDescriptor;
use crate::queue::{Recording, RecordingId, Variant};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub updated: usize,
    pub removed: Vec<RecordingId>,
}

/// Applies `listing` to `cache`: new recordings are inserted with
/// `first_seen = now`, known ones get their title and URLs refreshed while
/// keeping local flags and the earlier `first_seen`, new variants are added,
/// and recordings missing from the listing are dropped.
pub fn merge_listing(
    cache: &mut BTreeMap<RecordingId, Recording>,
    listing: Vec<RecordingDescriptor>,
    now: i64,
) -> MergeStats {
    let mut stats = MergeStats::default();
    let listed: BTreeSet<RecordingId> = listing.iter().map(|d| d.id).collect();

    for desc in listing {
        match cache.get_mut(&desc.id) {
            Some(existing) => {
                existing.title = desc.title;
                existing.first_seen = existing.first_seen.min(now);
                for file in desc.files {
                    let quality = file.quality();
                    existing
                        .variants
                        .entry(quality)
                        .and_modify(|v| v.url = file.url.clone())
                        .or_insert_with(|| Variant::new(file.url));
                }
                stats.updated += 1;
            }
            None => {
                let variants = desc
                    .files
                    .into_iter()
                    .map(|f| (f.quality(), Variant::new(f.url)))
                    .collect();
                cache.insert(
                    desc.id,
                    Recording {
                        id: desc.id,
                        title: desc.title,
                        first_seen: now,
                        marked_deleted: false,
                        variants,
                    },
                );
                stats.added += 1;
            }
        }
    }

    stats.removed = cache
        .keys()
        .filter(|id| !listed.contains(id))
        .copied()
        .collect();
    for id in &stats.removed {
        cache.remove(id);
    }
    stats
}
