//! History narrowing and live-view reconciliation.
//!
//! [`HistoryFilter`] is a pure function over an already-fetched list.
//! [`HistoryView`] holds the newest-first list a live subscriber renders and
//! folds change notifications into it, keeping the latest write per id even
//! when notifications arrive out of order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::creation::Creation;
use crate::style::PoemStyle;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Client-side narrowing of a history list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HistoryFilter {
    /// Exact style match.
    pub style: Option<PoemStyle>,
    /// Case-insensitive substring across title, note, and poem.
    pub search: Option<String>,
}

impl HistoryFilter {
    pub fn new(style: Option<PoemStyle>, search: Option<String>) -> Self {
        Self { style, search }
    }

    /// Lowercased search needle, or `None` when the term is blank.
    fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    /// Whether `creation` passes both criteria.
    pub fn matches(&self, creation: &Creation) -> bool {
        if let Some(style) = self.style {
            if creation.style != style {
                return false;
            }
        }
        match self.needle() {
            None => true,
            Some(needle) => [
                creation.title.as_deref(),
                creation.note.as_deref(),
                Some(creation.poem.as_str()),
            ]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle)),
        }
    }

    /// Narrow `items`, preserving their order. The input is never modified.
    pub fn apply<'a>(&self, items: &'a [Creation]) -> Vec<&'a Creation> {
        items.iter().filter(|c| self.matches(c)).collect()
    }
}

// ---------------------------------------------------------------------------
// Live view
// ---------------------------------------------------------------------------

/// A change notification for one owner's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HistoryChange {
    /// A record was created or its details were edited.
    Upsert { creation: Creation },
    /// A record was deleted at `at`.
    Remove { id: DbId, at: Timestamp },
}

/// Deletions remembered per view. Older ones are forgotten first.
pub const MAX_TOMBSTONES: usize = 256;

/// Newest-first list of creations maintained from snapshots and changes.
#[derive(Debug, Clone, Default)]
pub struct HistoryView {
    items: Vec<Creation>,
    /// Deletion times of recently removed ids, so a late upsert cannot
    /// resurrect them. Bounded by [`MAX_TOMBSTONES`].
    removed: HashMap<DbId, Timestamp>,
}

impl HistoryView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole view with a fresh store listing.
    pub fn replace_all(&mut self, mut items: Vec<Creation>) {
        sort_newest_first(&mut items);
        self.items = items;
        self.removed.clear();
    }

    /// Fold one change into the view.
    ///
    /// Returns `true` if the visible list changed.
    pub fn apply(&mut self, change: HistoryChange) -> bool {
        match change {
            HistoryChange::Upsert { creation } => self.upsert(creation),
            HistoryChange::Remove { id, at } => self.remove(id, at),
        }
    }

    fn upsert(&mut self, creation: Creation) -> bool {
        if let Some(at) = self.removed.get(&creation.id) {
            if *at >= creation.updated_at {
                return false;
            }
        }
        match self.items.iter_mut().find(|c| c.id == creation.id) {
            Some(existing) => {
                if existing.updated_at > creation.updated_at || *existing == creation {
                    return false;
                }
                *existing = creation;
            }
            None => {
                self.items.push(creation);
                sort_newest_first(&mut self.items);
            }
        }
        true
    }

    fn remove(&mut self, id: DbId, at: Timestamp) -> bool {
        let entry = self.removed.entry(id).or_insert(at);
        if at > *entry {
            *entry = at;
        }
        self.forget_old_tombstones();
        let before = self.items.len();
        self.items.retain(|c| c.id != id);
        self.items.len() != before
    }

    fn forget_old_tombstones(&mut self) {
        while self.removed.len() > MAX_TOMBSTONES {
            let oldest = self
                .removed
                .iter()
                .min_by_key(|(id, at)| (**at, **id))
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => self.removed.remove(&id),
                None => break,
            };
        }
    }

    /// Number of remembered deletions.
    pub fn tombstones(&self) -> usize {
        self.removed.len()
    }

    /// Current list, newest first.
    pub fn items(&self) -> &[Creation] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Message pushed over the live history feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveFeedMessage {
    /// The owner's full list, newest first. Replaces whatever the
    /// subscriber showed before.
    Snapshot { items: Vec<Creation> },
}

/// Order by `created_at` descending, ties broken by id descending.
pub fn sort_newest_first(items: &mut [Creation]) {
    items.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::creation::ImageRef;

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    fn creation(id: DbId, style: PoemStyle, poem: &str, created: i64) -> Creation {
        Creation {
            id,
            owner_id: 1,
            image: ImageRef::Blob {
                path: format!("creations/1/{id}.png"),
                url: format!("http://blobs/creations/1/{id}.png"),
            },
            photo_file_name: format!("{id}.png"),
            style,
            poem: poem.to_string(),
            title: None,
            note: None,
            share_id: None,
            created_at: at(created),
            updated_at: at(created),
        }
    }

    fn sample() -> Vec<Creation> {
        let mut with_title = creation(1, PoemStyle::Sonnet, "waves at dusk", 10);
        with_title.title = Some("The OCEAN Breathes".into());
        let mut with_note = creation(2, PoemStyle::Sonnet, "mountain air", 20);
        with_note.note = Some("written near the ocean".into());
        vec![
            creation(4, PoemStyle::Haiku, "ocean spray", 40),
            creation(3, PoemStyle::Sonnet, "forest hush", 30),
            with_note,
            with_title,
        ]
    }

    #[test]
    fn style_and_search_combine_with_and() {
        let items = sample();
        let filter = HistoryFilter::new(Some(PoemStyle::Sonnet), Some("ocean".into()));
        let ids: Vec<DbId> = filter.apply(&items).iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let items = sample();
        let filter = HistoryFilter::new(None, Some("OcEaN".into()));
        let ids: Vec<DbId> = filter.apply(&items).iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![4, 2, 1]);
    }

    #[test]
    fn blank_filter_keeps_everything_in_order() {
        let items = sample();
        let filter = HistoryFilter::new(None, Some("   ".into()));
        assert_eq!(filter.apply(&items).len(), items.len());
    }

    #[test]
    fn filtering_twice_equals_filtering_once() {
        let items = sample();
        let filter = HistoryFilter::new(Some(PoemStyle::Sonnet), Some("ocean".into()));
        let once: Vec<Creation> = filter.apply(&items).into_iter().cloned().collect();
        let twice: Vec<Creation> = filter.apply(&once).into_iter().cloned().collect();
        assert_eq!(once, twice);
        assert_eq!(items.len(), 4, "source list is untouched");
    }

    #[test]
    fn view_sorts_snapshot_newest_first() {
        let mut view = HistoryView::new();
        let mut items = sample();
        items.reverse();
        view.replace_all(items);
        let ids: Vec<DbId> = view.items().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![4, 3, 2, 1]);
    }

    #[test]
    fn stale_upsert_is_ignored() {
        let mut view = HistoryView::new();
        view.replace_all(sample());

        let mut newer = view.items()[1].clone();
        newer.title = Some("second edit".into());
        newer.updated_at = at(100);
        let mut older = newer.clone();
        older.title = Some("first edit".into());
        older.updated_at = at(50);

        assert!(view.apply(HistoryChange::Upsert { creation: newer }));
        assert!(!view.apply(HistoryChange::Upsert { creation: older }));
        assert_eq!(view.items()[1].title.as_deref(), Some("second edit"));
    }

    #[test]
    fn new_record_is_inserted_at_the_top() {
        let mut view = HistoryView::new();
        view.replace_all(sample());
        assert!(view.apply(HistoryChange::Upsert {
            creation: creation(5, PoemStyle::Ode, "new", 50),
        }));
        assert_eq!(view.items()[0].id, 5);
        assert_eq!(view.len(), 5);
    }

    #[test]
    fn late_upsert_does_not_resurrect_deleted_record() {
        let mut view = HistoryView::new();
        view.replace_all(sample());
        let stale = view.items()[0].clone();

        assert!(view.apply(HistoryChange::Remove {
            id: stale.id,
            at: at(200),
        }));
        assert!(!view.apply(HistoryChange::Upsert { creation: stale }));
        assert!(view.items().iter().all(|c| c.id != 4));
    }

    #[test]
    fn tombstones_stay_bounded_and_keep_newest() {
        let mut view = HistoryView::new();
        let total = MAX_TOMBSTONES as DbId + 50;
        for id in 1..=total {
            view.apply(HistoryChange::Remove { id, at: at(id) });
        }
        assert_eq!(view.tombstones(), MAX_TOMBSTONES);

        // The most recent deletion is still remembered.
        let newest = creation(total, PoemStyle::Haiku, "late", 0);
        assert!(!view.apply(HistoryChange::Upsert { creation: newest }));
        // The oldest one is forgotten, so a later copy shows again.
        let oldest = creation(1, PoemStyle::Haiku, "edited", 0);
        assert!(view.apply(HistoryChange::Upsert { creation: oldest }));
    }

    #[test]
    fn removing_unknown_id_reports_no_change() {
        let mut view = HistoryView::new();
        assert!(view.is_empty());
        assert!(!view.apply(HistoryChange::Remove { id: 99, at: at(0) }));
    }

    #[test]
    fn live_message_is_tagged_snapshot() {
        let json = serde_json::to_value(LiveFeedMessage::Snapshot { items: vec![] }).unwrap();
        assert_eq!(json["type"], "snapshot");
        assert!(json["items"].as_array().unwrap().is_empty());
    }
}
