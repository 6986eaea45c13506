use crate::types::{EntityId, PageMeta, Paginated};

/// Default page size before the server has told us otherwise.
pub const DEFAULT_LIMIT: u32 = 20;

/// A server record with a stable identity.
pub trait Entity: Clone {
    fn id(&self) -> EntityId;

    /// Combine a fresh copy of an entity with the one already cached.
    /// By default the fresh copy wins outright.
    fn merged_over(self, _existing: &Self) -> Self {
        self
    }
}

/// Items plus pagination cursor for one resource type.
///
/// `items.len() <= total` holds after every operation.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionCache<T> {
    items: Vec<T>,
    total: u64,
    page: u32,
    limit: u32,
    stale: bool,
}

impl<T> Default for CollectionCache<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page: 0,
            limit: DEFAULT_LIMIT,
            stale: false,
        }
    }
}

impl<T: Entity> CollectionCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Highest page fetched so far; 0 before the first fetch.
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_more(&self) -> bool {
        (self.items.len() as u64) < self.total
    }

    pub fn next_page(&self) -> u32 {
        self.page + 1
    }

    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.items.iter().find(|e| e.id() == id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: EntityId) -> Option<usize> {
        self.items.iter().position(|e| e.id() == id)
    }

    fn set_meta(&mut self, meta: PageMeta) {
        self.page = meta.page;
        self.limit = meta.limit;
        self.total = meta.total.max(self.items.len() as u64);
    }

    /// Page 1 result: replace everything, including the cursor.
    pub fn replace_all(&mut self, page: Paginated<T>) {
        self.items = page.data;
        self.stale = false;
        self.set_meta(page.meta);
    }

    /// Page N result: concatenate in server order. Rows are not de-duplicated;
    /// the server does not repeat rows across pages.
    pub fn append_page(&mut self, page: Paginated<T>) {
        self.items.extend(page.data);
        self.set_meta(page.meta);
    }

    /// Replace the entity with `id` by `updater(existing)`. Absent ids are a no-op.
    pub fn patch_by_id<F>(&mut self, id: EntityId, updater: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let Some(idx) = self.position(id) else {
            return false;
        };
        let updated = updater(&self.items[idx]);
        self.items[idx] = updated;
        true
    }

    /// Append a newly created entity. If the same id is already cached (the
    /// mutation response and the push event both delivered it) the cached entry
    /// is updated in place instead, so nothing is duplicated or reordered.
    /// Returns true when the entity was appended.
    pub fn insert(&mut self, entity: T) -> bool {
        match self.position(entity.id()) {
            Some(idx) => {
                let merged = entity.merged_over(&self.items[idx]);
                self.items[idx] = merged;
                false
            }
            None => {
                self.items.push(entity);
                self.total = (self.total + 1).max(self.items.len() as u64);
                true
            }
        }
    }

    pub fn remove_by_id(&mut self, id: EntityId) -> bool {
        self.remove_where(|e| e.id() == id) > 0
    }

    /// Drop every entity matching `pred`; returns how many went.
    pub fn remove_where<P>(&mut self, mut pred: P) -> usize
    where
        P: FnMut(&T) -> bool,
    {
        if !self.items.iter().any(&mut pred) {
            return 0;
        }
        let before = self.items.len();
        self.items.retain(|e| !pred(e));
        let removed = before - self.items.len();
        self.total = self.total.saturating_sub(removed as u64);
        removed
    }

    /// Apply `updater` to every entity matching `pred`; returns how many changed.
    pub fn patch_where<P, F>(&mut self, mut pred: P, mut updater: F) -> usize
    where
        P: FnMut(&T) -> bool,
        F: FnMut(&T) -> T,
    {
        let mut patched = 0;
        for item in self.items.iter_mut() {
            if pred(&*item) {
                *item = updater(&*item);
                patched += 1;
            }
        }
        patched
    }

    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: EntityId,
        label: &'static str,
    }

    impl Entity for Row {
        fn id(&self) -> EntityId {
            self.id
        }
    }

    fn rows(range: std::ops::Range<EntityId>) -> Vec<Row> {
        range.map(|id| Row { id, label: "r" }).collect()
    }

    fn page(data: Vec<Row>, page: u32, total: u64) -> Paginated<Row> {
        Paginated {
            data,
            meta: PageMeta {
                total,
                page,
                limit: 20,
            },
        }
    }

    #[test]
    fn load_more_appends_in_server_order() {
        let mut cache = CollectionCache::new();
        cache.replace_all(page(rows(1..21), 1, 50));
        cache.append_page(page(rows(21..41), 2, 50));

        assert_eq!(cache.len(), 40);
        assert_eq!(cache.page(), 2);
        assert_eq!(cache.total(), 50);
        assert!(cache.has_more());
        let ids: Vec<_> = cache.items().iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..41).collect::<Vec<_>>());
    }

    #[test]
    fn refresh_resets_to_page_one() {
        let mut cache = CollectionCache::new();
        cache.replace_all(page(rows(1..21), 1, 50));
        cache.append_page(page(rows(21..41), 2, 50));
        cache.invalidate();

        cache.replace_all(page(rows(100..105), 1, 5));
        assert_eq!(cache.len(), 5);
        assert_eq!(cache.page(), 1);
        assert!(!cache.is_stale());
        assert!(!cache.has_more());
    }

    #[test]
    fn unknown_id_patch_and_remove_leave_items_untouched() {
        let mut cache = CollectionCache::new();
        cache.replace_all(page(rows(1..4), 1, 3));
        let before = cache.clone();

        assert!(!cache.patch_by_id(99, |r| Row { id: r.id, label: "x" }));
        assert!(!cache.remove_by_id(99));
        assert_eq!(cache, before);
    }

    #[test]
    fn patch_replaces_only_the_target() {
        let mut cache = CollectionCache::new();
        cache.replace_all(page(rows(1..4), 1, 3));
        assert!(cache.patch_by_id(2, |r| Row { id: r.id, label: "patched" }));
        let labels: Vec<_> = cache.items().iter().map(|r| r.label).collect();
        assert_eq!(labels, vec!["r", "patched", "r"]);
    }

    #[test]
    fn insert_appends_once_and_keeps_total_consistent() {
        let mut cache = CollectionCache::new();
        cache.replace_all(page(rows(1..3), 1, 2));

        assert!(cache.insert(Row { id: 9, label: "new" }));
        assert!(!cache.insert(Row { id: 9, label: "echo" }));

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.total(), 3);
        assert_eq!(cache.items().last(), Some(&Row { id: 9, label: "echo" }));
    }

    #[test]
    fn remove_shrinks_total() {
        let mut cache = CollectionCache::new();
        cache.replace_all(page(rows(1..21), 1, 50));
        assert!(cache.remove_by_id(5));
        assert_eq!(cache.len(), 19);
        assert_eq!(cache.total(), 49);
        assert!(!cache.contains(5));
    }
}
