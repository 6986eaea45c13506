use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// Server pagination envelope: `{ data: [...], meta: { total, page, limit } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Paginated<T> {
    /// Wraps an unpaginated list as a single complete page.
    pub fn single(data: Vec<T>) -> Self {
        let len = data.len();
        Self {
            data,
            meta: PageMeta {
                total: len as u64,
                page: 1,
                limit: len as u32,
            },
        }
    }
}

/// Some list endpoints answer with a bare array, others with the envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListOrPage<T> {
    Page(Paginated<T>),
    List(Vec<T>),
}

impl<T> From<ListOrPage<T>> for Paginated<T> {
    fn from(value: ListOrPage<T>) -> Self {
        match value {
            ListOrPage::Page(page) => page,
            ListOrPage::List(list) => Paginated::single(list),
        }
    }
}
