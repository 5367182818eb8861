use serde::{Deserialize, Serialize};

/// A Spring Data page as the backend serializes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: u64,
    pub total_pages: u32,
    pub size: u32,
    pub number: u32,
    pub first: bool,
    pub last: bool,
}

impl<T: Clone> Page<T> {
    /// Pages a full list locally, for endpoints that cannot paginate.
    pub fn from_slice(items: &[T], number: u32, size: u32) -> Self {
        let total = items.len();
        let size_usize = size.max(1) as usize;
        let start = (number as usize).saturating_mul(size_usize).min(total);
        let end = start.saturating_add(size_usize).min(total);
        Page {
            content: items[start..end].to_vec(),
            total_elements: total as u64,
            total_pages: total.div_ceil(size_usize) as u32,
            size,
            number,
            first: number == 0,
            last: end >= total,
        }
    }
}
