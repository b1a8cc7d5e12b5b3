use serde::Serialize;

/// Records view page size.
pub const DEFAULT_PAGE_SIZE: usize = 5;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_number: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

/// `ceil(total_items / page_size)`, never less than one.
#[must_use]
pub fn total_pages(total_items: usize, page_size: usize) -> usize {
    total_items.div_ceil(page_size.max(1)).max(1)
}

#[must_use]
pub fn clamp_page(page_number: usize, total_pages: usize) -> usize {
    page_number.clamp(1, total_pages.max(1))
}

/// Slice one page out of `items`, clamping `page_number` into range.
#[must_use]
pub fn paginate<T: Clone>(items: &[T], page_size: usize, page_number: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_pages = total_pages(items.len(), page_size);
    let page_number = clamp_page(page_number, total_pages);
    let start = (page_number - 1) * page_size;
    Page {
        items: items.iter().skip(start).take(page_size).cloned().collect(),
        page_number,
        total_pages,
        total_items: items.len(),
    }
}
