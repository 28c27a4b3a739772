//! Fixed-size page slicing for list views.

use serde::Deserialize;

/// `?page=N` query parameter. Anything that is not a positive integer means page 1.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<String>,
}

impl PageQuery {
    pub fn number(&self) -> usize {
        self.page
            .as_deref()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|&n| n >= 1)
            .unwrap_or(1)
    }
}

/// One page of an ordered sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number that was requested
    pub number: usize,
    /// Always at least 1, even for an empty sequence
    pub num_pages: usize,
    /// Length of the whole sequence
    pub total: usize,
}

/// Slice `items` into pages of `page_size` and return page `number`.
/// A number past the last page yields an empty page.
pub fn paginate<T>(items: Vec<T>, number: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let number = number.max(1);
    let total = items.len();
    let num_pages = total.div_ceil(page_size).max(1);

    let items = items
        .into_iter()
        .skip((number - 1).saturating_mul(page_size))
        .take(page_size)
        .collect();

    Page {
        items,
        number,
        num_pages,
        total,
    }
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            total: self.total,
        }
    }

    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<_, E>>()?,
            number: self.number,
            num_pages: self.num_pages,
            total: self.total,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_other_pages(&self) -> bool {
        self.num_pages > 1
    }

    pub fn previous_number(&self) -> usize {
        self.number.saturating_sub(1).clamp(1, self.num_pages)
    }

    pub fn next_number(&self) -> usize {
        (self.number + 1).min(self.num_pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(raw: Option<&str>) -> PageQuery {
        PageQuery {
            page: raw.map(str::to_string),
        }
    }

    #[test]
    fn page_number_defaults_to_first() {
        assert_eq!(query(None).number(), 1);
        assert_eq!(query(Some("")).number(), 1);
        assert_eq!(query(Some("abc")).number(), 1);
        assert_eq!(query(Some("0")).number(), 1);
        assert_eq!(query(Some("-3")).number(), 1);
        assert_eq!(query(Some("4")).number(), 4);
    }

    #[test]
    fn last_page_holds_the_remainder() {
        for total in 1usize..=12 {
            for size in 1..=5 {
                let last = total.div_ceil(size);
                let page = paginate((0..total).collect::<Vec<_>>(), last, size);
                let expected = if total % size == 0 { size } else { total % size };
                assert_eq!(page.len(), expected, "total={total} size={size}");
                assert_eq!(page.num_pages, last);
                assert!(!page.has_next());
            }
        }
    }

    #[test]
    fn past_the_end_is_empty() {
        let page = paginate(vec![1, 2, 3], 3, 2);
        assert!(page.is_empty());
        assert_eq!(page.num_pages, 2);
        assert_eq!(page.total, 3);

        let page = paginate(vec![1, 2, 3], usize::MAX, 2);
        assert!(page.is_empty());
    }

    #[test]
    fn empty_sequence_has_one_empty_page() {
        let page = paginate(Vec::<u8>::new(), 1, 10);
        assert!(page.is_empty());
        assert_eq!(page.num_pages, 1);
        assert!(!page.has_other_pages());
    }

    #[test]
    fn neighbours() {
        let page = paginate((1..=5).collect::<Vec<_>>(), 2, 2);
        assert_eq!(page.items, vec![3, 4]);
        assert!(page.has_previous());
        assert!(page.has_next());
        assert_eq!(page.previous_number(), 1);
        assert_eq!(page.next_number(), 3);
    }
}
