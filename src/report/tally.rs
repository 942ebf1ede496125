//! Per-page findings and their merge.

use std::collections::BTreeMap;

use super::{PageAnomaly, PageSizeCount, WorstMargins};
use crate::analysis::{LowDpiImage, MarginViolation};
use crate::backend::ObjectRef;

/// Page sizes are grouped in thousandths of a point.
const SIZE_SCALE: f64 = 1000.0;

/// Pages sharing one rounded size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeGroup {
    /// Earliest page of this size
    pub first_page: u32,
    pub count: usize,
}

/// Findings of one page, or of a run of consecutive pages after merging.
///
/// [`merge`](Self::merge) is associative with [`Default`] as identity, and
/// expects `self` to cover the earlier pages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageTally {
    /// Pages per rounded size
    pub sizes: BTreeMap<(i64, i64), SizeGroup>,
    pub annotations: usize,
    pub form_fields: usize,
    /// Font handles with the name first seen for them
    pub fonts: BTreeMap<ObjectRef, String>,
    pub low_dpi: Vec<LowDpiImage>,
    pub worst: WorstMargins,
    pub violations: Vec<MarginViolation>,
    pub anomalies: Vec<PageAnomaly>,
}

impl PageTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count `page` under its size.
    pub fn add_size(&mut self, page: u32, width_pt: f64, height_pt: f64) {
        self.sizes
            .entry(size_key(width_pt, height_pt))
            .and_modify(|group| {
                group.first_page = group.first_page.min(page);
                group.count += 1;
            })
            .or_insert(SizeGroup {
                first_page: page,
                count: 1,
            });
    }

    /// Record a font unless an earlier page already named it.
    pub fn add_font(&mut self, handle: ObjectRef, name: impl Into<String>) {
        self.fonts.entry(handle).or_insert_with(|| name.into());
    }

    /// Fold `later` into `self`.
    pub fn merge(mut self, later: Self) -> Self {
        for (key, group) in later.sizes {
            self.sizes
                .entry(key)
                .and_modify(|g| {
                    g.first_page = g.first_page.min(group.first_page);
                    g.count += group.count;
                })
                .or_insert(group);
        }
        self.annotations += later.annotations;
        self.form_fields += later.form_fields;
        for (handle, name) in later.fonts {
            self.fonts.entry(handle).or_insert(name);
        }
        self.low_dpi.extend(later.low_dpi);
        self.worst = self.worst.combine(later.worst);
        self.violations.extend(later.violations);
        self.anomalies.extend(later.anomalies);
        self
    }

    /// Distinct page sizes, most common first. Ties go to the size seen on
    /// the earlier page.
    pub fn page_sizes(&self) -> Vec<PageSizeCount> {
        let mut groups: Vec<(&(i64, i64), &SizeGroup)> = self.sizes.iter().collect();
        groups.sort_by(|(_, a), (_, b)| {
            b.count
                .cmp(&a.count)
                .then(a.first_page.cmp(&b.first_page))
        });
        groups
            .into_iter()
            .map(|(&(w, h), group)| PageSizeCount {
                width_pt: w as f64 / SIZE_SCALE,
                height_pt: h as f64 / SIZE_SCALE,
                count: group.count,
            })
            .collect()
    }
}

fn size_key(width_pt: f64, height_pt: f64) -> (i64, i64) {
    (
        (width_pt * SIZE_SCALE).round() as i64,
        (height_pt * SIZE_SCALE).round() as i64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Margins;

    fn page(n: u32, top: f64) -> PageTally {
        let mut tally = PageTally::new();
        tally.add_size(n, 396.0, 612.0);
        let margins = Margins {
            top,
            bottom: 0.5,
            inside: 0.5,
            outside: 0.5,
        };
        tally.worst = WorstMargins::from_page(n, &margins);
        if top < 0.25 {
            tally.violations.push(MarginViolation { page: n, margins });
        }
        tally
    }

    #[test]
    fn test_merge_is_associative() {
        let (a, b, c) = (page(1, 0.5), page(2, 0.1), page(3, 0.2));
        let left = a.clone().merge(b.clone()).merge(c.clone());
        let right = a.merge(b.merge(c));
        assert_eq!(left, right);
        assert_eq!(left.sizes.values().map(|g| g.count).sum::<usize>(), 3);
        assert_eq!(left.sizes.values().next().map(|g| g.first_page), Some(1));
        assert_eq!(
            left.violations.iter().map(|v| v.page).collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert_eq!(left.worst.top.map(|m| m.page), Some(2));
    }

    #[test]
    fn test_default_is_identity() {
        let a = page(1, 0.1);
        assert_eq!(PageTally::default().merge(a.clone()), a);
        assert_eq!(a.clone().merge(PageTally::default()), a);
    }

    #[test]
    fn test_first_font_name_wins() {
        let mut early = PageTally::new();
        early.add_font(ObjectRef::new(4, 0), "Garamond");
        let mut late = PageTally::new();
        late.add_font(ObjectRef::new(4, 0), "Garamond-Subset");
        late.add_font(ObjectRef::new(2, 0), "Helvetica");

        let merged = early.merge(late);
        assert_eq!(merged.fonts.len(), 2);
        assert_eq!(merged.fonts[&ObjectRef::new(4, 0)], "Garamond");
    }

    #[test]
    fn test_page_sizes_grouped_and_sorted() {
        let mut tally = PageTally::new();
        tally.add_size(1, 612.0, 792.0);
        for page in 2..5 {
            tally.add_size(page, 396.0, 612.0);
        }
        // within rounding of the first group
        tally.add_size(5, 396.0002, 612.0);

        let sizes = tally.page_sizes();
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[0].count, 4);
        assert_eq!((sizes[0].width_pt, sizes[0].height_pt), (396.0, 612.0));
        assert_eq!(sizes[1].count, 1);
    }

    #[test]
    fn test_page_size_ties_follow_first_page() {
        // letter on page 1, a smaller size on page 2, one page each
        let mut first = PageTally::new();
        first.add_size(1, 612.0, 792.0);
        let mut second = PageTally::new();
        second.add_size(2, 396.0, 612.0);

        for tally in [first.clone().merge(second.clone()), second.merge(first)] {
            let sizes = tally.page_sizes();
            assert_eq!((sizes[0].width_pt, sizes[0].height_pt), (612.0, 792.0));
            assert_eq!((sizes[1].width_pt, sizes[1].height_pt), (396.0, 612.0));
        }
    }

    #[test]
    fn test_anomalies_merge_in_page_order() {
        let mut a = PageTally::new();
        a.anomalies.push(PageAnomaly::new(1, "content stream: undecodable stream"));
        let mut b = PageTally::new();
        b.anomalies.push(PageAnomaly::new(4, "unreadable content stream: no operators"));

        let merged = a.merge(b);
        assert_eq!(
            merged.anomalies.iter().map(|a| a.page).collect::<Vec<_>>(),
            vec![1, 4]
        );
    }
}
