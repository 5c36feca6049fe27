//! Catalog query: filter, partition and sort
//!
//! [`derive_list`] is a pure function of the record set and the view state.
//! Completed books always come after active ones, whatever the sort order.

use std::cmp::Ordering;
use std::fmt;

use icu_collator::{Collator, CollatorOptions};
use icu_locid::Locale;
use icu_provider::DataLocale;
use tracing::warn;

use super::data::{BookRecord, EmptyState, SortOrder, ViewState};

/// Locale-aware text comparison for titles and authors
pub struct Collation {
    tag: String,
    /// `None` only if ICU data for even the root locale is unavailable
    collator: Option<Collator>,
}

impl Collation {
    /// Collation for a BCP-47 tag such as `"ja"` or `"de-DE"`.
    ///
    /// An unparseable or unsupported tag falls back to the root collation.
    pub fn for_locale(tag: &str) -> Self {
        let collator = match tag.parse::<Locale>() {
            Ok(locale) => {
                let data_locale = DataLocale::from(&locale);
                match Collator::try_new(&data_locale, CollatorOptions::new()) {
                    Ok(collator) => Some(collator),
                    Err(err) => {
                        warn!(locale = tag, error = %err, "no collation data for locale, using root");
                        None
                    }
                }
            }
            Err(err) => {
                warn!(locale = tag, error = %err, "invalid collation locale, using root");
                None
            }
        };

        match collator {
            Some(collator) => Self {
                tag: tag.to_string(),
                collator: Some(collator),
            },
            None => Self::root(),
        }
    }

    /// Locale-independent Unicode collation
    pub fn root() -> Self {
        let collator = Collator::try_new(&DataLocale::default(), CollatorOptions::new())
            .map_err(|err| warn!(error = %err, "root collation unavailable, comparing code points"))
            .ok();
        Self {
            tag: "und".to_string(),
            collator,
        }
    }

    /// Locale tag this collation was built for
    pub fn locale(&self) -> &str {
        &self.tag
    }

    pub fn compare(&self, left: &str, right: &str) -> Ordering {
        match &self.collator {
            Some(collator) => collator.compare(left, right),
            None => left.cmp(right),
        }
    }
}

impl fmt::Debug for Collation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collation")
            .field("locale", &self.tag)
            .field("icu", &self.collator.is_some())
            .finish()
    }
}

/// Filter, partition and sort `records` for display.
///
/// Each call is a full pass over the record set; there is no incremental
/// update, so cost grows with catalog size. Cover bytes are shared with
/// `records`, not copied.
pub fn derive_list(records: &[BookRecord], view: ViewState, collation: &Collation) -> Vec<BookRecord> {
    let (mut active, mut completed): (Vec<&BookRecord>, Vec<&BookRecord>) = records
        .iter()
        .filter(|book| view.filter_status.map_or(true, |status| book.status == status))
        .partition(|book| !book.status.is_read());

    sort_partition(&mut active, view.sort_order, collation);
    sort_partition(&mut completed, view.sort_order, collation);

    active.into_iter().chain(completed).cloned().collect()
}

/// Stable in-place sort; equal keys keep their input order.
///
/// Descending orders flip the comparator rather than reversing the output,
/// which would also reverse ties.
fn sort_partition(books: &mut [&BookRecord], order: SortOrder, collation: &Collation) {
    match order {
        SortOrder::AddedDesc => books.sort_by(|a, b| b.added_date.cmp(&a.added_date)),
        SortOrder::AddedAsc => books.sort_by(|a, b| a.added_date.cmp(&b.added_date)),
        SortOrder::TitleAsc => books.sort_by(|a, b| collation.compare(&a.title, &b.title)),
        SortOrder::TitleDesc => books.sort_by(|a, b| collation.compare(&b.title, &a.title)),
        SortOrder::AuthorAsc => books.sort_by(|a, b| collation.compare(&a.author, &b.author)),
        SortOrder::AuthorDesc => books.sort_by(|a, b| collation.compare(&b.author, &a.author)),
    }
}

/// The list the user sees, with the view state that produced it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DerivedList {
    pub books: Vec<BookRecord>,
    pub view: ViewState,
}

impl DerivedList {
    pub fn compute(records: &[BookRecord], view: ViewState, collation: &Collation) -> Self {
        Self {
            books: derive_list(records, view, collation),
            view,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    /// Which empty-state message applies, or `None` if there are books to show
    pub fn empty_state(&self) -> Option<EmptyState> {
        if !self.books.is_empty() {
            return None;
        }
        Some(match self.view.filter_status {
            Some(status) => EmptyState::NoneWithStatus(status),
            None => EmptyState::NoBooks,
        })
    }
}
