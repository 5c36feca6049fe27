//! Reactive derived list
//!
//! [`CatalogView`] combines the store's snapshot stream with the current sort
//! order and status filter, and republishes the derived list whenever any of
//! the three changes. Rapid changes coalesce; subscribers always end up on the
//! latest combination.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::data::{BookStatus, SortOrder, ViewState};
use super::library::Snapshot;
use super::query::{Collation, DerivedList};

/// State holder for the list the presentation layer renders
pub struct CatalogView {
    view_tx: watch::Sender<ViewState>,
    output_rx: watch::Receiver<Arc<DerivedList>>,
    task: JoinHandle<()>,
}

impl CatalogView {
    /// Start recomputing from `snapshots`.
    ///
    /// The first list is computed before returning, so [`current`](Self::current)
    /// is valid immediately. Must be called from within a tokio runtime.
    pub fn spawn(mut snapshots: watch::Receiver<Snapshot>, collation: Collation, initial: ViewState) -> Self {
        let (view_tx, mut view_rx) = watch::channel(initial);

        let records = snapshots.borrow_and_update().clone();
        let first = DerivedList::compute(&records, initial, &collation);
        let (output_tx, output_rx) = watch::channel(Arc::new(first));

        let task = tokio::spawn(async move {
            let mut store_open = true;
            loop {
                tokio::select! {
                    changed = snapshots.changed(), if store_open => {
                        if changed.is_err() {
                            // Keep serving view changes against the last snapshot
                            debug!("snapshot stream closed");
                            store_open = false;
                            continue;
                        }
                    }
                    changed = view_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }

                let records = snapshots.borrow_and_update().clone();
                let view = *view_rx.borrow_and_update();
                let derived = DerivedList::compute(&records, view, &collation);
                trace!(
                    records = records.len(),
                    shown = derived.len(),
                    sort = %view.sort_order,
                    "recomputed catalog view"
                );
                output_tx.send_replace(Arc::new(derived));
            }
        });

        Self {
            view_tx,
            output_rx,
            task,
        }
    }

    pub fn set_sort_order(&self, order: SortOrder) {
        debug!(%order, "sort order changed");
        self.view_tx.send_modify(|view| view.sort_order = order);
    }

    /// `None` clears the filter
    pub fn set_filter_status(&self, status: Option<BookStatus>) {
        debug!(?status, "status filter changed");
        self.view_tx.send_modify(|view| view.filter_status = status);
    }

    /// The latest view inputs (not necessarily reflected in `current()` yet)
    pub fn view_state(&self) -> ViewState {
        *self.view_tx.borrow()
    }

    /// Most recently published list
    pub fn current(&self) -> Arc<DerivedList> {
        self.output_rx.borrow().clone()
    }

    /// Receiver that is notified on every republished list
    pub fn subscribe(&self) -> watch::Receiver<Arc<DerivedList>> {
        self.output_rx.clone()
    }
}

impl std::fmt::Debug for CatalogView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogView")
            .field("view", &self.view_state())
            .field("shown", &self.output_rx.borrow().len())
            .finish()
    }
}

impl Drop for CatalogView {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::{BookRecord, Timestamp};
    use crate::state::library::BookStore;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn at(ms: i64) -> Timestamp {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    async fn settle(view: &CatalogView, mut done: impl FnMut(&DerivedList) -> bool) -> Arc<DerivedList> {
        let mut rx = view.subscribe();
        let list = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|list| done(list.as_ref())))
            .await
            .expect("view never settled")
            .expect("view task stopped");
        Arc::clone(&*list)
    }

    fn titles(list: &DerivedList) -> Vec<&str> {
        list.books.iter().map(|b| b.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_initial_list_is_ready_immediately() {
        let store = BookStore::open_in_memory().unwrap();
        store.insert(&BookRecord::new("1", "a", at(1))).unwrap();
        store.insert(&BookRecord::new("2", "a", at(2))).unwrap();

        let view = CatalogView::spawn(store.observe(), Collation::root(), ViewState::default());
        assert_eq!(titles(&view.current()), ["2", "1"]);
    }

    #[tokio::test]
    async fn test_recomputes_on_store_change() {
        let store = BookStore::open_in_memory().unwrap();
        let view = CatalogView::spawn(store.observe(), Collation::root(), ViewState::default());
        assert_eq!(view.current().empty_state(), Some(crate::state::data::EmptyState::NoBooks));

        let mut books: Vec<_> = (1..=3)
            .map(|i| BookRecord::new(i.to_string(), "a", at(i)))
            .collect();
        for book in &books {
            store.insert(book).unwrap();
        }
        let list = settle(&view, |l| l.len() == 3).await;
        assert_eq!(titles(&list), ["3", "2", "1"]);

        books[1].apply_status(BookStatus::Read, at(10));
        store.update(&books[1]).unwrap();
        let list = settle(&view, |l| l.books.last().is_some_and(|b| b.status.is_read())).await;
        assert_eq!(titles(&list), ["3", "1", "2"]);
    }

    #[tokio::test]
    async fn test_recomputes_on_view_change() {
        let store = BookStore::open_in_memory().unwrap();
        let mut reading = BookRecord::new("b", "y", at(1));
        reading.apply_status(BookStatus::Reading, at(1));
        store.insert(&reading).unwrap();
        store.insert(&BookRecord::new("a", "z", at(2))).unwrap();

        let view = CatalogView::spawn(store.observe(), Collation::root(), ViewState::default());

        view.set_sort_order(SortOrder::TitleAsc);
        let list = settle(&view, |l| l.view.sort_order == SortOrder::TitleAsc).await;
        assert_eq!(titles(&list), ["a", "b"]);

        view.set_filter_status(Some(BookStatus::Reading));
        let list = settle(&view, |l| l.view.filter_status.is_some()).await;
        assert_eq!(titles(&list), ["b"]);

        view.set_filter_status(Some(BookStatus::Read));
        let list = settle(&view, |l| l.view.filter_status == Some(BookStatus::Read)).await;
        assert_eq!(list.empty_state(), Some(crate::state::data::EmptyState::NoneWithStatus(BookStatus::Read)));

        view.set_filter_status(None);
        let list = settle(&view, |l| l.view.filter_status.is_none()).await;
        assert_eq!(list.len(), 2);
    }

    #[tokio::test]
    async fn test_rapid_changes_settle_on_latest() {
        let store = BookStore::open_in_memory().unwrap();
        store.insert(&BookRecord::new("x", "m", at(1))).unwrap();
        store.insert(&BookRecord::new("y", "n", at(2))).unwrap();
        let view = CatalogView::spawn(store.observe(), Collation::root(), ViewState::default());

        for order in SortOrder::ALL {
            view.set_sort_order(order);
        }
        view.set_sort_order(SortOrder::AuthorDesc);
        assert_eq!(view.view_state().sort_order, SortOrder::AuthorDesc);

        let list = settle(&view, |l| l.view.sort_order == SortOrder::AuthorDesc).await;
        assert_eq!(titles(&list), ["y", "x"]);
    }

    #[tokio::test]
    async fn test_view_changes_still_apply_after_store_dropped() {
        let store = BookStore::open_in_memory().unwrap();
        store.insert(&BookRecord::new("b", "m", at(1))).unwrap();
        store.insert(&BookRecord::new("a", "n", at(2))).unwrap();
        let view = CatalogView::spawn(store.observe(), Collation::root(), ViewState::default());
        drop(store);

        view.set_sort_order(SortOrder::TitleAsc);
        let list = settle(&view, |l| l.view.sort_order == SortOrder::TitleAsc).await;
        assert_eq!(titles(&list), ["a", "b"]);
    }
}
