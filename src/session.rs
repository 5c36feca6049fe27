//! Process-wide wiring
//!
//! A [`Session`] is built once at startup from a [`CatalogConfig`] and torn
//! down by dropping it. There is no global store accessor.

use std::sync::Arc;

use tracing::info;

use crate::catalog::Catalog;
use crate::config::CatalogConfig;
use crate::error::StoreError;
use crate::state::library::BookStore;
use crate::state::query::Collation;
use crate::state::view::CatalogView;

/// The store, the mutation intents and the derived list, sharing one store
#[derive(Debug)]
pub struct Session {
    pub catalog: Catalog,
    pub view: CatalogView,
}

impl Session {
    /// Open the configured database and start the derived list.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(config: &CatalogConfig) -> Result<Self, StoreError> {
        let store = Arc::new(BookStore::open(&config.database_path)?);
        Ok(Self::with_store(store, config))
    }

    /// Same as [`open`](Self::open), around an existing store
    pub fn with_store(store: Arc<BookStore>, config: &CatalogConfig) -> Self {
        let collation = Collation::for_locale(&config.collation_locale);
        let view = CatalogView::spawn(store.observe(), collation, config.initial_view);
        let catalog = Catalog::new(store, config.cover);
        info!(
            books = view.current().len(),
            locale = %config.collation_locale,
            "catalog session started"
        );
        Self { catalog, view }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::{BookStatus, SortOrder, ViewState};
    use crate::state::query::DerivedList;
    use std::time::Duration;

    async fn settle(session: &Session, mut done: impl FnMut(&DerivedList) -> bool) -> Arc<DerivedList> {
        let mut rx = session.view.subscribe();
        let list = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|list| done(list.as_ref())))
            .await
            .expect("view never settled")
            .expect("view task stopped");
        Arc::clone(&*list)
    }

    #[tokio::test]
    async fn test_intents_flow_into_view() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let dir = tempfile::tempdir().unwrap();
        let config = CatalogConfig {
            database_path: dir.path().join("books.db"),
            initial_view: ViewState::new(SortOrder::TitleAsc, None),
            ..CatalogConfig::default()
        };
        let session = Session::open(&config).unwrap();

        let kokoro = session.catalog.add_book("こころ", "夏目漱石", "", None).await.unwrap();
        session.catalog.add_book("あ・うん", "向田邦子", "", None).await.unwrap();
        session.catalog.add_book("さようなら", "太宰治", "", None).await.unwrap();

        let list = settle(&session, |l| l.len() == 3).await;
        let titles: Vec<_> = list.books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, ["あ・うん", "こころ", "さようなら"]);

        session.catalog.set_status(&kokoro.id, BookStatus::Read).unwrap();
        let list = settle(&session, |l| l.books.last().is_some_and(|b| b.id == kokoro.id)).await;
        assert!(list.books.last().unwrap().read_date.is_some());

        session.view.set_filter_status(Some(BookStatus::Reading));
        let list = settle(&session, |l| l.view.filter_status.is_some()).await;
        assert!(list.is_empty());

        session.catalog.delete_book(&kokoro.id).unwrap();
        session.view.set_filter_status(None);
        let list = settle(&session, |l| l.view.filter_status.is_none() && l.len() == 2).await;
        assert!(list.books.iter().all(|b| b.id != kokoro.id));
    }
}
