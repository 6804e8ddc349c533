use gutenshelf_common::genre::GenreTable;
use gutenshelf_common::utils::paging::MAX_LIMIT;
use gutenshelf_storage::Storage;
use std::sync::Arc;

/// Everything a request needs: the store, the genre table and the listing cap.
/// Cheap to clone; built once at startup.
#[derive(Clone)]
pub struct App {
    pub storage: Storage,
    pub genres: Arc<GenreTable>,
    pub max_page_size: u64,
}

impl App {
    pub fn new(storage: Storage, genres: GenreTable) -> Self {
        Self {
            storage,
            genres: Arc::new(genres),
            max_page_size: MAX_LIMIT,
        }
    }

    pub fn with_max_page_size(mut self, max_page_size: u64) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }
}
