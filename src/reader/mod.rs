pub mod backend;
pub mod compare;
pub mod page;
pub mod pricing;
pub mod reading_prefs;
pub mod session;
pub mod status_watch;
pub mod token_usage;

pub use page::ChapterPageData;
pub use session::{ChapterSession, RenderedView};
