#[macro_use]
pub mod store;

pub mod cache;
pub mod config;
pub mod encoding;
pub mod error;
pub mod formats;
pub mod merge;
pub mod multistring;
pub mod terminology;
pub mod unit;


pub use cache::{read_store, write_store, CheckedOutStore, StoreCache};
pub use config::{CacheOptions, MatcherOptions, MergeOptions, OverwritePolicy, ParseOptions, StoreConfig};
pub use encoding::{Encoding, Newline};
pub use error::StoreError;
pub use formats::{new_store, parse_store, parse_store_bytes, FileFormat};
pub use merge::{merge_stores, MergeOutcome, Suggestion};
pub use multistring::Multistring;
pub use store::{ParseReport, StoreIndex, StoreMetadata, StoreStats, TranslationStore};
pub use terminology::{TermMatch, TermMatcher};
pub use unit::{NoteOrigin, SimpleUnit, TranslationUnit, UnitErrors};
