pub mod table_cache;
pub mod table_loader;
pub mod xlsx;

pub use table_cache::TableCache;
pub use table_loader::{SourceFormat, TableLoader};
