pub mod memory;
pub mod query;
pub mod store;
pub mod supabase;

pub use memory::MemoryStore;
pub use query::{Filter, Query, SortOrder};
pub use store::{decode, decode_all, tables, DocumentStore, Inserted, StoreError};
pub use supabase::{SupabaseClient, SupabaseStore};
