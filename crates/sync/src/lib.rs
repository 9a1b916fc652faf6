pub mod compare;
pub mod mapping;
pub mod promote;
pub mod refresh;
pub mod store;

pub use refresh::{RefreshOutcome, RefreshState};
pub use store::{StoreClient, StoreError, WorkingRow};
