//! # Records
//!
//! The Peoplepad record model and the storage seam semantic search runs on.
//!
//! - [`Record`]: a contact with free-text notes, tags and an optional
//!   embedding of those notes
//! - [`SearchFilter`]: owner, creation-date and tag-prefix predicates
//! - [`rank_records`]: the reference nearest-neighbour ranking
//! - [`RecordStore`]: the async storage interface, with
//!   [`InMemoryRecordStore`] as the in-process implementation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use peoplepad_records::{InMemoryRecordStore, RecordDraft, RecordStore};
//!
//! let store = InMemoryRecordStore::new(768);
//! let record = store
//!     .create(owner_id, RecordDraft::new("John Doe").with_notes("Met at conference"))
//!     .await?;
//! ```

pub mod error;
pub mod filter;
pub mod record;
pub mod store;
pub mod vector;

pub use error::{Result, StoreError};
pub use filter::{SearchFilter, SearchHit, rank_records};
pub use record::{PendingEmbedding, Record, RecordDraft, RecordSummary, embeddable};
pub use store::{InMemoryRecordStore, RecordStore, WriteOutcome};
pub use vector::VectorColumn;
