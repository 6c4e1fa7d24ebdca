//! Rookery message archive.
//!
//! Durable, ordered storage of conversation messages per (owner, peer)
//! pair with filtered, cursor-paginated retrieval, per-peer collection
//! listings and domain-level retention sweeps.
//!
//! The pieces, leaf first:
//! - [`identity`] — normalized JID newtypes (the comparison contract)
//! - [`stanza`] — body / delay-stamp / type extraction from payloads
//! - [`store`] — the `ArchiveStore` seam plus in-memory and libSQL backends
//! - [`filter`], [`page`], [`collections`] — predicate, pagination,
//!   per-peer grouping, shared across backends
//! - [`retention`] — the domain-scoped expiry sweep
//! - [`repository`] — the facade composing all of the above
//! - [`registry`] — connection-URI scheme to backend constructor table
//!
//! ```no_run
//! use rookery_archive::{BackendRegistry, BareJid, Direction, Jid, QueryCriteria};
//! use std::collections::BTreeSet;
//!
//! # async fn demo() -> Result<(), rookery_archive::ArchiveError> {
//! let repo = BackendRegistry::default().open("memory:").await?;
//!
//! let owner = BareJid::new("alice@rookery.example")?;
//! let buddy = Jid::new("bob@rookery.example/home")?;
//! let payload: minidom::Element =
//!     "<message xmlns='jabber:client' type='chat'><body>hi</body></message>".parse().unwrap();
//! repo.archive_message(
//!     &owner,
//!     &buddy,
//!     Direction::Outgoing,
//!     chrono::Utc::now(),
//!     &payload,
//!     &BTreeSet::new(),
//! )
//! .await?;
//!
//! let page = repo.query_items(&QueryCriteria::new(owner)).await?;
//! assert_eq!(page.items.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod collections;
pub mod criteria;
pub mod error;
pub mod filter;
pub mod identity;
pub mod item;
pub mod page;
pub mod registry;
pub mod repository;
pub mod retention;
pub mod stanza;
pub mod store;

pub use criteria::{Cursor, CursorMode, Paging, QueryCriteria};
pub use error::ArchiveError;
pub use identity::{BareJid, Jid};
pub use item::{ArchivedItem, Collection, ConversationType, Direction};
pub use page::ItemPage;
pub use registry::{ArchiveConfig, BackendRegistry};
pub use repository::ArchiveRepository;
pub use retention::RetentionSweeper;
pub use store::{ArchiveStore, LibsqlArchiveStore, MemoryArchiveStore, ScanRange};
