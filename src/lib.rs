//! haystack - fetch network device running configs and search them.
//!
//! Device configs are read from a telemetry dataset store, where each config
//! is a doubly linked list of line records delivered in no particular order.
//! [`assembler`] turns those records back into text, the results are stored
//! in a local corpus ([redb](https://github.com/cberner/redb) plus a
//! [Tantivy](https://github.com/quickwit-oss/tantivy) BM25 index), and
//! [`search`] answers "match all terms" queries over it.
//!
//! # Quick start
//!
//! ```
//! use haystack::{LinkNode, LinkedRecordStore, assembler};
//!
//! let store: LinkedRecordStore = [
//!     LinkNode::new("2", " ip address 10.0.0.1/24", Some("1"), None),
//!     LinkNode::new("1", "interface Ethernet1", None, Some("2")),
//! ]
//! .into_iter()
//! .collect();
//!
//! let config = assembler::assemble(&store).unwrap();
//! assert_eq!(config, "interface Ethernet1\n ip address 10.0.0.1/24");
//!
//! let results = haystack::search::search(&["ethernet1", "10.0.0.1"], |_query| {
//!     Ok(vec![haystack::ResultRow {
//!         hostname: "leaf1".into(),
//!         serial_number: "SN1".into(),
//!         score: 1.0,
//!         config: Some(config.clone()),
//!     }])
//! })
//! .unwrap();
//! assert_eq!(results.len(), 1);
//! ```

pub mod assembler;
pub mod catalog;
pub mod cli;
pub mod corpus;
pub mod corpus_db;
pub mod data_dir;
pub mod error;
pub mod ingestion;
pub mod pipeline;
pub mod query_plan;
pub mod records;
pub mod search;
pub mod tantivy_index;
pub mod telemetry;

pub use catalog::Device;
pub use corpus::Corpus;
pub use data_dir::DataDir;
pub use error::{Error, Result};
pub use records::{LinkNode, LinkedRecordStore};
pub use search::ResultRow;
pub use tantivy_index::SearchIndex;
