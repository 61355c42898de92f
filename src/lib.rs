//! # Rowflow
//!
//! A library for building and executing **computational graphs over row
//! streams**: lazy dataflow pipelines whose nodes are per-row transforms
//! (map), grouped aggregations (reduce), bounded-memory total orderings
//! (external sort), and two-input sort-merge joins. A row is a dynamically
//! typed mapping from column names to values; graphs are composed
//! declaratively and executed against named input streams.
//!
//! ## Quick Start
//!
//! ```
//! use rowflow::*;
//!
//! // Word count: tokenize, sort, count per word, sort by (count, word).
//! let graph = Graph::from_iter("docs")
//!     .map(FilterPunctuation::new("text"))
//!     .map(LowerCase::new("text"))
//!     .map(Split::new("text"))
//!     .sort(&["text"])
//!     .reduce(Count::new("count"), &["text"])
//!     .sort(&["count", "text"]);
//!
//! let bindings = Bindings::new().rows(
//!     "docs",
//!     vec![row! { "text" => "hello, WORLD" }, row! { "text" => "hello world!" }],
//! );
//! let out: Result<Vec<Row>> = graph.run(&bindings)?.collect();
//! assert_eq!(
//!     out?,
//!     vec![
//!         row! { "text" => "hello", "count" => 2 },
//!         row! { "text" => "world", "count" => 2 },
//!     ]
//! );
//! # rowflow::Result::<()>::Ok(())
//! ```
//!
//! ## Core Concepts
//!
//! ### `Graph`
//!
//! A [`Graph`] is an immutable description of a pipeline: one source followed
//! by a chain of operators. Composition methods ([`map`](Graph::map),
//! [`reduce`](Graph::reduce), [`sort`](Graph::sort), [`join`](Graph::join))
//! return a **new** graph and never mutate the receiver, so a shared prefix
//! can branch into several pipelines. A graph is inert until
//! [`run`](Graph::run), which materializes a fresh lazy [`RowStream`]; one
//! graph may be run many times, each run owning its own state.
//!
//! ### Rows and keys
//!
//! A [`Row`] maps column names to [`Value`]s (null, bool, int, float, string,
//! list). Ordering between rows exists only through explicit key-tuples of
//! column names; keys compare lexicographically, values totally. The
//! [`row!`] macro builds rows inline.
//!
//! ### Sources and bindings
//!
//! Graphs start from a named iterator source ([`Graph::from_iter`]) or a
//! line-parsed file ([`Graph::from_file`], with [`json_array_parser`] /
//! [`json_line_parser`] for the bundled framings). [`Bindings`] supply the
//! named sources at `run` as zero-argument callables returning fresh row
//! sequences.
//!
//! ### Operator contracts
//!
//! - [`Mapper`]: `Row -> zero or more rows`, order-preserving.
//! - [`Reducer`]: called once per maximal equal-key run of a **sorted**
//!   stream.
//! - [`Joiner`]: merge strategy ([`InnerJoiner`], [`LeftJoiner`],
//!   [`RightJoiner`], [`OuterJoiner`]) applied while merging two **sorted**
//!   streams; colliding non-key columns survive under `_1`/`_2` suffixes
//!   (see [`Suffixes`]).
//!
//! Sorting is never inserted automatically: place a `sort(keys)` before every
//! `reduce(keys)` and before both sides of a `join(keys)`. Unsorted input is
//! detected and fails the stream with an order error.
//!
//! ### External sort
//!
//! [`Graph::sort`] holds at most [`SortConfig::chunk_rows`] rows in memory;
//! larger streams spill sorted segments to a per-run temporary directory and
//! merge them through a min-heap. Spill files are deleted on completion, on
//! error, and when a stream is dropped mid-way. See [`SortConfig`] and
//! [`SpillFormat`].
//!
//! ### Errors
//!
//! All failures are typed [`Error`]s (construction, schema, order, parser,
//! I/O, user) and terminate the stream they occur in; the consumer observes
//! the error at the next pull. See [`ErrorKind`].
//!
//! ## Built-in catalog
//!
//! The [`mappers`] and [`reducers`] modules ship the transforms used by the
//! bundled pipelines in [`algorithms`]: word count, TF-IDF inverted index,
//! PMI, and road speed. They are ordinary implementations of the operator
//! contracts; nothing in the engine special-cases them.
//!
//! ## Module Overview
//!
//! - [`graph`] - graph composition, bindings, and the execution driver
//! - [`row`] - rows, values, keys, and their JSON form
//! - [`source`] - iterator and file sources, line parsers
//! - [`map`] / [`reduce`] / [`join`] - operator contracts and implementations
//! - [`sort`] - the bounded-memory external sort
//! - [`mappers`] / [`reducers`] - the built-in transform catalog
//! - [`algorithms`] - canned example pipelines
//! - [`error`] - error kinds

pub mod algorithms;
pub mod error;
pub mod graph;
mod group;
pub mod join;
pub mod map;
pub mod mappers;
pub mod reduce;
pub mod reducers;
pub mod row;
pub mod sort;
pub mod source;

pub use error::{Error, ErrorKind, Result};
pub use graph::{Bindings, Graph, SourceFn};
pub use join::{InnerJoiner, Joiner, LeftJoiner, OuterJoiner, RightJoiner, Suffixes};
pub use map::Mapper;
pub use mappers::*;
pub use reduce::Reducer;
pub use reducers::*;
pub use row::{Key, Row, RowStream, Value};
pub use sort::{SortConfig, SpillFormat};
pub use source::{json_array_parser, json_line_parser, LineParser};
