//! Graph composition and the execution driver.
//!
//! A [`Graph`] is an inert, value-like description of a pipeline: one source
//! followed by a chain of operators, where each join operator owns the graph
//! producing its right input. Composition methods never mutate the receiver:
//! every call returns a new graph, so a prefix can be extended in several
//! directions (the bundled TF-IDF pipeline reuses one tokenized prefix three
//! ways).
//!
//! Nothing runs until [`Graph::run`]: it wires the source to the operator
//! chain and returns a lazy row stream. Each run owns its state, so one graph
//! may be run many times, with different bindings or concurrently, and join
//! subgraphs are re-executed with the same bindings on every run.
//!
//! ```
//! use rowflow::{row, Bindings, Graph, Result, Row};
//!
//! let graph = Graph::from_iter("numbers").map(|mut row: Row| -> Result<Vec<Row>> {
//!     let doubled = row.require("n")?.as_int().unwrap_or(0) * 2;
//!     row.set("n", doubled);
//!     Ok(vec![row])
//! });
//!
//! let bindings = Bindings::new().rows("numbers", vec![row! { "n" => 1 }, row! { "n" => 2 }]);
//! let out: Result<Vec<Row>> = graph.run(&bindings)?.collect();
//! assert_eq!(out?, vec![row! { "n" => 2 }, row! { "n" => 4 }]);
//! # rowflow::Result::<()>::Ok(())
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::join::{Joiner, MergeJoin};
use crate::map::{Map, Mapper};
use crate::reduce::{Reduce, Reducer};
use crate::row::{Row, RowStream};
use crate::sort::{ExternalSort, SortConfig};
use crate::source::{LineParser, SourceKind};

/// Zero-argument callable producing a fresh row sequence for a named source.
pub type SourceFn = dyn Fn() -> RowStream + Send + Sync;

/// Maps iterator-source names to callables supplying their rows at `run`.
#[derive(Clone, Default)]
pub struct Bindings {
    sources: HashMap<String, Arc<SourceFn>>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to a callable invoked once per run for a fresh sequence.
    pub fn source<F, I>(mut self, name: impl Into<String>, source: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: IntoIterator<Item = Row>,
        I::IntoIter: Send + 'static,
    {
        self.sources.insert(
            name.into(),
            Arc::new(move || Box::new(source().into_iter().map(Ok)) as RowStream),
        );
        self
    }

    /// Bind `name` to a vector of rows, cloned on every run.
    pub fn rows(self, name: impl Into<String>, rows: Vec<Row>) -> Self {
        self.source(name, move || rows.clone())
    }

    pub(crate) fn open(&self, name: &str) -> Result<RowStream> {
        match self.sources.get(name) {
            Some(source) => Ok(source()),
            None => Err(Error::Construction(format!(
                "no binding for source {name:?}"
            ))),
        }
    }
}

#[derive(Clone)]
enum Operator {
    Map(Arc<dyn Mapper>),
    Reduce {
        reducer: Arc<dyn Reducer>,
        keys: Vec<String>,
    },
    Sort {
        keys: Vec<String>,
        config: SortConfig,
    },
    Join {
        joiner: Arc<dyn Joiner>,
        right: Graph,
        keys: Vec<String>,
    },
}

/// An immutable pipeline description. See the [module docs](self).
#[derive(Clone)]
pub struct Graph {
    source: SourceKind,
    operators: Vec<Operator>,
}

impl Graph {
    /// A graph reading from the iterator bound under `name` at `run`.
    pub fn from_iter(name: impl Into<String>) -> Graph {
        Graph {
            source: SourceKind::Iter { name: name.into() },
            operators: Vec::new(),
        }
    }

    /// A graph reading `path` line by line through `parser`.
    pub fn from_file<F>(path: impl Into<PathBuf>, parser: F) -> Graph
    where
        F: Fn(&str) -> anyhow::Result<Vec<Row>> + Send + Sync + 'static,
    {
        Graph {
            source: SourceKind::File {
                path: path.into(),
                parser: Arc::new(parser) as Arc<LineParser>,
            },
            operators: Vec::new(),
        }
    }

    fn extended(&self, operator: Operator) -> Graph {
        let mut graph = self.clone();
        graph.operators.push(operator);
        graph
    }

    /// Extend with a map operator.
    pub fn map(&self, mapper: impl Mapper + 'static) -> Graph {
        self.extended(Operator::Map(Arc::new(mapper)))
    }

    /// Extend with a reduce operator grouping on `keys`. The upstream must be
    /// sorted on `keys`; place a [`sort`](Graph::sort) before it.
    pub fn reduce<S: AsRef<str>>(&self, reducer: impl Reducer + 'static, keys: &[S]) -> Graph {
        self.extended(Operator::Reduce {
            reducer: Arc::new(reducer),
            keys: owned(keys),
        })
    }

    /// Extend with an external sort on `keys`, using the default
    /// [`SortConfig`].
    pub fn sort<S: AsRef<str>>(&self, keys: &[S]) -> Graph {
        self.sort_with(keys, SortConfig::default())
    }

    /// Extend with an external sort on `keys` under explicit operational
    /// parameters.
    pub fn sort_with<S: AsRef<str>>(&self, keys: &[S], config: SortConfig) -> Graph {
        self.extended(Operator::Sort {
            keys: owned(keys),
            config,
        })
    }

    /// Extend with a sort-merge join against `right` on `keys`. Both this
    /// graph's output and `right`'s output must be sorted on `keys`. The
    /// right graph is owned by the join node and executed with the same
    /// bindings on every run.
    pub fn join<S: AsRef<str>>(
        &self,
        joiner: impl Joiner + 'static,
        right: &Graph,
        keys: &[S],
    ) -> Graph {
        self.extended(Operator::Join {
            joiner: Arc::new(joiner),
            right: right.clone(),
            keys: owned(keys),
        })
    }

    /// Execute the graph, materializing a fresh lazy row stream.
    pub fn run(&self, bindings: &Bindings) -> Result<RowStream> {
        let mut stream = self.source.open(bindings)?;
        for operator in &self.operators {
            stream = match operator {
                Operator::Map(mapper) => Box::new(Map::new(Arc::clone(mapper), stream)),
                Operator::Reduce { reducer, keys } => {
                    Box::new(Reduce::new(Arc::clone(reducer), keys.clone(), stream))
                }
                Operator::Sort { keys, config } => {
                    Box::new(ExternalSort::new(keys.clone(), config.clone(), stream))
                }
                Operator::Join {
                    joiner,
                    right,
                    keys,
                } => {
                    let right_stream = right.run(bindings)?;
                    Box::new(MergeJoin::new(
                        Arc::clone(joiner),
                        keys.clone(),
                        stream,
                        right_stream,
                    ))
                }
            };
        }
        Ok(stream)
    }
}

fn owned<S: AsRef<str>>(keys: &[S]) -> Vec<String> {
    keys.iter().map(|k| k.as_ref().to_owned()).collect()
}
