//! Data sources: named row iterators and line-parsed files.
//!
//! An iterator source yields whatever the binding of its name produces at
//! `run`. A file source opens its path lazily on the first pull, reads line by
//! line, and flattens the rows produced by a caller-supplied parser. The
//! canonical parser for the bundled pipelines, [`json_array_parser`], expects
//! each line to hold one JSON array of row objects; [`json_line_parser`]
//! accepts the more common one-object-per-line framing.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use crate::error::{Error, Result};
use crate::graph::Bindings;
use crate::row::{Row, RowStream};

/// Turns one text line into zero or more rows.
pub type LineParser = dyn Fn(&str) -> anyhow::Result<Vec<Row>> + Send + Sync;

/// Parse a line holding a single JSON array of row objects.
pub fn json_array_parser(line: &str) -> anyhow::Result<Vec<Row>> {
    if line.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Vec<Row>>(line).context("expected a JSON array of row objects")
}

/// Parse a line holding a single JSON row object. Blank lines yield nothing.
pub fn json_line_parser(line: &str) -> anyhow::Result<Vec<Row>> {
    if line.trim().is_empty() {
        return Ok(Vec::new());
    }
    let row = serde_json::from_str::<Row>(line).context("expected a JSON row object")?;
    Ok(vec![row])
}

/// The root of every graph.
#[derive(Clone)]
pub(crate) enum SourceKind {
    /// Pulls rows from the binding registered under `name`.
    Iter { name: String },
    /// Reads `path` line by line through `parser`.
    File {
        path: PathBuf,
        parser: Arc<LineParser>,
    },
}

impl SourceKind {
    pub(crate) fn open(&self, bindings: &Bindings) -> Result<RowStream> {
        match self {
            SourceKind::Iter { name } => bindings.open(name),
            SourceKind::File { path, parser } => Ok(Box::new(FileSource {
                path: path.clone(),
                parser: Arc::clone(parser),
                state: FileState::Unopened,
                pending: Vec::new().into_iter(),
                line: 0,
            })),
        }
    }
}

struct FileSource {
    path: PathBuf,
    parser: Arc<LineParser>,
    state: FileState,
    pending: std::vec::IntoIter<Row>,
    line: usize,
}

enum FileState {
    Unopened,
    Reading(Lines<BufReader<File>>),
    Done,
}

impl Iterator for FileSource {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.pending.next() {
                return Some(Ok(row));
            }
            match &mut self.state {
                FileState::Done => return None,
                FileState::Unopened => match File::open(&self.path) {
                    Ok(file) => self.state = FileState::Reading(BufReader::new(file).lines()),
                    Err(e) => {
                        self.state = FileState::Done;
                        return Some(Err(e.into()));
                    }
                },
                FileState::Reading(lines) => match lines.next() {
                    None => self.state = FileState::Done,
                    Some(Err(e)) => {
                        self.state = FileState::Done;
                        return Some(Err(e.into()));
                    }
                    Some(Ok(line)) => {
                        self.line += 1;
                        match (self.parser)(&line) {
                            Ok(rows) => self.pending = rows.into_iter(),
                            Err(cause) => {
                                self.state = FileState::Done;
                                return Some(Err(Error::Parser {
                                    line: self.line,
                                    cause,
                                }));
                            }
                        }
                    }
                },
            }
        }
    }
}
