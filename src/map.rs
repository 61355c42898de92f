//! The map operator: a per-row transform producing zero or more rows.

use std::sync::Arc;

use crate::error::Result;
use crate::row::{Row, RowStream};

/// A per-row transform. Output order is preserved row by row: one input row's
/// outputs all precede the next input row's outputs.
///
/// Closures of the matching shape implement this directly:
///
/// ```
/// use rowflow::{Graph, Row, Result};
///
/// let keep_short = |row: Row| -> Result<Vec<Row>> {
///     Ok(if row.len() <= 3 { vec![row] } else { vec![] })
/// };
/// let graph = Graph::from_iter("rows").map(keep_short);
/// # let _ = graph;
/// ```
pub trait Mapper: Send + Sync {
    fn apply(&self, row: Row) -> Result<Vec<Row>>;
}

impl<F> Mapper for F
where
    F: Fn(Row) -> Result<Vec<Row>> + Send + Sync,
{
    fn apply(&self, row: Row) -> Result<Vec<Row>> {
        self(row)
    }
}

/// Flattens the upstream through a mapper.
pub(crate) struct Map {
    mapper: Arc<dyn Mapper>,
    input: RowStream,
    pending: std::vec::IntoIter<Row>,
    done: bool,
}

impl Map {
    pub(crate) fn new(mapper: Arc<dyn Mapper>, input: RowStream) -> Self {
        Self {
            mapper,
            input,
            pending: Vec::new().into_iter(),
            done: false,
        }
    }
}

impl Iterator for Map {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if let Some(row) = self.pending.next() {
                return Some(Ok(row));
            }
            match self.input.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(row)) => match self.mapper.apply(row) {
                    Ok(rows) => self.pending = rows.into_iter(),
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                },
            }
        }
    }
}
