//! The reduce operator: fold each maximal equal-key run of a sorted stream.

use std::sync::Arc;

use crate::error::Result;
use crate::group::Groups;
use crate::row::{Row, RowStream};

/// Folds one group of rows into zero or more output rows. Receives the
/// grouping columns and the full group, called once per maximal run of equal
/// keys. The input stream must be sorted on the key-tuple.
pub trait Reducer: Send + Sync {
    fn reduce(&self, key_columns: &[String], rows: Vec<Row>) -> Result<Vec<Row>>;
}

impl<F> Reducer for F
where
    F: Fn(&[String], Vec<Row>) -> Result<Vec<Row>> + Send + Sync,
{
    fn reduce(&self, key_columns: &[String], rows: Vec<Row>) -> Result<Vec<Row>> {
        self(key_columns, rows)
    }
}

pub(crate) struct Reduce {
    reducer: Arc<dyn Reducer>,
    keys: Vec<String>,
    groups: Groups,
    pending: std::vec::IntoIter<Row>,
    done: bool,
}

impl Reduce {
    pub(crate) fn new(reducer: Arc<dyn Reducer>, keys: Vec<String>, input: RowStream) -> Self {
        Self {
            reducer,
            groups: Groups::new(input, keys.clone(), "reduce"),
            keys,
            pending: Vec::new().into_iter(),
            done: false,
        }
    }
}

impl Iterator for Reduce {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if let Some(row) = self.pending.next() {
                return Some(Ok(row));
            }
            match self.groups.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(group)) => match self.reducer.reduce(&self.keys, group.rows) {
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
