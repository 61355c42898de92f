//! Maximal-run grouping of a key-sorted stream, shared by reduce and join.

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::row::{Key, Row, RowStream};

/// A maximal run of consecutive rows sharing one key.
pub(crate) struct Group {
    pub key: Key,
    pub rows: Vec<Row>,
    /// Union of column names across the run's rows.
    pub columns: BTreeSet<String>,
}

/// Splits a stream into groups, verifying that keys never decrease. An
/// inversion surfaces as an order error in place of the group the offending
/// row would have started; groups already emitted stay delivered.
pub(crate) struct Groups {
    input: RowStream,
    keys: Vec<String>,
    context: &'static str,
    lookahead: Option<(Key, Row)>,
    done: bool,
}

impl Groups {
    pub(crate) fn new(input: RowStream, keys: Vec<String>, context: &'static str) -> Self {
        Self {
            input,
            keys,
            context,
            lookahead: None,
            done: false,
        }
    }

    fn pull(&mut self) -> Option<Result<(Key, Row)>> {
        match self.input.next()? {
            Err(e) => Some(Err(e)),
            Ok(row) => match row.key(&self.keys) {
                Ok(key) => Some(Ok((key, row))),
                Err(e) => Some(Err(e)),
            },
        }
    }
}

impl Iterator for Groups {
    type Item = Result<Group>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let (key, first) = match self.lookahead.take() {
            Some(pair) => pair,
            None => match self.pull() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(pair)) => pair,
            },
        };
        let mut group = Group {
            columns: first.columns().map(str::to_owned).collect(),
            key,
            rows: vec![first],
        };
        loop {
            match self.pull() {
                None => {
                    self.done = true;
                    return Some(Ok(group));
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok((key, row))) => {
                    if key == group.key {
                        group.columns.extend(row.columns().map(str::to_owned));
                        group.rows.push(row);
                    } else if key < group.key {
                        self.done = true;
                        return Some(Err(Error::Order {
                            context: self.context,
                            keys: self.keys.clone(),
                        }));
                    } else {
                        self.lookahead = Some((key, row));
                        return Some(Ok(group));
                    }
                }
            }
        }
    }
}
