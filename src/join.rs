//! Sort-merge join over two key-sorted row streams.
//!
//! The driver groups each side into maximal equal-key runs and walks both run
//! cursors in key order. At every step the [`Joiner`] strategy is applied with
//! the runs present on that step: both runs when keys match, one run when its
//! key is behind the other side or the other side is exhausted. Strategies
//! decide what an absent side means: inner drops the step, left/right/outer
//! pass the present side through.
//!
//! # Duplicate columns
//!
//! When a non-key column name appears on both sides, both occurrences survive
//! under suffixed names (`_1` for left-origin columns, `_2` for right-origin,
//! configurable via [`Suffixes`]). A per-join duplicates set records every
//! column name observed to collide: the non-key column intersection of the two
//! current runs is added whenever both cursors are loaded, and paired emission
//! adds any name present on both sides of a row pair. Once a name is in the
//! set it is renamed on every subsequent row it appears in, paired or
//! passed-through, so downstream consumers see one column layout instead of a
//! mixture of renamed and unrenamed rows.
//!
//! Either side failing to be non-decreasing on the key-tuple is fatal.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::Result;
use crate::group::Groups;
use crate::row::{Row, RowStream};

/// Column-rename suffixes for duplicate columns.
#[derive(Clone, Debug)]
pub struct Suffixes {
    left: String,
    right: String,
}

impl Suffixes {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }
}

impl Default for Suffixes {
    fn default() -> Self {
        Self::new("_1", "_2")
    }
}

/// A join strategy, applied once per key step of the merge.
///
/// `left`/`right` hold the current run on each side; an empty slice marks an
/// absent side (its cursor is behind, or exhausted). The duplicates set is
/// owned by the enclosing join and shared across all steps.
pub trait Joiner: Send + Sync {
    fn join(
        &self,
        key_columns: &[String],
        left: &[Row],
        right: &[Row],
        duplicates: &mut BTreeSet<String>,
    ) -> Result<Vec<Row>>;
}

/// Emit matched pairs only.
#[derive(Clone, Debug, Default)]
pub struct InnerJoiner {
    suffixes: Suffixes,
}

impl InnerJoiner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_suffixes(suffixes: Suffixes) -> Self {
        Self { suffixes }
    }
}

impl Joiner for InnerJoiner {
    fn join(
        &self,
        key_columns: &[String],
        left: &[Row],
        right: &[Row],
        duplicates: &mut BTreeSet<String>,
    ) -> Result<Vec<Row>> {
        if left.is_empty() || right.is_empty() {
            return Ok(Vec::new());
        }
        emit_pairs(key_columns, left, right, &self.suffixes, duplicates)
    }
}

/// Emit matched pairs plus unmatched left rows.
#[derive(Clone, Debug, Default)]
pub struct LeftJoiner {
    suffixes: Suffixes,
}

impl LeftJoiner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_suffixes(suffixes: Suffixes) -> Self {
        Self { suffixes }
    }
}

impl Joiner for LeftJoiner {
    fn join(
        &self,
        key_columns: &[String],
        left: &[Row],
        right: &[Row],
        duplicates: &mut BTreeSet<String>,
    ) -> Result<Vec<Row>> {
        if right.is_empty() {
            return Ok(pass_through(left, &self.suffixes.left, duplicates));
        }
        if left.is_empty() {
            return Ok(Vec::new());
        }
        emit_pairs(key_columns, left, right, &self.suffixes, duplicates)
    }
}

/// Emit matched pairs plus unmatched right rows.
#[derive(Clone, Debug, Default)]
pub struct RightJoiner {
    suffixes: Suffixes,
}

impl RightJoiner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_suffixes(suffixes: Suffixes) -> Self {
        Self { suffixes }
    }
}

impl Joiner for RightJoiner {
    fn join(
        &self,
        key_columns: &[String],
        left: &[Row],
        right: &[Row],
        duplicates: &mut BTreeSet<String>,
    ) -> Result<Vec<Row>> {
        if left.is_empty() {
            return Ok(pass_through(right, &self.suffixes.right, duplicates));
        }
        if right.is_empty() {
            return Ok(Vec::new());
        }
        emit_pairs(key_columns, left, right, &self.suffixes, duplicates)
    }
}

/// Emit matched pairs plus unmatched rows of both sides.
#[derive(Clone, Debug, Default)]
pub struct OuterJoiner {
    suffixes: Suffixes,
}

impl OuterJoiner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_suffixes(suffixes: Suffixes) -> Self {
        Self { suffixes }
    }
}

impl Joiner for OuterJoiner {
    fn join(
        &self,
        key_columns: &[String],
        left: &[Row],
        right: &[Row],
        duplicates: &mut BTreeSet<String>,
    ) -> Result<Vec<Row>> {
        if right.is_empty() {
            return Ok(pass_through(left, &self.suffixes.left, duplicates));
        }
        if left.is_empty() {
            return Ok(pass_through(right, &self.suffixes.right, duplicates));
        }
        emit_pairs(key_columns, left, right, &self.suffixes, duplicates)
    }
}

/// Cross product of two runs: key columns from the common key, non-key
/// columns from both rows, collisions suffixed and recorded.
fn emit_pairs(
    key_columns: &[String],
    left: &[Row],
    right: &[Row],
    suffixes: &Suffixes,
    duplicates: &mut BTreeSet<String>,
) -> Result<Vec<Row>> {
    let mut out = Vec::with_capacity(left.len() * right.len());
    for a in left {
        for b in right {
            let mut merged = Row::new();
            for column in key_columns {
                merged.set(column.clone(), a.require(column)?.clone());
            }
            merge_side(&mut merged, a, b, key_columns, &suffixes.left, duplicates);
            merge_side(&mut merged, b, a, key_columns, &suffixes.right, duplicates);
            out.push(merged);
        }
    }
    Ok(out)
}

fn merge_side(
    merged: &mut Row,
    row: &Row,
    other: &Row,
    key_columns: &[String],
    suffix: &str,
    duplicates: &mut BTreeSet<String>,
) {
    for (column, value) in row.iter() {
        if key_columns.iter().any(|k| k == column) {
            continue;
        }
        if duplicates.contains(column) || other.contains(column) {
            duplicates.insert(column.to_owned());
            merged.set(format!("{column}{suffix}"), value.clone());
        } else {
            merged.set(column, value.clone());
        }
    }
}

/// Single-side emission: rows pass unchanged except that columns already known
/// to collide keep their side's suffix.
fn pass_through(rows: &[Row], suffix: &str, duplicates: &BTreeSet<String>) -> Vec<Row> {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|(column, value)| {
                    let name = if duplicates.contains(column) {
                        format!("{column}{suffix}")
                    } else {
                        column.to_owned()
                    };
                    (name, value.clone())
                })
                .collect()
        })
        .collect()
}

/// The merge driver: advances the two run cursors in key order and applies
/// the strategy at each step.
pub(crate) struct MergeJoin {
    joiner: Arc<dyn Joiner>,
    keys: Vec<String>,
    left: Groups,
    right: Groups,
    current_left: Option<crate::group::Group>,
    current_right: Option<crate::group::Group>,
    duplicates: BTreeSet<String>,
    pending: std::vec::IntoIter<Row>,
    primed: bool,
    done: bool,
}

impl MergeJoin {
    pub(crate) fn new(
        joiner: Arc<dyn Joiner>,
        keys: Vec<String>,
        left: RowStream,
        right: RowStream,
    ) -> Self {
        Self {
            joiner,
            left: Groups::new(left, keys.clone(), "left join"),
            right: Groups::new(right, keys.clone(), "right join"),
            keys,
            current_left: None,
            current_right: None,
            duplicates: BTreeSet::new(),
            pending: Vec::new().into_iter(),
            primed: false,
            done: false,
        }
    }

    /// One merge step: `Ok(None)` when both sides are exhausted.
    fn step(&mut self) -> Result<Option<Vec<Row>>> {
        if !self.primed {
            self.primed = true;
            self.current_left = self.left.next().transpose()?;
            self.current_right = self.right.next().transpose()?;
        }
        let joiner = Arc::clone(&self.joiner);
        match (self.current_left.take(), self.current_right.take()) {
            (None, None) => Ok(None),
            (Some(left), None) => {
                let out = joiner.join(&self.keys, &left.rows, &[], &mut self.duplicates)?;
                self.current_left = self.left.next().transpose()?;
                Ok(Some(out))
            }
            (None, Some(right)) => {
                let out = joiner.join(&self.keys, &[], &right.rows, &mut self.duplicates)?;
                self.current_right = self.right.next().transpose()?;
                Ok(Some(out))
            }
            (Some(left), Some(right)) => {
                // Both runs are in view: any shared non-key column name is a
                // collision from here on, keys matching or not.
                for column in left.columns.intersection(&right.columns) {
                    if !self.keys.contains(column) {
                        self.duplicates.insert(column.clone());
                    }
                }
                match left.key.cmp(&right.key) {
                    std::cmp::Ordering::Less => {
                        let out = joiner.join(&self.keys, &left.rows, &[], &mut self.duplicates)?;
                        self.current_left = self.left.next().transpose()?;
                        self.current_right = Some(right);
                        Ok(Some(out))
                    }
                    std::cmp::Ordering::Greater => {
                        let out =
                            joiner.join(&self.keys, &[], &right.rows, &mut self.duplicates)?;
                        self.current_left = Some(left);
                        self.current_right = self.right.next().transpose()?;
                        Ok(Some(out))
                    }
                    std::cmp::Ordering::Equal => {
                        let out = joiner.join(
                            &self.keys,
                            &left.rows,
                            &right.rows,
                            &mut self.duplicates,
                        )?;
                        self.current_left = self.left.next().transpose()?;
                        self.current_right = self.right.next().transpose()?;
                        Ok(Some(out))
                    }
                }
            }
        }
    }
}

impl Iterator for MergeJoin {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if let Some(row) = self.pending.next() {
                return Some(Ok(row));
            }
            match self.step() {
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Ok(Some(rows)) => self.pending = rows.into_iter(),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
