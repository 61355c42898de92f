//! Built-in reducers.
//!
//! Each receives the grouping columns and one maximal equal-key run. Output
//! rows carry the group's key columns (taken from the first row of the run)
//! plus whatever the reducer computes.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::anyhow;

use crate::error::{Error, Result};
use crate::mappers::{numeric_column, parse_datetime, string_column};
use crate::reduce::Reducer;
use crate::row::{Row, Value};

fn group_key_columns(row: &Row, key_columns: &[String]) -> Result<Row> {
    let mut out = Row::new();
    for column in key_columns {
        out.set(column.clone(), row.require(column)?.clone());
    }
    Ok(out)
}

/// Yield only the first row of each group.
#[derive(Clone, Copy, Debug, Default)]
pub struct First;

impl Reducer for First {
    fn reduce(&self, _key_columns: &[String], rows: Vec<Row>) -> Result<Vec<Row>> {
        Ok(rows.into_iter().take(1).collect())
    }
}

/// The n largest rows of each group by a column, descending. Tie order
/// follows stream order.
#[derive(Clone, Debug)]
pub struct TopN {
    column: String,
    n: usize,
}

impl TopN {
    pub fn new(column: impl Into<String>, n: usize) -> Self {
        Self {
            column: column.into(),
            n,
        }
    }
}

impl Reducer for TopN {
    fn reduce(&self, _key_columns: &[String], rows: Vec<Row>) -> Result<Vec<Row>> {
        let mut ranked = Vec::with_capacity(rows.len());
        for row in rows {
            let rank = row.require(&self.column)?.clone();
            ranked.push((rank, row));
        }
        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        ranked.truncate(self.n);
        Ok(ranked.into_iter().map(|(_, row)| row).collect())
    }
}

/// Frequency of each distinct value of a column within the group, as
/// occurrences over group size. One output row per distinct value, in
/// first-occurrence order.
#[derive(Clone, Debug)]
pub struct TermFrequency {
    words_column: String,
    result_column: String,
}

impl TermFrequency {
    pub fn new(words_column: impl Into<String>, result_column: impl Into<String>) -> Self {
        Self {
            words_column: words_column.into(),
            result_column: result_column.into(),
        }
    }
}

impl Reducer for TermFrequency {
    fn reduce(&self, key_columns: &[String], rows: Vec<Row>) -> Result<Vec<Row>> {
        let mut counts: BTreeMap<Value, usize> = BTreeMap::new();
        let mut first_seen: Vec<Value> = Vec::new();
        let mut key_values: Option<Row> = None;
        let total = rows.len();
        for row in &rows {
            if key_values.is_none() {
                key_values = Some(group_key_columns(row, key_columns)?);
            }
            let word = row.require(&self.words_column)?.clone();
            match counts.get_mut(&word) {
                Some(count) => *count += 1,
                None => {
                    counts.insert(word.clone(), 1);
                    first_seen.push(word);
                }
            }
        }
        let key_values = key_values.unwrap_or_default();
        let mut out = Vec::with_capacity(first_seen.len());
        for word in first_seen {
            let count = counts[&word];
            let mut row = key_values.clone();
            row.set(self.words_column.clone(), word);
            row.set(self.result_column.clone(), count as f64 / total as f64);
            out.push(row);
        }
        Ok(out)
    }
}

/// Number of rows in the group, as an int column.
#[derive(Clone, Debug)]
pub struct Count {
    column: String,
}

impl Count {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Reducer for Count {
    fn reduce(&self, key_columns: &[String], rows: Vec<Row>) -> Result<Vec<Row>> {
        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let mut out = group_key_columns(first, key_columns)?;
        out.set(self.column.clone(), rows.len() as i64);
        Ok(vec![out])
    }
}

/// Sum of a numeric column over the group, int-preserving.
#[derive(Clone, Debug)]
pub struct Sum {
    column: String,
}

impl Sum {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Reducer for Sum {
    fn reduce(&self, key_columns: &[String], rows: Vec<Row>) -> Result<Vec<Row>> {
        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let mut key_values = group_key_columns(first, key_columns)?;
        let mut total = Value::Int(0);
        for row in &rows {
            let value = row.require(&self.column)?;
            total = total.numeric_add(value).ok_or_else(|| {
                Error::user(anyhow!(
                    "column {:?} holds {value:?}, expected a number",
                    self.column
                ))
            })?;
        }
        key_values.set(self.column.clone(), total);
        Ok(vec![key_values])
    }
}

/// Number of distinct values of a column within the group.
#[derive(Clone, Debug)]
pub struct NUnique {
    column: String,
    result_column: String,
}

impl NUnique {
    pub fn new(column: impl Into<String>, result_column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            result_column: result_column.into(),
        }
    }
}

impl Reducer for NUnique {
    fn reduce(&self, key_columns: &[String], rows: Vec<Row>) -> Result<Vec<Row>> {
        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let mut out = group_key_columns(first, key_columns)?;
        let mut distinct: BTreeSet<Value> = BTreeSet::new();
        for row in &rows {
            distinct.insert(row.require(&self.column)?.clone());
        }
        out.set(self.result_column.clone(), distinct.len() as i64);
        Ok(vec![out])
    }
}

/// Average speed over the group in km/h: total segment length divided by
/// total traversal time.
#[derive(Clone, Debug)]
pub struct Speed {
    length_column: String,
    enter_time_column: String,
    leave_time_column: String,
    time_format: String,
    result_column: String,
}

const SECONDS_IN_HOUR: f64 = 3600.0;

impl Speed {
    pub fn new(
        length_column: impl Into<String>,
        enter_time_column: impl Into<String>,
        leave_time_column: impl Into<String>,
        time_format: impl Into<String>,
        result_column: impl Into<String>,
    ) -> Self {
        Self {
            length_column: length_column.into(),
            enter_time_column: enter_time_column.into(),
            leave_time_column: leave_time_column.into(),
            time_format: time_format.into(),
            result_column: result_column.into(),
        }
    }
}

impl Reducer for Speed {
    fn reduce(&self, key_columns: &[String], rows: Vec<Row>) -> Result<Vec<Row>> {
        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let mut out = group_key_columns(first, key_columns)?;
        let mut total_length = 0.0;
        let mut total_hours = 0.0;
        for row in &rows {
            let entered = parse_datetime(
                string_column(row, &self.enter_time_column)?,
                &self.time_format,
            )?;
            let exited = parse_datetime(
                string_column(row, &self.leave_time_column)?,
                &self.time_format,
            )?;
            let delta = exited - entered;
            let micros = delta
                .num_microseconds()
                .unwrap_or_else(|| delta.num_seconds().saturating_mul(1_000_000));
            total_hours += micros as f64 / 1e6 / SECONDS_IN_HOUR;
            total_length += numeric_column(row, &self.length_column)?;
        }
        if total_hours == 0.0 {
            return Err(Error::user(anyhow!("zero total traversal time")));
        }
        out.set(self.result_column.clone(), total_length / total_hours);
        Ok(vec![out])
    }
}
