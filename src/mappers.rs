//! Built-in mappers.
//!
//! These are ordinary [`Mapper`] implementations shipped for the bundled
//! pipelines: text cleanup ([`FilterPunctuation`], [`LowerCase`], [`Split`]),
//! column arithmetic ([`Product`], [`NaturalLog`], [`Divide`]), row shaping
//! ([`Filter`], [`Project`], [`Identity`]), and the road-speed helpers
//! ([`ParseTime`], [`Haversine`]).

use std::sync::Arc;

use anyhow::anyhow;
use chrono::{Datelike, NaiveDateTime, Timelike};
use regex::Regex;

use crate::error::{Error, Result};
use crate::map::Mapper;
use crate::row::{Row, Value};

const PUNCTUATION: &str = r##"!"#$%&'()*+,-./:;<=>?@[\]^_`{|}~"##;

pub(crate) fn string_column<'a>(row: &'a Row, column: &str) -> Result<&'a str> {
    match row.require(column)? {
        Value::Str(s) => Ok(s.as_str()),
        other => Err(Error::user(anyhow!(
            "column {column:?} holds {other:?}, expected a string"
        ))),
    }
}

pub(crate) fn numeric_column(row: &Row, column: &str) -> Result<f64> {
    let value = row.require(column)?;
    value.as_float().ok_or_else(|| {
        Error::user(anyhow!(
            "column {column:?} holds {value:?}, expected a number"
        ))
    })
}

/// Parse with `format`, falling back to the compact `%Y%m%dT%H%M%S` form the
/// bundled travel-time data mixes in.
pub(crate) fn parse_datetime(raw: &str, format: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, format)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%S"))
        .map_err(|e| Error::user(anyhow!("cannot parse time {raw:?}: {e}")))
}

/// Strip ASCII punctuation from a string column, in place.
#[derive(Clone, Debug)]
pub struct FilterPunctuation {
    column: String,
}

impl FilterPunctuation {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Mapper for FilterPunctuation {
    fn apply(&self, mut row: Row) -> Result<Vec<Row>> {
        let cleaned: String = string_column(&row, &self.column)?
            .chars()
            .filter(|c| !PUNCTUATION.contains(*c))
            .collect();
        row.set(self.column.clone(), cleaned);
        Ok(vec![row])
    }
}

/// Lowercase a string column, in place.
#[derive(Clone, Debug)]
pub struct LowerCase {
    column: String,
}

impl LowerCase {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Mapper for LowerCase {
    fn apply(&self, mut row: Row) -> Result<Vec<Row>> {
        let lowered = string_column(&row, &self.column)?.to_lowercase();
        row.set(self.column.clone(), lowered);
        Ok(vec![row])
    }
}

/// Split a string column into one row per token.
///
/// The separator is a regex pattern. One separator is appended to the text
/// before scanning, so the final token is always emitted and a trailing empty
/// token never is; consecutive literal separators mid-string produce empty
/// tokens. The default separator is `\s+`.
#[derive(Clone, Debug)]
pub struct Split {
    column: String,
    pattern: Regex,
    sentinel: String,
}

impl Split {
    /// Split on runs of whitespace.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            pattern: Regex::new(r"\s+").expect("static pattern"),
            sentinel: " ".to_owned(),
        }
    }

    /// Split on a caller-supplied regex pattern.
    pub fn with_separator(column: impl Into<String>, separator: &str) -> Result<Self> {
        Ok(Self {
            column: column.into(),
            pattern: Regex::new(separator).map_err(Error::user)?,
            sentinel: separator.to_owned(),
        })
    }
}

impl Mapper for Split {
    fn apply(&self, row: Row) -> Result<Vec<Row>> {
        let padded = format!("{}{}", string_column(&row, &self.column)?, self.sentinel);
        let mut out = Vec::new();
        let mut start = 0;
        for found in self.pattern.find_iter(&padded) {
            let mut token_row = row.clone();
            token_row.set(self.column.clone(), &padded[start..found.start()]);
            out.push(token_row);
            start = found.end();
        }
        Ok(out)
    }
}

/// Multiply numeric columns into a result column. The product stays an int
/// while every factor is an int.
#[derive(Clone, Debug)]
pub struct Product {
    columns: Vec<String>,
    result_column: String,
}

impl Product {
    pub fn new<S: AsRef<str>>(columns: &[S], result_column: impl Into<String>) -> Self {
        Self {
            columns: columns.iter().map(|c| c.as_ref().to_owned()).collect(),
            result_column: result_column.into(),
        }
    }
}

impl Mapper for Product {
    fn apply(&self, mut row: Row) -> Result<Vec<Row>> {
        let mut product = Value::Int(1);
        for column in &self.columns {
            let value = row.require(column)?;
            product = product.numeric_mul(value).ok_or_else(|| {
                Error::user(anyhow!(
                    "column {column:?} holds {value:?}, expected a number"
                ))
            })?;
        }
        row.set(self.result_column.clone(), product);
        Ok(vec![row])
    }
}

/// Natural log of a numeric column into a result column.
#[derive(Clone, Debug)]
pub struct NaturalLog {
    column: String,
    result_column: String,
}

impl NaturalLog {
    pub fn new(column: impl Into<String>, result_column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            result_column: result_column.into(),
        }
    }
}

impl Mapper for NaturalLog {
    fn apply(&self, mut row: Row) -> Result<Vec<Row>> {
        let x = numeric_column(&row, &self.column)?;
        if x <= 0.0 {
            return Err(Error::user(anyhow!(
                "natural log of non-positive value {x} in column {:?}",
                self.column
            )));
        }
        row.set(self.result_column.clone(), x.ln());
        Ok(vec![row])
    }
}

/// Divide one numeric column by another into a result column.
#[derive(Clone, Debug)]
pub struct Divide {
    numerator: String,
    denominator: String,
    result_column: String,
}

impl Divide {
    pub fn new(
        numerator: impl Into<String>,
        denominator: impl Into<String>,
        result_column: impl Into<String>,
    ) -> Self {
        Self {
            numerator: numerator.into(),
            denominator: denominator.into(),
            result_column: result_column.into(),
        }
    }
}

impl Mapper for Divide {
    fn apply(&self, mut row: Row) -> Result<Vec<Row>> {
        let numerator = numeric_column(&row, &self.numerator)?;
        let denominator = numeric_column(&row, &self.denominator)?;
        if denominator == 0.0 {
            return Err(Error::user(anyhow!(
                "division by zero in column {:?}",
                self.denominator
            )));
        }
        row.set(self.result_column.clone(), numerator / denominator);
        Ok(vec![row])
    }
}

/// Drop rows failing a predicate.
#[derive(Clone)]
pub struct Filter {
    condition: Arc<dyn Fn(&Row) -> bool + Send + Sync>,
}

impl Filter {
    pub fn new(condition: impl Fn(&Row) -> bool + Send + Sync + 'static) -> Self {
        Self {
            condition: Arc::new(condition),
        }
    }
}

impl Mapper for Filter {
    fn apply(&self, row: Row) -> Result<Vec<Row>> {
        Ok(if (self.condition)(&row) {
            vec![row]
        } else {
            Vec::new()
        })
    }
}

/// Keep only the named columns, all of which must be present.
#[derive(Clone, Debug)]
pub struct Project {
    columns: Vec<String>,
}

impl Project {
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.as_ref().to_owned()).collect(),
        }
    }
}

impl Mapper for Project {
    fn apply(&self, row: Row) -> Result<Vec<Row>> {
        let mut out = Row::new();
        for column in &self.columns {
            out.set(column.clone(), row.require(column)?.clone());
        }
        Ok(vec![out])
    }
}

/// Yield the row unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl Mapper for Identity {
    fn apply(&self, row: Row) -> Result<Vec<Row>> {
        Ok(vec![row])
    }
}

/// Parse a time column and record its weekday abbreviation and hour.
#[derive(Clone, Debug)]
pub struct ParseTime {
    time_column: String,
    time_format: String,
    weekday_result: String,
    hour_result: String,
}

impl ParseTime {
    pub fn new(
        time_column: impl Into<String>,
        time_format: impl Into<String>,
        weekday_result: impl Into<String>,
        hour_result: impl Into<String>,
    ) -> Self {
        Self {
            time_column: time_column.into(),
            time_format: time_format.into(),
            weekday_result: weekday_result.into(),
            hour_result: hour_result.into(),
        }
    }
}

impl Mapper for ParseTime {
    fn apply(&self, mut row: Row) -> Result<Vec<Row>> {
        let parsed = {
            let raw = string_column(&row, &self.time_column)?;
            parse_datetime(raw, &self.time_format)?
        };
        row.set(self.weekday_result.clone(), parsed.weekday().to_string());
        row.set(self.hour_result.clone(), parsed.hour() as i64);
        Ok(vec![row])
    }
}

/// Great-circle distance in km between two `[lon, lat]` columns.
#[derive(Clone, Debug)]
pub struct Haversine {
    start_column: String,
    end_column: String,
    result_column: String,
}

const EARTH_RADIUS_KM: f64 = 6371.0;

impl Haversine {
    pub fn new(
        start_column: impl Into<String>,
        end_column: impl Into<String>,
        result_column: impl Into<String>,
    ) -> Self {
        Self {
            start_column: start_column.into(),
            end_column: end_column.into(),
            result_column: result_column.into(),
        }
    }
}

fn coordinates(row: &Row, column: &str) -> Result<(f64, f64)> {
    let value = row.require(column)?;
    if let Some([lon, lat]) = value.as_list() {
        if let (Some(lon), Some(lat)) = (lon.as_float(), lat.as_float()) {
            return Ok((lon, lat));
        }
    }
    Err(Error::user(anyhow!(
        "column {column:?} holds {value:?}, expected a [lon, lat] pair"
    )))
}

fn haversine_km(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (lon1, lat1, lon2, lat2) = (
        lon1.to_radians(),
        lat1.to_radians(),
        lon2.to_radians(),
        lat2.to_radians(),
    );
    let dlon = lon2 - lon1;
    let dlat = lat2 - lat1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * a.sqrt().asin() * EARTH_RADIUS_KM
}

impl Mapper for Haversine {
    fn apply(&self, mut row: Row) -> Result<Vec<Row>> {
        let (lon1, lat1) = coordinates(&row, &self.start_column)?;
        let (lon2, lat2) = coordinates(&row, &self.end_column)?;
        row.set(
            self.result_column.clone(),
            haversine_km(lon1, lat1, lon2, lat2),
        );
        Ok(vec![row])
    }
}
