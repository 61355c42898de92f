//! Canned pipelines built from the operator and catalog surface.
//!
//! Each function takes pre-built source graphs, so iterator-backed and
//! file-backed variants share one definition:
//!
//! ```
//! use rowflow::{algorithms, Graph};
//!
//! let from_bindings = algorithms::word_count(&Graph::from_iter("docs"), "text", "count");
//! let from_file = algorithms::word_count(
//!     &Graph::from_file("docs.json", rowflow::json_array_parser),
//!     "text",
//!     "count",
//! );
//! # let _ = (from_bindings, from_file);
//! ```

use crate::graph::Graph;
use crate::join::InnerJoiner;
use crate::mappers::{
    Divide, Filter, FilterPunctuation, Haversine, LowerCase, NaturalLog, ParseTime, Product,
    Project, Split,
};
use crate::reducers::{Count, NUnique, Speed, TermFrequency, TopN};
use crate::row::Value;

const COUNT: &str = "count";
const FRACTION: &str = "fraction";
const FREQUENCY: &str = "frequency";
const FREQUENCY_ALL: &str = "frequency_all";
const LOG: &str = "log";
const N_DOCS: &str = "n_docs";
const PRESENCE_IN_DOCS: &str = "presence_in_docs";
const LENGTH: &str = "length";

const TIME_FORMAT: &str = "%Y%m%dT%H%M%S%.f";

const NO_KEYS: &[&str] = &[];

fn tokenize(input: &Graph, text_column: &str) -> Graph {
    input
        .map(FilterPunctuation::new(text_column))
        .map(LowerCase::new(text_column))
        .map(Split::new(text_column))
}

/// Count words in `text_column` across all rows, sorted by count then word.
pub fn word_count(input: &Graph, text_column: &str, count_column: &str) -> Graph {
    tokenize(input, text_column)
        .sort(&[text_column])
        .reduce(Count::new(count_column), &[text_column])
        .sort(&[count_column, text_column])
}

/// TF-IDF per word/document pair, keeping the top 3 documents per word.
pub fn inverted_index(
    input: &Graph,
    doc_column: &str,
    text_column: &str,
    result_column: &str,
) -> Graph {
    let words = tokenize(input, text_column);

    let count_docs = input
        .map(Project::new(&[doc_column]))
        .reduce(NUnique::new(doc_column, N_DOCS), NO_KEYS);

    let frequencies = words
        .sort(&[doc_column])
        .reduce(TermFrequency::new(text_column, FREQUENCY), &[doc_column])
        .sort(&[text_column]);

    let presence = words
        .sort(&[text_column])
        .reduce(NUnique::new(doc_column, PRESENCE_IN_DOCS), &[text_column])
        .sort(&[text_column]);

    count_docs
        .join(InnerJoiner::new(), &frequencies, NO_KEYS)
        .join(InnerJoiner::new(), &presence, &[text_column])
        .map(Divide::new(N_DOCS, PRESENCE_IN_DOCS, FRACTION))
        .map(NaturalLog::new(FRACTION, LOG))
        .map(Product::new(&[FREQUENCY, LOG], result_column))
        .map(Project::new(&[doc_column, text_column, result_column]))
        .sort(&[text_column])
        .reduce(TopN::new(result_column, 3), &[text_column])
}

/// Pointwise mutual information of words against the whole corpus, keeping
/// the top 10 words per document. Only words longer than four characters
/// occurring at least twice in their document participate.
pub fn pmi(input: &Graph, doc_column: &str, text_column: &str, result_column: &str) -> Graph {
    let words = tokenize(input, text_column).sort(&[doc_column, text_column]);

    let long_words = {
        let column = text_column.to_owned();
        words.map(Filter::new(move |row| {
            matches!(row.get(&column), Some(Value::Str(s)) if s.chars().count() > 4)
        }))
    };

    let frequent = words
        .reduce(Count::new(COUNT), &[doc_column, text_column])
        .map(Filter::new(|row| {
            matches!(row.get(COUNT), Some(Value::Int(n)) if *n >= 2)
        }));

    let filtered = long_words.join(InnerJoiner::new(), &frequent, &[doc_column, text_column]);

    let per_document = filtered
        .reduce(TermFrequency::new(text_column, FREQUENCY), &[doc_column])
        .sort(&[text_column]);

    let corpus_wide = filtered
        .reduce(TermFrequency::new(text_column, FREQUENCY_ALL), NO_KEYS)
        .sort(&[text_column]);

    per_document
        .join(InnerJoiner::new(), &corpus_wide, &[text_column])
        .map(Divide::new(FREQUENCY, FREQUENCY_ALL, FRACTION))
        .map(NaturalLog::new(FRACTION, result_column))
        .map(Project::new(&[doc_column, text_column, result_column]))
        .sort(&[doc_column, result_column, text_column])
        .reduce(TopN::new(result_column, 10), &[doc_column])
}

/// Column configuration for [`road_speed`].
#[derive(Clone, Debug)]
pub struct RoadSpeedColumns {
    pub enter_time: String,
    pub leave_time: String,
    pub edge_id: String,
    pub start_coord: String,
    pub end_coord: String,
    pub weekday_result: String,
    pub hour_result: String,
    pub speed_result: String,
}

impl Default for RoadSpeedColumns {
    fn default() -> Self {
        Self {
            enter_time: "enter_time".into(),
            leave_time: "leave_time".into(),
            edge_id: "edge_id".into(),
            start_coord: "start".into(),
            end_coord: "end".into(),
            weekday_result: "weekday".into(),
            hour_result: "hour".into(),
            speed_result: "speed".into(),
        }
    }
}

/// Average speed in km/h per weekday and hour, from a stream of timed edge
/// traversals joined with a stream of edge coordinates.
pub fn road_speed(travel_times: &Graph, road_edges: &Graph, columns: &RoadSpeedColumns) -> Graph {
    let times = travel_times
        .map(ParseTime::new(
            &columns.enter_time,
            TIME_FORMAT,
            &columns.weekday_result,
            &columns.hour_result,
        ))
        .sort(&[&columns.edge_id]);

    let lengths = road_edges
        .map(Haversine::new(
            &columns.start_coord,
            &columns.end_coord,
            LENGTH,
        ))
        .sort(&[&columns.edge_id]);

    times
        .join(InnerJoiner::new(), &lengths, &[&columns.edge_id])
        .sort(&[&columns.weekday_result, &columns.hour_result])
        .reduce(
            Speed::new(
                LENGTH,
                &columns.enter_time,
                &columns.leave_time,
                TIME_FORMAT,
                &columns.speed_result,
            ),
            &[&columns.weekday_result, &columns.hour_result],
        )
}
