//! External sort: totally order a row stream on a key-tuple in bounded memory.
//!
//! Rows accumulate in an in-memory buffer of at most
//! [`chunk_rows`](SortConfig::chunk_rows). Each full buffer is sorted and
//! written to a spill segment under a per-run temporary directory; at
//! end-of-input the segments are merged through a min-heap keyed on the
//! key-tuple, ties resolving by segment index. A stream that fits in one
//! buffer never touches disk.
//!
//! The sort is stable within a segment (buffers are sorted with a stable
//! sort and segments are read in write order); across segments ties resolve
//! in segment order, which is deterministic for a given run but not an input
//! ordering guarantee.
//!
//! No work happens before the first pull. The spill directory is a
//! self-deleting temporary: it is removed when the merge finishes, when an
//! error ends the stream, and when the consumer abandons the stream mid-way.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::env;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Lines, Read, Write};
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::error::{Error, Result};
use crate::row::{Key, Row, RowStream, Value};

/// On-disk encoding for spill segments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpillFormat {
    /// One JSON document per row per line.
    JsonLines,
    /// Length-prefixed postcard frames.
    LengthPrefixed,
}

/// Operational parameters for [`Graph::sort`](crate::Graph::sort).
#[derive(Clone, Debug)]
pub struct SortConfig {
    /// Maximum rows held in memory before a chunk spills to disk.
    pub chunk_rows: usize,
    /// Parent directory for spill segments; the system temp dir when `None`.
    pub spill_dir: Option<PathBuf>,
    /// Segment encoding.
    pub format: SpillFormat,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            chunk_rows: 100_000,
            spill_dir: None,
            format: SpillFormat::LengthPrefixed,
        }
    }
}

pub(crate) struct ExternalSort {
    state: State,
}

enum State {
    Pending {
        input: RowStream,
        keys: Vec<String>,
        config: SortConfig,
    },
    Memory(std::vec::IntoIter<Row>),
    Merging(KWayMerge),
    Done,
}

impl ExternalSort {
    pub(crate) fn new(keys: Vec<String>, config: SortConfig, input: RowStream) -> Self {
        Self {
            state: State::Pending { input, keys, config },
        }
    }
}

impl Iterator for ExternalSort {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match &mut self.state {
                State::Done => return None,
                State::Memory(rows) => return rows.next().map(Ok),
                State::Merging(merge) => {
                    let item = merge.next();
                    match item {
                        Some(Err(e)) => {
                            self.state = State::Done;
                            return Some(Err(e));
                        }
                        other => return other,
                    }
                }
                State::Pending { .. } => {
                    let State::Pending { input, keys, config } =
                        std::mem::replace(&mut self.state, State::Done)
                    else {
                        unreachable!()
                    };
                    match sort_stream(input, &keys, &config) {
                        Ok(Sorted::Memory(rows)) => self.state = State::Memory(rows.into_iter()),
                        Ok(Sorted::Spilled(merge)) => self.state = State::Merging(merge),
                        Err(e) => return Some(Err(e)),
                    }
                }
            }
        }
    }
}

enum Sorted {
    Memory(Vec<Row>),
    Spilled(KWayMerge),
}

fn sort_stream(mut input: RowStream, keys: &[String], config: &SortConfig) -> Result<Sorted> {
    let chunk_rows = config.chunk_rows.max(1);
    let mut buffer: Vec<(Key, Row)> = Vec::new();
    let mut spill: Option<Spill> = None;

    for item in input.by_ref() {
        let row = item?;
        let key = row.key(keys)?;
        buffer.push((key, row));
        if buffer.len() >= chunk_rows {
            if spill.is_none() {
                spill = Some(Spill::create(config)?);
            }
            let mut chunk = std::mem::take(&mut buffer);
            sort_chunk(&mut chunk);
            if let Some(spill) = spill.as_mut() {
                spill.write_segment(chunk)?;
            }
        }
    }

    match spill {
        None => {
            sort_chunk(&mut buffer);
            Ok(Sorted::Memory(
                buffer.into_iter().map(|(_, row)| row).collect(),
            ))
        }
        Some(mut spill) => {
            if !buffer.is_empty() {
                let mut chunk = std::mem::take(&mut buffer);
                sort_chunk(&mut chunk);
                spill.write_segment(chunk)?;
            }
            debug!("merging {} spill segments", spill.segments);
            KWayMerge::new(spill, keys.to_vec()).map(Sorted::Spilled)
        }
    }
}

fn sort_chunk(chunk: &mut [(Key, Row)]) {
    // Stable, so equal keys keep their stream order within the segment.
    chunk.sort_by(|a, b| a.0.cmp(&b.0));
}

fn segment_path(dir: &Path, segment: usize) -> PathBuf {
    dir.join(format!("segment-{segment}.rows"))
}

fn codec_error(e: impl std::error::Error + Send + Sync + 'static) -> Error {
    Error::Io(io::Error::new(io::ErrorKind::InvalidData, e))
}

struct Spill {
    dir: TempDir,
    format: SpillFormat,
    segments: usize,
}

impl Spill {
    fn create(config: &SortConfig) -> Result<Self> {
        let base = match &config.spill_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                dir.clone()
            }
            None => env::temp_dir(),
        };
        let dir = tempfile::Builder::new()
            .prefix("rowflow-sort-")
            .tempdir_in(base)?;
        debug!("spilling to {}", dir.path().display());
        Ok(Self {
            dir,
            format: config.format,
            segments: 0,
        })
    }

    fn write_segment(&mut self, chunk: Vec<(Key, Row)>) -> Result<()> {
        let path = segment_path(self.dir.path(), self.segments);
        let rows = chunk.len();
        let mut writer = BufWriter::new(File::create(&path)?);
        match self.format {
            SpillFormat::JsonLines => {
                for (_, row) in chunk {
                    serde_json::to_writer(&mut writer, &row).map_err(codec_error)?;
                    writer.write_all(b"\n")?;
                }
            }
            SpillFormat::LengthPrefixed => {
                for (_, row) in chunk {
                    let frame = postcard::to_allocvec(&WireRow::from(row)).map_err(codec_error)?;
                    writer.write_all(&(frame.len() as u32).to_le_bytes())?;
                    writer.write_all(&frame)?;
                }
            }
        }
        writer.flush()?;
        debug!("wrote spill segment {} ({rows} rows)", self.segments);
        self.segments += 1;
        Ok(())
    }
}

struct HeapEntry {
    key: Key,
    segment: usize,
    row: Row,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.segment == other.segment
    }
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.segment.cmp(&other.segment))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct KWayMerge {
    readers: Vec<SegmentReader>,
    heap: BinaryHeap<Reverse<HeapEntry>>,
    keys: Vec<String>,
    done: bool,
    // Keeps the spill directory alive until the merge is dropped, so the
    // segments are removed even when the consumer abandons the stream.
    _dir: TempDir,
}

impl KWayMerge {
    fn new(spill: Spill, keys: Vec<String>) -> Result<Self> {
        let Spill { dir, format, segments } = spill;
        let mut readers = Vec::with_capacity(segments);
        let mut heap = BinaryHeap::with_capacity(segments);
        for segment in 0..segments {
            let mut reader = SegmentReader::open(&segment_path(dir.path(), segment), format)?;
            if let Some(row) = reader.read_row()? {
                let key = row.key(&keys)?;
                heap.push(Reverse(HeapEntry { key, segment, row }));
            }
            readers.push(reader);
        }
        Ok(Self {
            readers,
            heap,
            keys,
            done: false,
            _dir: dir,
        })
    }

    fn refill(&mut self, segment: usize) -> Result<()> {
        if let Some(row) = self.readers[segment].read_row()? {
            let key = row.key(&self.keys)?;
            self.heap.push(Reverse(HeapEntry { key, segment, row }));
        }
        Ok(())
    }
}

impl Iterator for KWayMerge {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Reverse(entry) = self.heap.pop()?;
        match self.refill(entry.segment) {
            Ok(()) => Some(Ok(entry.row)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

enum SegmentReader {
    JsonLines(Lines<BufReader<File>>),
    LengthPrefixed(BufReader<File>),
}

impl SegmentReader {
    fn open(path: &Path, format: SpillFormat) -> Result<Self> {
        let file = File::open(path)?;
        Ok(match format {
            SpillFormat::JsonLines => SegmentReader::JsonLines(BufReader::new(file).lines()),
            SpillFormat::LengthPrefixed => SegmentReader::LengthPrefixed(BufReader::new(file)),
        })
    }

    fn read_row(&mut self) -> Result<Option<Row>> {
        match self {
            SegmentReader::JsonLines(lines) => match lines.next() {
                None => Ok(None),
                Some(line) => {
                    let line = line?;
                    Ok(Some(serde_json::from_str(&line).map_err(codec_error)?))
                }
            },
            SegmentReader::LengthPrefixed(reader) => {
                let mut prefix = [0u8; 4];
                match reader.read_exact(&mut prefix) {
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
                    Err(e) => return Err(e.into()),
                    Ok(()) => {}
                }
                let mut frame = vec![0u8; u32::from_le_bytes(prefix) as usize];
                reader.read_exact(&mut frame)?;
                let wire: WireRow = postcard::from_bytes(&frame).map_err(codec_error)?;
                Ok(Some(wire.into()))
            }
        }
    }
}

// Spill wire form. The public serde impls on `Row`/`Value` target natural
// JSON, which a non-self-describing codec cannot reverse; postcard segments
// go through this tagged mirror instead.

#[derive(Serialize, Deserialize)]
enum WireValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<WireValue>),
}

impl From<Value> for WireValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => WireValue::Null,
            Value::Bool(b) => WireValue::Bool(b),
            Value::Int(i) => WireValue::Int(i),
            Value::Float(f) => WireValue::Float(f),
            Value::Str(s) => WireValue::Str(s),
            Value::List(items) => WireValue::List(items.into_iter().map(Into::into).collect()),
        }
    }
}

impl From<WireValue> for Value {
    fn from(value: WireValue) -> Self {
        match value {
            WireValue::Null => Value::Null,
            WireValue::Bool(b) => Value::Bool(b),
            WireValue::Int(i) => Value::Int(i),
            WireValue::Float(f) => Value::Float(f),
            WireValue::Str(s) => Value::Str(s),
            WireValue::List(items) => Value::List(items.into_iter().map(Into::into).collect()),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireRow(Vec<(String, WireValue)>);

impl From<Row> for WireRow {
    fn from(row: Row) -> Self {
        WireRow(row.into_iter().map(|(c, v)| (c, v.into())).collect())
    }
}

impl From<WireRow> for Row {
    fn from(wire: WireRow) -> Self {
        wire.0.into_iter().map(|(c, v)| (c, Value::from(v))).collect()
    }
}
