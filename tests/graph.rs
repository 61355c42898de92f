use std::io::Write;

use rowflow::*;

fn collect(graph: &Graph, bindings: &Bindings) -> anyhow::Result<Vec<Row>> {
    Ok(graph.run(bindings)?.collect::<Result<Vec<_>>>()?)
}

fn numbers(n: i64) -> Vec<Row> {
    (0..n).map(|i| row! { "n" => i }).collect()
}

#[test]
fn source_passes_rows_through() -> anyhow::Result<()> {
    let graph = Graph::from_iter("input");
    let bindings = Bindings::new().rows("input", numbers(3));
    assert_eq!(collect(&graph, &bindings)?, numbers(3));
    Ok(())
}

#[test]
fn map_is_linear_over_the_stream() -> anyhow::Result<()> {
    // Each row fans out to (n, n * 10): output must be the concatenation of
    // per-row outputs, in stream order.
    let fan_out = |row: Row| -> Result<Vec<Row>> {
        let n = row.require("n")?.as_int().unwrap_or(0);
        Ok(vec![row.clone(), row! { "n" => n * 10 }])
    };
    let graph = Graph::from_iter("input").map(fan_out);
    let bindings = Bindings::new().rows("input", numbers(3));

    let expected: Vec<Row> = (0..3)
        .flat_map(|n| vec![row! { "n" => n }, row! { "n" => n * 10 }])
        .collect();
    assert_eq!(collect(&graph, &bindings)?, expected);
    Ok(())
}

#[test]
fn extension_does_not_mutate_the_receiver() -> anyhow::Result<()> {
    let base = Graph::from_iter("input");
    let doubled = base.map(|mut row: Row| -> Result<Vec<Row>> {
        let n = row.require("n")?.as_int().unwrap_or(0);
        row.set("n", n * 2);
        Ok(vec![row])
    });
    let dropped = base.map(|_row: Row| -> Result<Vec<Row>> { Ok(vec![]) });

    let bindings = Bindings::new().rows("input", numbers(2));
    assert_eq!(collect(&base, &bindings)?, numbers(2));
    assert_eq!(
        collect(&doubled, &bindings)?,
        vec![row! { "n" => 0 }, row! { "n" => 2 }]
    );
    assert_eq!(collect(&dropped, &bindings)?, vec![]);
    Ok(())
}

#[test]
fn graphs_run_repeatedly_with_different_bindings() -> anyhow::Result<()> {
    let graph = Graph::from_iter("input").map(Identity);
    let small = Bindings::new().rows("input", numbers(2));
    let large = Bindings::new().rows("input", numbers(5));

    assert_eq!(collect(&graph, &small)?.len(), 2);
    assert_eq!(collect(&graph, &large)?.len(), 5);
    assert_eq!(collect(&graph, &small)?.len(), 2);
    Ok(())
}

#[test]
fn missing_binding_is_a_construction_error() {
    let graph = Graph::from_iter("absent");
    let err = graph.run(&Bindings::new()).err().expect("run must fail");
    assert_eq!(err.kind(), ErrorKind::Construction);
}

#[test]
fn mapper_failure_terminates_the_stream() -> anyhow::Result<()> {
    let fail_on_two = |row: Row| -> Result<Vec<Row>> {
        if row.require("n")?.as_int() == Some(2) {
            return Err(Error::user(anyhow::anyhow!("boom")));
        }
        Ok(vec![row])
    };
    let graph = Graph::from_iter("input").map(fail_on_two);
    let bindings = Bindings::new().rows("input", numbers(5));

    let mut stream = graph.run(&bindings)?;
    assert_eq!(stream.next().unwrap()?, row! { "n" => 0 });
    assert_eq!(stream.next().unwrap()?, row! { "n" => 1 });
    let err = stream.next().unwrap().err().expect("third pull must fail");
    assert_eq!(err.kind(), ErrorKind::User);
    assert!(stream.next().is_none(), "stream must end after the error");
    Ok(())
}

#[test]
fn file_source_reads_a_json_array_line() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("rows.json");
    std::fs::write(
        &path,
        r#"[{"doc_id": 1, "text": "hello"}, {"doc_id": 2, "text": "world"}]"#,
    )?;

    let graph = Graph::from_file(&path, json_array_parser);
    let rows = collect(&graph, &Bindings::new())?;
    assert_eq!(
        rows,
        vec![
            row! { "doc_id" => 1, "text" => "hello" },
            row! { "doc_id" => 2, "text" => "world" },
        ]
    );
    Ok(())
}

#[test]
fn file_source_reads_one_object_per_line() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("rows.jsonl");
    let mut file = std::fs::File::create(&path)?;
    writeln!(file, r#"{{"n": 1}}"#)?;
    writeln!(file)?;
    writeln!(file, r#"{{"n": 2}}"#)?;

    let graph = Graph::from_file(&path, json_line_parser);
    let rows = collect(&graph, &Bindings::new())?;
    assert_eq!(rows, vec![row! { "n" => 1 }, row! { "n" => 2 }]);
    Ok(())
}

#[test]
fn rejected_line_is_a_parser_error() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "not json at all")?;

    let graph = Graph::from_file(&path, json_array_parser);
    let mut stream = graph.run(&Bindings::new())?;
    let err = stream.next().unwrap().err().expect("parse must fail");
    assert_eq!(err.kind(), ErrorKind::Parser);
    assert!(stream.next().is_none());
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() -> anyhow::Result<()> {
    let graph = Graph::from_file("/nonexistent/rowflow-input.json", json_array_parser);
    let mut stream = graph.run(&Bindings::new())?;
    let err = stream.next().unwrap().err().expect("open must fail");
    assert_eq!(err.kind(), ErrorKind::Io);
    Ok(())
}

#[test]
fn bindings_source_is_invoked_per_run() -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let bindings = Bindings::new().source("input", move || {
        counted.fetch_add(1, Ordering::SeqCst);
        vec![row! { "n" => 1 }]
    });

    let graph = Graph::from_iter("input");
    collect(&graph, &bindings)?;
    collect(&graph, &bindings)?;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    Ok(())
}
