use rowflow::*;

fn collect(graph: &Graph, bindings: &Bindings) -> anyhow::Result<Vec<Row>> {
    Ok(graph.run(bindings)?.collect::<Result<Vec<_>>>()?)
}

#[test]
fn groups_are_maximal_equal_key_runs() -> anyhow::Result<()> {
    // A plain-function reducer that records the group size keyed by its
    // first row.
    fn sizes(keys: &[String], rows: Vec<Row>) -> Result<Vec<Row>> {
        let mut out = Row::new();
        for key in keys {
            out.set(key.clone(), rows[0].require(key)?.clone());
        }
        out.set("size", rows.len() as i64);
        Ok(vec![out])
    }
    let graph = Graph::from_iter("input").reduce(sizes, &["k"]);
    let bindings = Bindings::new().rows(
        "input",
        vec![
            row! { "k" => 1, "v" => "a" },
            row! { "k" => 1, "v" => "b" },
            row! { "k" => 2, "v" => "c" },
            row! { "k" => 3, "v" => "d" },
            row! { "k" => 3, "v" => "e" },
            row! { "k" => 3, "v" => "f" },
        ],
    );
    assert_eq!(
        collect(&graph, &bindings)?,
        vec![
            row! { "k" => 1, "size" => 2 },
            row! { "k" => 2, "size" => 1 },
            row! { "k" => 3, "size" => 3 },
        ]
    );
    Ok(())
}

#[test]
fn empty_input_yields_no_groups() -> anyhow::Result<()> {
    let graph = Graph::from_iter("input").reduce(Count::new("count"), &["k"]);
    let bindings = Bindings::new().rows("input", vec![]);
    assert_eq!(collect(&graph, &bindings)?, vec![]);
    Ok(())
}

#[test]
fn key_inversion_is_an_order_error() -> anyhow::Result<()> {
    let graph = Graph::from_iter("input").reduce(Count::new("count"), &["k"]);
    let bindings = Bindings::new().rows("input", vec![row! { "k" => 2 }, row! { "k" => 1 }]);

    let mut stream = graph.run(&bindings)?;
    let err = stream.next().unwrap().err().expect("inversion must fail");
    assert_eq!(err.kind(), ErrorKind::Order);
    assert!(stream.next().is_none());
    Ok(())
}

#[test]
fn groups_before_an_inversion_stay_delivered() -> anyhow::Result<()> {
    let graph = Graph::from_iter("input").reduce(Count::new("count"), &["k"]);
    let bindings = Bindings::new().rows(
        "input",
        vec![row! { "k" => 1 }, row! { "k" => 2 }, row! { "k" => 1 }],
    );

    let mut stream = graph.run(&bindings)?;
    assert_eq!(stream.next().unwrap()?, row! { "k" => 1, "count" => 1 });
    let err = stream.next().unwrap().err().expect("inversion must fail");
    assert_eq!(err.kind(), ErrorKind::Order);
    Ok(())
}

#[test]
fn missing_key_column_is_a_schema_error() -> anyhow::Result<()> {
    let graph = Graph::from_iter("input").reduce(Count::new("count"), &["absent"]);
    let bindings = Bindings::new().rows("input", vec![row! { "k" => 1 }]);

    let mut stream = graph.run(&bindings)?;
    let err = stream.next().unwrap().err().expect("lookup must fail");
    assert_eq!(err.kind(), ErrorKind::Schema);
    Ok(())
}

#[test]
fn count_projects_all_key_columns() -> anyhow::Result<()> {
    let graph = Graph::from_iter("input").reduce(Count::new("count"), &["a", "b"]);
    let bindings = Bindings::new().rows(
        "input",
        vec![
            row! { "a" => 1, "b" => "x", "noise" => 9 },
            row! { "a" => 1, "b" => "x", "noise" => 8 },
            row! { "a" => 1, "b" => "y", "noise" => 7 },
        ],
    );
    assert_eq!(
        collect(&graph, &bindings)?,
        vec![
            row! { "a" => 1, "b" => "x", "count" => 2 },
            row! { "a" => 1, "b" => "y", "count" => 1 },
        ]
    );
    Ok(())
}

#[test]
fn sum_preserves_int_and_widens_to_float() -> anyhow::Result<()> {
    let graph = Graph::from_iter("input").reduce(Sum::new("v"), &["k"]);
    let bindings = Bindings::new().rows(
        "input",
        vec![
            row! { "k" => 1, "v" => 2 },
            row! { "k" => 1, "v" => 3 },
            row! { "k" => 2, "v" => 1.5 },
            row! { "k" => 2, "v" => 2 },
        ],
    );
    assert_eq!(
        collect(&graph, &bindings)?,
        vec![
            row! { "k" => 1, "v" => 5 },
            row! { "k" => 2, "v" => 3.5 },
        ]
    );
    Ok(())
}

#[test]
fn nunique_counts_distinct_values() -> anyhow::Result<()> {
    let graph = Graph::from_iter("input").reduce(NUnique::new("v", "uniques"), &["k"]);
    let bindings = Bindings::new().rows(
        "input",
        vec![
            row! { "k" => 1, "v" => "a" },
            row! { "k" => 1, "v" => "a" },
            row! { "k" => 1, "v" => "b" },
        ],
    );
    assert_eq!(
        collect(&graph, &bindings)?,
        vec![row! { "k" => 1, "uniques" => 2 }]
    );
    Ok(())
}

#[test]
fn top_n_keeps_the_largest_descending() -> anyhow::Result<()> {
    let graph = Graph::from_iter("input").reduce(TopN::new("score", 2), &["k"]);
    let bindings = Bindings::new().rows(
        "input",
        vec![
            row! { "k" => 1, "score" => 3, "tag" => "low" },
            row! { "k" => 1, "score" => 9, "tag" => "high" },
            row! { "k" => 1, "score" => 5, "tag" => "mid" },
        ],
    );
    assert_eq!(
        collect(&graph, &bindings)?,
        vec![
            row! { "k" => 1, "score" => 9, "tag" => "high" },
            row! { "k" => 1, "score" => 5, "tag" => "mid" },
        ]
    );
    Ok(())
}

#[test]
fn first_yields_one_row_per_group() -> anyhow::Result<()> {
    let graph = Graph::from_iter("input").reduce(First, &["k"]);
    let bindings = Bindings::new().rows(
        "input",
        vec![
            row! { "k" => 1, "v" => "keep" },
            row! { "k" => 1, "v" => "drop" },
            row! { "k" => 2, "v" => "keep" },
        ],
    );
    assert_eq!(
        collect(&graph, &bindings)?,
        vec![
            row! { "k" => 1, "v" => "keep" },
            row! { "k" => 2, "v" => "keep" },
        ]
    );
    Ok(())
}

#[test]
fn term_frequency_reports_fractions_in_first_occurrence_order() -> anyhow::Result<()> {
    let graph = Graph::from_iter("input").reduce(TermFrequency::new("w", "tf"), &["doc"]);
    let bindings = Bindings::new().rows(
        "input",
        vec![
            row! { "doc" => 1, "w" => "b" },
            row! { "doc" => 1, "w" => "a" },
            row! { "doc" => 1, "w" => "b" },
            row! { "doc" => 1, "w" => "b" },
        ],
    );
    assert_eq!(
        collect(&graph, &bindings)?,
        vec![
            row! { "doc" => 1, "w" => "b", "tf" => 0.75 },
            row! { "doc" => 1, "w" => "a", "tf" => 0.25 },
        ]
    );
    Ok(())
}

#[test]
fn reducer_failure_terminates_the_stream() -> anyhow::Result<()> {
    fn failing(_keys: &[String], _rows: Vec<Row>) -> Result<Vec<Row>> {
        Err(Error::user(anyhow::anyhow!("reducer refused")))
    }
    let graph = Graph::from_iter("input").reduce(failing, &["k"]);
    let bindings = Bindings::new().rows("input", vec![row! { "k" => 1 }]);

    let mut stream = graph.run(&bindings)?;
    let err = stream.next().unwrap().err().expect("reducer must fail");
    assert_eq!(err.kind(), ErrorKind::User);
    assert!(stream.next().is_none());
    Ok(())
}
