use rowflow::algorithms::{self, RoadSpeedColumns};
use rowflow::*;

fn collect(graph: &Graph, bindings: &Bindings) -> anyhow::Result<Vec<Row>> {
    Ok(graph.run(bindings)?.collect::<Result<Vec<_>>>()?)
}

fn docs() -> Vec<Row> {
    vec![
        row! { "doc_id" => 1, "text" => "hello, WORLD" },
        row! { "doc_id" => 2, "text" => "hello world!" },
    ]
}

#[test]
fn word_count_from_bindings() -> anyhow::Result<()> {
    let graph = algorithms::word_count(&Graph::from_iter("docs"), "text", "count");
    let bindings = Bindings::new().rows("docs", docs());
    assert_eq!(
        collect(&graph, &bindings)?,
        vec![
            row! { "text" => "hello", "count" => 2 },
            row! { "text" => "world", "count" => 2 },
        ]
    );
    Ok(())
}

#[test]
fn word_count_from_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("docs.json");
    std::fs::write(
        &path,
        r#"[{"text": "hello, WORLD"}, {"text": "hello world!"}]"#,
    )?;

    let graph = algorithms::word_count(&Graph::from_file(&path, json_array_parser), "text", "count");
    assert_eq!(
        collect(&graph, &Bindings::new())?,
        vec![
            row! { "text" => "hello", "count" => 2 },
            row! { "text" => "world", "count" => 2 },
        ]
    );
    Ok(())
}

#[test]
fn inverted_index_scores_tf_idf() -> anyhow::Result<()> {
    let graph = algorithms::inverted_index(&Graph::from_iter("docs"), "doc_id", "text", "tf_idf");
    let bindings = Bindings::new().rows(
        "docs",
        vec![
            row! { "doc_id" => 1, "text" => "a b" },
            row! { "doc_id" => 2, "text" => "a c" },
            row! { "doc_id" => 3, "text" => "a" },
        ],
    );

    let mut out = collect(&graph, &bindings)?;
    out.sort_by(|x, y| {
        let key = |r: &Row| {
            (
                r.require("text").unwrap().as_str().unwrap().to_owned(),
                r.require("doc_id").unwrap().as_int().unwrap(),
            )
        };
        key(x).cmp(&key(y))
    });

    // "a" is in every document: idf = ln(3/3) = 0, so every pair scores 0.
    // "b" and "c" each live in one document with tf 1/2 and idf ln(3).
    let unique_score = 0.5 * 3.0_f64.ln();
    assert_eq!(
        out,
        vec![
            row! { "doc_id" => 1, "text" => "a", "tf_idf" => 0.0 },
            row! { "doc_id" => 2, "text" => "a", "tf_idf" => 0.0 },
            row! { "doc_id" => 3, "text" => "a", "tf_idf" => 0.0 },
            row! { "doc_id" => 1, "text" => "b", "tf_idf" => unique_score },
            row! { "doc_id" => 2, "text" => "c", "tf_idf" => unique_score },
        ]
    );
    Ok(())
}

#[test]
fn pmi_ranks_words_per_document() -> anyhow::Result<()> {
    let graph = algorithms::pmi(&Graph::from_iter("docs"), "doc_id", "text", "pmi");
    let bindings = Bindings::new().rows(
        "docs",
        vec![
            row! { "doc_id" => 1, "text" => "alpha alpha alpha beta" },
            row! { "doc_id" => 2, "text" => "alpha alpha gamma gamma" },
        ],
    );

    // "beta" is four characters long and occurs once, so it drops out. Seven
    // surviving word occurrences: five "alpha", two "gamma".
    let alpha_all = 5.0_f64 / 7.0;
    let gamma_all = 2.0_f64 / 7.0;
    assert_eq!(
        collect(&graph, &bindings)?,
        vec![
            row! { "doc_id" => 1, "text" => "alpha", "pmi" => (1.0 / alpha_all).ln() },
            row! { "doc_id" => 2, "text" => "gamma", "pmi" => (0.5 / gamma_all).ln() },
            row! { "doc_id" => 2, "text" => "alpha", "pmi" => (0.5 / alpha_all).ln() },
        ]
    );
    Ok(())
}

#[test]
fn road_speed_averages_per_weekday_and_hour() -> anyhow::Result<()> {
    let columns = RoadSpeedColumns::default();
    let graph = algorithms::road_speed(
        &Graph::from_iter("times"),
        &Graph::from_iter("edges"),
        &columns,
    );
    let bindings = Bindings::new()
        .rows(
            "times",
            vec![
                // Two traversals of the same edge on Sunday noon: 10 and 20
                // minutes.
                row! {
                    "edge_id" => "e1",
                    "enter_time" => "20230101T120000.000000",
                    "leave_time" => "20230101T121000.000000",
                },
                row! {
                    "edge_id" => "e1",
                    "enter_time" => "20230101T123000",
                    "leave_time" => "20230101T125000",
                },
            ],
        )
        .rows(
            "edges",
            vec![row! {
                "edge_id" => "e1",
                "start" => Value::list([37.0, 55.0]),
                "end" => Value::list([38.0, 55.0]),
            }],
        );

    let out = collect(&graph, &bindings)?;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].require("weekday")?, &Value::Str("Sun".into()));
    assert_eq!(out[0].require("hour")?, &Value::Int(12));

    let edge_km = haversine_km(37.0, 55.0, 38.0, 55.0);
    let expected = (2.0 * edge_km) / 0.5;
    let speed = out[0].require("speed")?.as_float().unwrap();
    assert!(
        (speed - expected).abs() < 1e-9,
        "speed {speed} vs expected {expected}"
    );
    Ok(())
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
    2.0 * a.sqrt().asin() * 6371.0
}
