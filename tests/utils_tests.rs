use srctag::utils::{csv, table};

#[test]
fn table_renderer_produces_expected_grid() {
    let headers = ["A", "B"];
    let rows = vec![vec!["x".into(), "y".into()], vec!["long".into(), "z".into()]];
    let out = table::render(&headers, &rows);
    assert!(out.starts_with('+'));
    assert!(out.contains("| A    | B |"));
    assert!(out.contains("| long | z |"));
    assert_eq!(out.lines().count(), 6);
}

#[test]
fn table_renderer_pads_missing_cells_and_counts_chars() {
    let rows = vec![vec!["é".into()]];
    let out = table::render(&["Kind", "Count"], &rows);
    assert!(out.contains("| é    |       |"));
}

#[test]
fn csv_writer_quotes_only_when_needed() {
    let mut out = String::new();
    csv::write_record(&mut out, &["plain", "a,b", " padded", ""]);
    assert_eq!(out, "plain,\"a,b\",\" padded\",\n");
}
