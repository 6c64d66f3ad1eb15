use serde_json::json;
use sheetgrid::cell::{Cell, Scalar};
use sheetgrid::grid::{
    Grid, GridPayload, SaveRequest, flatten, parse_rows, project, reconcile, reconcile_request,
    rows_from_grid,
};
use sheetgrid::spreadsheet::{MergeRange, Worksheet};

fn grid(rows: &[&[&str]]) -> Grid {
    rows.iter()
        .map(|row| row.iter().map(|v| v.to_string()).collect())
        .collect()
}

fn merge(top: u32, left: u32, bottom: u32, right: u32) -> MergeRange {
    MergeRange::new(top, left, bottom, right).unwrap()
}

// ---- Flattener ----

#[test]
fn zero_row_worksheet_yields_placeholder() {
    let sheet = Worksheet::default();
    assert_eq!(flatten(&sheet), grid(&[&["", "", "", ""]]));
}

#[test]
fn all_blank_worksheet_yields_placeholder() {
    let sheet = Worksheet::from_rows(vec![vec!["", ""], vec!["", ""]]);
    assert_eq!(flatten(&sheet), grid(&[&["", "", "", ""]]));
}

#[test]
fn ragged_rows_are_padded() {
    let sheet = Worksheet::from_rows(vec![vec!["a"], vec!["b", "c", "d"], vec!["e", "f"]]);
    assert_eq!(
        flatten(&sheet),
        grid(&[&["a", "", ""], &["b", "c", "d"], &["e", "f", ""]])
    );
}

#[test]
fn blank_rows_are_dropped_and_order_kept() {
    let sheet = Worksheet::from_rows(vec![
        vec!["h1", "h2"],
        vec!["", ""],
        vec!["", "x"],
        vec!["", ""],
        vec!["y", ""],
    ]);
    assert_eq!(
        flatten(&sheet),
        grid(&[&["h1", "h2"], &["", "x"], &["y", ""]])
    );
}

#[test]
fn merge_anchor_fills_whole_range() {
    let mut sheet = Worksheet::default();
    sheet.set_cell(1, 1, Cell::text("X")).unwrap();
    sheet.set_cell(1, 3, Cell::text("c")).unwrap();
    sheet.set_cell(2, 2, Cell::text("hidden")).unwrap();
    sheet.add_merge(merge(1, 1, 2, 2)).unwrap();

    let flat = flatten(&sheet);
    assert_eq!(flat[0], vec!["X", "X", "c"]);
    assert_eq!(flat[1], vec!["X", "X", ""]);
}

#[test]
fn merge_extends_grid_past_populated_cells() {
    let mut sheet = Worksheet::default();
    sheet.set_cell(1, 1, Cell::text("title")).unwrap();
    sheet.add_merge(merge(1, 1, 3, 4)).unwrap();

    let flat = flatten(&sheet);
    assert_eq!(flat.len(), 3);
    assert!(flat.iter().all(|row| row == &vec!["title"; 4]));
}

#[test]
fn empty_anchor_propagates_empty() {
    let mut sheet = Worksheet::default();
    sheet.set_cell(1, 2, Cell::text("keep")).unwrap();
    sheet.set_cell(2, 1, Cell::text("lost")).unwrap();
    sheet.add_merge(merge(1, 1, 2, 1)).unwrap();

    assert_eq!(flatten(&sheet), grid(&[&["", "keep"]]));
}

#[test]
fn formula_and_rich_text_cells_flatten_to_values() {
    let mut sheet = Worksheet::default();
    sheet.set_cell(1, 1, Cell::formula("B1*2", Some(Scalar::Number(0.0)))).unwrap();
    sheet.set_cell(1, 2, Cell::formula("NA()", None)).unwrap();
    sheet
        .set_cell(
            1,
            3,
            Cell::RichText(vec![sheetgrid::TextRun::new("a"), sheetgrid::TextRun::new("b")]),
        )
        .unwrap();
    assert_eq!(flatten(&sheet), grid(&[&["0", "", "ab"]]));
}

#[test]
fn single_nonempty_cell_keeps_its_row() {
    let mut sheet = Worksheet::default();
    sheet.set_cell(5, 3, Cell::number(7.0)).unwrap();
    assert_eq!(flatten(&sheet), grid(&[&["", "", "7"]]));
}

#[test]
fn project_remaps_merges_past_dropped_rows() {
    let mut sheet = Worksheet::default();
    sheet.set_cell(1, 1, Cell::text("top")).unwrap();
    sheet.set_cell(4, 1, Cell::text("body")).unwrap();
    sheet.set_cell(4, 3, Cell::text("z")).unwrap();
    sheet.add_merge(merge(4, 1, 5, 2)).unwrap();
    // rows 2 and 3 are blank, this merge only covers blank rows
    sheet.add_merge(merge(2, 3, 3, 3)).unwrap();

    let payload = project(&sheet);
    assert_eq!(
        payload.data,
        grid(&[&["top", "", ""], &["body", "body", "z"], &["body", "body", ""]])
    );
    assert_eq!(payload.merged_cells, Some(vec![merge(2, 1, 3, 2)]));
}

#[test]
fn payload_uses_camel_case_wire_names() {
    let payload = GridPayload {
        data: grid(&[&["a"]]),
        merged_cells: Some(vec![merge(1, 1, 1, 2)]),
    };
    let value = serde_json::to_value(&payload).unwrap();
    assert_eq!(
        value,
        json!({"data": [["a"]], "mergedCells": [{"top": 1, "left": 1, "bottom": 1, "right": 2}]})
    );
}

// ---- Reconciler ----

#[test]
fn reconcile_then_flatten_round_trips() {
    let original = grid(&[
        &["Name", "Qty", "Note"],
        &["apple", "3", ""],
        &["", "", "loose"],
        &["pear", "0", "ripe"],
    ]);
    let mut sheet = Worksheet::default();
    reconcile(&mut sheet, rows_from_grid(&original), None).unwrap();
    assert_eq!(flatten(&sheet), original);
}

#[test]
fn reconcile_replaces_previous_content() {
    let mut sheet = Worksheet::from_rows(vec![
        vec!["old", "old", "old", "old"],
        vec!["old", "old", "old", "old"],
        vec!["old", "old", "old", "old"],
    ]);
    sheet.add_merge(merge(1, 1, 3, 1)).unwrap();

    reconcile(&mut sheet, rows_from_grid(&grid(&[&["new", "n"]])), None).unwrap();
    assert!(sheet.merges().is_empty());
    assert_eq!(flatten(&sheet), grid(&[&["new", "n"]]));
}

#[test]
fn reconcile_drops_whitespace_only_rows() {
    let mut sheet = Worksheet::default();
    let edited = grid(&[&["a", "b"], &["  ", "\t"], &["c", ""]]);
    reconcile(&mut sheet, rows_from_grid(&edited), None).unwrap();
    assert_eq!(sheet.rows().len(), 2);
    assert_eq!(flatten(&sheet), grid(&[&["a", "b"], &["c", ""]]));
}

#[test]
fn reconcile_applies_merges() {
    let mut sheet = Worksheet::default();
    let edited = grid(&[&["X", "X", "c"], &["X", "X", "d"]]);
    reconcile(&mut sheet, rows_from_grid(&edited), Some(&[merge(1, 1, 2, 2)])).unwrap();
    assert_eq!(sheet.merges(), &[merge(1, 1, 2, 2)]);
    assert_eq!(flatten(&sheet), edited);
}

#[test]
fn overlapping_merges_are_a_validation_error() {
    let mut sheet = Worksheet::from_rows(vec![vec!["keep"]]);
    let edited = grid(&[&["a", "b", "c"], &["d", "e", "f"]]);
    let err = reconcile(
        &mut sheet,
        rows_from_grid(&edited),
        Some(&[merge(1, 1, 2, 2), merge(2, 2, 2, 3)]),
    )
    .unwrap_err();
    assert_eq!(err.kind(), "validation");
    // nothing was written
    assert_eq!(flatten(&sheet), grid(&[&["keep"]]));
}

#[test]
fn out_of_grid_merge_is_a_validation_error() {
    let mut sheet = Worksheet::default();
    let edited = grid(&[&["a", "b"]]);
    let err = reconcile(&mut sheet, rows_from_grid(&edited), Some(&[merge(1, 1, 2, 1)]))
        .unwrap_err();
    assert_eq!(err.kind(), "validation");

    let inverted = MergeRange {
        top: 1,
        left: 2,
        bottom: 1,
        right: 1,
    };
    let err = reconcile(&mut sheet, rows_from_grid(&edited), Some(&[inverted])).unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[test]
fn parse_rows_accepts_scalars() {
    let rows = parse_rows(&json!([["a", 1, 2.5, true, null]])).unwrap();
    assert_eq!(
        rows[0],
        vec![
            Cell::text("a"),
            Cell::number(1.0),
            Cell::number(2.5),
            Cell::boolean(true),
            Cell::Empty,
        ]
    );
}

#[test]
fn parse_rows_rejects_bad_shapes() {
    for bad in [
        json!("not a grid"),
        json!({"rows": []}),
        json!([["ok"], "row"]),
        json!([["ok", ["nested"]]]),
        json!([[{"v": 1}]]),
    ] {
        let err = parse_rows(&bad).unwrap_err();
        assert_eq!(err.kind(), "format", "{}", bad);
    }
}

#[test]
fn parse_rows_rejects_oversized_rows() {
    let wide = vec![json!("x"); sheetgrid::MAX_COLUMNS + 1];
    let err = parse_rows(&json!([wide])).unwrap_err();
    assert_eq!(err.kind(), "format");
}

#[test]
fn reconcile_request_reads_wire_shape() {
    let request: SaveRequest = serde_json::from_value(json!({
        "data": [["Region", "Total"], ["North", 10], ["", ""]],
        "mergedCells": [{"top": 2, "left": 1, "bottom": 2, "right": 2}]
    }))
    .unwrap();
    let mut sheet = Worksheet::default();
    reconcile_request(&mut sheet, &request).unwrap();

    assert_eq!(
        flatten(&sheet),
        grid(&[&["Region", "Total"], &["North", "North"]])
    );
}

#[test]
fn numbers_from_the_wire_flatten_as_text() {
    let mut sheet = Worksheet::default();
    let rows = parse_rows(&json!([[0, 1.0, -2.75]])).unwrap();
    reconcile(&mut sheet, rows, None).unwrap();
    assert_eq!(flatten(&sheet), grid(&[&["0", "1", "-2.75"]]));
}

#[test]
fn merges_below_a_blank_row_move_up_with_their_rows() {
    let edited = grid(&[&["a", "b"], &["", ""], &["X", "X"], &["c", "d"]]);
    let mut sheet = Worksheet::default();
    reconcile(&mut sheet, rows_from_grid(&edited), Some(&[merge(3, 1, 3, 2)])).unwrap();
    assert_eq!(sheet.merges(), &[merge(2, 1, 2, 2)]);
    assert_eq!(
        flatten(&sheet),
        grid(&[&["a", "b"], &["X", "X"], &["c", "d"]])
    );

    // the merge sits on the last posted row
    let edited = grid(&[&["a", "b"], &["", ""], &["X", "X"]]);
    let mut sheet = Worksheet::default();
    reconcile(&mut sheet, rows_from_grid(&edited), Some(&[merge(3, 1, 3, 2)])).unwrap();
    assert_eq!(flatten(&sheet), grid(&[&["a", "b"], &["X", "X"]]));
}

#[test]
fn merge_covering_a_blank_row_is_a_validation_error() {
    let mut sheet = Worksheet::from_rows(vec![vec!["keep"]]);
    let edited = grid(&[&["a", "b"], &[" ", ""], &["c", "d"]]);
    let err = reconcile(&mut sheet, rows_from_grid(&edited), Some(&[merge(1, 1, 3, 1)]))
        .unwrap_err();
    assert_eq!(err.kind(), "validation");
    assert_eq!(flatten(&sheet), grid(&[&["keep"]]));

    let err = reconcile(&mut sheet, rows_from_grid(&edited), Some(&[merge(4, 1, 4, 1)]))
        .unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[test]
fn reconciled_merges_round_trip_through_project() {
    let edited = grid(&[&["", ""], &["t", "t"], &["x", "y"]]);
    let mut sheet = Worksheet::default();
    reconcile(&mut sheet, rows_from_grid(&edited), Some(&[merge(2, 1, 2, 2)])).unwrap();
    let payload = project(&sheet);
    assert_eq!(payload.data, grid(&[&["t", "t"], &["x", "y"]]));
    assert_eq!(payload.merged_cells, Some(vec![merge(1, 1, 1, 2)]));
}
