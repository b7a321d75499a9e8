use super::*;

#[test]
fn round_trips_a_record_through_append_and_read() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("t.jsonl");

    let record = TraceRecord {
        relative_time_us: 1_500_000,
        path: vec!["R1".into(), "R2".into(), "R3".into()],
        purpose: "general".into(),
    };

    let mut writer = TraceWriter::create(&path).expect("create writer");
    writer.append(&record).expect("append record");
    drop(writer);

    let read_back = read_trace(&path).expect("read trace");
    assert_eq!(read_back, vec![record]);
}

#[test]
fn empty_file_yields_no_records() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("empty.jsonl");
    std::fs::write(&path, "").expect("write empty file");

    let records = read_trace(&path).expect("read empty trace");
    assert!(records.is_empty());
}

#[test]
fn malformed_line_is_a_construction_failure() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("bad.jsonl");
    std::fs::write(&path, "not json\n").expect("write malformed file");

    let err = read_trace(&path).expect_err("expected parse failure");
    assert!(matches!(err, DriverError::ConstructionFailure(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let path = Path::new("/nonexistent/trace/does/not/exist.jsonl");
    let err = read_trace(path).expect_err("expected io failure");
    assert!(matches!(err, DriverError::Trace(_)));
}

#[test]
fn blank_lines_between_records_are_skipped() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("t.jsonl");

    let a = TraceRecord { relative_time_us: 0, path: vec!["R1".into()], purpose: "general".into() };
    let b = TraceRecord { relative_time_us: 5, path: vec!["R2".into()], purpose: "general".into() };

    std::fs::write(&path, format!("{}\n\n{}\n", a.to_line().unwrap(), b.to_line().unwrap()))
        .expect("write trace");

    let records = read_trace(&path).expect("read trace");
    assert_eq!(records, vec![a, b]);
}
