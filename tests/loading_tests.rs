use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use chrono::{FixedOffset, TimeZone, Utc};
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use sugar_diary::data_loading::load_records;
use sugar_diary::{Level, Record};

const CSV_EXPORT: &str = "\
record_id;when;kind;value;insulin_kind
1;2024-05-01 08:00;metering;6.2;
1;2024-05-01 08:00;meal;3;
1;2024-05-01 08:00;injection;4;Rapid
2;2024-05-01T12:00:00Z;comment;\"after lunch; fine\";
3;2024-05-01 18:30;;;
";

fn write_feather(path: &Path) {
    let schema = Arc::new(Schema::new(vec![
        Field::new("record_id", DataType::Int64, false),
        Field::new("when", DataType::Utf8, false),
        Field::new("kind", DataType::Utf8, true),
        Field::new("value", DataType::Utf8, true),
        Field::new("insulin_kind", DataType::Utf8, true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(vec![10, 10, 11])),
        Arc::new(StringArray::from(vec![
            "2024-05-02 07:00",
            "2024-05-02 07:00",
            "2024-05-02 21:15",
        ])),
        Arc::new(StringArray::from(vec![
            Some("metering"),
            Some("injection"),
            None,
        ])),
        Arc::new(StringArray::from(vec![Some("5,4"), None, None])),
        Arc::new(StringArray::from(vec![None, Some("Basal"), None])),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();

    let file = File::create(path).unwrap();
    let mut writer = FileWriter::try_new(file, &schema).unwrap();
    writer.write(&batch).unwrap();
    writer.finish().unwrap();
}

fn find(records: &[Record], id: i64) -> &Record {
    records.iter().find(|r| r.id == id).unwrap()
}

#[test]
fn loads_a_csv_export_in_local_time() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("diary.csv");
    fs::write(&path, CSV_EXPORT).unwrap();

    let tz = FixedOffset::east_opt(3 * 3600).unwrap();
    let records = load_records(&path, &tz).unwrap();
    assert_eq!(records.len(), 3);

    let morning = find(&records, 1);
    assert_eq!(morning.when, Utc.with_ymd_and_hms(2024, 5, 1, 5, 0, 0).unwrap());
    assert_eq!(morning.meterings, vec![Level::from_tenths(62)]);
    assert_eq!(morning.meals, vec![Level::from_tenths(30)]);
    assert_eq!(morning.injections[0].kind, "Rapid");
    assert_eq!(morning.injections[0].quantity, Some(4));

    let lunch = find(&records, 2);
    assert_eq!(lunch.when, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
    assert_eq!(lunch.comments, vec!["after lunch; fine".to_string()]);

    assert!(find(&records, 3).meterings.is_empty());
}

#[test]
fn loads_a_feather_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("diary.feather");
    write_feather(&path);

    let records = load_records(&path, &Utc).unwrap();
    assert_eq!(records.len(), 2);
    let morning = find(&records, 10);
    assert_eq!(morning.meterings, vec![Level::from_tenths(54)]);
    assert_eq!(morning.injections[0].kind, "Basal");
    assert_eq!(morning.injections[0].quantity, None);
    assert!(find(&records, 11).injections.is_empty());
}

#[test]
fn walks_a_directory_of_exports() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("2024").join("05");
    fs::create_dir_all(&nested).unwrap();
    fs::write(dir.path().join("diary.csv"), CSV_EXPORT).unwrap();
    write_feather(&nested.join("more.feather"));
    fs::write(nested.join("notes.txt"), "not an export").unwrap();

    let records = load_records(dir.path(), &Utc).unwrap();
    let mut ids: Vec<i64> = records.iter().map(|r| r.id).collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2, 3, 10, 11]);
}

#[test]
fn reports_the_failing_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.csv");
    fs::write(
        &path,
        "record_id;when;kind;value;insulin_kind\n1;2024-05-01 08:00;metering;6.2;\n1;2024-05-01 08:00;metering;high;\n",
    )
    .unwrap();

    let err = load_records(&path, &Utc).unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("broken.csv:3"), "{}", message);
}
