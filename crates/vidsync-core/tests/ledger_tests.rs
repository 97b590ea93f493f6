use chrono::NaiveDate;
use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;
use vidsync_core::ledger::{self, read_partition};
use vidsync_core::metadata::METADATA_COLUMNS;
use vidsync_core::{Ledger, MetadataRecord};

const MELBOURNE: chrono_tz::Tz = chrono_tz::Australia::Melbourne;

fn full_record() -> MetadataRecord {
    MetadataRecord {
        identifier: "B2004203".to_string(),
        title: "CyberthonIV".to_string(),
        filetype: "mo01".to_string(),
        duration_secs: 125.5,
        duration_hms: "00:02:05:15".to_string(),
        checksum: "d41d8cd98f00b204e9800998ecf8427e".to_string(),
        mime_type: Some("video/quicktime".to_string()),
        creation_datetime: "2021-03-04T16:06:07+11:00".to_string(),
        file_size_bytes: 1_048_576,
        overall_bit_rate: Some(8_000_000),
        video_codec: Some("H.264 / AVC / MPEG-4 AVC / MPEG-4 part 10 (avc1)".to_string()),
        video_bit_rate: Some(7_800_000),
        video_max_bit_rate: None,
        video_frame_rate: 30000.0 / 1001.0,
        width: Some(1920),
        height: Some(1080),
        audio_codec: Some("AAC (Advanced Audio Coding) (mp4a)".to_string()),
        audio_channels: Some(2),
        audio_sample_rate: Some(48_000),
        audio_bit_rate: Some(192_000),
        audio_max_bit_rate: None,
    }
}

fn sparse_record() -> MetadataRecord {
    MetadataRecord {
        identifier: String::new(),
        title: "loose file, with a comma".to_string(),
        filetype: "m".to_string(),
        duration_secs: 0.0,
        duration_hms: "00:00:00:00".to_string(),
        checksum: "0cc175b9c0f1b6a831c399e269772661".to_string(),
        mime_type: None,
        creation_datetime: "2024-02-09T09:00:00+11:00".to_string(),
        file_size_bytes: 0,
        overall_bit_rate: None,
        video_codec: None,
        video_bit_rate: None,
        video_max_bit_rate: None,
        video_frame_rate: 0.0,
        width: None,
        height: None,
        audio_codec: None,
        audio_channels: None,
        audio_sample_rate: None,
        audio_bit_rate: None,
        audio_max_bit_rate: None,
    }
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 2, 9).unwrap()
}

#[test]
fn test_round_trip_keeps_absent_fields_absent() {
    let dir = tempdir().unwrap();
    let ledger = Ledger::new(dir.path(), MELBOURNE);

    let path = ledger.append_on(day(), &full_record()).unwrap();
    ledger.append_on(day(), &sparse_record()).unwrap();

    assert_eq!(path, dir.path().join("20240209_metadata.csv"));
    let records = read_partition(&path).unwrap();
    assert_eq!(records, vec![full_record(), sparse_record()]);
}

#[test]
fn test_absent_values_are_empty_cells() {
    let dir = tempdir().unwrap();
    let ledger = Ledger::new(dir.path(), MELBOURNE);
    let path = ledger.append_on(day(), &sparse_record()).unwrap();

    let contents = fs::read_to_string(path).unwrap();
    let row = contents.lines().nth(1).unwrap();
    assert!(row.starts_with(",\"loose file, with a comma\",m,0.0,00:00:00:00,"));
    assert!(row.ends_with(",0.0,,,,,,,"));
}

#[test]
fn test_header_matches_column_order() {
    let dir = tempdir().unwrap();
    let ledger = Ledger::new(dir.path(), MELBOURNE);
    let path = ledger.append_on(day(), &full_record()).unwrap();

    let contents = fs::read_to_string(path).unwrap();
    assert_eq!(contents.lines().next().unwrap(), METADATA_COLUMNS.join(","));
}

#[test]
fn test_header_written_once_across_writers() {
    let dir = tempdir().unwrap();
    let first = Ledger::new(dir.path(), MELBOURNE);
    let second = Ledger::new(dir.path(), MELBOURNE);

    first.append_on(day(), &full_record()).unwrap();
    second.append_on(day(), &sparse_record()).unwrap();
    let path = first.append_on(day(), &full_record()).unwrap();

    let contents = fs::read_to_string(path).unwrap();
    let headers = contents
        .lines()
        .filter(|line| line.starts_with("identifier,"))
        .count();
    assert_eq!(headers, 1);
    assert_eq!(contents.lines().count(), 4);
}

#[test]
fn test_racing_first_appends_write_one_header() {
    let dir = tempdir().unwrap();
    let workers = 8;
    let barrier = Arc::new(Barrier::new(workers));

    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let folder = dir.path().to_path_buf();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let ledger = Ledger::new(folder, MELBOURNE);
                barrier.wait();
                ledger.append_on(day(), &full_record()).unwrap()
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let path = dir.path().join("20240209_metadata.csv");
    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.starts_with(&METADATA_COLUMNS.join(",")));
    let headers = contents
        .lines()
        .filter(|line| line.starts_with("identifier,"))
        .count();
    assert_eq!(headers, 1);
    assert_eq!(read_partition(&path).unwrap().len(), workers);

    // Losing writers leave no temporary files behind.
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_empty_partition_gets_header() {
    let dir = tempdir().unwrap();
    let ledger = Ledger::new(dir.path(), MELBOURNE);
    fs::write(ledger.partition_path(day()), b"").unwrap();

    let path = ledger.append_on(day(), &full_record()).unwrap();
    assert_eq!(read_partition(&path).unwrap(), vec![full_record()]);
}

#[test]
fn test_partitions_are_per_day() {
    let dir = tempdir().unwrap();
    let ledger = Ledger::new(dir.path(), MELBOURNE);
    let next_day = day().succ_opt().unwrap();

    ledger.append_on(day(), &full_record()).unwrap();
    let path = ledger.append_on(next_day, &sparse_record()).unwrap();

    assert_eq!(path, dir.path().join("20240210_metadata.csv"));
    assert_eq!(read_partition(&path).unwrap(), vec![sparse_record()]);
}

#[test]
fn test_output_folder_is_created() {
    let dir = tempdir().unwrap();
    let ledger = Ledger::new(dir.path().join("nested").join("out"), MELBOURNE);
    let path = ledger.append_on(day(), &full_record()).unwrap();
    assert!(path.exists());
}

#[test]
fn test_json_sidecar_uses_null_for_absent_values() {
    let dir = tempdir().unwrap();
    let video = dir.path().join("clip.mov");
    fs::write(&video, b"video").unwrap();

    let sidecar = ledger::write_json_sidecar(&video, &sparse_record()).unwrap();
    assert_eq!(sidecar, dir.path().join("clip.mov.json"));

    let value: serde_json::Value = serde_json::from_slice(&fs::read(sidecar).unwrap()).unwrap();
    assert!(value["mime_type"].is_null());
    assert!(value["width"].is_null());
    assert_eq!(value["filetype"], "m");
    let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), METADATA_COLUMNS.len());
}
