#![allow(dead_code)]

use std::path::{Path, PathBuf};

use arrow::array::{Array, Int64Array, RecordBatch, StringArray};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::json;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Reference timestamp: 2018-11-02 01:25:34 UTC (a Friday).
pub const TS: i64 = 1_541_121_934_796;

pub fn catalog_line(
    song_id: &str,
    title: &str,
    artist_id: &str,
    artist_name: &str,
    duration: f64,
    year: i64,
) -> String {
    json!({
        "num_songs": 1,
        "song_id": song_id,
        "title": title,
        "artist_id": artist_id,
        "artist_name": artist_name,
        "artist_location": "",
        "artist_latitude": null,
        "artist_longitude": null,
        "year": year,
        "duration": duration,
    })
    .to_string()
}

pub fn play_line(user_id: &str, song: &str, artist: &str, length: f64, ts: i64) -> String {
    json!({
        "artist": artist,
        "auth": "Logged In",
        "firstName": "Test",
        "gender": "F",
        "itemInSession": 0,
        "lastName": "User",
        "length": length,
        "level": "free",
        "location": "NY",
        "method": "PUT",
        "page": "NextSong",
        "sessionId": 1,
        "song": song,
        "status": 200,
        "ts": ts,
        "userAgent": "x",
        "userId": user_id,
    })
    .to_string()
}

pub fn page_line(user_id: &str, page: &str, ts: i64) -> String {
    json!({
        "artist": null,
        "firstName": "Test",
        "lastName": "User",
        "gender": "F",
        "length": null,
        "level": "free",
        "page": page,
        "sessionId": 1,
        "song": null,
        "ts": ts,
        "userId": user_id,
    })
    .to_string()
}

pub fn write_lines(root: &Path, rel: &str, lines: &[String]) -> TestResult {
    let abs = root.join(rel);
    if let Some(parent) = abs.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut body = lines.join("\n");
    body.push('\n');
    std::fs::write(abs, body)?;
    Ok(())
}

/// Every Parquet file under `dir`, as (path relative to `dir`, batches).
pub fn read_table(dir: &Path) -> TestResult<Vec<(PathBuf, Vec<RecordBatch>)>> {
    let mut files = Vec::new();
    collect_parquet(dir, &mut files)?;
    files.sort();

    let mut out = Vec::new();
    for path in files {
        let file = std::fs::File::open(&path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
        let batches = reader.collect::<Result<Vec<_>, _>>()?;
        out.push((path.strip_prefix(dir)?.to_path_buf(), batches));
    }
    Ok(out)
}

fn collect_parquet(dir: &Path, out: &mut Vec<PathBuf>) -> TestResult {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_parquet(&path, out)?;
        } else if path.extension().is_some_and(|e| e == "parquet") {
            out.push(path);
        }
    }
    Ok(())
}

pub fn row_count(table: &[(PathBuf, Vec<RecordBatch>)]) -> usize {
    table
        .iter()
        .flat_map(|(_, batches)| batches)
        .map(|b| b.num_rows())
        .sum()
}

pub fn strings(batch: &RecordBatch, column: &str) -> TestResult<Vec<Option<String>>> {
    let idx = batch.schema().index_of(column)?;
    let array = batch
        .column(idx)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| format!("column {column} is not Utf8"))?;
    Ok((0..array.len())
        .map(|i| (!array.is_null(i)).then(|| array.value(i).to_string()))
        .collect())
}

pub fn ints(batch: &RecordBatch, column: &str) -> TestResult<Vec<Option<i64>>> {
    let idx = batch.schema().index_of(column)?;
    let array = batch
        .column(idx)
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| format!("column {column} is not Int64"))?;
    Ok(array.iter().collect())
}

/// Concatenated values of a string column across every file of a table.
pub fn all_strings(
    table: &[(PathBuf, Vec<RecordBatch>)],
    column: &str,
) -> TestResult<Vec<Option<String>>> {
    let mut out = Vec::new();
    for (_, batches) in table {
        for batch in batches {
            out.extend(strings(batch, column)?);
        }
    }
    Ok(out)
}
