// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//! Integration tests for the delimited-text materialization path.

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use quarry::{
    Cell, ColumnDesc, ConnectionProfile, LogicalType, QuarryError, QueryExecution, QueryState,
    ResultSet, ResultSetOptions, StandardConverter,
};

fn execution(location: &str, query: &str) -> QueryExecution {
    QueryExecution {
        query_id: "q-test".to_string(),
        query: query.to_string(),
        state: QueryState::Succeeded,
        output_location: Some(location.to_string()),
    }
}

fn build(
    location: &str,
    description: Vec<ColumnDesc>,
    options: ResultSetOptions,
) -> quarry::Result<ResultSet> {
    ResultSet::new(
        ConnectionProfile::default(),
        Arc::new(StandardConverter::new()),
        execution(location, "SELECT * FROM t"),
        description,
        options,
    )
}

#[test]
fn tsv_result_preserves_blank_line_as_null_row() -> Result<()> {
    let dir = tempfile::tempdir().context("tempdir")?;
    let path = dir.path().join("q-test.txt");
    fs::write(&path, "1\talpha\n\n3\tgamma\n").context("write tsv")?;

    let description = vec![
        ColumnDesc::new("id", LogicalType::BigInt),
        ColumnDesc::new("name", LogicalType::Varchar),
    ];
    let mut rs = build(
        path.to_str().context("utf8 path")?,
        description,
        ResultSetOptions::default(),
    )?;

    let rows = rs.fetch_all();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], vec![Cell::Int64(1), Cell::Utf8("alpha".to_string())]);
    assert_eq!(rows[1], vec![Cell::Null, Cell::Null]);
    assert_eq!(rows[2], vec![Cell::Int64(3), Cell::Utf8("gamma".to_string())]);
    assert_eq!(rs.rownumber(), 3);
    Ok(())
}

#[test]
fn csv_result_types_columns_from_description() -> Result<()> {
    let dir = tempfile::tempdir().context("tempdir")?;
    let path = dir.path().join("q-test.csv");
    fs::write(
        &path,
        "\"id\",\"ok\",\"score\",\"seen_at\",\"wake_up\",\"day\"\n\
         \"1\",\"true\",\"1.5\",\"2021-09-02 12:34:56.789\",\"11:30:05.000\",\"2021-09-02\"\n\
         \"2\",\"false\",\"\",\"2021-09-03 00:00:00.000\",\"23:59:59.000\",\"2021-09-03\"\n",
    )
    .context("write csv")?;

    let description = vec![
        ColumnDesc::new("id", LogicalType::BigInt),
        ColumnDesc::new("ok", LogicalType::Boolean),
        ColumnDesc::new("score", LogicalType::Double),
        ColumnDesc::new("seen_at", LogicalType::Timestamp),
        ColumnDesc::new("wake_up", LogicalType::Time),
        ColumnDesc::new("day", LogicalType::Date),
    ];
    let mut rs = build(
        path.to_str().context("utf8 path")?,
        description,
        ResultSetOptions::default(),
    )?;

    assert_eq!(
        rs.parse_dates(),
        vec!["seen_at", "wake_up", "day"],
        "date-flavored columns in declared order"
    );

    let rows = rs.fetch_all();
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0][0], Cell::Int64(1));
    assert_eq!(rows[0][1], Cell::Boolean(true));
    assert_eq!(rows[0][2], Cell::Float64(1.5));
    let expected_ts = NaiveDate::from_ymd_opt(2021, 9, 2)
        .context("valid date")?
        .and_hms_milli_opt(12, 34, 56, 789)
        .context("valid datetime")?;
    assert_eq!(rows[0][3], Cell::Timestamp(expected_ts));
    let expected_time = NaiveTime::from_hms_opt(11, 30, 5).context("valid time")?;
    assert_eq!(rows[0][4], Cell::Time(expected_time));

    // Empty string is a null marker by default.
    assert_eq!(rows[1][2], Cell::Null);
    Ok(())
}

#[test]
fn fetch_many_drain_matches_fetch_all_order() -> Result<()> {
    let dir = tempfile::tempdir().context("tempdir")?;
    let path = dir.path().join("q-test.txt");
    let mut content = String::new();
    for i in 0..7 {
        content.push_str(&format!("{i}\trow-{i}\n"));
    }
    fs::write(&path, &content).context("write tsv")?;

    let description = vec![
        ColumnDesc::new("id", LogicalType::BigInt),
        ColumnDesc::new("name", LogicalType::Varchar),
    ];
    let location = path.to_str().context("utf8 path")?;

    let mut chunked = build(location, description.clone(), ResultSetOptions::default())?;
    let mut collected = Vec::new();
    loop {
        let rows = chunked.fetch_many(Some(3));
        if rows.is_empty() {
            break;
        }
        collected.extend(rows);
    }

    let mut fresh = build(location, description, ResultSetOptions::default())?;
    assert_eq!(collected, fresh.fetch_all());
    Ok(())
}

#[test]
fn fetch_many_defaults_to_arraysize() -> Result<()> {
    let dir = tempfile::tempdir().context("tempdir")?;
    let path = dir.path().join("q-test.txt");
    fs::write(&path, "1\n2\n3\n4\n5\n").context("write tsv")?;

    let description = vec![ColumnDesc::new("id", LogicalType::BigInt)];
    let mut rs = build(
        path.to_str().context("utf8 path")?,
        description,
        ResultSetOptions::default().with_arraysize(2),
    )?;
    assert_eq!(rs.fetch_many(None).len(), 2);
    assert_eq!(rs.fetch_many(Some(0)).len(), 2);
    assert_eq!(rs.fetch_many(Some(10)).len(), 1);
    Ok(())
}

#[test]
fn bulk_access_is_independent_of_cursor_position() -> Result<()> {
    let dir = tempfile::tempdir().context("tempdir")?;
    let path = dir.path().join("q-test.txt");
    fs::write(&path, "1\n2\n3\n").context("write tsv")?;

    let description = vec![ColumnDesc::new("id", LogicalType::BigInt)];
    let mut rs = build(
        path.to_str().context("utf8 path")?,
        description,
        ResultSetOptions::default(),
    )?;

    assert!(rs.fetch_one().is_some());
    assert_eq!(rs.as_table().num_rows(), 3);
    assert_eq!(rs.fetch_all().len(), 2);
    assert_eq!(rs.as_table().num_rows(), 3);
    Ok(())
}

#[test]
fn rownumber_tracks_successful_fetches_only() -> Result<()> {
    let dir = tempfile::tempdir().context("tempdir")?;
    let path = dir.path().join("q-test.txt");
    fs::write(&path, "1\n2\n").context("write tsv")?;

    let description = vec![ColumnDesc::new("id", LogicalType::BigInt)];
    let mut rs = build(
        path.to_str().context("utf8 path")?,
        description,
        ResultSetOptions::default(),
    )?;

    assert_eq!(rs.rownumber(), 0);
    rs.fetch_one();
    assert_eq!(rs.rownumber(), 1);
    rs.fetch_one();
    assert_eq!(rs.rownumber(), 2);
    assert_eq!(rs.fetch_one(), None);
    assert_eq!(rs.rownumber(), 2, "exhaustion must not advance rownumber");
    Ok(())
}

#[test]
fn close_releases_table_and_cursor() -> Result<()> {
    let dir = tempfile::tempdir().context("tempdir")?;
    let path = dir.path().join("q-test.txt");
    fs::write(&path, "1\n2\n3\n").context("write tsv")?;

    let description = vec![ColumnDesc::new("id", LogicalType::BigInt)];
    let mut rs = build(
        path.to_str().context("utf8 path")?,
        description,
        ResultSetOptions::default(),
    )?;

    assert!(rs.fetch_one().is_some());
    rs.close();
    assert_eq!(rs.fetch_one(), None);
    assert!(rs.fetch_many(Some(5)).is_empty());
    assert!(rs.fetch_all().is_empty());
    assert_eq!(rs.as_table().num_rows(), 0);
    Ok(())
}

#[test]
fn non_text_suffix_materializes_empty_table() -> Result<()> {
    let dir = tempfile::tempdir().context("tempdir")?;
    let path = dir.path().join("q-test");
    fs::write(&path, "not a result file").context("write file")?;

    let description = vec![ColumnDesc::new("id", LogicalType::BigInt)];
    let mut rs = build(
        path.to_str().context("utf8 path")?,
        description,
        ResultSetOptions::default(),
    )?;
    assert_eq!(rs.as_table().num_rows(), 0);
    assert_eq!(rs.fetch_one(), None);
    Ok(())
}

#[test]
fn missing_result_file_fails_construction() -> Result<()> {
    let dir = tempfile::tempdir().context("tempdir")?;
    let path = dir.path().join("q-missing.csv");

    let description = vec![ColumnDesc::new("id", LogicalType::BigInt)];
    let err = build(
        path.to_str().context("utf8 path")?,
        description,
        ResultSetOptions::default(),
    )
    .err()
    .context("construction must fail for a missing file")?;
    assert!(matches!(err, QuarryError::Read { .. }));
    Ok(())
}

#[test]
fn result_set_iterates_rows() -> Result<()> {
    let dir = tempfile::tempdir().context("tempdir")?;
    let path = dir.path().join("q-test.txt");
    fs::write(&path, "1\n2\n3\n").context("write tsv")?;

    let description = vec![ColumnDesc::new("id", LogicalType::BigInt)];
    let rs = build(
        path.to_str().context("utf8 path")?,
        description,
        ResultSetOptions::default(),
    )?;
    let ids: Vec<Vec<Cell>> = rs.collect();
    assert_eq!(
        ids,
        vec![
            vec![Cell::Int64(1)],
            vec![Cell::Int64(2)],
            vec![Cell::Int64(3)],
        ]
    );
    Ok(())
}
