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
use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::datatypes::{Schema, SchemaRef};

use crate::exec::value::{Cell, cell_at};

/// The single in-memory result of a materialized query: an ordered, named
/// columnar table. Built exactly once per result set and never mutated
/// afterwards; `close` swaps it for an empty one.
#[derive(Clone, Debug)]
pub struct MaterializedTable {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
    num_rows: usize,
}

impl MaterializedTable {
    pub fn empty() -> Self {
        Self {
            schema: Arc::new(Schema::empty()),
            batches: Vec::new(),
            num_rows: 0,
        }
    }

    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        let num_rows = batches.iter().map(RecordBatch::num_rows).sum();
        Self {
            schema,
            batches,
            num_rows,
        }
    }

    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.schema.fields().len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }
}

/// Forward-only position over a table's rows. Batches are reference-counted,
/// so the cursor shares storage with the table it was built from.
#[derive(Clone, Debug)]
pub struct RowCursor {
    batches: Vec<RecordBatch>,
    batch_idx: usize,
    row_idx: usize,
}

impl RowCursor {
    pub fn empty() -> Self {
        Self {
            batches: Vec::new(),
            batch_idx: 0,
            row_idx: 0,
        }
    }

    pub fn over(table: &MaterializedTable) -> Self {
        Self {
            batches: table.batches().to_vec(),
            batch_idx: 0,
            row_idx: 0,
        }
    }

    /// The next row as cells in column order, or `None` once exhausted.
    pub fn next_row(&mut self) -> Option<Vec<Cell>> {
        loop {
            let batch = self.batches.get(self.batch_idx)?;
            if self.row_idx >= batch.num_rows() {
                self.batch_idx += 1;
                self.row_idx = 0;
                continue;
            }
            let row = batch
                .columns()
                .iter()
                .map(|col| cell_at(col.as_ref(), self.row_idx))
                .collect();
            self.row_idx += 1;
            return Some(row);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Int32Array, StringArray};
    use arrow::datatypes::{DataType, Field};

    fn two_batch_table() -> MaterializedTable {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int32, true),
            Field::new("name", DataType::Utf8, true),
        ]));
        let b1 = RecordBatch::try_new(
            Arc::clone(&schema),
            vec![
                Arc::new(Int32Array::from(vec![1, 2])) as ArrayRef,
                Arc::new(StringArray::from(vec!["a", "b"])) as ArrayRef,
            ],
        )
        .expect("first batch");
        let b2 = RecordBatch::try_new(
            Arc::clone(&schema),
            vec![
                Arc::new(Int32Array::from(vec![3])) as ArrayRef,
                Arc::new(StringArray::from(vec![Option::<&str>::None])) as ArrayRef,
            ],
        )
        .expect("second batch");
        MaterializedTable::new(schema, vec![b1, b2])
    }

    #[test]
    fn cursor_walks_batches_in_order() {
        let table = two_batch_table();
        assert_eq!(table.num_rows(), 3);

        let mut cursor = RowCursor::over(&table);
        assert_eq!(
            cursor.next_row(),
            Some(vec![Cell::Int32(1), Cell::Utf8("a".to_string())])
        );
        assert_eq!(
            cursor.next_row(),
            Some(vec![Cell::Int32(2), Cell::Utf8("b".to_string())])
        );
        assert_eq!(cursor.next_row(), Some(vec![Cell::Int32(3), Cell::Null]));
        assert_eq!(cursor.next_row(), None);
        assert_eq!(cursor.next_row(), None);
    }

    #[test]
    fn empty_cursor_yields_nothing() {
        let mut cursor = RowCursor::empty();
        assert_eq!(cursor.next_row(), None);
    }
}
