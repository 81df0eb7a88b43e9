//! Conversion between [`StructuredTable`] and Arrow record batches

use crate::error::WriteError;
use crate::table::{Column, ColumnData, StructuredTable};
use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// Build a record batch with one nullable field per column
///
/// A table without columns cannot be represented and is rejected.
pub fn to_record_batch(table: &StructuredTable) -> Result<RecordBatch, WriteError> {
    if table.num_columns() == 0 {
        return Err(WriteError::SerializationFailure(
            "table has no columns".to_string(),
        ));
    }

    let mut fields = Vec::with_capacity(table.num_columns());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.num_columns());

    for column in table.columns() {
        let array: ArrayRef = match &column.data {
            ColumnData::Int64(v) => Arc::new(Int64Array::from(v.clone())),
            ColumnData::Float64(v) => Arc::new(Float64Array::from(v.clone())),
            ColumnData::Boolean(v) => Arc::new(BooleanArray::from(v.clone())),
            ColumnData::Utf8(v) => Arc::new(v.iter().map(|s| s.as_deref()).collect::<StringArray>()),
        };
        fields.push(Field::new(&column.name, array.data_type().clone(), true));
        arrays.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    Ok(RecordBatch::try_new(schema, arrays)?)
}

/// Rebuild a table from record batches sharing one schema
///
/// Integer and float columns of other widths are widened; any other type is
/// read back as text.
pub fn from_record_batches(batches: &[RecordBatch], schema: &Schema) -> Result<StructuredTable, WriteError> {
    let mut columns = Vec::with_capacity(schema.fields().len());

    for (index, field) in schema.fields().iter().enumerate() {
        let mut data = empty_like(field.data_type());
        for batch in batches {
            append_array(&mut data, batch.column(index))?;
        }
        columns.push(Column::new(field.name().clone(), data));
    }

    StructuredTable::new(columns).map_err(|e| WriteError::SerializationFailure(e.to_string()))
}

fn empty_like(data_type: &DataType) -> ColumnData {
    match data_type {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => ColumnData::Int64(Vec::new()),
        DataType::Float16 | DataType::Float32 | DataType::Float64 => ColumnData::Float64(Vec::new()),
        DataType::Boolean => ColumnData::Boolean(Vec::new()),
        _ => ColumnData::Utf8(Vec::new()),
    }
}

fn append_array(data: &mut ColumnData, array: &ArrayRef) -> Result<(), WriteError> {
    match data {
        ColumnData::Int64(out) => {
            let cast = arrow::compute::cast(array, &DataType::Int64)?;
            out.extend(cast.as_primitive::<Int64Type>().iter());
        }
        ColumnData::Float64(out) => {
            let cast = arrow::compute::cast(array, &DataType::Float64)?;
            out.extend(cast.as_primitive::<Float64Type>().iter());
        }
        ColumnData::Boolean(out) => {
            out.extend(array.as_boolean().iter());
        }
        ColumnData::Utf8(out) => {
            let cast = arrow::compute::cast(array, &DataType::Utf8)?;
            out.extend(cast.as_string::<i32>().iter().map(|s| s.map(str::to_string)));
        }
    }
    Ok(())
}
