//! Parquet artifact writer
//!
//! Each table is encoded into a temporary file inside the output directory,
//! fsynced, then renamed over `{output_dir}/{resource_id}.parquet`. Readers
//! never observe a partially written artifact, and a failed write leaves no
//! file at the final path.

use crate::columnar::{from_record_batches, to_record_batch};
use crate::config::{Compression, OutputConfig};
use crate::error::WriteError;
use crate::table::StructuredTable;
use crate::types::ResourceId;
use async_trait::async_trait;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::{GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::path::{Path, PathBuf};

/// Persists a table as a columnar artifact
#[async_trait]
pub trait TableWriter: Send + Sync {
    /// Deterministic artifact location for a resource
    fn artifact_path(&self, resource: &ResourceId) -> PathBuf;

    /// Write the table and return the final artifact path
    ///
    /// # Errors
    ///
    /// - [`WriteError::SerializationFailure`] if the table cannot be encoded
    /// - [`WriteError::IoFailure`] for directory, temp file, fsync or rename failures
    async fn write(&self, table: StructuredTable, resource: &ResourceId) -> Result<PathBuf, WriteError>;
}

/// Writes `{output_dir}/{resource_id}.parquet` files
#[derive(Clone, Debug)]
pub struct ParquetWriter {
    output_dir: PathBuf,
    compression: Compression,
}

impl ParquetWriter {
    /// Create a writer for a directory (created on first write)
    pub fn new(output_dir: impl Into<PathBuf>, compression: Compression) -> Self {
        Self {
            output_dir: output_dir.into(),
            compression,
        }
    }

    /// Create a writer from the output section of the config
    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(config.output_dir.clone(), config.compression)
    }

    /// Output directory
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait]
impl TableWriter for ParquetWriter {
    fn artifact_path(&self, resource: &ResourceId) -> PathBuf {
        self.output_dir.join(format!("{}.parquet", resource))
    }

    async fn write(&self, table: StructuredTable, resource: &ResourceId) -> Result<PathBuf, WriteError> {
        // Idempotent; concurrent first use is fine
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let final_path = self.artifact_path(resource);
        let dir = self.output_dir.clone();
        let target = final_path.clone();
        let prefix = format!(".{}.", resource);
        let props = writer_properties(self.compression);
        let rows = table.num_rows();

        tokio::task::spawn_blocking(move || write_atomic(&table, &dir, &prefix, &target, props))
            .await
            .map_err(|e| {
                WriteError::IoFailure(std::io::Error::other(format!(
                    "parquet write task failed: {}",
                    e
                )))
            })??;

        tracing::debug!(
            resource = %resource,
            path = %final_path.display(),
            rows,
            "Wrote parquet artifact"
        );

        Ok(final_path)
    }
}

fn writer_properties(compression: Compression) -> WriterProperties {
    let codec = match compression {
        Compression::Uncompressed => parquet::basic::Compression::UNCOMPRESSED,
        Compression::Snappy => parquet::basic::Compression::SNAPPY,
        Compression::Zstd => parquet::basic::Compression::ZSTD(ZstdLevel::default()),
        Compression::Gzip => parquet::basic::Compression::GZIP(GzipLevel::default()),
    };
    WriterProperties::builder().set_compression(codec).build()
}

/// Encode into a temp file next to `target`, fsync, then rename over `target`
///
/// The temp file is removed on every error path when it is dropped.
fn write_atomic(
    table: &StructuredTable,
    dir: &Path,
    prefix: &str,
    target: &Path,
    props: WriterProperties,
) -> Result<(), WriteError> {
    let batch = to_record_batch(table)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".tmp")
        .tempfile_in(dir)?;

    let mut writer = ArrowWriter::try_new(tmp.as_file_mut(), batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| WriteError::IoFailure(e.error))?;
    Ok(())
}

/// Read a Parquet artifact back into a table
pub fn read_artifact(path: impl AsRef<Path>) -> Result<StructuredTable, WriteError> {
    let file = std::fs::File::open(path.as_ref())?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let batches = reader.collect::<Result<Vec<_>, arrow::error::ArrowError>>()?;
    from_record_batches(&batches, &schema)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, ColumnData};

    fn id(s: &str) -> ResourceId {
        ResourceId::new(s).unwrap()
    }

    fn ab_table() -> StructuredTable {
        StructuredTable::new(vec![
            Column::new("a", ColumnData::Int64(vec![Some(1), Some(2)])),
            Column::new(
                "b",
                ColumnData::Utf8(vec![Some("x".to_string()), Some("y".to_string())]),
            ),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("parquet_files");
        let writer = ParquetWriter::new(&out, Compression::Snappy);

        let path = writer.write(ab_table(), &id("r1")).await.unwrap();
        assert_eq!(path, out.join("r1.parquet"));

        let back = read_artifact(&path).unwrap();
        assert_eq!(back.column_names(), vec!["a", "b"]);
        assert_eq!(back.num_rows(), 2);
        assert_eq!(back, ab_table());
    }

    #[tokio::test]
    async fn test_every_codec_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        for codec in [
            Compression::Uncompressed,
            Compression::Snappy,
            Compression::Zstd,
            Compression::Gzip,
        ] {
            let writer = ParquetWriter::new(dir.path(), codec);
            let path = writer
                .write(ab_table(), &id(&format!("{:?}", codec).to_lowercase()))
                .await
                .unwrap();
            assert_eq!(read_artifact(&path).unwrap(), ab_table());
        }
    }

    #[tokio::test]
    async fn test_overwrite_replaces_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ParquetWriter::new(dir.path(), Compression::default());

        writer.write(ab_table(), &id("r1")).await.unwrap();

        let smaller = StructuredTable::new(vec![Column::new(
            "only",
            ColumnData::Boolean(vec![Some(true)]),
        )])
        .unwrap();
        let path = writer.write(smaller.clone(), &id("r1")).await.unwrap();

        assert_eq!(read_artifact(&path).unwrap(), smaller);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ParquetWriter::new(dir.path(), Compression::default());

        let empty = StructuredTable::new(Vec::new()).unwrap();
        let err = writer.write(empty, &id("r1")).await.unwrap_err();
        assert!(matches!(err, WriteError::SerializationFailure(_)));

        assert!(!writer.artifact_path(&id("r1")).exists());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(leftovers.is_empty(), "no temp files should remain");
    }

    #[tokio::test]
    async fn test_unusable_output_dir_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"file").unwrap();

        let writer = ParquetWriter::new(&blocker, Compression::default());
        let err = writer.write(ab_table(), &id("r1")).await.unwrap_err();
        assert!(matches!(err, WriteError::IoFailure(_)));
    }

    #[test]
    fn test_read_missing_artifact() {
        let err = read_artifact("/definitely/not/here.parquet").unwrap_err();
        assert!(matches!(err, WriteError::IoFailure(_)));
    }
}
