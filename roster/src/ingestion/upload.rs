use metrics::counter;
use roster_config::shared::IngestionConfig;
use serde::Deserialize;
use std::io::Read;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::io::SyncIoBridge;
use tracing::{debug, info};

use crate::error::{ErrorKind, RosterError, RosterResult};
use crate::ingestion::CommandProducer;
use crate::metrics::ROSTER_INGESTION_ROWS_TOTAL;
use crate::roster_error;
use crate::types::StaffFields;

/// One data row of an upload, keyed by the header.
///
/// Columns missing from the header deserialize as absent.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    position: Option<String>,
    #[serde(default)]
    salary: Option<String>,
    #[serde(default)]
    age: Option<String>,
}

/// Numeric columns that fail to parse become absent rather than failing the upload.
impl From<CsvRow> for StaffFields {
    fn from(row: CsvRow) -> Self {
        StaffFields {
            name: row.name.filter(|name| !name.is_empty()),
            position: row.position.filter(|position| !position.is_empty()),
            salary: row
                .salary
                .and_then(|salary| salary.parse::<f64>().ok())
                .filter(|salary| salary.is_finite()),
            age: row.age.and_then(|age| age.parse::<i32>().ok()),
        }
    }
}

/// Totals of a completed ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionReport {
    pub total_queued: usize,
    /// Size of each flushed batch, in flush order.
    pub batches: Vec<usize>,
}

/// Streams a CSV upload into insert commands.
///
/// A blocking reader task parses rows and hands them over a channel holding at most
/// `row_buffer` rows. The accumulator gathers `batch_size` rows and flushes them to the queue
/// before it takes the next row, so the reader stalls while a flush is in flight.
#[derive(Debug, Clone)]
pub struct CsvIngestion {
    producer: CommandProducer,
    batch_size: usize,
    row_buffer: usize,
}

impl CsvIngestion {
    pub fn new(producer: CommandProducer, config: &IngestionConfig) -> Self {
        Self {
            producer,
            batch_size: config.batch_size.max(1),
            row_buffer: config.row_buffer.max(1),
        }
    }

    /// Ingests every row of `source` and returns the totals once the stream ends.
    ///
    /// A malformed row fails with [`ErrorKind::CsvParseFailed`] and a failing source with
    /// [`ErrorKind::UploadFailed`]. Either way the pending partial batch is dropped while
    /// batches flushed earlier stay queued.
    pub async fn ingest<R>(&self, source: R) -> RosterResult<IngestionReport>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let (rows_tx, mut rows_rx) = mpsc::channel(self.row_buffer);
        let bridge = SyncIoBridge::new(source);
        let reader = tokio::task::spawn_blocking(move || read_rows(bridge, rows_tx));

        let mut report = IngestionReport::default();
        let mut batch = Vec::with_capacity(self.batch_size);

        while let Some(row) = rows_rx.recv().await {
            batch.push(row?);

            if batch.len() >= self.batch_size {
                self.flush(&mut batch, &mut report).await?;
            }
        }

        reader.await.map_err(|err| {
            roster_error!(
                ErrorKind::IngestionReaderPanic,
                "CSV reader task failed",
                err
            )
        })?;

        if !batch.is_empty() {
            self.flush(&mut batch, &mut report).await?;
        }

        info!(
            total_queued = report.total_queued,
            batches = report.batches.len(),
            "csv ingestion completed"
        );

        Ok(report)
    }

    async fn flush(
        &self,
        batch: &mut Vec<StaffFields>,
        report: &mut IngestionReport,
    ) -> RosterResult<()> {
        let rows = std::mem::replace(batch, Vec::with_capacity(self.batch_size));
        let queued = self.producer.enqueue_inserts(rows).await?;

        report.total_queued += queued;
        report.batches.push(queued);
        counter!(ROSTER_INGESTION_ROWS_TOTAL).increment(queued as u64);
        debug!(queued, total_queued = report.total_queued, "batch flushed");

        Ok(())
    }
}

/// Parses `source` row by row until it ends, a row fails, or the accumulator goes away.
fn read_rows<R: Read>(source: R, rows_tx: mpsc::Sender<RosterResult<StaffFields>>) {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source);

    for row in reader.deserialize::<CsvRow>() {
        let row = row.map(StaffFields::from).map_err(RosterError::from);
        let failed = row.is_err();

        if rows_tx.blocking_send(row).is_err() || failed {
            break;
        }
    }
}
