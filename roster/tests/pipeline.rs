#![cfg(feature = "test-utils")]

use roster::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use roster::error::ErrorKind;
use roster::ingestion::{CommandProducer, CsvIngestion};
use roster::notification::NotificationService;
use roster::queue::CommandQueue;
use roster::queue::memory::MemoryCommandQueue;
use roster::store::notification::memory::MemoryNotificationStore;
use roster::store::staff::StaffStore;
use roster::store::staff::memory::MemoryStaffStore;
use roster::test_utils::io::{CountingReader, FailingReader, staff_csv};
use roster::test_utils::notify::wait_until;
use roster::test_utils::queue::RecordingQueue;
use roster::test_utils::staff_store::TestStaffStore;
use roster::types::{Command, NewStaff, StaffFields, StaffFilter};
use roster::workers::pool::MutationWorkerPool;
use roster_config::shared::{IngestionConfig, QueueConfig};
use roster_telemetry::tracing::init_test_tracing;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

fn ingestion(queue: &RecordingQueue, batch_size: usize) -> CsvIngestion {
    CsvIngestion::new(
        CommandProducer::new(Arc::new(queue.clone())),
        &IngestionConfig {
            batch_size,
            row_buffer: batch_size,
        },
    )
}

fn complete_fields(name: &str) -> StaffFields {
    StaffFields {
        name: Some(name.to_string()),
        age: Some(30),
        position: Some("Engineer".to_string()),
        salary: Some(1_000_000.0),
    }
}

async fn start_pool(
    store: Arc<dyn StaffStore>,
    queue: Arc<dyn CommandQueue>,
    concurrency: u16,
    max_retries: u32,
) -> (MutationWorkerPool, ShutdownTx) {
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let config = QueueConfig {
        concurrency,
        max_retries,
        poll_interval_ms: 10,
        ..QueueConfig::default()
    };

    let pool = MutationWorkerPool::start(&config, store, queue, shutdown_rx)
        .await
        .unwrap();

    (pool, shutdown_tx)
}

async fn stop_pool(pool: MutationWorkerPool, shutdown_tx: ShutdownTx) {
    shutdown_tx.shutdown();
    pool.wait_all().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn eleven_rows_flush_ten_then_one() {
    init_test_tracing();

    let queue = RecordingQueue::new();

    let report = ingestion(&queue, 10)
        .ingest(Cursor::new(staff_csv(11)))
        .await
        .unwrap();

    assert_eq!(report.total_queued, 11);
    assert_eq!(report.batches, vec![10, 1]);

    let enqueued = queue.enqueued().await;
    assert_eq!(enqueued.len(), 11);
    assert!(
        enqueued
            .iter()
            .all(|command| matches!(command, Command::Insert { .. }))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn header_only_upload_queues_nothing() {
    init_test_tracing();

    let queue = RecordingQueue::new();

    let report = ingestion(&queue, 10)
        .ingest(Cursor::new(staff_csv(0)))
        .await
        .unwrap();

    assert_eq!(report.total_queued, 0);
    assert!(report.batches.is_empty());
    assert_eq!(queue.attempts().await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn every_row_is_queued_whatever_the_batch_size() {
    init_test_tracing();

    for (rows, batch_size) in [(7, 3), (25, 10), (30, 1), (9, 50)] {
        let queue = RecordingQueue::new();

        let report = ingestion(&queue, batch_size)
            .ingest(Cursor::new(staff_csv(rows)))
            .await
            .unwrap();

        assert_eq!(report.total_queued, rows);
        assert_eq!(report.batches.len(), rows.div_ceil(batch_size));
        assert_eq!(queue.enqueued().await.len(), rows);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn ingested_rows_are_preserved_in_order() {
    init_test_tracing();

    let queue = RecordingQueue::new();
    let csv = "name,position,salary,age\n\
               Ada,Engineer,4000000,36\n\
               Grace,Admiral,not-a-number,45\n\
               Linus,Maintainer,3000000,\n";

    ingestion(&queue, 2)
        .ingest(Cursor::new(csv.to_string()))
        .await
        .unwrap();

    let enqueued = queue.enqueued().await;
    let fields: Vec<&StaffFields> = enqueued.iter().filter_map(Command::fields).collect();

    assert_eq!(fields.len(), 3);
    assert_eq!(fields[0], &{
        let mut ada = complete_fields("Ada");
        ada.age = Some(36);
        ada.salary = Some(4_000_000.0);
        ada
    });
    assert_eq!(fields[1].name.as_deref(), Some("Grace"));
    assert_eq!(fields[1].salary, None);
    assert_eq!(fields[2].name.as_deref(), Some("Linus"));
    assert_eq!(fields[2].age, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn workers_see_every_ingested_insert() {
    init_test_tracing();

    let store = MemoryStaffStore::new();
    let queue = RecordingQueue::new();
    let (pool, shutdown_tx) =
        start_pool(Arc::new(store.clone()), Arc::new(queue.clone()), 4, 0).await;

    let report = ingestion(&queue, 10)
        .ingest(Cursor::new(staff_csv(37)))
        .await
        .unwrap();
    wait_until(|| pool.stats().completed() >= 37).await;

    let stats = pool.stats();
    stop_pool(pool, shutdown_tx).await;

    assert_eq!(report.total_queued, 37);
    assert_eq!(stats.applied, 37);
    assert_eq!(stats.failed, 0);
    assert_eq!(store.count(&StaffFilter::default()).await.unwrap(), 37);
}

#[tokio::test(flavor = "multi_thread")]
async fn parse_error_aborts_and_drops_the_partial_batch() {
    init_test_tracing();

    let queue = RecordingQueue::new();
    let mut csv = staff_csv(12);
    csv.push_str("Broken,Row\n");
    csv.push_str(&staff_csv(5).replace("name,position,salary,age\n", ""));

    let err = ingestion(&queue, 10)
        .ingest(Cursor::new(csv))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CsvParseFailed);
    // The first batch was flushed before the bad row, the two rows after it were not.
    assert_eq!(queue.enqueued().await.len(), 10);
}

#[tokio::test(flavor = "multi_thread")]
async fn transport_error_is_reported_as_upload_failure() {
    init_test_tracing();

    let queue = RecordingQueue::new();

    let err = ingestion(&queue, 10)
        .ingest(FailingReader::new(staff_csv(3)))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UploadFailed);
    assert!(queue.enqueued().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn queue_rejection_propagates_to_the_caller() {
    init_test_tracing();

    let queue = RecordingQueue::new();
    queue.accept_only(5).await;

    let err = ingestion(&queue, 10)
        .ingest(Cursor::new(staff_csv(11)))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::QueueAcceptFailed);
    assert_eq!(queue.enqueued().await.len(), 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn reader_stalls_while_a_flush_is_blocked() {
    init_test_tracing();

    let queue = RecordingQueue::new();
    queue.pause();

    let csv = staff_csv(20_000);
    let total_bytes = csv.len();
    let reader = CountingReader::new(csv);
    let consumed = reader.consumed();

    let first_flush = queue.notify_on_attempts(1).await;
    let ingestion = ingestion(&queue, 10);
    let task = tokio::spawn(async move { ingestion.ingest(reader).await });

    first_flush.notified().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let consumed_while_paused = consumed.load(Ordering::SeqCst);
    assert!(
        consumed_while_paused < total_bytes / 4,
        "reader consumed {consumed_while_paused} of {total_bytes} bytes while paused"
    );
    assert!(queue.enqueued().await.is_empty());

    queue.resume();
    let report = task.await.unwrap().unwrap();

    assert_eq!(report.total_queued, 20_000);
    assert_eq!(consumed.load(Ordering::SeqCst), total_bytes);
}

#[tokio::test(flavor = "multi_thread")]
async fn update_through_the_pool_is_a_sparse_patch() {
    init_test_tracing();

    let store = MemoryStaffStore::new();
    let queue = MemoryCommandQueue::new();
    let record = store
        .create(NewStaff {
            name: "Ada".to_string(),
            age: 36,
            position: "Engineer".to_string(),
            salary: 4_000_000.0,
        })
        .await
        .unwrap();
    let (pool, shutdown_tx) =
        start_pool(Arc::new(store.clone()), Arc::new(queue.clone()), 2, 0).await;

    CommandProducer::new(Arc::new(queue))
        .enqueue_updates(vec![(
            record.id,
            StaffFields {
                salary: Some(5_000_000.0),
                ..StaffFields::default()
            },
        )])
        .await
        .unwrap();
    wait_until(|| pool.stats().completed() >= 1).await;
    stop_pool(pool, shutdown_tx).await;

    let updated = store.get(record.id).await.unwrap();
    assert_eq!(updated.salary, 5_000_000.0);
    assert_eq!(updated.name, record.name);
    assert_eq!(updated.age, record.age);
    assert_eq!(updated.position, record.position);
    assert!(updated.updated_at >= record.updated_at);
}

#[tokio::test(flavor = "multi_thread")]
async fn deleting_a_missing_record_is_a_noop() {
    init_test_tracing();

    let store = MemoryStaffStore::new();
    let queue = MemoryCommandQueue::new();
    store
        .create(NewStaff {
            name: "Ada".to_string(),
            age: 36,
            position: "Engineer".to_string(),
            salary: 4_000_000.0,
        })
        .await
        .unwrap();
    let (pool, shutdown_tx) =
        start_pool(Arc::new(store.clone()), Arc::new(queue.clone()), 2, 0).await;

    CommandProducer::new(Arc::new(queue))
        .enqueue_deletes(vec![uuid::Uuid::now_v7()])
        .await
        .unwrap();
    wait_until(|| pool.stats().completed() >= 1).await;

    let stats = pool.stats();
    stop_pool(pool, shutdown_tx).await;

    assert_eq!(stats.noop, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(store.count(&StaffFilter::default()).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_commands_are_discarded_without_retries() {
    init_test_tracing();

    let store = TestStaffStore::wrap(MemoryStaffStore::new());
    store.fail_next(1).await;
    let queue = MemoryCommandQueue::new();
    let (pool, shutdown_tx) =
        start_pool(Arc::new(store.clone()), Arc::new(queue.clone()), 1, 0).await;
    let producer = CommandProducer::new(Arc::new(queue.clone()));

    producer
        .enqueue_inserts(vec![complete_fields("Dropped")])
        .await
        .unwrap();
    wait_until(|| pool.stats().completed() >= 1).await;
    producer
        .enqueue_inserts(vec![complete_fields("Kept")])
        .await
        .unwrap();
    wait_until(|| pool.stats().completed() >= 2).await;

    let stats = pool.stats();
    stop_pool(pool, shutdown_tx).await;

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.applied, 1);
    assert_eq!(stats.retried, 0);
    assert_eq!(queue.pending().await.unwrap(), 0);

    let records = store.wrapped().records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "Kept");
}

#[tokio::test(flavor = "multi_thread")]
async fn panicking_commands_are_discarded_and_the_worker_survives() {
    init_test_tracing();

    let store = TestStaffStore::wrap(MemoryStaffStore::new());
    store.panic_next(1).await;
    let queue = MemoryCommandQueue::new();
    let (pool, shutdown_tx) =
        start_pool(Arc::new(store.clone()), Arc::new(queue.clone()), 1, 3).await;
    let producer = CommandProducer::new(Arc::new(queue.clone()));

    producer
        .enqueue_inserts(vec![complete_fields("Crashes")])
        .await
        .unwrap();
    wait_until(|| pool.stats().completed() >= 1).await;
    producer
        .enqueue_inserts(vec![complete_fields("Survives")])
        .await
        .unwrap();
    wait_until(|| pool.stats().completed() >= 2).await;

    let stats = pool.stats();
    stop_pool(pool, shutdown_tx).await;

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.retried, 0);
    assert_eq!(stats.applied, 1);
    assert_eq!(queue.pending().await.unwrap(), 0);

    let records = store.wrapped().records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "Survives");
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_commands_are_retried_up_to_the_limit() {
    init_test_tracing();

    let store = TestStaffStore::wrap(MemoryStaffStore::new());
    store.fail_next(2).await;
    let third_write = store.notify_on_writes(3).await;
    let queue = MemoryCommandQueue::new();
    let (pool, shutdown_tx) =
        start_pool(Arc::new(store.clone()), Arc::new(queue.clone()), 1, 2).await;

    CommandProducer::new(Arc::new(queue.clone()))
        .enqueue_inserts(vec![complete_fields("Persistent")])
        .await
        .unwrap();
    third_write.notified().await;
    wait_until(|| pool.stats().completed() >= 1).await;

    let stats = pool.stats();
    stop_pool(pool, shutdown_tx).await;

    assert_eq!(stats.retried, 2);
    assert_eq!(stats.applied, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(store.writes().await, 3);
    assert_eq!(store.wrapped().records().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn mark_read_reports_changed_notifications() {
    init_test_tracing();

    let service = NotificationService::new(Arc::new(MemoryNotificationStore::new()), None);
    for index in 0..5 {
        service
            .create("Staff queued", &format!("{index} staff records queued"))
            .await
            .unwrap();
    }

    assert_eq!(service.mark_read(None).await.unwrap(), 5);
    assert_eq!(service.mark_read(None).await.unwrap(), 0);
}
