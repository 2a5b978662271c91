use crate::server::{
    service::handler::ToDoHandler,
    storage::{
        StoreError, ToDoStore,
        sqlite::tests::{insert_undecodable, memory_store},
    },
};
use chrono::{DateTime, TimeZone, Utc};
use core::{fmt::Debug, time::Duration};
use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Instant,
};
use todo_tonic_core::{
    proto::{
        CreateToDoRequest, DeleteToDoRequest, ReadAllRequest, ReadToDoRequest, ToDo,
        UpdateToDoRequest,
        to_do_service_client::ToDoServiceClient,
        to_do_service_server::{ToDoService, ToDoServiceServer},
    },
    types::{ToDoDraft, ToDoRecord, reminder_to_wire},
};
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Code, Request, Response, Status, transport::Server};

const TEST_TITLE: &str = "Dummy title";
const TEST_DESCRIPTION: &str = "This is a test description";

/// What a [`ScriptedStore`] answers to whichever call it receives.
enum Outcome {
    Id(i64),
    Rows(Vec<ToDoRecord>),
    Affected(u64),
    Fail(fn() -> StoreError),
}

/// Store that replays a fixed [`Outcome`] and counts how often it was hit.
struct ScriptedStore {
    calls: AtomicUsize,
    outcome: Outcome,
}

impl ScriptedStore {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) -> &Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        &self.outcome
    }
}

#[tonic::async_trait]
impl ToDoStore for ScriptedStore {
    async fn insert(&self, _draft: &ToDoDraft) -> Result<i64, StoreError> {
        match self.hit() {
            Outcome::Id(id) => Ok(*id),
            Outcome::Fail(err) => Err(err()),
            _ => panic!("unexpected insert"),
        }
    }

    async fn fetch(&self, id: i64) -> Result<Option<ToDoRecord>, StoreError> {
        match self.hit() {
            Outcome::Rows(rows) => Ok(rows.iter().find(|r| r.id == id).cloned()),
            Outcome::Fail(err) => Err(err()),
            _ => panic!("unexpected fetch"),
        }
    }

    async fn fetch_all(&self) -> Result<Vec<ToDoRecord>, StoreError> {
        match self.hit() {
            Outcome::Rows(rows) => Ok(rows.clone()),
            Outcome::Fail(err) => Err(err()),
            _ => panic!("unexpected fetch_all"),
        }
    }

    async fn update(&self, _record: &ToDoRecord) -> Result<u64, StoreError> {
        match self.hit() {
            Outcome::Affected(n) => Ok(*n),
            Outcome::Fail(err) => Err(err()),
            _ => panic!("unexpected update"),
        }
    }

    async fn delete(&self, _id: i64) -> Result<u64, StoreError> {
        match self.hit() {
            Outcome::Affected(n) => Ok(*n),
            Outcome::Fail(err) => Err(err()),
            _ => panic!("unexpected delete"),
        }
    }
}

fn scripted(outcome: Outcome) -> (ToDoHandler, Arc<ScriptedStore>) {
    let store = Arc::new(ScriptedStore {
        calls: AtomicUsize::new(0),
        outcome,
    });
    (ToDoHandler::new(store.clone()), store)
}

fn connection_dropped() -> StoreError {
    StoreError::Database(sqlx::Error::Protocol("connection dropped".into()))
}

fn expect_status<T: Debug>(result: Result<Response<T>, Status>, code: Code) -> Status {
    let status = result.unwrap_err();
    assert_eq!(status.code(), code, "unexpected status: {status:?}");
    status
}

fn reminder(nanos: u32) -> DateTime<Utc> {
    Utc.timestamp_opt(1_714_555_800, nanos).single().unwrap()
}

fn record(id: i64, title: &str, description: &str, at: DateTime<Utc>) -> ToDoRecord {
    ToDoRecord {
        id,
        title: title.into(),
        description: description.into(),
        reminder: at,
    }
}

fn to_do(id: i64, title: &str) -> ToDo {
    ToDo {
        id,
        title: title.into(),
        description: TEST_DESCRIPTION.into(),
        reminder: Some(reminder_to_wire(&reminder(0))),
    }
}

fn create(title: &str) -> Request<CreateToDoRequest> {
    Request::new(CreateToDoRequest {
        to_do: Some(to_do(0, title)),
    })
}

fn update(id: i64, title: &str) -> Request<UpdateToDoRequest> {
    Request::new(UpdateToDoRequest {
        to_do: Some(to_do(id, title)),
    })
}

// === Create ===

#[tokio::test]
async fn create_returns_generated_id() {
    let (handler, store) = scripted(Outcome::Id(1));
    let res = handler.create(create(TEST_TITLE)).await.unwrap();
    assert_eq!(res.into_inner().id, 1);
    assert_eq!(store.calls(), 1);
}

#[tokio::test]
async fn create_with_empty_title_never_reaches_storage() {
    let (handler, store) = scripted(Outcome::Fail(connection_dropped));
    let status = expect_status(handler.create(create("")).await, Code::InvalidArgument);
    assert_eq!(status.message(), "title cannot be empty");
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn create_without_item_is_invalid() {
    let (handler, store) = scripted(Outcome::Id(1));
    let req = Request::new(CreateToDoRequest { to_do: None });
    let status = expect_status(handler.create(req).await, Code::InvalidArgument);
    assert_eq!(status.message(), "title cannot be empty");
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn create_with_out_of_range_reminder_is_invalid() {
    let (handler, store) = scripted(Outcome::Id(1));
    let mut item = to_do(0, TEST_TITLE);
    item.reminder = Some(prost_types::Timestamp {
        seconds: 0,
        nanos: 1_000_000_000,
    });
    let req = Request::new(CreateToDoRequest { to_do: Some(item) });
    let status = expect_status(handler.create(req).await, Code::InvalidArgument);
    assert_eq!(status.message(), "invalid reminder timestamp");
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn create_storage_failure_is_internal() {
    let (handler, _) = scripted(Outcome::Fail(connection_dropped));
    let status = expect_status(handler.create(create(TEST_TITLE)).await, Code::Internal);
    assert!(status.message().starts_with("failed to insert into todo: "));
    assert!(status.message().contains("connection dropped"));
}

#[tokio::test]
async fn create_without_generated_id_is_internal() {
    let (handler, _) = scripted(Outcome::Fail(|| StoreError::MissingId));
    let status = expect_status(handler.create(create(TEST_TITLE)).await, Code::Internal);
    assert!(
        status
            .message()
            .starts_with("failed to retrieve id for created todo: ")
    );
}

// === Read ===

#[tokio::test]
async fn read_returns_row_fields() {
    let at = reminder(987_654_321);
    let (handler, _) = scripted(Outcome::Rows(vec![record(
        1,
        TEST_TITLE,
        TEST_DESCRIPTION,
        at,
    )]));

    let res = handler
        .read(Request::new(ReadToDoRequest { id: 1 }))
        .await
        .unwrap();
    let item = res.into_inner().to_do.unwrap();
    assert_eq!(item.id, 1);
    assert_eq!(item.title, TEST_TITLE);
    assert_eq!(item.description, TEST_DESCRIPTION);
    assert_eq!(item.reminder, Some(reminder_to_wire(&at)));
}

#[tokio::test]
async fn read_missing_row_is_not_found() {
    let (handler, _) = scripted(Outcome::Rows(vec![]));
    let status = expect_status(
        handler.read(Request::new(ReadToDoRequest { id: 1 })).await,
        Code::NotFound,
    );
    assert_eq!(status.message(), "todo not found");
}

#[tokio::test]
async fn read_storage_failure_is_internal() {
    let (handler, _) = scripted(Outcome::Fail(connection_dropped));
    let status = expect_status(
        handler.read(Request::new(ReadToDoRequest { id: 1 })).await,
        Code::Internal,
    );
    assert!(status.message().starts_with("failed to retrieve todo: "));
    assert!(status.message().contains("connection dropped"));
}

#[tokio::test]
async fn read_scan_failure_is_internal() {
    let (handler, _) = scripted(Outcome::Fail(|| {
        StoreError::Scan(sqlx::Error::ColumnNotFound("reminder".into()))
    }));
    let status = expect_status(
        handler.read(Request::new(ReadToDoRequest { id: 1 })).await,
        Code::Internal,
    );
    assert!(status.message().starts_with("failed to retrieve todo: "));
    assert!(status.message().contains("reminder"));
}

#[tokio::test]
async fn read_of_undecodable_sqlite_row_is_internal() {
    let store = memory_store().await;
    let id = insert_undecodable(&store).await;
    let handler = ToDoHandler::new(Arc::new(store));

    let status = expect_status(
        handler.read(Request::new(ReadToDoRequest { id })).await,
        Code::Internal,
    );
    assert!(status.message().starts_with("failed to retrieve todo: "));
}

// === ReadAll ===

#[tokio::test]
async fn read_all_on_empty_table_is_empty() {
    let (handler, _) = scripted(Outcome::Rows(vec![]));
    let res = handler
        .read_all(Request::new(ReadAllRequest {}))
        .await
        .unwrap();
    assert!(res.into_inner().to_do.is_empty());
}

#[tokio::test]
async fn read_all_preserves_storage_order() {
    let (t1, t2) = (reminder(1), reminder(2));
    let (handler, _) = scripted(Outcome::Rows(vec![
        record(1, "Dummy Todo 1", "Description 1", t1),
        record(2, "Dummy Todo 2", "Description 2", t2),
    ]));

    let items = handler
        .read_all(Request::new(ReadAllRequest {}))
        .await
        .unwrap()
        .into_inner()
        .to_do;

    assert_eq!(
        items,
        vec![
            ToDo {
                id: 1,
                title: "Dummy Todo 1".into(),
                description: "Description 1".into(),
                reminder: Some(reminder_to_wire(&t1)),
            },
            ToDo {
                id: 2,
                title: "Dummy Todo 2".into(),
                description: "Description 2".into(),
                reminder: Some(reminder_to_wire(&t2)),
            },
        ]
    );
}

#[tokio::test]
async fn read_all_scan_failure_is_internal() {
    let (handler, _) = scripted(Outcome::Fail(|| {
        StoreError::Scan(sqlx::Error::ColumnNotFound("reminder".into()))
    }));
    let status = expect_status(
        handler.read_all(Request::new(ReadAllRequest {})).await,
        Code::Internal,
    );
    assert!(status.message().starts_with("failed to scan todo item: "));
    assert!(status.message().contains("reminder"));
}

#[tokio::test]
async fn read_all_query_failure_is_internal() {
    let (handler, _) = scripted(Outcome::Fail(connection_dropped));
    let status = expect_status(
        handler.read_all(Request::new(ReadAllRequest {})).await,
        Code::Internal,
    );
    assert!(status.message().starts_with("failed to retrieve todos: "));
    assert!(status.message().contains("connection dropped"));
}

// === Update ===

#[tokio::test]
async fn update_with_one_affected_row_succeeds() {
    let (handler, store) = scripted(Outcome::Affected(1));
    let res = handler.update(update(1, TEST_TITLE)).await.unwrap();
    assert!(res.into_inner().success);
    assert_eq!(store.calls(), 1);
}

#[tokio::test]
async fn update_with_no_affected_rows_is_not_found() {
    let (handler, _) = scripted(Outcome::Affected(0));
    let status = expect_status(
        handler.update(update(1, TEST_TITLE)).await,
        Code::NotFound,
    );
    assert_eq!(status.message(), "todo not found");
}

#[tokio::test]
async fn update_with_empty_title_never_reaches_storage() {
    let (handler, store) = scripted(Outcome::Affected(1));
    let status = expect_status(handler.update(update(1, "")).await, Code::InvalidArgument);
    assert_eq!(status.message(), "title cannot be empty");
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn update_storage_failure_is_internal() {
    let (handler, _) = scripted(Outcome::Fail(connection_dropped));
    let status = expect_status(handler.update(update(1, TEST_TITLE)).await, Code::Internal);
    assert!(status.message().starts_with("failed to update todo: "));
    assert!(status.message().contains("connection dropped"));
}

// === Delete ===

#[tokio::test]
async fn delete_with_one_affected_row_succeeds() {
    let (handler, store) = scripted(Outcome::Affected(1));
    let res = handler
        .delete(Request::new(DeleteToDoRequest { id: 1 }))
        .await
        .unwrap();
    assert!(res.into_inner().success);
    assert_eq!(store.calls(), 1);
}

#[tokio::test]
async fn delete_with_no_affected_rows_is_not_found() {
    let (handler, _) = scripted(Outcome::Affected(0));
    let status = expect_status(
        handler
            .delete(Request::new(DeleteToDoRequest { id: 1 }))
            .await,
        Code::NotFound,
    );
    assert_eq!(status.message(), "todo not found");
}

#[tokio::test]
async fn delete_storage_failure_is_internal() {
    let (handler, _) = scripted(Outcome::Fail(|| StoreError::Database(sqlx::Error::PoolClosed)));
    let status = expect_status(
        handler
            .delete(Request::new(DeleteToDoRequest { id: 1 }))
            .await,
        Code::Internal,
    );
    assert!(status.message().starts_with("failed to delete todo: "));
    assert!(
        status
            .message()
            .contains(&sqlx::Error::PoolClosed.to_string())
    );
}

// === Id validation ===

#[tokio::test]
async fn zero_id_is_rejected_before_storage() {
    let (handler, store) = scripted(Outcome::Fail(connection_dropped));

    let read = handler.read(Request::new(ReadToDoRequest { id: 0 })).await;
    let update = handler.update(update(0, TEST_TITLE)).await;
    let delete = handler
        .delete(Request::new(DeleteToDoRequest { id: 0 }))
        .await;

    for status in [
        expect_status(read, Code::InvalidArgument),
        expect_status(update, Code::InvalidArgument),
        expect_status(delete, Code::InvalidArgument),
    ] {
        assert_eq!(status.message(), "todo id is required");
    }
    assert_eq!(store.calls(), 0);
}

// === Against SQLite ===

#[tokio::test]
async fn full_lifecycle_against_sqlite() {
    let handler = ToDoHandler::new(Arc::new(memory_store().await));
    let at = reminder(123_456_789);

    let mut item = to_do(0, TEST_TITLE);
    item.reminder = Some(reminder_to_wire(&at));
    let id = handler
        .create(Request::new(CreateToDoRequest {
            to_do: Some(item.clone()),
        }))
        .await
        .unwrap()
        .into_inner()
        .id;
    assert_eq!(id, 1);

    let read = handler
        .read(Request::new(ReadToDoRequest { id }))
        .await
        .unwrap()
        .into_inner()
        .to_do
        .unwrap();
    assert_eq!(read, ToDo { id, ..item });

    assert!(
        handler
            .update(update(id, "Renamed"))
            .await
            .unwrap()
            .into_inner()
            .success
    );

    let all = handler
        .read_all(Request::new(ReadAllRequest {}))
        .await
        .unwrap()
        .into_inner()
        .to_do;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].title, "Renamed");

    expect_status(handler.update(update(id + 1, "Nope")).await, Code::NotFound);

    assert!(
        handler
            .delete(Request::new(DeleteToDoRequest { id }))
            .await
            .unwrap()
            .into_inner()
            .success
    );
    expect_status(
        handler.read(Request::new(ReadToDoRequest { id })).await,
        Code::NotFound,
    );
    expect_status(
        handler
            .delete(Request::new(DeleteToDoRequest { id }))
            .await,
        Code::NotFound,
    );
}

#[tokio::test]
async fn closed_store_surfaces_internal() {
    let handler = ToDoHandler::new(Arc::new(memory_store().await));
    handler.shutdown().await;

    let status = expect_status(handler.create(create(TEST_TITLE)).await, Code::Internal);
    assert!(status.message().starts_with("failed to insert into todo: "));
}

// === Deadlines ===

const STALL: Duration = Duration::from_secs(10);

/// Sets its flag when the future holding it is dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Store whose lookups take far longer than any test deadline.
struct StalledStore {
    released: Arc<AtomicBool>,
}

#[tonic::async_trait]
impl ToDoStore for StalledStore {
    async fn insert(&self, _draft: &ToDoDraft) -> Result<i64, StoreError> {
        unreachable!("insert")
    }

    async fn fetch(&self, _id: i64) -> Result<Option<ToDoRecord>, StoreError> {
        let _flag = DropFlag(self.released.clone());
        tokio::time::sleep(STALL).await;
        Ok(None)
    }

    async fn fetch_all(&self) -> Result<Vec<ToDoRecord>, StoreError> {
        unreachable!("fetch_all")
    }

    async fn update(&self, _record: &ToDoRecord) -> Result<u64, StoreError> {
        unreachable!("update")
    }

    async fn delete(&self, _id: i64) -> Result<u64, StoreError> {
        unreachable!("delete")
    }
}

/// Serves a handler over [`StalledStore`] on an ephemeral local port.
async fn serve_stalled(timeout: Option<Duration>) -> (SocketAddr, Arc<AtomicBool>, JoinHandle<()>) {
    let released = Arc::new(AtomicBool::new(false));
    let handler = ToDoHandler::new(Arc::new(StalledStore {
        released: released.clone(),
    }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut builder = Server::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    let router = builder.add_service(ToDoServiceServer::new(handler));
    let server = tokio::spawn(async move {
        router
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    (addr, released, server)
}

async fn assert_read_is_cut_short(
    addr: SocketAddr,
    released: &AtomicBool,
    req: Request<ReadToDoRequest>,
) {
    let mut client = ToDoServiceClient::connect(format!("http://{addr}"))
        .await
        .unwrap();

    let started = Instant::now();
    let status = client.read(req).await.unwrap_err();
    assert!(
        matches!(status.code(), Code::Cancelled | Code::DeadlineExceeded),
        "unexpected status: {status:?}"
    );
    assert!(started.elapsed() < STALL / 2);

    // The storage future is dropped once the deadline fires.
    let waited = Instant::now();
    while !released.load(Ordering::SeqCst) {
        assert!(
            waited.elapsed() < Duration::from_secs(2),
            "storage call still running"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn caller_deadline_cancels_storage_call() {
    let (addr, released, server) = serve_stalled(None).await;

    let mut req = Request::new(ReadToDoRequest { id: 1 });
    req.set_timeout(Duration::from_millis(100));
    assert_read_is_cut_short(addr, &released, req).await;

    server.abort();
}

#[tokio::test]
async fn server_timeout_cancels_storage_call() {
    let (addr, released, server) = serve_stalled(Some(Duration::from_millis(100))).await;

    assert_read_is_cut_short(addr, &released, Request::new(ReadToDoRequest { id: 1 })).await;

    server.abort();
}
