//! gRPC service implementation for to-do items.
//!
//! This module defines [`ToDoHandler`], the concrete implementation of the
//! [`ToDoService`] gRPC service defined in the protobuf specification. Every
//! RPC follows the same shape:
//!
//! 1. Validate the request locally (`InvalidArgument` on failure). Nothing
//!    reaches storage when validation fails.
//! 2. Issue exactly one call against the [`ToDoStore`].
//! 3. Map the outcome: a missing row or zero affected rows becomes
//!    `NotFound`, any storage failure becomes `Internal` with the driver text
//!    appended.
//!
//! No retries are attempted and no state is kept between calls. Deadlines are
//! enforced by the transport, which drops the in-flight future (and the
//! storage call with it) when the caller's `grpc-timeout` expires.

use crate::server::{
    storage::{StoreError, ToDoStore},
    telemetry::{increment_errors, increment_requests, record_request_duration},
};
use std::{sync::Arc, time::Instant};
use todo_tonic_core::{
    Error, Result,
    proto::{
        CreateToDoRequest, CreateToDoResponse, DeleteToDoRequest, DeleteToDoResponse,
        ReadAllRequest, ReadAllResponse, ReadToDoRequest, ReadToDoResponse, ToDo,
        UpdateToDoRequest, UpdateToDoResponse, to_do_service_server::ToDoService,
    },
    types::{ToDoDraft, ToDoRecord, require_id},
};
use tonic::{Request, Response, Status};

/// Stateless request handler for the `ToDoService` RPCs.
///
/// Cloning is cheap: all clones share the same [`ToDoStore`].
#[derive(Clone)]
pub struct ToDoHandler {
    store: Arc<dyn ToDoStore>,
}

impl ToDoHandler {
    pub fn new(store: Arc<dyn ToDoStore>) -> Self {
        Self { store }
    }

    /// Releases the store's pooled connections. Call once the server has
    /// stopped accepting requests.
    pub async fn shutdown(&self) {
        self.store.close().await;
    }

    pub async fn create_item(&self, req: CreateToDoRequest) -> Result<CreateToDoResponse> {
        // proto3 leaves an unset message as `None`; treat it as an empty item
        // so it fails title validation.
        let draft = ToDoDraft::try_from(req.to_do.unwrap_or_default())?;

        let id = self.store.insert(&draft).await.map_err(|err| match err {
            StoreError::MissingId => Error::GeneratedId(err.to_string()),
            err => Error::Insert(err.to_string()),
        })?;

        Ok(CreateToDoResponse { id })
    }

    pub async fn read_item(&self, req: ReadToDoRequest) -> Result<ReadToDoResponse> {
        let id = require_id(req.id)?;

        let record = self
            .store
            .fetch(id)
            .await
            .map_err(|err| Error::Read(err.to_string()))?
            .ok_or(Error::NotFound)?;

        Ok(ReadToDoResponse {
            to_do: Some(record.into()),
        })
    }

    pub async fn read_all_items(&self, _req: ReadAllRequest) -> Result<ReadAllResponse> {
        let records = self.store.fetch_all().await.map_err(|err| match err {
            StoreError::Scan(_) => Error::Scan(err.to_string()),
            err => Error::ReadAll(err.to_string()),
        })?;

        Ok(ReadAllResponse {
            to_do: records.into_iter().map(ToDo::from).collect(),
        })
    }

    pub async fn update_item(&self, req: UpdateToDoRequest) -> Result<UpdateToDoResponse> {
        let record = ToDoRecord::try_from(req.to_do.unwrap_or_default())?;

        let affected = self
            .store
            .update(&record)
            .await
            .map_err(|err| Error::Update(err.to_string()))?;

        if affected == 0 {
            return Err(Error::NotFound);
        }
        Ok(UpdateToDoResponse { success: true })
    }

    pub async fn delete_item(&self, req: DeleteToDoRequest) -> Result<DeleteToDoResponse> {
        let id = require_id(req.id)?;

        let affected = self
            .store
            .delete(id)
            .await
            .map_err(|err| Error::Delete(err.to_string()))?;

        if affected == 0 {
            return Err(Error::NotFound);
        }
        Ok(DeleteToDoResponse { success: true })
    }
}

/// Awaits a handler future, records its telemetry and converts the outcome
/// into a tonic response.
async fn respond<T>(
    rpc: &'static str,
    fut: impl Future<Output = Result<T>>,
) -> core::result::Result<Response<T>, Status> {
    let start = Instant::now();
    increment_requests(rpc);

    let result = fut.await;
    record_request_duration(rpc, start.elapsed().as_secs_f64() * 1000.0);

    match result {
        Ok(message) => Ok(Response::new(message)),
        Err(err) => {
            let code = err.code();
            increment_errors(rpc, code);

            #[cfg(feature = "tracing")]
            if code == tonic::Code::Internal {
                tracing::error!(rpc, "{err}");
            } else {
                tracing::debug!(rpc, ?code, "{err}");
            }

            Err(err.into())
        }
    }
}

#[tonic::async_trait]
impl ToDoService for ToDoHandler {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn create(
        &self,
        req: Request<CreateToDoRequest>,
    ) -> core::result::Result<Response<CreateToDoResponse>, Status> {
        respond("Create", self.create_item(req.into_inner())).await
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(id = req.get_ref().id)))]
    async fn read(
        &self,
        req: Request<ReadToDoRequest>,
    ) -> core::result::Result<Response<ReadToDoResponse>, Status> {
        respond("Read", self.read_item(req.into_inner())).await
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn read_all(
        &self,
        req: Request<ReadAllRequest>,
    ) -> core::result::Result<Response<ReadAllResponse>, Status> {
        respond("ReadAll", self.read_all_items(req.into_inner())).await
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip_all, fields(id = req.get_ref().to_do.as_ref().map(|t| t.id)))
    )]
    async fn update(
        &self,
        req: Request<UpdateToDoRequest>,
    ) -> core::result::Result<Response<UpdateToDoResponse>, Status> {
        respond("Update", self.update_item(req.into_inner())).await
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(id = req.get_ref().id)))]
    async fn delete(
        &self,
        req: Request<DeleteToDoRequest>,
    ) -> core::result::Result<Response<DeleteToDoResponse>, Status> {
        respond("Delete", self.delete_item(req.into_inner())).await
    }
}
