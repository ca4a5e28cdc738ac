use std::sync::Arc;

use allot_core::{Allocation, RequestKind};
use eyre::Result;
use flume::Sender;
use thiserror::Error;
use tokio::sync::oneshot;
use uuid::Uuid;

pub mod mock;

#[derive(Debug, Error)]
#[error("Error 500: {0}")]
pub struct ApiError(pub String);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum Response {
    Error {
        msg: String,
        request_id: Uuid,
    },
    Allocations {
        msg: String,
        allocations: Vec<Allocation>,
        request_id: Uuid,
    },
    Int {
        i: u32,
        request_id: Uuid,
    },
    String {
        s: String,
        request_id: Uuid,
    },
}

impl Response {
    fn request_id(&self) -> Uuid {
        match self {
            Response::Error { request_id, .. }
            | Response::Allocations { request_id, .. }
            | Response::Int { request_id, .. }
            | Response::String { request_id, .. } => *request_id,
        }
    }
}

struct RequestMsg {
    kind: RequestKind,
    payload: Option<u32>,
    response_channel: oneshot::Sender<Response>,
}

/// Outcome of a successful allocation request
#[derive(Debug)]
pub struct Allocated {
    pub message: String,
    pub allocations: Vec<Allocation>,
}

pub struct ApiResponse<T> {
    pub request_id: Uuid,
    pub result: ApiResult<T>,
}

pub struct Api {
    /// One channel per balancer thread
    channels: Arc<Vec<Sender<RequestMsg>>>,

    my_channel: Sender<RequestMsg>,
    my_index: usize,
}

impl Api {
    fn new(channels: Vec<Sender<RequestMsg>>) -> Self {
        let my_channel = channels[0].clone();
        Self {
            channels: Arc::new(channels),
            my_channel,
            my_index: 0,
        }
    }
}

impl Clone for Api {
    fn clone(&self) -> Self {
        let my_index = (self.my_index + 1) % self.channels.len();
        Self {
            channels: self.channels.clone(),
            my_channel: self.channels[my_index].clone(),
            my_index,
        }
    }
}

impl Api {
    async fn make_request(&self, kind: RequestKind, payload: Option<u32>) -> Result<Response> {
        let (sender, receiver) = oneshot::channel();
        let msg = RequestMsg {
            kind,
            payload,
            response_channel: sender,
        };
        self.my_channel.send_async(msg).await?;
        Ok(receiver.await?)
    }

    /// Trigger an allocation run with the configured number of spots
    pub async fn allocate(&self) -> Result<ApiResponse<Allocated>> {
        self.allocate_inner(None).await
    }

    /// Trigger an allocation run handing out `capacity` spots
    pub async fn allocate_with_capacity(&self, capacity: u32) -> Result<ApiResponse<Allocated>> {
        self.allocate_inner(Some(capacity)).await
    }

    async fn allocate_inner(&self, capacity: Option<u32>) -> Result<ApiResponse<Allocated>> {
        let kind = RequestKind::Allocate;
        Ok(match self.make_request(kind, capacity).await? {
            Response::Allocations {
                msg,
                allocations,
                request_id,
            } => ApiResponse {
                request_id,
                result: Ok(Allocated {
                    message: msg,
                    allocations,
                }),
            },
            Response::Error { msg, request_id } => ApiResponse {
                request_id,
                result: Err(ApiError(msg)),
            },
            resp => panic!("{kind:?} must not be answered by {resp:?}"),
        })
    }

    /// Ask for an immediate reconciliation pass
    ///
    /// Yields the number of repair jobs still outstanding.
    pub async fn reconcile(&self) -> Result<ApiResponse<u32>> {
        let kind = RequestKind::Reconcile;
        Ok(match self.make_request(kind, None).await? {
            Response::Int { i, request_id } => ApiResponse {
                request_id,
                result: Ok(i),
            },
            Response::Error { msg, request_id } => ApiResponse {
                request_id,
                result: Err(ApiError(msg)),
            },
            resp => panic!("{kind:?} must not be answered by {resp:?}"),
        })
    }

    pub async fn debug(&self) -> Result<ApiResponse<String>> {
        let kind = RequestKind::Debug;
        let response = self.make_request(kind, None).await?;
        let request_id = response.request_id();
        Ok(match response {
            Response::String { s, .. } => ApiResponse {
                request_id,
                result: Ok(s),
            },
            resp => panic!("{kind:?} must not be answered by {resp:?}"),
        })
    }
}
