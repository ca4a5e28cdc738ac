//! Mock API implementation directly using the `allot-rocket` crate

use std::sync::Arc;

use allot_core::{Allocation, Config, RawRequest, Request, RequestHandler, RequestKind};
use allot_rocket::{Coordinator, RepairJob};
use crossbeam::channel::Receiver;
use tokio::sync::oneshot;
use tokio::task::{self, JoinHandle};
use uuid::Uuid;

use super::{Api, RequestMsg, Response};

pub struct MockBalancer {
    balancer: Arc<allot_rocket::Balancer>,
    join_handles: Vec<JoinHandle<()>>,
}

struct MockRawRequest {
    payload: Option<u32>,
    kind: RequestKind,
    response_channel: oneshot::Sender<Response>,
}

pub async fn start(
    threads: u16,
    config: Config,
    coordinator: Arc<Coordinator>,
    repairs: Receiver<RepairJob>,
) -> (MockBalancer, Api) {
    let balancer = Arc::new(
        task::spawn_blocking(move || allot_rocket::launch_with(&config, coordinator, repairs))
            .await
            .unwrap(),
    );

    let it = (0..threads).map(|_| {
        let (sender, receiver) = flume::bounded::<RequestMsg>(65536);
        let balancer = balancer.clone();
        let handle = task::spawn_blocking(move || {
            let balancer = &*balancer;
            for msg in receiver.into_iter() {
                tracing::debug!(kind = ?msg.kind, "mock request");
                let raw = Box::new(MockRawRequest {
                    payload: msg.payload,
                    kind: msg.kind,
                    response_channel: msg.response_channel,
                });
                balancer.handle(Request::from_raw(msg.kind, raw))
            }
        });
        (sender, handle)
    });
    let (senders, join_handles) = it.unzip();

    let mock_balancer = MockBalancer {
        balancer,
        join_handles,
    };
    (mock_balancer, Api::new(senders))
}

impl MockBalancer {
    pub async fn shutdown(self) {
        for handle in self.join_handles {
            handle.await.unwrap()
        }
        task::spawn_blocking(move || Arc::into_inner(self.balancer).unwrap().shutdown())
            .await
            .unwrap();
    }
}

impl RawRequest for MockRawRequest {
    fn url(&self) -> &str {
        use RequestKind::*;
        match self.kind {
            Allocate => "/api/parking-allotted",
            Reconcile => "/api/admin/reconcile",
            Debug => "/api/debug",
        }
    }

    fn method(&self) -> allot_core::RequestMethod {
        use allot_core::RequestMethod::*;
        use RequestKind::*;
        match self.kind {
            Debug => Get,
            Allocate | Reconcile => Post,
        }
    }

    fn read_bytes(&mut self) -> std::io::Result<Vec<u8>> {
        Ok(match self.payload.take() {
            None => Vec::new(),
            Some(i) => i.to_string().into_bytes(),
        })
    }
    fn read_string(&mut self) -> std::io::Result<String> {
        Ok(match self.payload.take() {
            None => String::new(),
            Some(i) => i.to_string(),
        })
    }
    fn read_u32(&mut self) -> Option<u32> {
        self.payload.take()
    }

    fn respond_with_err(self: Box<Self>, msg: String, request_id: Uuid) {
        let response = Response::Error { msg, request_id };
        self.response_channel.send(response).unwrap()
    }

    fn respond_with_allocations(
        self: Box<Self>,
        msg: String,
        allocations: &[Allocation],
        request_id: Uuid,
    ) {
        let response = Response::Allocations {
            msg,
            allocations: allocations.to_vec(),
            request_id,
        };
        self.response_channel.send(response).unwrap()
    }

    fn respond_with_int(self: Box<Self>, i: u32, request_id: Uuid) {
        let response = Response::Int { i, request_id };
        self.response_channel.send(response).unwrap()
    }

    fn respond_with_string(self: Box<Self>, s: String, request_id: Uuid) {
        let response = Response::String { s, request_id };
        self.response_channel.send(response).unwrap()
    }
}
