//! 🏗 HTTP request implementation

use std::io;
use std::io::{Read, Write};

use allot_core::{Allocation, RequestKind};
use tiny_http::{Header, Response};
use uuid::Uuid;

/// Length of any hyphenated UUID
const UUID_LEN: usize = b"a1a2a3a4-b1b2-c1c2-d1d2-d3d4d5d6d7d8".len();

struct HTTPRequest(tiny_http::Request);

impl allot_core::RawRequest for HTTPRequest {
    fn url(&self) -> &str {
        self.0.url()
    }

    fn method(&self) -> allot_core::RequestMethod {
        match self.0.method() {
            tiny_http::Method::Get => allot_core::RequestMethod::Get,
            tiny_http::Method::Post => allot_core::RequestMethod::Post,
            _ => unreachable!(),
        }
    }

    fn read_bytes(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.0.body_length().unwrap_or(0));
        self.0.as_reader().read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn read_string(&mut self) -> io::Result<String> {
        let mut s = String::with_capacity(self.0.body_length().unwrap_or(0));
        self.0.as_reader().read_to_string(&mut s)?;
        Ok(s)
    }

    fn read_u32(&mut self) -> Option<u32> {
        let mut s = String::with_capacity(self.0.body_length().unwrap_or(16));
        self.0.as_reader().read_to_string(&mut s).ok()?;
        s.trim().parse().ok()
    }

    fn respond_with_err(self: Box<Self>, err: String, id: Uuid) {
        self.respond(Response::from_string(err).with_status_code(500), id)
    }

    fn respond_with_allocations(self: Box<Self>, msg: String, allocations: &[Allocation], id: Uuid) {
        let mut body = Vec::<u8>::with_capacity(msg.len() + 1 + (UUID_LEN + 24) * allocations.len());
        writeln!(&mut body, "{msg}").unwrap();
        for allocation in allocations {
            writeln!(
                &mut body,
                "{}\t{}\t{}",
                allocation.spot, allocation.user, allocation.booking
            )
            .unwrap();
        }
        self.respond(Response::from_data(body).with_status_code(200), id)
    }

    fn respond_with_int(self: Box<Self>, int: u32, id: Uuid) {
        self.respond(
            Response::from_string(int.to_string()).with_status_code(200),
            id,
        )
    }

    fn respond_with_string(self: Box<Self>, s: String, id: Uuid) {
        self.respond(Response::from_string(s).with_status_code(200), id)
    }
}

impl HTTPRequest {
    /// Add HTTP headers (CORS, X-Request-Id) to `res` and send it
    fn respond<R: Read>(self, mut res: Response<R>, id: Uuid) {
        add_response_cors_headers(&mut res);

        let mut rid = Vec::<u8>::with_capacity(UUID_LEN);
        write!(&mut rid, "{}", id.hyphenated()).unwrap();
        res.add_header(tiny_http::Header::from_bytes(b"X-Request-Id", rid).unwrap());

        if let Err(err) = self.0.respond(res) {
            tracing::warn!(request = %id, %err, "HTTP response failed");
        }
    }
}

/// Parse the given HTTP request
///
/// If [`None`] is returned, the request was already answered with a
/// corresponding error message.
pub fn parse(rq: tiny_http::Request) -> Option<allot_core::Request> {
    use tiny_http::Method::*;

    let kind = match (rq.method(), rq.url()) {
        (Options, _) => {
            let res = Response::empty(204);
            respond_early(rq, res);
            return None;
        }
        (Post, "/api/parking-allotted") => RequestKind::Allocate,
        (Post, "/api/admin/reconcile") => RequestKind::Reconcile,
        (Get, url) | (Post, url) => {
            if url.starts_with("/api/debug") {
                RequestKind::Debug
            } else {
                let res = Response::from_string(
                    "🦀 could not find the service you are looking for!

Valid requests are:
  POST /api/parking-allotted
  POST /api/admin/reconcile
  GET  /api/debug(.*)
  POST /api/debug(.*)",
                )
                .with_status_code(404);
                respond_early(rq, res);
                return None;
            }
        }
        _ => {
            let res = Response::empty(405);
            respond_early(rq, res);
            return None;
        }
    };

    Some(allot_core::Request::from_raw(kind, Box::new(HTTPRequest(rq))))
}

/// Answer a request that never reaches the handler
fn respond_early<R: Read>(rq: tiny_http::Request, mut res: Response<R>) {
    add_response_cors_headers(&mut res);
    let url = rq.url().to_owned();
    if let Err(err) = rq.respond(res) {
        tracing::warn!(%url, %err, "HTTP response failed");
    }
}

/// Add CORS headers to `res`
fn add_response_cors_headers<R: Read>(res: &mut Response<R>) {
    res.add_header(Header::from_bytes(b"Access-Control-Request-Method", b"*").unwrap());
    res.add_header(Header::from_bytes(b"Access-Control-Allow-Origin", b"*").unwrap());
    res.add_header(Header::from_bytes(b"Access-Control-Allow-Headers", b"*").unwrap());
    res.add_header(Header::from_bytes(b"Access-Control-Expose-Headers", b"*").unwrap());
}
