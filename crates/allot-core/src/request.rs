use std::io;

use uuid::Uuid;

use crate::model::Allocation;

/// Kind of the request
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(u8)]
pub enum RequestKind {
    /// Run one allocation over all pending bookings
    ///
    /// The body may carry a capacity overriding the configured number of
    /// spots. The response is either a success message together with the
    /// created allocations or a failure message.
    Allocate,

    /// Retry the writes left missing by partially failed runs
    ///
    /// The response is the number of repair jobs still outstanding.
    Reconcile,

    /// Useful for sending information for debugging
    Debug,
}

/// Request sent by a client of the allotment
pub struct Request {
    kind: RequestKind,
    id: Uuid,
    raw: Box<dyn RawRequest + Send>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("raw", &format_args!(".."))
            .finish()
    }
}

/// HTTP request method
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum RequestMethod {
    /// GET request
    Get,
    /// POST request, may have a payload
    Post,
}

/// Interface for handling requests
pub trait RequestHandler {
    /// Handle a request
    ///
    /// This method may be called concurrently from different threads.
    fn handle(&self, request: Request);

    /// Shut the allotment down
    ///
    /// This method waits for all threads spawned by the handler (e.g., the
    /// reconciler) to have terminated.
    fn shutdown(self);
}

/// A raw request, implemented by the transport
pub trait RawRequest {
    /// Get the URL
    fn url(&self) -> &str;
    /// Get the request method
    fn method(&self) -> RequestMethod;

    /// Read the request body as bytes
    fn read_bytes(&mut self) -> io::Result<Vec<u8>>;
    /// Read the request body as string
    fn read_string(&mut self) -> io::Result<String>;
    /// Parse the request body as [`u32`] integer
    fn read_u32(&mut self) -> Option<u32>;

    /// Respond with a failure message
    fn respond_with_err(self: Box<Self>, err: String, id: Uuid);
    /// Respond with a success message and the allocations created
    fn respond_with_allocations(self: Box<Self>, msg: String, allocations: &[Allocation], id: Uuid);
    /// Respond with an integer
    fn respond_with_int(self: Box<Self>, int: u32, id: Uuid);
    /// Respond with a string
    fn respond_with_string(self: Box<Self>, s: String, id: Uuid);
}

impl Request {
    /// Get the request's kind
    #[inline]
    pub fn kind(&self) -> &RequestKind {
        &self.kind
    }

    /// Get the request's id, used to correlate log lines and responses
    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get the request URL
    #[inline]
    pub fn url(&self) -> &str {
        self.raw.url()
    }

    /// Get the request method
    #[inline]
    pub fn method(&self) -> RequestMethod {
        self.raw.method()
    }

    /// Read an integer provided by the client (e.g., a capacity override).
    ///
    /// In case the client did not provide an integer (or some communication
    /// error happened), [`None`] is returned.
    ///
    /// This method has side effects and should be called only once per
    /// request.
    #[inline]
    pub fn read_u32(&mut self) -> Option<u32> {
        self.raw.read_u32()
    }

    /// Read the payload as bytes
    ///
    /// Returns [`Err`] in case of a communication error. Like
    /// [`Self::read_u32()`], this method should be called only once per
    /// request.
    #[inline]
    #[allow(unused)]
    pub fn read_bytes(&mut self) -> io::Result<Vec<u8>> {
        self.raw.read_bytes()
    }

    /// Read the payload as a UTF-8 string
    ///
    /// Returns [`Err`] if the payload is invalid UTF-8 or in case of a
    /// communication error.
    #[inline]
    #[allow(unused)]
    pub fn read_string(&mut self) -> io::Result<String> {
        self.raw.read_string()
    }

    /// Respond with a failure message.
    ///
    /// This method blocks until the response has been sent.
    #[inline]
    pub fn respond_with_err(self, err: impl Into<String>) {
        self.raw.respond_with_err(err.into(), self.id);
    }

    /// Respond with a success message and the created allocations.
    ///
    /// This method blocks until the response has been sent.
    #[inline]
    pub fn respond_with_allocations(self, msg: impl Into<String>, allocations: &[Allocation]) {
        self.raw
            .respond_with_allocations(msg.into(), allocations, self.id);
    }

    /// Respond with an integer, e.g., the number of outstanding repair jobs.
    ///
    /// This method blocks until the response has been sent.
    #[inline]
    pub fn respond_with_int(self, int: u32) {
        self.raw.respond_with_int(int, self.id);
    }

    /// Respond with an arbitrary string
    ///
    /// This method blocks until the response has been sent.
    #[inline]
    pub fn respond_with_string(self, s: impl Into<String>) {
        self.raw.respond_with_string(s.into(), self.id);
    }

    /// Create a new request from a [`RawRequest`]
    #[inline]
    pub fn from_raw(kind: RequestKind, raw: Box<dyn RawRequest + Send>) -> Self {
        Self {
            kind,
            id: Uuid::new_v4(),
            raw,
        }
    }
}
