//! Scripted transports for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::upload::{UploadMetadata, UploadPlan, UploadProtocol};
use crate::error::SteadyError;

/// Replays a fixed list of results, one per call.
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    calls: AtomicU32,
    latency: Option<Duration>,
    first_only: bool,
}

impl ScriptedTransport {
    pub(crate) fn new(script: Vec<Result<HttpResponse, TransportError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
            latency: None,
            first_only: false,
        }
    }

    /// Every call sleeps for `latency` before answering.
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self.first_only = false;
        self
    }

    /// Only the first call sleeps; its scripted result is not consumed.
    pub(crate) fn with_latency_on_first(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self.first_only = true;
        self
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptedTransport {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send {
        async move {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(latency) = self.latency {
                if !self.first_only || call == 0 {
                    if let Some(limit) = request.timeout.filter(|limit| *limit < latency) {
                        tokio::time::sleep(limit).await;
                        return Err(TransportError::TimedOut(limit));
                    }
                    tokio::time::sleep(latency).await;
                    if self.first_only {
                        return Err(TransportError::Connection("slow first call".into()));
                    }
                }
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Connection("script exhausted".into())))
        }
    }
}

/// Header carrying the 1-based part number in [`HeaderProtocol`] requests.
pub(crate) const PART_HEADER: &str = "x-part-number";

/// Minimal upload protocol: routes by path, part number in a header.
pub(crate) struct HeaderProtocol;

impl UploadProtocol for HeaderProtocol {
    fn initiate(&self, plan: &UploadPlan, metadata: &UploadMetadata) -> HttpRequest {
        HttpRequest::post("mem://uploads")
            .with_header("x-parts", plan.part_count.to_string())
            .with_header("x-filename", metadata.filename.clone())
    }

    fn session_id(&self, response: &HttpResponse) -> Result<String, SteadyError> {
        String::from_utf8(response.body.clone()).map_err(|e| SteadyError::Unknown {
            status: Some(response.status),
            detail: e.to_string(),
        })
    }

    fn send_part(&self, session_id: &str, part_number: Option<u32>, bytes: &[u8], _metadata: &UploadMetadata) -> HttpRequest {
        let mut req = HttpRequest::post(format!("mem://uploads/{}/send", session_id)).with_body(bytes.to_vec());
        if let Some(n) = part_number {
            req = req.with_header(PART_HEADER, n.to_string());
        }
        req
    }

    fn complete(&self, session_id: &str) -> HttpRequest {
        HttpRequest::post(format!("mem://uploads/{}/complete", session_id))
    }
}

/// In-memory upload endpoint for [`HeaderProtocol`].
///
/// Parts listed in `fail_once` answer 503 on their first attempt; parts in
/// `fail_always` always answer `fail_status`.
#[derive(Default)]
pub(crate) struct FakeUploadServer {
    pub(crate) fail_once: HashSet<u32>,
    pub(crate) fail_always: HashSet<u32>,
    pub(crate) fail_status: u16,
    pub(crate) initiate_status: Option<u16>,
    /// Statuses answered by the first initiate calls, in order, before the normal answer.
    pub(crate) initiate_script: Vec<u16>,
    /// Answer initiate with a body that is not a session id.
    pub(crate) garbled_session: bool,
    pub(crate) part_latency: Option<Duration>,
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    attempts: HashMap<u32, u32>,
    received: HashMap<u32, usize>,
    completed_with: Option<Vec<u32>>,
    initiations: u32,
    single_sends: u32,
}

impl FakeUploadServer {
    pub(crate) fn new() -> Self {
        Self {
            fail_status: 503,
            ..Self::default()
        }
    }

    pub(crate) fn attempts_for(&self, part: u32) -> u32 {
        self.state.lock().unwrap().attempts.get(&part).copied().unwrap_or(0)
    }

    pub(crate) fn received_parts(&self) -> Vec<u32> {
        let mut parts: Vec<u32> = self.state.lock().unwrap().received.keys().copied().collect();
        parts.sort_unstable();
        parts
    }

    pub(crate) fn received_bytes(&self) -> usize {
        self.state.lock().unwrap().received.values().sum()
    }

    /// Parts acknowledged at the moment `complete` was called.
    pub(crate) fn completed_with(&self) -> Option<Vec<u32>> {
        self.state.lock().unwrap().completed_with.clone()
    }

    pub(crate) fn initiations(&self) -> u32 {
        self.state.lock().unwrap().initiations
    }

    pub(crate) fn single_sends(&self) -> u32 {
        self.state.lock().unwrap().single_sends
    }

    fn handle(&self, request: &HttpRequest) -> HttpResponse {
        let mut st = self.state.lock().unwrap();
        if request.url == "mem://uploads" {
            st.initiations += 1;
            if let Some(&status) = self.initiate_script.get(st.initiations as usize - 1) {
                return HttpResponse::new(status);
            }
            if let Some(status) = self.initiate_status {
                return HttpResponse::new(status);
            }
            if self.garbled_session {
                return HttpResponse::new(200).with_body(vec![0xff, 0xfe]);
            }
            return HttpResponse::new(200).with_body("session-1");
        }
        if request.url.ends_with("/complete") {
            let mut parts: Vec<u32> = st.received.keys().copied().collect();
            parts.sort_unstable();
            st.completed_with = Some(parts);
            return HttpResponse::new(200);
        }
        let Some(part) = request.header(PART_HEADER).and_then(|v| v.parse::<u32>().ok()) else {
            st.single_sends += 1;
            return HttpResponse::new(200);
        };
        let attempt = {
            let n = st.attempts.entry(part).or_insert(0);
            *n += 1;
            *n
        };
        if self.fail_always.contains(&part) || (self.fail_once.contains(&part) && attempt == 1) {
            return HttpResponse::new(self.fail_status);
        }
        st.received.insert(part, request.body.len());
        HttpResponse::new(200)
    }
}

impl Transport for FakeUploadServer {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send {
        async move {
            if request.header(PART_HEADER).is_some() {
                if let Some(latency) = self.part_latency {
                    if let Some(limit) = request.timeout.filter(|limit| *limit < latency) {
                        tokio::time::sleep(limit).await;
                        return Err(TransportError::TimedOut(limit));
                    }
                    tokio::time::sleep(latency).await;
                }
            }
            Ok(self.handle(&request))
        }
    }
}
