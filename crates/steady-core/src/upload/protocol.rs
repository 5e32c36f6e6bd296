//! Three-call upload protocol: initiate, send part, complete.
//!
//! The orchestrator only needs requests to send and the session id back;
//! [`UploadProtocol`] isolates it from the endpoint's wire format.

use serde::{Deserialize, Serialize};
use url::Url;

use super::options::UploadMetadata;
use super::plan::{UploadMode, UploadPlan};
use crate::error::SteadyError;
use crate::transport::{HttpRequest, HttpResponse};

/// Builds the requests of the upload protocol for one endpoint.
pub trait UploadProtocol: Send + Sync + 'static {
    /// Request that opens an upload session for `plan`.
    fn initiate(&self, plan: &UploadPlan, metadata: &UploadMetadata) -> HttpRequest;

    /// Session id from a successful initiate response.
    fn session_id(&self, response: &HttpResponse) -> Result<String, SteadyError>;

    /// Request carrying one part. `part_number` is None for single-shot uploads.
    fn send_part(
        &self,
        session_id: &str,
        part_number: Option<u32>,
        bytes: &[u8],
        metadata: &UploadMetadata,
    ) -> HttpRequest;

    /// Request that finalizes a multi-part upload. Idempotent on the server.
    fn complete(&self, session_id: &str) -> HttpRequest;
}

/// JSON + `multipart/form-data` file upload endpoint:
///
/// - `POST {base}/file_uploads` with `{"mode", "filename", "content_type"?, "number_of_parts"?}`
/// - `POST {base}/file_uploads/{id}/send` with form fields `file` and `part_number`
/// - `POST {base}/file_uploads/{id}/complete`
#[derive(Debug, Clone)]
pub struct FileUploadsApi {
    base: Url,
    headers: Vec<(String, String)>,
}

#[derive(Debug, Serialize)]
struct CreateUpload<'a> {
    mode: &'static str,
    filename: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    number_of_parts: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CreatedUpload {
    id: String,
}

impl FileUploadsApi {
    /// `base_url` is the API root, e.g. `https://api.example.com/v1`.
    pub fn new(base_url: &str) -> Result<Self, SteadyError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| SteadyError::Validation(format!("invalid base URL {}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(SteadyError::Validation(format!("{} cannot be a base URL", base_url)));
        }
        // Url::join replaces the last segment unless the path ends with '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base,
            headers: Vec::new(),
        })
    }

    /// Header sent with every protocol request (authorization, API version, ...).
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    fn url(&self, path: &str) -> String {
        match self.base.join(path) {
            Ok(u) => u.into(),
            Err(_) => format!("{}{}", self.base, path),
        }
    }

    fn request(&self, path: &str) -> HttpRequest {
        let mut req = HttpRequest::post(self.url(path));
        req.headers.extend(self.headers.iter().cloned());
        req
    }
}

impl UploadProtocol for FileUploadsApi {
    fn initiate(&self, plan: &UploadPlan, metadata: &UploadMetadata) -> HttpRequest {
        let body = CreateUpload {
            mode: match plan.mode {
                UploadMode::Single => "single_part",
                UploadMode::MultiPart => "multi_part",
            },
            filename: &metadata.filename,
            content_type: metadata.content_type.as_deref(),
            number_of_parts: plan.is_multipart().then_some(plan.part_count),
        };
        // Serializing a struct of strings and integers cannot fail.
        let json = serde_json::to_vec(&body).unwrap_or_default();
        self.request("file_uploads")
            .with_header("Content-Type", "application/json")
            .with_body(json)
    }

    fn session_id(&self, response: &HttpResponse) -> Result<String, SteadyError> {
        serde_json::from_slice::<CreatedUpload>(&response.body)
            .map(|created| created.id)
            .map_err(|e| SteadyError::Unknown {
                status: Some(response.status),
                detail: format!("initiate response without upload id: {}", e),
            })
    }

    fn send_part(
        &self,
        session_id: &str,
        part_number: Option<u32>,
        bytes: &[u8],
        metadata: &UploadMetadata,
    ) -> HttpRequest {
        let boundary = pick_boundary(bytes, rand::random::<u64>);
        let mut form = MultipartForm::new(&boundary);
        if let Some(n) = part_number {
            form.text("part_number", &n.to_string());
        }
        form.file(
            "file",
            &metadata.filename,
            metadata.content_type.as_deref().unwrap_or("application/octet-stream"),
            bytes,
        );
        self.request(&format!("file_uploads/{}/send", session_id))
            .with_header("Content-Type", format!("multipart/form-data; boundary={}", boundary))
            .with_body(form.finish())
    }

    fn complete(&self, session_id: &str) -> HttpRequest {
        self.request(&format!("file_uploads/{}/complete", session_id))
    }
}

/// Random form boundary that does not occur in `bytes`.
fn pick_boundary(bytes: &[u8], mut candidate: impl FnMut() -> u64) -> String {
    loop {
        let boundary = format!("steady-{:016x}", candidate());
        if !bytes.windows(boundary.len()).any(|w| w == boundary.as_bytes()) {
            return boundary;
        }
    }
}

/// Minimal `multipart/form-data` body writer.
struct MultipartForm<'a> {
    boundary: &'a str,
    body: Vec<u8>,
}

impl<'a> MultipartForm<'a> {
    fn new(boundary: &'a str) -> Self {
        Self {
            boundary,
            body: Vec::new(),
        }
    }

    fn text(&mut self, name: &str, value: &str) {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
    }

    fn file(&mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) {
        let filename = filename.replace(['"', '\r', '\n'], "_");
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                self.boundary, name, filename, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
    }

    fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        self.body
    }
}
