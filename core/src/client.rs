//! Blocking client for the sandbox REST API.
//!
//! # Design
//! `CuckooClient` holds an immutable `ClientConfig` and a `Transport`. Every
//! public method runs the same sequence:
//!
//! 1. validate identifiers and local paths,
//! 2. build the endpoint URL for the configured flavor,
//! 3. reject operations or hash types the flavor does not serve,
//! 4. dispatch exactly one request,
//! 5. decode a 200 body as a JSON object, or stream it to disk for
//!    downloads; any other status becomes `ApiError::BadRequest`.
//!
//! Steps 1-3 never touch the network, so a malformed call has no side
//! effects. Nothing is retried.

use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{FormPart, HttpRequest, HttpResponse};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{FormFields, HashType, JsonMap, REPORT_FORMAT_JSON};
use crate::url::{ApiFlavor, Operation};

/// Downloads are copied to disk this many bytes at a time.
pub const DOWNLOAD_CHUNK_SIZE: usize = 1024;

/// Key kinds the web interface accepts for sample downloads. `task` means
/// the hash argument is a task ID.
const SAMPLE_KEY_TYPES: [&str; 4] = ["task", "md5", "sha1", "sha256"];

/// Client for one sandbox server.
#[derive(Debug, Clone)]
pub struct CuckooClient<T = ReqwestTransport> {
    config: ClientConfig,
    transport: T,
}

impl CuckooClient<ReqwestTransport> {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, ReqwestTransport::new())
    }
}

impl<T: Transport> CuckooClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn flavor(&self) -> ApiFlavor {
        self.config.flavor
    }

    // -----------------------------------------------------------------------
    // Service and machines
    // -----------------------------------------------------------------------

    pub fn cuckoo_status(&self) -> Result<JsonMap, ApiError> {
        self.get_json(self.url("/cuckoo/status"))
    }

    pub fn list_machines(&self) -> Result<JsonMap, ApiError> {
        self.get_json(self.url("/machines/list"))
    }

    pub fn view_machine(&self, name: &str) -> Result<JsonMap, ApiError> {
        if name.is_empty() {
            return Err(ApiError::NoVm {
                name: name.to_string(),
            });
        }
        self.get_json(self.url(&format!("/machines/view/{name}")))
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    /// List tasks. `offset` is only sent together with `limit`.
    pub fn list_tasks(&self, limit: Option<u32>, offset: Option<u32>) -> Result<JsonMap, ApiError> {
        let mut action = String::from("/tasks/list");
        if let Some(limit) = limit {
            action.push_str(&format!("/{limit}"));
            if let Some(offset) = offset {
                action.push_str(&format!("/{offset}"));
            }
        }
        self.get_json(self.url(&action))
    }

    pub fn view_task(&self, task_id: i64) -> Result<JsonMap, ApiError> {
        check_task_id(task_id)?;
        self.get_json(self.url(&format!("/tasks/view/{task_id}")))
    }

    pub fn task_status(&self, task_id: i64) -> Result<JsonMap, ApiError> {
        check_task_id(task_id)?;
        let url = self.url(&format!("/tasks/status/{task_id}"));
        self.ensure_supported(Operation::TaskStatus, &url)?;
        self.get_json(url)
    }

    pub fn task_iocs(&self, task_id: i64, detailed: bool) -> Result<JsonMap, ApiError> {
        check_task_id(task_id)?;
        let mut action = format!("/tasks/get/iocs/{task_id}");
        if detailed {
            action.push_str("/detailed");
        }
        let url = self.url(&action);
        self.ensure_supported(Operation::TaskIocs, &url)?;
        self.get_json(url)
    }

    /// Fetch the analysis report. Only `"json"` is decoded; other formats
    /// fail with `NotImplemented` before dispatch.
    pub fn task_report(&self, task_id: i64, format: &str) -> Result<JsonMap, ApiError> {
        check_task_id(task_id)?;
        let action = match self.flavor() {
            ApiFlavor::Script => format!("/tasks/report/{task_id}/{format}"),
            ApiFlavor::WebInterface => format!("/tasks/get/report/{task_id}/{format}"),
        };
        let url = self.url(&action);
        if format != REPORT_FORMAT_JSON {
            return Err(ApiError::NotImplemented { url });
        }
        self.get_json(url)
    }

    /// Delete a task. The server answers 404 for unknown tasks and 500 for
    /// tasks it refuses to delete.
    pub fn delete_task(&self, task_id: i64) -> Result<JsonMap, ApiError> {
        check_task_id(task_id)?;
        let url = self.url(&format!("/tasks/delete/{task_id}"));
        let response = self.dispatch(HttpRequest::get(url.clone()))?;
        match response.status {
            200 => decode_json(response, url),
            404 => Err(ApiError::NoTaskId { task_id }),
            500 => Err(ApiError::TaskNoDelete { task_id }),
            status => Err(ApiError::BadRequest {
                url,
                status: Some(status),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Submissions
    // -----------------------------------------------------------------------

    /// Submit a local file for analysis. `fields` are extra form values
    /// (timeout, package, options, ...) forwarded as-is.
    pub fn submit_file(&self, path: impl AsRef<Path>, fields: &FormFields) -> Result<JsonMap, ApiError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ApiError::InvalidFile {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read(path).map_err(|source| io_error(path, source))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut parts = vec![FormPart::File {
            name: "file".to_string(),
            file_name,
            content,
        }];
        parts.extend(extra_fields(fields));
        self.post_json(self.url("/tasks/create/file"), parts)
    }

    pub fn submit_url(&self, target: &str, fields: &FormFields) -> Result<JsonMap, ApiError> {
        let mut parts = vec![FormPart::text("url", target)];
        parts.extend(extra_fields(fields));
        self.post_json(self.url("/tasks/create/url"), parts)
    }

    // -----------------------------------------------------------------------
    // File lookups
    // -----------------------------------------------------------------------

    /// Find the tasks that analysed a sample with this digest.
    pub fn task_search(&self, hash: &str, hash_type: &str) -> Result<JsonMap, ApiError> {
        check_hash(hash, hash_type)?;
        let url = self.url(&format!("/files/view/{hash_type}/{hash}"));
        self.ensure_supported(Operation::TaskSearch, &url)?;
        self.ensure_hash_type(hash_type, &url)?;
        self.get_json(url)
    }

    /// Show what the server knows about a sample. The script flavor has no
    /// SHA-1 index.
    pub fn file_view(&self, hash: &str, hash_type: &str) -> Result<JsonMap, ApiError> {
        check_hash(hash, hash_type)?;
        let url = self.url(&format!("/files/view/{hash_type}/{hash}"));
        self.ensure_hash_type(hash_type, &url)?;
        self.get_json(url)
    }

    // -----------------------------------------------------------------------
    // Artifact downloads
    // -----------------------------------------------------------------------

    /// Where a screenshot or sample archive for `dest` is written: `dest`
    /// plus `.zip` (script) or `.tar.bz` (web interface).
    pub fn archive_destination(&self, dest: impl AsRef<Path>) -> PathBuf {
        with_suffix(dest.as_ref(), self.flavor().archive_extension())
    }

    /// Download all screenshots of a task, or only number `screenshot`.
    pub fn task_screenshots(
        &self,
        task_id: i64,
        dest: impl AsRef<Path>,
        screenshot: Option<u32>,
    ) -> Result<(), ApiError> {
        check_task_id(task_id)?;
        let target = self.prepare_archive(dest.as_ref())?;

        let mut action = match self.flavor() {
            ApiFlavor::Script => format!("/tasks/screenshots/{task_id}"),
            ApiFlavor::WebInterface => format!("/tasks/get/screenshot/{task_id}"),
        };
        if let Some(number) = screenshot {
            action.push_str(&format!("/{number}"));
        }
        self.download(self.url(&action), &target)
    }

    /// Download a submitted sample. The script flavor only indexes samples
    /// by SHA-256.
    pub fn sample_download(&self, hash: &str, hash_type: &str, dest: impl AsRef<Path>) -> Result<(), ApiError> {
        check_hash(hash, hash_type)?;
        if hash_type.is_empty() {
            return Err(ApiError::NoHash {
                hash: hash.to_string(),
                hash_type: String::new(),
            });
        }
        let target = self.prepare_archive(dest.as_ref())?;

        let (action, supported) = match self.flavor() {
            ApiFlavor::Script => (format!("/files/get/{hash}"), hash_type == "sha256"),
            ApiFlavor::WebInterface => (
                format!("/files/get/{hash_type}/{hash}"),
                SAMPLE_KEY_TYPES.contains(&hash_type),
            ),
        };
        let url = self.url(&action);
        if !supported {
            return Err(ApiError::NotAvailable { url });
        }
        self.download(url, &target)
    }

    pub fn pcap_download(&self, task_id: i64, dest: impl AsRef<Path>) -> Result<(), ApiError> {
        check_task_id(task_id)?;
        let dest = dest.as_ref();
        check_destination(dest)?;
        let action = match self.flavor() {
            ApiFlavor::Script => format!("/pcap/get/{task_id}"),
            ApiFlavor::WebInterface => format!("/tasks/get/pcap/{task_id}"),
        };
        self.download(self.url(&action), dest)
    }

    pub fn dropped_download(&self, task_id: i64, dest: impl AsRef<Path>) -> Result<(), ApiError> {
        self.task_artifact(Operation::DroppedDownload, "dropped", task_id, dest.as_ref(), None)
    }

    /// Download the files Suricata extracted from the task's traffic.
    pub fn surifiles_download(&self, task_id: i64, dest: impl AsRef<Path>) -> Result<(), ApiError> {
        self.task_artifact(Operation::SurifilesDownload, "surifile", task_id, dest.as_ref(), None)
    }

    pub fn fullmemory_download(&self, task_id: i64, dest: impl AsRef<Path>) -> Result<(), ApiError> {
        self.task_artifact(Operation::FullMemoryDownload, "fullmemory", task_id, dest.as_ref(), None)
    }

    /// Download process memory dumps, optionally only for `pid`.
    pub fn procmemory_download(
        &self,
        task_id: i64,
        dest: impl AsRef<Path>,
        pid: Option<u32>,
    ) -> Result<(), ApiError> {
        self.task_artifact(Operation::ProcMemoryDownload, "procmemory", task_id, dest.as_ref(), pid)
    }

    // -----------------------------------------------------------------------
    // Shared plumbing
    // -----------------------------------------------------------------------

    fn url(&self, action: &str) -> String {
        self.config.url_for(action)
    }

    fn ensure_supported(&self, operation: Operation, url: &str) -> Result<(), ApiError> {
        if self.flavor().supports(operation) {
            Ok(())
        } else {
            Err(ApiError::NotAvailable { url: url.to_string() })
        }
    }

    fn ensure_hash_type(&self, hash_type: &str, url: &str) -> Result<(), ApiError> {
        match (HashType::parse(hash_type), self.flavor()) {
            (Some(HashType::Sha1), ApiFlavor::Script) | (None, _) => {
                Err(ApiError::NotAvailable { url: url.to_string() })
            }
            (Some(_), _) => Ok(()),
        }
    }

    /// Check `dest` and its archive-suffixed form, returning the latter.
    fn prepare_archive(&self, dest: &Path) -> Result<PathBuf, ApiError> {
        check_destination(dest)?;
        let target = self.archive_destination(dest);
        check_destination(&target)?;
        Ok(target)
    }

    /// Web-interface-only `/tasks/get/<kind>/<id>[/<sub>]` downloads.
    fn task_artifact(
        &self,
        operation: Operation,
        kind: &str,
        task_id: i64,
        dest: &Path,
        sub_id: Option<u32>,
    ) -> Result<(), ApiError> {
        check_task_id(task_id)?;
        check_destination(dest)?;
        let mut action = format!("/tasks/get/{kind}/{task_id}");
        if let Some(sub_id) = sub_id {
            action.push_str(&format!("/{sub_id}"));
        }
        let url = self.url(&action);
        self.ensure_supported(operation, &url)?;
        self.download(url, dest)
    }

    fn dispatch(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        tracing::debug!(method = ?request.method, url = %request.url, "dispatching request");
        match self.transport.execute(&request) {
            Ok(response) => {
                tracing::debug!(url = %request.url, status = response.status, "received response");
                Ok(response)
            }
            Err(err) => {
                tracing::debug!(url = %request.url, error = %err, "request failed");
                Err(ApiError::BadRequest {
                    url: request.url,
                    status: None,
                })
            }
        }
    }

    fn get_json(&self, url: String) -> Result<JsonMap, ApiError> {
        let response = self.dispatch(HttpRequest::get(url.clone()))?;
        json_reply(response, url)
    }

    fn post_json(&self, url: String, parts: Vec<FormPart>) -> Result<JsonMap, ApiError> {
        let response = self.dispatch(HttpRequest::post_multipart(url.clone(), parts))?;
        json_reply(response, url)
    }

    fn download(&self, url: String, dest: &Path) -> Result<(), ApiError> {
        let response = self.dispatch(HttpRequest::get(url.clone()))?;
        if response.status != 200 {
            return Err(ApiError::BadRequest {
                url,
                status: Some(response.status),
            });
        }
        let written = save_body(response.body, dest)?;
        tracing::info!(url = %url, path = %dest.display(), bytes = written, "saved artifact");
        Ok(())
    }
}

fn check_task_id(task_id: i64) -> Result<(), ApiError> {
    if task_id < 1 {
        return Err(ApiError::NoTaskId { task_id });
    }
    Ok(())
}

fn check_hash(hash: &str, hash_type: &str) -> Result<(), ApiError> {
    if hash.is_empty() {
        return Err(ApiError::NoHash {
            hash: String::new(),
            hash_type: hash_type.to_string(),
        });
    }
    Ok(())
}

fn check_destination(path: &Path) -> Result<(), ApiError> {
    if path.as_os_str().is_empty() || path.exists() {
        return Err(ApiError::FileExists {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(suffix);
    PathBuf::from(raw)
}

fn extra_fields(fields: &FormFields) -> impl Iterator<Item = FormPart> + '_ {
    fields.iter().map(|(name, value)| FormPart::text(name, value))
}

fn json_reply(response: HttpResponse, url: String) -> Result<JsonMap, ApiError> {
    if response.status != 200 {
        return Err(ApiError::BadRequest {
            url,
            status: Some(response.status),
        });
    }
    decode_json(response, url)
}

fn decode_json(response: HttpResponse, url: String) -> Result<JsonMap, ApiError> {
    serde_json::from_reader(response.body).map_err(|source| ApiError::Decode { url, source })
}

fn io_error(path: &Path, source: io::Error) -> ApiError {
    ApiError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Copy `body` into a newly created `dest` in `DOWNLOAD_CHUNK_SIZE` pieces.
/// A failure mid-stream leaves the partial file in place.
fn save_body(mut body: impl Read, dest: &Path) -> Result<u64, ApiError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .map_err(|source| match source.kind() {
            io::ErrorKind::AlreadyExists => ApiError::FileExists {
                path: dest.to_path_buf(),
            },
            _ => io_error(dest, source),
        })?;

    let mut chunk = [0u8; DOWNLOAD_CHUNK_SIZE];
    let mut written = 0u64;
    loop {
        let n = match body.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => return Err(io_error(dest, source)),
        };
        file.write_all(&chunk[..n]).map_err(|source| io_error(dest, source))?;
        written += n as u64;
    }
    file.flush().map_err(|source| io_error(dest, source))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, RequestBody};
    use crate::transport::{MockTransport, TransportError};

    const WEB: ApiFlavor = ApiFlavor::WebInterface;
    const SCRIPT: ApiFlavor = ApiFlavor::Script;

    fn client(flavor: ApiFlavor, transport: MockTransport) -> CuckooClient<MockTransport> {
        CuckooClient::with_transport(ClientConfig::new("http", "127.0.0.1", 8000, flavor), transport)
    }

    /// A transport that fails the test if anything is dispatched.
    fn no_requests() -> MockTransport {
        let mut mock = MockTransport::new();
        mock.expect_execute().never();
        mock
    }

    /// Expect exactly one GET of `url` and answer it.
    fn expect_get(url: &'static str, status: u16, body: &'static str) -> MockTransport {
        let mut mock = MockTransport::new();
        mock.expect_execute()
            .times(1)
            .withf(move |req: &HttpRequest| req.method == HttpMethod::Get && req.url == url)
            .returning(move |_| Ok(HttpResponse::from_bytes(status, body)));
        mock
    }

    fn expect_download(url: &'static str, payload: Vec<u8>) -> MockTransport {
        let mut mock = MockTransport::new();
        mock.expect_execute()
            .times(1)
            .withf(move |req: &HttpRequest| req.url == url)
            .returning(move |_| Ok(HttpResponse::from_bytes(200, payload.clone())));
        mock
    }

    fn artifact(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    // --- status and machines ---

    #[test]
    fn empty_object_decodes_to_empty_map() {
        for (flavor, url) in [
            (WEB, "http://127.0.0.1:8000/api/cuckoo/status/"),
            (SCRIPT, "http://127.0.0.1:8000/cuckoo/status"),
        ] {
            let reply = client(flavor, expect_get(url, 200, "{}")).cuckoo_status().unwrap();
            assert!(reply.is_empty());
        }
    }

    #[test]
    fn non_200_is_bad_request_with_url() {
        let err = client(WEB, expect_get("http://127.0.0.1:8000/api/machines/list/", 404, ""))
            .list_machines()
            .unwrap_err();
        match err {
            ApiError::BadRequest { url, status } => {
                assert_eq!(url, "http://127.0.0.1:8000/api/machines/list/");
                assert_eq!(status, Some(404));
            }
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[test]
    fn non_json_success_body_is_decode_error() {
        let err = client(SCRIPT, expect_get("http://127.0.0.1:8000/machines/list", 200, "<html>"))
            .list_machines()
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));

        let err = client(SCRIPT, expect_get("http://127.0.0.1:8000/machines/list", 200, "[1, 2]"))
            .list_machines()
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }

    #[test]
    fn transport_failure_is_bad_request_without_status() {
        let mut mock = MockTransport::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Err(TransportError::new("connection refused")));
        let err = client(WEB, mock).cuckoo_status().unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { status: None, .. }));
        assert_eq!(err.url(), Some("http://127.0.0.1:8000/api/cuckoo/status/"));
    }

    #[test]
    fn view_machine_requires_a_name() {
        let err = client(WEB, no_requests()).view_machine("").unwrap_err();
        assert!(matches!(err, ApiError::NoVm { .. }));
    }

    #[test]
    fn view_machine_decodes_reply() {
        let reply = client(
            SCRIPT,
            expect_get(
                "http://127.0.0.1:8000/machines/view/win7",
                200,
                r#"{"machine": {"name": "win7", "locked": false}}"#,
            ),
        )
        .view_machine("win7")
        .unwrap();
        assert_eq!(reply["machine"]["name"], "win7");
    }

    // --- task listing ---

    #[test]
    fn offset_without_limit_is_ignored() {
        let url = "http://127.0.0.1:8000/api/tasks/list/";
        client(WEB, expect_get(url, 200, "{}")).list_tasks(None, Some(5)).unwrap();
        client(WEB, expect_get(url, 200, "{}")).list_tasks(None, None).unwrap();
    }

    #[test]
    fn limit_and_offset_extend_the_path() {
        client(SCRIPT, expect_get("http://127.0.0.1:8000/tasks/list/10", 200, "{}"))
            .list_tasks(Some(10), None)
            .unwrap();
        client(SCRIPT, expect_get("http://127.0.0.1:8000/tasks/list/10/20", 200, "{}"))
            .list_tasks(Some(10), Some(20))
            .unwrap();
    }

    // --- task validation ---

    #[test]
    fn invalid_task_ids_never_reach_the_network() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("artifact");
        let c = client(WEB, no_requests());

        for id in [0, -1, i64::MIN] {
            let results = [
                c.view_task(id).map(drop),
                c.task_status(id).map(drop),
                c.task_iocs(id, true).map(drop),
                c.task_report(id, "json").map(drop),
                c.delete_task(id).map(drop),
                c.task_screenshots(id, &dest, None),
                c.pcap_download(id, &dest),
                c.dropped_download(id, &dest),
                c.surifiles_download(id, &dest),
                c.fullmemory_download(id, &dest),
                c.procmemory_download(id, &dest, Some(4)),
            ];
            for result in results {
                assert!(
                    matches!(result, Err(ApiError::NoTaskId { task_id }) if task_id == id),
                    "{result:?}"
                );
            }
        }
        assert!(!dest.exists());
    }

    #[test]
    fn existing_destination_never_reaches_the_network() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("taken");
        fs::write(&dest, b"keep me").unwrap();
        let c = client(WEB, no_requests());

        let results = [
            c.task_screenshots(1, &dest, Some(2)),
            c.sample_download("abc", "sha256", &dest),
            c.pcap_download(1, &dest),
            c.dropped_download(1, &dest),
            c.surifiles_download(1, &dest),
            c.fullmemory_download(1, &dest),
            c.procmemory_download(1, &dest, None),
        ];
        for result in results {
            assert!(matches!(result, Err(ApiError::FileExists { .. })), "{result:?}");
        }
        assert!(matches!(
            c.pcap_download(1, ""),
            Err(ApiError::FileExists { .. })
        ));
        assert_eq!(fs::read(&dest).unwrap(), b"keep me");
    }

    #[test]
    fn existing_archive_path_counts_as_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("shots");
        fs::write(dir.path().join("shots.zip"), b"old").unwrap();

        let err = client(SCRIPT, no_requests())
            .task_screenshots(3, &dest, None)
            .unwrap_err();
        assert!(matches!(err, ApiError::FileExists { path } if path.ends_with("shots.zip")));
    }

    #[test]
    fn web_only_task_operations_unavailable_on_script() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("artifact");
        let c = client(SCRIPT, no_requests());

        assert!(matches!(c.task_status(1), Err(ApiError::NotAvailable { .. })));
        assert!(matches!(c.task_iocs(1, false), Err(ApiError::NotAvailable { .. })));
        assert!(matches!(c.dropped_download(1, &dest), Err(ApiError::NotAvailable { .. })));
        assert!(matches!(c.surifiles_download(1, &dest), Err(ApiError::NotAvailable { .. })));
        assert!(matches!(c.fullmemory_download(1, &dest), Err(ApiError::NotAvailable { .. })));
        assert!(matches!(
            c.procmemory_download(1, &dest, None),
            Err(ApiError::NotAvailable { .. })
        ));
        assert!(!dest.exists());
    }

    #[test]
    fn task_iocs_detailed_appends_segment() {
        client(WEB, expect_get("http://127.0.0.1:8000/api/tasks/get/iocs/7/detailed/", 200, "{}"))
            .task_iocs(7, true)
            .unwrap();
        client(WEB, expect_get("http://127.0.0.1:8000/api/tasks/get/iocs/7/", 200, "{}"))
            .task_iocs(7, false)
            .unwrap();
    }

    // --- reports ---

    #[test]
    fn report_path_depends_on_flavor() {
        client(WEB, expect_get("http://127.0.0.1:8000/api/tasks/get/report/4/json/", 200, "{}"))
            .task_report(4, "json")
            .unwrap();
        client(SCRIPT, expect_get("http://127.0.0.1:8000/tasks/report/4/json", 200, "{}"))
            .task_report(4, "json")
            .unwrap();
    }

    #[test]
    fn non_json_report_is_not_implemented() {
        let err = client(SCRIPT, no_requests()).task_report(4, "html").unwrap_err();
        match err {
            ApiError::NotImplemented { url } => {
                assert_eq!(url, "http://127.0.0.1:8000/tasks/report/4/html");
            }
            other => panic!("expected NotImplemented, got {other:?}"),
        }
    }

    // --- delete ---

    #[test]
    fn delete_maps_specific_statuses() {
        let url = "http://127.0.0.1:8000/api/tasks/delete/12/";

        let reply = client(WEB, expect_get(url, 200, r#"{"status": "OK"}"#))
            .delete_task(12)
            .unwrap();
        assert_eq!(reply["status"], "OK");

        let err = client(WEB, expect_get(url, 404, "")).delete_task(12).unwrap_err();
        assert!(matches!(err, ApiError::NoTaskId { task_id: 12 }));

        let err = client(WEB, expect_get(url, 500, "")).delete_task(12).unwrap_err();
        assert!(matches!(err, ApiError::TaskNoDelete { task_id: 12 }));

        let err = client(WEB, expect_get(url, 400, "")).delete_task(12).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { status: Some(400), .. }));
    }

    // --- submissions ---

    #[test]
    fn submit_file_rejects_directories_and_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let c = client(WEB, no_requests());

        let err = c.submit_file(dir.path(), &FormFields::new()).unwrap_err();
        assert!(matches!(err, ApiError::InvalidFile { .. }));

        let err = c
            .submit_file(dir.path().join("missing.exe"), &FormFields::new())
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidFile { .. }));
    }

    #[test]
    fn submit_file_posts_basename_and_fields() {
        let dir = tempfile::tempdir().unwrap();
        let sample = dir.path().join("dropper.bin");
        fs::write(&sample, b"MZ\x90\x00").unwrap();

        let mut mock = MockTransport::new();
        mock.expect_execute()
            .times(1)
            .withf(|req: &HttpRequest| {
                let Some(RequestBody::Multipart(parts)) = &req.body else {
                    return false;
                };
                req.method == HttpMethod::Post
                    && req.url == "http://127.0.0.1:8000/tasks/create/file"
                    && parts
                        == &vec![
                            FormPart::File {
                                name: "file".to_string(),
                                file_name: "dropper.bin".to_string(),
                                content: b"MZ\x90\x00".to_vec(),
                            },
                            FormPart::text("package", "exe"),
                            FormPart::text("timeout", "120"),
                        ]
            })
            .returning(|_| Ok(HttpResponse::from_bytes(200, r#"{"task_ids": [14]}"#)));

        let fields = FormFields::from([
            ("timeout".to_string(), "120".to_string()),
            ("package".to_string(), "exe".to_string()),
        ]);
        let reply = client(SCRIPT, mock).submit_file(&sample, &fields).unwrap();
        assert_eq!(reply["task_ids"][0], 14);
    }

    #[test]
    fn submit_url_sends_url_field() {
        let mut mock = MockTransport::new();
        mock.expect_execute()
            .times(1)
            .withf(|req: &HttpRequest| {
                req.url == "http://127.0.0.1:8000/api/tasks/create/url/"
                    && req.form_parts() == [FormPart::text("url", "http://example.com/payload")]
            })
            .returning(|_| {
                Ok(HttpResponse::from_bytes(
                    200,
                    r#"{"error": false, "data": {"task_ids": [15]}}"#,
                ))
            });

        let reply = client(WEB, mock)
            .submit_url("http://example.com/payload", &FormFields::new())
            .unwrap();
        assert_eq!(reply["data"]["task_ids"][0], 15);
    }

    #[test]
    fn submit_failure_is_bad_request() {
        let mut mock = MockTransport::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::from_bytes(404, "")));
        let err = client(WEB, mock)
            .submit_url("http://example.com", &FormFields::new())
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { status: Some(404), .. }));
    }

    // --- file lookups ---

    #[test]
    fn file_view_rejects_unknown_hash_types_on_every_flavor() {
        for flavor in [WEB, SCRIPT] {
            let err = client(flavor, no_requests()).file_view("abc", "sha255").unwrap_err();
            assert!(matches!(err, ApiError::NotAvailable { .. }), "{flavor}");
        }
    }

    #[test]
    fn file_view_sha1_only_on_web_interface() {
        let err = client(SCRIPT, no_requests()).file_view("da39a3ee", "sha1").unwrap_err();
        assert!(matches!(err, ApiError::NotAvailable { .. }));

        client(WEB, expect_get("http://127.0.0.1:8000/api/files/view/sha1/da39a3ee/", 200, "{}"))
            .file_view("da39a3ee", "sha1")
            .unwrap();
    }

    #[test]
    fn file_view_requires_a_hash() {
        let err = client(WEB, no_requests()).file_view("", "md5").unwrap_err();
        assert!(matches!(err, ApiError::NoHash { .. }));
    }

    #[test]
    fn task_search_is_web_only() {
        let err = client(SCRIPT, no_requests()).task_search("abc", "md5").unwrap_err();
        assert!(matches!(err, ApiError::NotAvailable { .. }));

        client(WEB, expect_get("http://127.0.0.1:8000/api/files/view/md5/abc/", 200, "{}"))
            .task_search("abc", "md5")
            .unwrap();
    }

    // --- downloads ---

    #[test]
    fn screenshots_are_saved_with_flavor_extension() {
        let dir = tempfile::tempdir().unwrap();
        let payload = artifact(2 * DOWNLOAD_CHUNK_SIZE + 77);

        let web = client(
            WEB,
            expect_download("http://127.0.0.1:8000/api/tasks/get/screenshot/5/", payload.clone()),
        );
        web.task_screenshots(5, dir.path().join("web"), None).unwrap();
        assert_eq!(fs::read(dir.path().join("web.tar.bz")).unwrap(), payload);

        let script = client(
            SCRIPT,
            expect_download("http://127.0.0.1:8000/tasks/screenshots/5/2", payload.clone()),
        );
        script.task_screenshots(5, dir.path().join("script"), Some(2)).unwrap();
        assert_eq!(fs::read(dir.path().join("script.zip")).unwrap(), payload);
    }

    #[test]
    fn sample_download_key_types_per_flavor() {
        let dir = tempfile::tempdir().unwrap();

        let err = client(SCRIPT, no_requests())
            .sample_download("abc", "md5", dir.path().join("a"))
            .unwrap_err();
        assert!(matches!(err, ApiError::NotAvailable { .. }));

        let err = client(WEB, no_requests())
            .sample_download("abc", "crc32", dir.path().join("b"))
            .unwrap_err();
        assert!(matches!(err, ApiError::NotAvailable { .. }));

        let err = client(WEB, no_requests())
            .sample_download("abc", "", dir.path().join("c"))
            .unwrap_err();
        assert!(matches!(err, ApiError::NoHash { .. }));

        client(WEB, expect_download("http://127.0.0.1:8000/api/files/get/task/9/", artifact(10)))
            .sample_download("9", "task", dir.path().join("d"))
            .unwrap();
        assert!(dir.path().join("d.tar.bz").is_file());

        client(SCRIPT, expect_download("http://127.0.0.1:8000/files/get/ff00", artifact(10)))
            .sample_download("ff00", "sha256", dir.path().join("e"))
            .unwrap();
        assert!(dir.path().join("e.zip").is_file());
    }

    #[test]
    fn pcap_path_depends_on_flavor() {
        let dir = tempfile::tempdir().unwrap();
        let payload = artifact(DOWNLOAD_CHUNK_SIZE);

        client(SCRIPT, expect_download("http://127.0.0.1:8000/pcap/get/3", payload.clone()))
            .pcap_download(3, dir.path().join("a.pcap"))
            .unwrap();
        client(WEB, expect_download("http://127.0.0.1:8000/api/tasks/get/pcap/3/", payload.clone()))
            .pcap_download(3, dir.path().join("b.pcap"))
            .unwrap();

        assert_eq!(fs::read(dir.path().join("a.pcap")).unwrap(), payload);
        assert_eq!(fs::read(dir.path().join("b.pcap")).unwrap(), payload);
    }

    #[test]
    fn procmemory_pid_scopes_the_dump() {
        let dir = tempfile::tempdir().unwrap();
        client(
            WEB,
            expect_download("http://127.0.0.1:8000/api/tasks/get/procmemory/8/1337/", artifact(5)),
        )
        .procmemory_download(8, dir.path().join("dump"), Some(1337))
        .unwrap();
        assert_eq!(fs::read(dir.path().join("dump")).unwrap().len(), 5);
    }

    #[test]
    fn failed_download_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("memory.dmp");
        let err = client(WEB, expect_get("http://127.0.0.1:8000/api/tasks/get/fullmemory/2/", 404, ""))
            .fullmemory_download(2, &dest)
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { status: Some(404), .. }));
        assert!(!dest.exists());
    }

    #[test]
    fn save_body_writes_in_chunks_until_eof() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");
        let payload = artifact(3 * DOWNLOAD_CHUNK_SIZE + 1);
        let written = save_body(io::Cursor::new(payload.clone()), &dest).unwrap();
        assert_eq!(written, payload.len() as u64);
        assert_eq!(fs::read(&dest).unwrap(), payload);

        let err = save_body(io::Cursor::new(Vec::new()), &dest).unwrap_err();
        assert!(matches!(err, ApiError::FileExists { .. }));
    }
}
