//! Asynchronous (UWS) job protocol for TAP queries.
//!
//! A TAP query does not execute inside a single request: the client creates a
//! server-side job, starts it, polls until the server reports a terminal
//! phase, then fetches the result and deletes the job. [`TapSession::run_async`]
//! collapses that whole lifecycle into one call, so callers supply a query and
//! receive a [`Table`] without ever seeing job ids or polling.
//!
//! The client-observed state machine is
//! `Submitted -> Waiting -> Terminal{Completed|Error} -> Cleaned`, where the
//! cleanup step is reached on the success path only: failed jobs are left on
//! the server, matching the upstream service contract.

use std::fmt;
use std::time::Duration;

use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::Response;
use reqwest::multipart;
use tokio::time::sleep;
use tracing::{debug, info, instrument};

use super::error::TapError;
use super::session::TapSession;
use crate::votable::Table;

/// Initial interval between phase polls while waiting for a terminal state.
const POLL_INTERVAL_START: Duration = Duration::from_secs(1);

/// Poll intervals double up to this cap. There is no overall wait timeout;
/// the client relies on the server eventually reaching a terminal phase.
const POLL_INTERVAL_CAP: Duration = Duration::from_secs(60);

/// Options for a query execution.
///
/// The default is an ADQL query with no record cap and no uploads.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Query language passed to the service (`LANG` parameter).
    pub language: String,
    /// Cap on the number of result records (`MAXREC` parameter).
    pub max_records: Option<u64>,
    /// Tables uploaded alongside the query, addressable in ADQL as
    /// `TAP_UPLOAD.<name>`.
    pub uploads: Vec<(String, Table)>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            language: "ADQL".to_string(),
            max_records: None,
            uploads: Vec::new(),
        }
    }
}

/// Execution phase of a server-side job, as defined by UWS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPhase {
    /// Accepted but not yet queued for execution.
    Pending,
    /// Queued for execution.
    Queued,
    /// Currently executing.
    Executing,
    /// Finished successfully; results are (nominally) available.
    Completed,
    /// Finished with an error.
    Error,
    /// Aborted by the client or the server.
    Aborted,
    /// Any phase this client does not recognize.
    Unknown(String),
}

impl JobPhase {
    /// Parses a UWS phase string (as served by the job's `/phase` resource).
    #[must_use]
    pub fn parse(phase: &str) -> Self {
        match phase {
            "PENDING" => Self::Pending,
            "QUEUED" => Self::Queued,
            "EXECUTING" => Self::Executing,
            "COMPLETED" => Self::Completed,
            "ERROR" => Self::Error,
            "ABORTED" => Self::Aborted,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Whether the server will make no further progress on this job.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Aborted)
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Queued => write!(f, "QUEUED"),
            Self::Executing => write!(f, "EXECUTING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Error => write!(f, "ERROR"),
            Self::Aborted => write!(f, "ABORTED"),
            Self::Unknown(other) => write!(f, "{other}"),
        }
    }
}

/// Handle to one server-side query job.
///
/// Most callers should use [`TapSession::run_async`]; the handle is public so
/// the individual protocol steps remain testable and available for manual
/// driving.
#[derive(Debug)]
pub struct AsyncJob<'a> {
    session: &'a TapSession,
    url: String,
    phase: JobPhase,
}

impl<'a> AsyncJob<'a> {
    /// Submits a query, creating a job on the server.
    ///
    /// Sends `REQUEST=doQuery` with the query text, language, optional record
    /// cap, and optional upload bindings to the service's `/async` resource.
    /// Uploads go inline as VOTable multipart parts referenced through the
    /// `UPLOAD` parameter.
    ///
    /// # Errors
    ///
    /// Network, authentication, and HTTP errors propagate unchanged;
    /// [`TapError::Protocol`] is returned when the server's job document
    /// cannot be interpreted.
    pub async fn submit(
        session: &'a TapSession,
        query: &str,
        options: &QueryOptions,
    ) -> Result<AsyncJob<'a>, TapError> {
        let url = format!("{}/async", session.base_url());
        let request = session.client().post(&url);

        let sent = if options.uploads.is_empty() {
            let mut form: Vec<(&str, String)> = vec![
                ("REQUEST", "doQuery".to_string()),
                ("LANG", options.language.clone()),
                ("QUERY", query.to_string()),
            ];
            if let Some(max) = options.max_records {
                form.push(("MAXREC", max.to_string()));
            }
            request.form(&form).send().await
        } else {
            let mut form = multipart::Form::new()
                .text("REQUEST", "doQuery")
                .text("LANG", options.language.clone())
                .text("QUERY", query.to_string());
            if let Some(max) = options.max_records {
                form = form.text("MAXREC", max.to_string());
            }
            let bindings = options
                .uploads
                .iter()
                .map(|(name, _)| format!("{name},param:{name}"))
                .collect::<Vec<_>>()
                .join(";");
            form = form.text("UPLOAD", bindings);
            for (name, table) in &options.uploads {
                let part = multipart::Part::text(table.to_votable())
                    .file_name(format!("{name}.xml"))
                    .mime_str("application/x-votable+xml")
                    .map_err(|e| {
                        TapError::protocol(format!("cannot encode upload '{name}': {e}"))
                    })?;
                form = form.part(name.clone(), part);
            }
            request.multipart(form).send().await
        };

        let response = ensure_success(sent.map_err(|e| TapError::network(&url, e))?)?;
        let body = response
            .text()
            .await
            .map_err(|e| TapError::network(&url, e))?;
        let document = UwsJobDocument::parse(&body)?;
        debug!(job_id = %document.job_id, phase = %document.phase, "job submitted");

        Ok(AsyncJob {
            session,
            url: format!("{}/async/{}", session.base_url(), document.job_id),
            phase: document.phase,
        })
    }

    /// URL of the job resource on the server.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Last phase observed by this client.
    #[must_use]
    pub fn phase(&self) -> &JobPhase {
        &self.phase
    }

    /// Instructs the server to start executing the job (`PHASE=RUN`).
    ///
    /// # Errors
    ///
    /// Network and HTTP errors propagate unchanged.
    pub async fn run(&self) -> Result<(), TapError> {
        let url = format!("{}/phase", self.url);
        let response = self
            .session
            .client()
            .post(&url)
            .form(&[("PHASE", "RUN")])
            .send()
            .await
            .map_err(|e| TapError::network(&url, e))?;
        ensure_success(response)?;
        Ok(())
    }

    /// Blocks until the server reports a terminal phase.
    ///
    /// Polls the job's `/phase` resource, starting at 1 s between polls and
    /// doubling up to 60 s. There is no client-side timeout.
    ///
    /// # Errors
    ///
    /// Network and HTTP errors during polling propagate unchanged.
    pub async fn wait(&mut self) -> Result<JobPhase, TapError> {
        let mut interval = POLL_INTERVAL_START;
        loop {
            let phase = self.fetch_phase().await?;
            self.phase = phase.clone();
            if phase.is_terminal() {
                return Ok(phase);
            }
            debug!(phase = %phase, "job not terminal, polling again");
            sleep(interval).await;
            interval = (interval * 2).min(POLL_INTERVAL_CAP);
        }
    }

    /// Fetches the current phase from the server.
    async fn fetch_phase(&self) -> Result<JobPhase, TapError> {
        let url = format!("{}/phase", self.url);
        let response = self
            .session
            .client()
            .get(&url)
            .send()
            .await
            .map_err(|e| TapError::network(&url, e))?;
        let body = ensure_success(response)?
            .text()
            .await
            .map_err(|e| TapError::network(&url, e))?;
        Ok(JobPhase::parse(body.trim()))
    }

    /// Retrieves the server-reported error detail for a failed job.
    ///
    /// The server answers with either plain text or a VOTable error document;
    /// in the latter case the message is pulled from its `INFO` element. If
    /// the error resource itself cannot be read, a generic phase-based detail
    /// is returned instead of masking the job failure.
    pub async fn error_detail(&self) -> String {
        let url = format!("{}/error", self.url);
        let body = match self.session.client().get(&url).send().await {
            Ok(response) if response.status().is_success() => response.text().await.ok(),
            _ => None,
        };
        body.and_then(|body| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(
                    extract_votable_message(trimmed).unwrap_or_else(|| trimmed.to_string()),
                )
            }
        })
        .unwrap_or_else(|| format!("job terminated in phase {}", self.phase))
    }

    /// Fetches and parses the result table of a completed job.
    ///
    /// # Errors
    ///
    /// Network and HTTP errors propagate unchanged (including the transient
    /// 500s served when results are touched too early); [`TapError::Protocol`]
    /// is returned for an unparseable payload.
    pub async fn fetch_result(&self) -> Result<Table, TapError> {
        let url = format!("{}/results/result", self.url);
        let response = self
            .session
            .client()
            .get(&url)
            .send()
            .await
            .map_err(|e| TapError::network(&url, e))?;
        let body = ensure_success(response)?
            .text()
            .await
            .map_err(|e| TapError::network(&url, e))?;
        Table::from_votable(&body)
    }

    /// Deletes the job resource on the server.
    ///
    /// # Errors
    ///
    /// Network and HTTP errors propagate unchanged.
    pub async fn delete(self) -> Result<(), TapError> {
        let response = self
            .session
            .client()
            .delete(&self.url)
            .send()
            .await
            .map_err(|e| TapError::network(&self.url, e))?;
        ensure_success(response)?;
        debug!(job = %self.url, "job deleted");
        Ok(())
    }
}

impl TapSession {
    /// Runs an ADQL query through the asynchronous job protocol and returns
    /// the result table.
    ///
    /// Equivalent to [`run_async_with`](Self::run_async_with) with default
    /// [`QueryOptions`]. The call is synchronous from the caller's point of
    /// view; "async" refers to the server-side job.
    ///
    /// # Errors
    ///
    /// See [`run_async_with`](Self::run_async_with).
    pub async fn run_async(&self, query: &str) -> Result<Table, TapError> {
        self.run_async_with(query, &QueryOptions::default()).await
    }

    /// Runs a query with explicit language, record cap, and upload bindings.
    ///
    /// Drives the full job lifecycle: submit, start, wait for a terminal
    /// phase, pause for the configured result delay, then either fetch the
    /// result and delete the job (success) or surface the server's error
    /// detail (failure, job left in place).
    ///
    /// # Errors
    ///
    /// - [`TapError::Network`] / [`TapError::Status`] for transport failures
    ///   at any protocol step, propagated without retry;
    /// - [`TapError::Job`] when the server reports the job failed;
    /// - [`TapError::Protocol`] for responses this client cannot interpret.
    #[instrument(skip(self, query, options), fields(lang = %options.language))]
    pub async fn run_async_with(
        &self,
        query: &str,
        options: &QueryOptions,
    ) -> Result<Table, TapError> {
        let mut job = AsyncJob::submit(self, query, options).await?;
        job.run().await?;
        let phase = job.wait().await?;

        // The archive can report COMPLETED slightly before results are
        // readable; touching the job immediately yields spurious 500s.
        // TODO: replace the fixed pause with a readiness probe if the service
        // ever exposes one.
        sleep(self.result_delay()).await;

        if phase == JobPhase::Completed {
            let table = job.fetch_result().await?;
            job.delete().await?;
            info!(rows = table.n_rows(), "query complete");
            Ok(table)
        } else {
            // Failed jobs are left on the server; only completed jobs are
            // deleted after their result is fetched.
            Err(TapError::job(job.error_detail().await))
        }
    }
}

/// Rejects non-2xx responses with a status error.
fn ensure_success(response: Response) -> Result<Response, TapError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(TapError::status(response.url().as_str(), status.as_u16()))
    }
}

/// The fields of a UWS job document this client needs.
struct UwsJobDocument {
    job_id: String,
    phase: JobPhase,
}

impl UwsJobDocument {
    /// Pulls `jobId` and `phase` out of a UWS job document.
    fn parse(xml: &str) -> Result<Self, TapError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut job_id: Option<String> = None;
        let mut phase: Option<JobPhase> = None;
        let mut current: Option<Vec<u8>> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| TapError::protocol(format!("malformed job document: {e}")))?;
            match event {
                Event::Start(ref e) => current = Some(e.local_name().as_ref().to_vec()),
                Event::Text(ref t) => {
                    let text = t
                        .unescape()
                        .map_err(|e| TapError::protocol(format!("malformed job document: {e}")))?;
                    match current.as_deref() {
                        Some(b"jobId") => job_id = Some(text.trim().to_string()),
                        Some(b"phase") => phase = Some(JobPhase::parse(text.trim())),
                        _ => {}
                    }
                }
                Event::End(_) => current = None,
                Event::Eof => break,
                _ => {}
            }
        }

        let job_id =
            job_id.ok_or_else(|| TapError::protocol("job document carries no jobId"))?;
        Ok(Self {
            job_id,
            phase: phase.unwrap_or(JobPhase::Unknown(String::new())),
        })
    }
}

/// Extracts the message from a VOTable error document's `INFO` element.
fn extract_votable_message(body: &str) -> Option<String> {
    if !body.starts_with('<') {
        return None;
    }
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut in_info = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"INFO" => in_info = true,
            Ok(Event::Text(ref t)) if in_info => {
                if let Ok(text) = t.unescape() {
                    let text = text.trim().to_string();
                    if !text.is_empty() {
                        return Some(text);
                    }
                }
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"INFO" => in_info = false,
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_parse_known_values() {
        assert_eq!(JobPhase::parse("PENDING"), JobPhase::Pending);
        assert_eq!(JobPhase::parse("EXECUTING"), JobPhase::Executing);
        assert_eq!(JobPhase::parse("COMPLETED"), JobPhase::Completed);
        assert_eq!(JobPhase::parse("ERROR"), JobPhase::Error);
        assert_eq!(JobPhase::parse("ABORTED"), JobPhase::Aborted);
    }

    #[test]
    fn test_phase_parse_unknown_value_is_preserved() {
        let phase = JobPhase::parse("ARCHIVED");
        assert_eq!(phase, JobPhase::Unknown("ARCHIVED".to_string()));
        assert_eq!(phase.to_string(), "ARCHIVED");
    }

    #[test]
    fn test_terminal_phases() {
        assert!(JobPhase::Completed.is_terminal());
        assert!(JobPhase::Error.is_terminal());
        assert!(JobPhase::Aborted.is_terminal());
        assert!(!JobPhase::Pending.is_terminal());
        assert!(!JobPhase::Executing.is_terminal());
        assert!(!JobPhase::Unknown("ARCHIVED".to_string()).is_terminal());
    }

    #[test]
    fn test_uws_job_document_parse() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <uws:job xmlns:uws="http://www.ivoa.net/xml/UWS/v1.0">
              <uws:jobId>1481-1748-4163</uws:jobId>
              <uws:phase>PENDING</uws:phase>
              <uws:quote xsi:nil="true" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"/>
            </uws:job>"#;
        let doc = UwsJobDocument::parse(xml).unwrap();
        assert_eq!(doc.job_id, "1481-1748-4163");
        assert_eq!(doc.phase, JobPhase::Pending);
    }

    #[test]
    fn test_uws_job_document_without_job_id_is_an_error() {
        let xml = "<uws:job xmlns:uws=\"http://www.ivoa.net/xml/UWS/v1.0\"></uws:job>";
        let result = UwsJobDocument::parse(xml);
        assert!(matches!(result, Err(TapError::Protocol { .. })));
    }

    #[test]
    fn test_extract_votable_message() {
        let body = r#"<VOTABLE><RESOURCE type="results">
            <INFO name="QUERY_STATUS" value="ERROR">ADQL syntax error near 'FRM'</INFO>
            </RESOURCE></VOTABLE>"#;
        assert_eq!(
            extract_votable_message(body).as_deref(),
            Some("ADQL syntax error near 'FRM'")
        );
    }

    #[test]
    fn test_extract_votable_message_plain_text_passthrough() {
        assert_eq!(extract_votable_message("query failed"), None);
    }

    #[test]
    fn test_default_query_options() {
        let options = QueryOptions::default();
        assert_eq!(options.language, "ADQL");
        assert_eq!(options.max_records, None);
        assert!(options.uploads.is_empty());
    }
}
