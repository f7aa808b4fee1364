//! Remote multi-turn workflow client.
//!
//! Content that is not handled by the local rule engine is reviewed by a
//! remote Dify-style workflow, one POST per segment. Each response returns a
//! conversation id that the next request must carry, so segments are sent
//! strictly sequentially; there is no per-segment retry and no mid-sequence
//! cancellation — the first failure aborts the remaining segments.

use std::time::Duration;

use serde_json::{json, Value as Json};
use tracing::debug;

use crate::error::ReviewError;
use crate::models::{Issue, Segment, Selection};
use crate::normalize::issues_from_value;

/// Immutable remote endpoint settings, constructed once from configuration
/// and passed into the client.
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    /// Full workflow endpoint URL.
    pub endpoint: String,
    /// Bearer token for the workflow API.
    pub api_key: String,
    /// Stable user identifier forwarded with every call.
    pub user: String,
    /// Dify response mode; the pipeline only supports `blocking`.
    pub response_mode: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl RemoteSettings {
    /// Reject unusable settings before any call is made.
    pub fn validate(&self) -> Result<(), ReviewError> {
        if self.endpoint.trim().is_empty() {
            return Err(ReviewError::Configuration(
                "remote workflow endpoint is not configured".to_string(),
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(ReviewError::Configuration(
                "remote workflow API key is not configured".to_string(),
            ));
        }
        Ok(())
    }
}

/// Conversation state of one review exchange. The first response
/// establishes the session; every later response may rotate the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Fresh,
    Established(String),
}

impl Session {
    /// Token to send with the next request; empty while fresh.
    pub fn conversation_id(&self) -> &str {
        match self {
            Session::Fresh => "",
            Session::Established(id) => id,
        }
    }

    /// Adopt the token returned by a response. Empty ids leave the state
    /// unchanged.
    pub fn advance(&mut self, id: Option<&str>) {
        if let Some(id) = id.map(str::trim).filter(|s| !s.is_empty()) {
            *self = Session::Established(id.to_string());
        }
    }
}

/// Human-readable descriptor of a selection, used in the prompt and in the
/// request inputs.
pub fn selection_label(selection: &Selection) -> String {
    if selection.start_line == selection.end_line {
        format!("第 {} 行", selection.start_line)
    } else {
        format!("第 {} 行至第 {} 行", selection.start_line, selection.end_line)
    }
}

/// Render the review prompt for one segment: a fixed bilingual instruction
/// header, the chunk position, the optional selection descriptor, and the
/// segment embedded verbatim in a fenced block.
pub fn render_prompt(segment: &Segment, selection: Option<&Selection>) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "你是一名資深的資料庫與 SQL 審查專家。請審查以下內容，指出命名規範、安全性與效能問題，\
         並以 JSON 物件 {\"summary\": ..., \"issues\": [...]} 回覆；每個 issue 需包含 rule_id、\
         severity、message、line 欄位。\n",
    );
    prompt.push_str(
        "You are a senior database reviewer. Review the fragment below and reply with a single \
         JSON object {\"summary\", \"issues\"}; each issue carries rule_id, severity, message \
         and line.\n",
    );
    prompt.push_str(&format!("（第 {}/{} 段）\n", segment.index, segment.total));
    if let Some(selection) = selection {
        prompt.push_str(&format!("（選取範圍：{}）\n", selection_label(selection)));
    }
    prompt.push_str("```sql\n");
    prompt.push_str(&segment.text);
    if !segment.text.ends_with('\n') {
        prompt.push('\n');
    }
    prompt.push_str("```");
    prompt
}

/// Build the per-segment request body. An empty `user` falls back to the
/// configured one.
#[allow(clippy::too_many_arguments)]
fn request_body(
    settings: &RemoteSettings,
    session: &Session,
    project_name: &str,
    file_path: &str,
    user: &str,
    segment: &Segment,
    selection: Option<&Selection>,
) -> Json {
    let mut inputs = json!({
        "project_name": project_name,
        "file_path": file_path,
        "chunk_index": segment.index,
        "chunk_total": segment.total,
    });
    if let (Some(selection), Some(map)) = (selection, inputs.as_object_mut()) {
        map.insert("selection_start_line".to_string(), json!(selection.start_line));
        map.insert("selection_end_line".to_string(), json!(selection.end_line));
        if let Some(col) = selection.start_column {
            map.insert("selection_start_column".to_string(), json!(col));
        }
        if let Some(col) = selection.end_column {
            map.insert("selection_end_column".to_string(), json!(col));
        }
        map.insert(
            "selection_line_count".to_string(),
            json!(selection.end_line.saturating_sub(selection.start_line) + 1),
        );
        map.insert(
            "selection_label".to_string(),
            json!(selection_label(selection)),
        );
    }
    let user = if user.trim().is_empty() {
        settings.user.as_str()
    } else {
        user
    };
    json!({
        "inputs": inputs,
        "query": render_prompt(segment, selection),
        "response_mode": settings.response_mode,
        "conversation_id": session.conversation_id(),
        "user": user,
        "files": [],
    })
}

/// Structured view of one answer: issues when the answer parsed as JSON,
/// otherwise the raw text kept as an unstructured report.
#[derive(Debug, Clone)]
pub struct SegmentAnswer {
    pub answer: String,
    pub issues: Vec<Issue>,
    pub structured: bool,
}

/// Strip a surrounding markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let body = match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        None => return trimmed,
    };
    body.trim_end().trim_end_matches("```").trim_end()
}

/// Parse a workflow answer. Unparseable answers degrade to an unstructured
/// report (text kept, zero structured issues) rather than failing.
pub fn parse_answer(answer: &str) -> SegmentAnswer {
    let body = strip_code_fence(answer);
    match serde_json::from_str::<Json>(body) {
        Ok(value) => SegmentAnswer {
            answer: answer.to_string(),
            issues: issues_from_value(&value),
            structured: true,
        },
        Err(_) => SegmentAnswer {
            answer: answer.to_string(),
            issues: Vec::new(),
            structured: false,
        },
    }
}

/// Result of reviewing all segments of one request.
#[derive(Debug, Clone, Default)]
pub struct WorkflowOutcome {
    /// Conversation id of the exchange, once established.
    pub conversation_id: Option<String>,
    /// Issues parsed across all structured answers, in segment order.
    pub issues: Vec<Issue>,
    /// Raw answer per segment, in segment order.
    pub answers: Vec<String>,
    /// Number of segments sent.
    pub segments: usize,
}

/// Blocking workflow client.
pub struct WorkflowClient {
    settings: RemoteSettings,
    http: reqwest::blocking::Client,
}

impl WorkflowClient {
    pub fn new(settings: RemoteSettings) -> Result<Self, ReviewError> {
        settings.validate()?;
        let http = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ReviewError::Network {
                reason: e.to_string(),
                hint: "HTTP client could not be constructed".to_string(),
            })?;
        Ok(Self { settings, http })
    }

    /// Review all segments sequentially, carrying the conversation token
    /// forward. The first failure aborts the remaining segments.
    pub fn review_segments(
        &self,
        project_name: &str,
        file_path: &str,
        user: &str,
        selection: Option<&Selection>,
        segments: &[Segment],
    ) -> Result<WorkflowOutcome, ReviewError> {
        let mut session = Session::Fresh;
        let mut outcome = WorkflowOutcome::default();
        for segment in segments {
            debug!(
                index = segment.index,
                total = segment.total,
                conversation = session.conversation_id(),
                "sending segment to remote workflow"
            );
            let (conversation_id, answer) =
                self.call_segment(&session, project_name, file_path, user, segment, selection)?;
            session.advance(conversation_id.as_deref());
            let parsed = parse_answer(&answer);
            if !parsed.structured {
                debug!(index = segment.index, "answer was not structured JSON; keeping text");
            }
            outcome.issues.extend(parsed.issues);
            outcome.answers.push(parsed.answer);
            outcome.segments += 1;
        }
        if let Session::Established(id) = session {
            outcome.conversation_id = Some(id);
        }
        Ok(outcome)
    }

    /// One POST. Returns the conversation id and answer text.
    #[allow(clippy::too_many_arguments)]
    fn call_segment(
        &self,
        session: &Session,
        project_name: &str,
        file_path: &str,
        user: &str,
        segment: &Segment,
        selection: Option<&Selection>,
    ) -> Result<(Option<String>, String), ReviewError> {
        let body = request_body(
            &self.settings,
            session,
            project_name,
            file_path,
            user,
            segment,
            selection,
        );
        let response = self
            .http
            .post(&self.settings.endpoint)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .map_err(|e| ReviewError::Network {
                reason: e.to_string(),
                hint: format!(
                    "無法連接遠端工作流端點，請確認網路與端點設定（{}）",
                    self.settings.endpoint
                ),
            })?;

        let status = response.status();
        let text = response.text().unwrap_or_default();
        if !status.is_success() {
            return Err(ReviewError::RemoteRejection {
                status: status.as_u16(),
                body: text,
            });
        }

        // envelope parse failure degrades to treating the body as the answer
        match serde_json::from_str::<Json>(&text) {
            Ok(envelope) => {
                let conversation_id = envelope
                    .get("conversation_id")
                    .and_then(Json::as_str)
                    .map(str::to_string);
                let answer = envelope
                    .get("answer")
                    .and_then(Json::as_str)
                    .map(str::to_string)
                    .unwrap_or(text);
                Ok((conversation_id, answer))
            }
            Err(_) => Ok((None, text)),
        }
    }
}
