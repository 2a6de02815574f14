//! FAQ retrieval by vector similarity.
//!
//! The user's text is embedded and matched inside the warehouse with
//! `VECTOR_SEARCH` over `ML.GENERATE_EMBEDDING`. The text travels as a named
//! query parameter; only configuration-provided identifiers are formatted
//! into the SQL, and those are checked against a strict charset first.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::errors::LookupError;
use crate::http::send_json;
use crate::outcome::LookupOutcome;

/// Context returned when the search produced nothing usable
pub const NO_RELEVANT_INFORMATION: &str = "No relevant information found.";
pub const DEFAULT_BIGQUERY_BASE: &str = "https://bigquery.googleapis.com/bigquery/v2";
pub const DEFAULT_TOP_K: usize = 5;
pub const QUERY_PARAMETER: &str = "user_query";
/// How long a search waits on a slow query job before giving up
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(60);

const ROW_SEPARATOR_WIDTH: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaqRow {
    pub question: String,
    pub answer: String,
}

/// Nearest-neighbour search over the FAQ embeddings
#[async_trait]
pub trait FaqIndex: Send + Sync {
    async fn search(&self, text: &str) -> LookupOutcome<Vec<FaqRow>>;
}

/// Turns FAQ search hits into a context blob for the model
#[derive(Clone)]
pub struct FaqRetriever {
    index: Arc<dyn FaqIndex>,
}

impl FaqRetriever {
    pub fn new(index: Arc<dyn FaqIndex>) -> Self {
        Self { index }
    }

    /// Search for `text` and render the hits; never returns an empty string
    pub async fn query(&self, text: &str) -> String {
        match self.index.search(text).await.log_failure("faq") {
            Some(rows) if !rows.is_empty() => {
                debug!(rows = rows.len(), "FAQ search returned rows");
                render_context(&rows)
            }
            _ => NO_RELEVANT_INFORMATION.to_string(),
        }
    }
}

/// `question\nanswer` followed by a dashed separator, for each row in order
pub fn render_context(rows: &[FaqRow]) -> String {
    let separator = "-".repeat(ROW_SEPARATOR_WIDTH);
    rows.iter()
        .map(|row| format!("{}\n{}{}", row.question, row.answer, separator))
        .collect()
}

/// Where the embeddings live and how the search is tuned
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSearchTable {
    pub project: String,
    pub dataset: String,
    pub embedding_table: String,
    pub embedding_model: String,
    pub top_k: usize,
    pub fraction_lists_to_search: f64,
}

fn is_identifier(value: &str, allow_dash: bool) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || (allow_dash && c == '-'))
}

impl VectorSearchTable {
    /// Reject identifiers that could not be safely placed inside backticks
    pub fn validate(&self) -> Result<(), LookupError> {
        if !is_identifier(&self.project, true) {
            return Err(LookupError::InvalidConfig(format!(
                "invalid project id: {:?}",
                self.project
            )));
        }
        for (label, value) in [
            ("dataset", &self.dataset),
            ("embedding table", &self.embedding_table),
            ("embedding model", &self.embedding_model),
        ] {
            if !is_identifier(value, false) {
                return Err(LookupError::InvalidConfig(format!(
                    "invalid {}: {:?}",
                    label, value
                )));
            }
        }
        if self.top_k == 0 {
            return Err(LookupError::InvalidConfig(
                "top_k must be at least 1".to_string(),
            ));
        }
        if !(self.fraction_lists_to_search > 0.0 && self.fraction_lists_to_search <= 1.0) {
            return Err(LookupError::InvalidConfig(format!(
                "fraction_lists_to_search must be in (0, 1], got {}",
                self.fraction_lists_to_search
            )));
        }
        Ok(())
    }

    fn qualified(&self, name: &str) -> String {
        format!("{}.{}.{}", self.project, self.dataset, name)
    }

    /// Similarity query with the user text bound as `@user_query`
    pub fn sql(&self) -> String {
        format!(
            r#"SELECT base.question, base.answer
FROM VECTOR_SEARCH(
  TABLE `{table}`,
  'ml_generate_embedding_result',
  (
    SELECT ml_generate_embedding_result, content AS query
    FROM ML.GENERATE_EMBEDDING(
      MODEL `{model}`,
      (SELECT @{param} AS content))
  ),
  top_k => {top_k},
  options => '{{"fraction_lists_to_search": {fraction}}}'
)"#,
            table = self.qualified(&self.embedding_table),
            model = self.qualified(&self.embedding_model),
            param = QUERY_PARAMETER,
            top_k = self.top_k,
            fraction = self.fraction_lists_to_search,
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    pub use_legacy_sql: bool,
    pub parameter_mode: &'static str,
    pub query_parameters: Vec<QueryParameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameter {
    pub name: String,
    pub parameter_type: ParameterType,
    pub parameter_value: ParameterValue,
}

#[derive(Debug, Serialize)]
pub struct ParameterType {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ParameterValue {
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(default)]
    pub job_complete: Option<bool>,
    #[serde(default)]
    pub job_reference: Option<JobReference>,
    #[serde(default)]
    pub schema: Option<TableSchema>,
    #[serde(default)]
    pub rows: Option<Vec<TableRow>>,
}

/// Identifies a query job that is still running
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    pub project_id: String,
    pub job_id: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TableSchema {
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
pub struct FieldSchema {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct TableRow {
    #[serde(default)]
    pub f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
pub struct TableCell {
    #[serde(default)]
    pub v: Value,
}

impl QueryResponse {
    pub fn is_complete(&self) -> bool {
        self.job_complete != Some(false)
    }

    /// Decode `{question, answer}` rows, locating columns through the schema
    pub fn into_rows(self) -> Result<Vec<FaqRow>, LookupError> {
        if !self.is_complete() {
            return Err(LookupError::Incomplete(
                "query job did not finish within the request timeout".to_string(),
            ));
        }

        let rows = match self.rows {
            Some(rows) if !rows.is_empty() => rows,
            _ => return Ok(Vec::new()),
        };

        let schema = self
            .schema
            .ok_or_else(|| LookupError::malformed("rows returned without a schema"))?;
        let column = |name: &str| {
            schema
                .fields
                .iter()
                .position(|f| f.name == name)
                .ok_or_else(|| LookupError::malformed(format!("missing column {}", name)))
        };
        let question_idx = column("question")?;
        let answer_idx = column("answer")?;

        let cell_text = |row: &TableRow, idx: usize| -> String {
            match row.f.get(idx).map(|cell| &cell.v) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            }
        };

        Ok(rows
            .iter()
            .map(|row| FaqRow {
                question: cell_text(row, question_idx),
                answer: cell_text(row, answer_idx),
            })
            .collect())
    }
}

/// FAQ index backed by BigQuery's `jobs.query` REST endpoint
#[derive(Debug, Clone)]
pub struct BigQueryFaqIndex {
    client: Client,
    base_url: String,
    access_token: Option<String>,
    table: VectorSearchTable,
    timeout_ms: Option<u64>,
    max_wait: Duration,
}

impl BigQueryFaqIndex {
    pub fn new(client: Client, table: VectorSearchTable) -> Result<Self, LookupError> {
        table.validate()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BIGQUERY_BASE.to_string(),
            access_token: None,
            table,
            timeout_ms: Some(10_000),
            max_wait: DEFAULT_MAX_WAIT,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Upper bound on polling a query job that has not finished
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn build_request(&self, text: &str) -> QueryRequest {
        QueryRequest {
            query: self.table.sql(),
            use_legacy_sql: false,
            parameter_mode: "NAMED",
            query_parameters: vec![QueryParameter {
                name: QUERY_PARAMETER.to_string(),
                parameter_type: ParameterType { kind: "STRING" },
                parameter_value: ParameterValue {
                    value: text.to_string(),
                },
            }],
            timeout_ms: self.timeout_ms,
        }
    }

    fn queries_url(&self) -> String {
        format!("{}/projects/{}/queries", self.base_url, self.table.project)
    }

    fn query_results_url(&self, job: &JobReference) -> String {
        format!(
            "{}/projects/{}/queries/{}",
            self.base_url, job.project_id, job.job_id
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Start the query and poll `getQueryResults` until the job finishes or
    /// `max_wait` runs out
    async fn run_query(&self, text: &str) -> Result<Vec<FaqRow>, LookupError> {
        let request = self
            .client
            .post(self.queries_url())
            .json(&self.build_request(text));
        let mut body: QueryResponse = send_json(self.authorized(request)).await?;

        let deadline = Instant::now() + self.max_wait;
        let mut job: Option<JobReference> = None;
        while !body.is_complete() {
            if let Some(reference) = body.job_reference.take() {
                job = Some(reference);
            }
            let current = job.as_ref().ok_or_else(|| {
                LookupError::Incomplete("unfinished query job without a job reference".to_string())
            })?;
            if Instant::now() >= deadline {
                return Err(LookupError::Incomplete(format!(
                    "query job {} did not finish within {:?}",
                    current.job_id, self.max_wait
                )));
            }

            debug!(job_id = %current.job_id, "Waiting for query job to finish");
            let mut params: Vec<(&str, String)> = Vec::new();
            if let Some(timeout_ms) = self.timeout_ms {
                params.push(("timeoutMs", timeout_ms.to_string()));
            }
            if let Some(location) = &current.location {
                params.push(("location", location.clone()));
            }
            let request = self
                .client
                .get(self.query_results_url(current))
                .query(&params);
            body = send_json(self.authorized(request)).await?;
        }

        body.into_rows()
    }
}

#[async_trait]
impl FaqIndex for BigQueryFaqIndex {
    async fn search(&self, text: &str) -> LookupOutcome<Vec<FaqRow>> {
        let result = self.run_query(text).await;
        if let Err(e) = &result {
            warn!(error = %e, "BigQuery vector search failed");
        }
        result.into()
    }
}
