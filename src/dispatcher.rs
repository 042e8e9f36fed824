//! Query-mode selection and result classification.
//!
//! ## 分派流程
//!
//! ```text
//! SearchRequest (immutable)
//!   ├─ QueryMode::select()
//!   │    ├─ prompt present            → PromptDriven
//!   │    ├─ conditions, no prompt     → ConditionsOnly
//!   │    └─ neither                   → Idle (no query)
//!   ├─ plan() → QueryParams (conditions / prompt / page / pageSize)
//!   ├─ SearchBackend::search()
//!   └─ classify() → SearchOutcome
//!        ├─ Results(ResultEnvelope)
//!        ├─ NoResults      (empty page, 404, "no companies found")
//!        └─ Failed         (any other failure, raw message kept)
//! ```
//!
//! [`ResultCache`] holds the single "current result set" and discards
//! responses to superseded requests.

use serde_json::Value;

use crate::combiner::{combine, to_param};
use crate::condition::ConditionSet;
use crate::error::{QueryError, QueryResult};
use crate::pagination::{ResultEnvelope, DEFAULT_PAGE, DEFAULT_PAGE_SIZE};

/// Backend messages that mean "nothing matched" rather than failure.
const NO_RESULTS_MARKERS: [&str; 2] = ["no companies found", "matching your conditions"];

/// One user interaction's query inputs. Every change produces a new request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    conditions: ConditionSet,
    prompt: String,
    page: u32,
    page_size: u32,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl SearchRequest {
    pub fn new(page_size: u32) -> Self {
        Self {
            conditions: ConditionSet::new(),
            prompt: String::new(),
            page: DEFAULT_PAGE,
            page_size: page_size.max(1),
        }
    }

    /// Replace the conditions; the page resets to 1.
    pub fn with_conditions(&self, conditions: ConditionSet) -> Self {
        Self {
            conditions,
            page: DEFAULT_PAGE,
            ..self.clone()
        }
    }

    /// Replace the prompt; the page resets to 1.
    pub fn with_prompt(&self, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            page: DEFAULT_PAGE,
            ..self.clone()
        }
    }

    /// Move to another page, keeping filters and prompt.
    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page: page.max(1),
            ..self.clone()
        }
    }

    pub fn conditions(&self) -> &ConditionSet {
        &self.conditions
    }

    /// The prompt with surrounding whitespace removed.
    pub fn prompt(&self) -> &str {
        self.prompt.trim()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }
}

/// Which query a request issues. Recomputed for every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Idle,
    ConditionsOnly,
    PromptDriven,
}

impl QueryMode {
    /// A prompt takes precedence over plain conditions.
    pub fn select(request: &SearchRequest) -> Self {
        if !request.prompt().is_empty() {
            QueryMode::PromptDriven
        } else if !request.conditions().is_empty() {
            QueryMode::ConditionsOnly
        } else {
            QueryMode::Idle
        }
    }
}

/// Request parameters sent to the search backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub mode: QueryMode,
    /// JSON array of conditions.
    pub conditions: Option<String>,
    pub prompt: Option<String>,
    pub page: u32,
    pub page_size: u32,
}

impl QueryParams {
    /// `(name, value)` pairs in transport order.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(4);
        if let Some(conditions) = &self.conditions {
            pairs.push(("conditions", conditions.clone()));
        }
        if let Some(prompt) = &self.prompt {
            pairs.push(("prompt", prompt.clone()));
        }
        pairs.push(("page", self.page.to_string()));
        pairs.push(("pageSize", self.page_size.to_string()));
        pairs
    }
}

/// Build the backend parameters for a request; `None` when idle.
///
/// With both a prompt and conditions, the prompt travels only inside the
/// combined condition set as an `ai.search` condition.
pub fn plan(request: &SearchRequest) -> QueryResult<Option<QueryParams>> {
    let mode = QueryMode::select(request);
    let (conditions, prompt) = match mode {
        QueryMode::Idle => return Ok(None),
        QueryMode::ConditionsOnly => (Some(to_param(request.conditions())?), None),
        QueryMode::PromptDriven if request.conditions().is_empty() => {
            (None, Some(request.prompt().to_string()))
        }
        QueryMode::PromptDriven => {
            let combined = combine(request.conditions(), request.prompt());
            (Some(to_param(&combined)?), None)
        }
    };

    Ok(Some(QueryParams {
        mode,
        conditions,
        prompt,
        page: request.page(),
        page_size: request.page_size(),
    }))
}

/// Raw response of a search backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse {
    pub status: u16,
    pub body: Value,
}

/// The search backend collaborator.
pub trait SearchBackend {
    /// Issue one query. `Err` is a transport failure (no usable response).
    fn search(&self, params: &QueryParams) -> QueryResult<BackendResponse>;
}

/// What a consumer renders for the current request.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SearchOutcome {
    /// No prompt and no conditions: no search is active.
    #[default]
    Inactive,
    /// The backend found nothing. Not a failure.
    NoResults,
    Results(ResultEnvelope),
    Failed { message: String },
}

impl SearchOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, SearchOutcome::Failed { .. })
    }
}

/// Classify a backend response into an outcome.
pub fn classify(response: &BackendResponse) -> SearchOutcome {
    if (200..300).contains(&response.status) {
        // Records win over any message text on a successful response.
        let envelope = ResultEnvelope::from_value(&response.body);
        if envelope.records.is_empty() {
            return SearchOutcome::NoResults;
        }
        return SearchOutcome::Results(envelope);
    }

    let message = response_message(&response.body);
    let says_no_results = message.as_deref().is_some_and(is_no_results_message);
    if response.status == 404 || says_no_results {
        SearchOutcome::NoResults
    } else {
        let message = message
            .unwrap_or_else(|| format!("Request failed with status {}", response.status));
        log::warn!("search failed with status {}: {}", response.status, message);
        SearchOutcome::Failed { message }
    }
}

fn response_message(body: &Value) -> Option<String> {
    match body {
        Value::String(s) => Some(s.clone()),
        Value::Object(fields) => ["error", "message"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}

fn is_no_results_message(message: &str) -> bool {
    let message = message.to_lowercase();
    NO_RESULTS_MARKERS.iter().any(|marker| message.contains(marker))
}

/// Issues requests through a [`SearchBackend`] in the mode each request calls for.
pub struct Dispatcher<B> {
    backend: B,
}

impl<B: SearchBackend> Dispatcher<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn dispatch(&self, request: &SearchRequest) -> SearchOutcome {
        let params = match plan(request) {
            Ok(Some(params)) => params,
            Ok(None) => return SearchOutcome::Inactive,
            Err(e) => return SearchOutcome::Failed { message: e.to_string() },
        };
        log::debug!("dispatching {:?} query for page {}", params.mode, params.page);

        match self.backend.search(&params) {
            Ok(response) => classify(&response),
            Err(QueryError::Transport(message)) => {
                log::warn!("search transport failure: {}", message);
                SearchOutcome::Failed { message }
            }
            Err(e) => SearchOutcome::Failed { message: e.to_string() },
        }
    }

    /// Run `request` and store its outcome in `cache`.
    pub fn refresh(&self, cache: &mut ResultCache, request: &SearchRequest) -> bool {
        let ticket = cache.begin(request);
        let outcome = self.dispatch(request);
        cache.complete(ticket, outcome)
    }
}

/// Identifies one issued request. Only the latest ticket may complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// The single current result set, last request wins.
#[derive(Debug, Default)]
pub struct ResultCache {
    generation: u64,
    in_flight: Option<(SearchRequest, Ticket)>,
    current_request: Option<SearchRequest>,
    current: SearchOutcome,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request about to be issued. An identical request already
    /// in flight shares its ticket instead of superseding it.
    pub fn begin(&mut self, request: &SearchRequest) -> Ticket {
        if let Some((pending, ticket)) = &self.in_flight {
            if pending == request {
                return *ticket;
            }
        }
        self.generation += 1;
        let ticket = Ticket(self.generation);
        self.in_flight = Some((request.clone(), ticket));
        ticket
    }

    /// Store an outcome. Returns `false` and discards it when a newer
    /// request has been issued since `ticket`.
    pub fn complete(&mut self, ticket: Ticket, outcome: SearchOutcome) -> bool {
        if ticket != Ticket(self.generation) {
            log::debug!("discarding superseded response {:?}", ticket);
            return false;
        }
        if let Some((request, _)) = self.in_flight.take() {
            self.current_request = Some(request);
        }
        self.current = outcome;
        true
    }

    pub fn current(&self) -> &SearchOutcome {
        &self.current
    }

    pub fn current_request(&self) -> Option<&SearchRequest> {
        self.current_request.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }
}
