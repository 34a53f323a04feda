//! HTTP client for communicating with the Caretaker API.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::config::ActorConfig;

/// Identity headers the API resolves the session from.
const ACTOR_ID_HEADER: &str = "X-Actor-Id";
const ACTOR_NAME_HEADER: &str = "X-Actor-Name";
const ACTOR_ROLE_HEADER: &str = "X-Actor-Role";

/// API client for the Caretaker server.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    actor: ActorConfig,
}

#[allow(dead_code)]
impl ApiClient {
    /// Creates a new API client presenting the given actor identity.
    pub fn new(base_url: &str, actor: ActorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            actor,
        })
    }

    /// Creates a client pointing to localhost.
    pub fn localhost(port: u16, actor: ActorConfig) -> Result<Self> {
        Self::new(&format!("http://localhost:{}", port), actor)
    }

    /// Checks if the API server is healthy.
    pub async fn health(&self) -> Result<HealthSummary> {
        self.get("/health").await
    }

    /// Lists tickets with optional filtering.
    pub async fn list_tickets(&self, params: &ListTicketsParams) -> Result<PaginatedTickets> {
        let mut url = format!("{}/api/tickets", self.base_url);
        let mut query_parts = Vec::new();

        if let Some(status) = &params.status {
            query_parts.push(format!("status={}", status));
        }
        if let Some(building) = params.building {
            query_parts.push(format!("building={}", building));
        }
        if let Some(technician) = params.technician {
            query_parts.push(format!("technician={}", technician));
        }
        if let Some(q) = &params.q {
            query_parts.push(format!("q={}", q));
        }
        if let Some(page) = params.page {
            query_parts.push(format!("page={}", page));
        }
        if let Some(per_page) = params.per_page {
            query_parts.push(format!("per_page={}", per_page));
        }

        if !query_parts.is_empty() {
            url.push('?');
            url.push_str(&query_parts.join("&"));
        }

        let response = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .context("Failed to send request")?;

        self.handle_response(response).await
    }

    /// Gets a single ticket with its history and allowed transitions.
    pub async fn get_ticket(&self, id: u64) -> Result<TicketDetail> {
        self.get(&format!("/api/tickets/{}", id)).await
    }

    /// Moves a ticket to a new status.
    pub async fn transition_ticket(
        &self,
        id: u64,
        request: &TransitionRequestBody,
    ) -> Result<TransitionOutcome> {
        self.post(&format!("/api/tickets/{}/transitions", id), request)
            .await
    }

    /// Fetches the board view for the presented actor.
    pub async fn board(&self, params: &BoardParams) -> Result<BoardData> {
        let mut url = format!("{}/api/board", self.base_url);
        let mut query_parts = Vec::new();

        if let Some(status) = &params.status {
            query_parts.push(format!("status={}", status));
        }
        if let Some(technician) = params.technician {
            query_parts.push(format!("technician={}", technician));
        }
        if let Some(building) = params.building {
            query_parts.push(format!("building={}", building));
        }

        if !query_parts.is_empty() {
            url.push('?');
            url.push_str(&query_parts.join("&"));
        }

        let response = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .context("Failed to send request")?;

        self.handle_response(response).await
    }

    /// Fetches the KPI dashboard snapshot.
    pub async fn dashboard(&self) -> Result<DashboardData> {
        self.get("/api/analytics/dashboard").await
    }

    // Helper methods

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header(ACTOR_ID_HEADER, self.actor.id.to_string())
            .header(ACTOR_NAME_HEADER, self.actor.name.clone())
            .header(ACTOR_ROLE_HEADER, self.actor.role.clone())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .context("Failed to send request")?;

        self.handle_response(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .request(reqwest::Method::POST, &url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .context("Failed to parse response body")
        } else {
            let error: ApiErrorResponse =
                response.json().await.unwrap_or_else(|_| ApiErrorResponse {
                    code: "UNKNOWN".to_string(),
                    message: "Unknown error".to_string(),
                    details: None,
                    request_id: None,
                });

            anyhow::bail!("API error ({}): {} - {}", status, error.code, error.message)
        }
    }
}

// Request/Response types (matching server DTOs)

#[derive(Debug, Default)]
pub struct ListTicketsParams {
    pub status: Option<String>,
    pub building: Option<u64>,
    pub technician: Option<u64>,
    pub q: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default)]
pub struct BoardParams {
    pub status: Option<String>,
    pub technician: Option<u64>,
    pub building: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct TransitionRequestBody {
    pub target_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub trigger: String,
}

#[allow(dead_code)]
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthSummary {
    pub status: String,
    pub version: String,
    pub store: StoreStatus,
    pub uptime_seconds: u64,
}

#[allow(dead_code)]
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreStatus {
    pub operational: bool,
    pub tickets: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedTickets {
    pub data: Vec<TicketSummary>,
    pub pagination: PaginationInfo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginationInfo {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TicketSummary {
    pub id: u64,
    pub code: String,
    pub status: String,
    pub summary: String,
    pub category: String,
    pub tenant_id: u64,
    pub tenant_name: String,
    pub technician_id: Option<u64>,
    pub device: Option<String>,
    pub building_id: u64,
    pub apartment: String,
    pub reported_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: TicketSummary,
    pub history: Vec<HistoryEntry>,
    pub allowed_transitions: Vec<AllowedTransition>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub action: String,
    pub description: String,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AllowedTransition {
    pub status: String,
    pub requires_comment: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub ticket: TicketSummary,
    pub history_entry: HistoryEntry,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BoardData {
    pub columns: Vec<BoardColumnData>,
    pub total_tickets: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BoardColumnData {
    pub key: String,
    pub label: String,
    pub tickets: Vec<TicketSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardData {
    pub generated_at: DateTime<Utc>,
    pub tickets: TicketKpis,
    pub technicians: Vec<TechnicianKpis>,
    pub open_by_building: HashMap<u64, u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TicketKpis {
    pub total_tickets: u64,
    pub by_status: HashMap<String, u64>,
    pub by_building: HashMap<u64, u64>,
    pub by_category: HashMap<String, u64>,
    pub reported_last_7_days: u64,
    pub resolved_last_7_days: u64,
    pub open_unassigned: u64,
    pub mttr_seconds: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TechnicianKpis {
    pub technician_id: u64,
    pub name: String,
    pub tickets_handled: u64,
    pub tickets_resolved: u64,
    pub avg_resolution_time_secs: Option<f64>,
    pub resolution_rate: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub request_id: Option<String>,
}
