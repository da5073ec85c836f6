//! # Content Manager Connector
//!
//! Adapter for the primary content management system's administrative API.
//! Authentication follows the system's ticket model: a ticket is minted
//! from the service credentials and presented on every subsequent call.

use super::types::{
    ActionOutcome, ActionRequest, BackendKind, BackendTarget, Connection, ProbeResult, ProbeSpec,
};
use super::{classify_connect_error, classify_probe_error, probe_value_from_json};
use crate::config::BackendKindConfig;
use crate::error::{Result, SentinelError};
use serde::Deserialize;
use std::time::Instant;
use tracing::debug;

const TICKET_HEADER: &str = "X-Sentinel-Ticket";

#[derive(Debug, Deserialize)]
struct TicketResponse {
    ticket: String,
}

#[derive(Debug, Deserialize)]
struct ProbeResponse {
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ActionResponse {
    status: String,
    #[serde(default)]
    reason: Option<String>,
}

/// Connector for the primary content management system
pub struct ContentManagerConnector {
    client: reqwest::Client,
    config: BackendKindConfig,
}

impl ContentManagerConnector {
    pub fn new(config: &BackendKindConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.probe_timeout())
            .build()
            .map_err(|e| SentinelError::configuration(format!("content manager client: {e}")))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub async fn connect(&self, target: &BackendTarget) -> Result<Connection> {
        debug_assert_eq!(target.kind, BackendKind::ContentManager);

        let url = format!("{}/api/admin/tickets", target.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "credentials_ref": target.credentials_ref }))
            .send()
            .await
            .map_err(|e| classify_connect_error(target, e))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(SentinelError::Authentication {
                target: target.name.clone(),
                message: format!("ticket request rejected with {}", response.status()),
            });
        }
        if !response.status().is_success() {
            return Err(SentinelError::connection(
                &target.name,
                format!("ticket request returned {}", response.status()),
            ));
        }

        let ticket: TicketResponse = response
            .json()
            .await
            .map_err(|e| SentinelError::connection(&target.name, e.to_string()))?;

        debug!(target = %target.name, "Content manager session established");
        Ok(Connection::new(target, ticket.ticket))
    }

    pub async fn probe(&self, connection: &Connection, spec: &ProbeSpec) -> Result<ProbeResult> {
        let url = format!("{}/api/admin/probes/{}", connection.base_url, spec.name);
        let target_name = connection.target_id.to_string();
        let timeout = connection
            .timeout_override
            .unwrap_or_else(|| self.config.probe_timeout());
        let started = Instant::now();

        let response = self
            .client
            .get(&url)
            .header(TICKET_HEADER, connection.session_token.as_str())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_probe_error(&spec.name, &target_name, timeout, e))?;

        let latency = started.elapsed();

        if !response.status().is_success() {
            return Err(SentinelError::probe(
                &spec.name,
                &target_name,
                format!("probe returned {}", response.status()),
            ));
        }

        let body: ProbeResponse = response
            .json()
            .await
            .map_err(|e| SentinelError::probe(&spec.name, &target_name, e.to_string()))?;

        let value = probe_value_from_json(&body.value).ok_or_else(|| {
            SentinelError::probe(&spec.name, &target_name, "probe value is not a scalar")
        })?;

        Ok(ProbeResult::new(
            &spec.name,
            connection.target_id,
            value,
            latency,
        ))
    }

    pub async fn apply_action(
        &self,
        connection: &Connection,
        request: &ActionRequest,
    ) -> Result<ActionOutcome> {
        let url = format!("{}/api/admin/actions", connection.base_url);
        let target_name = connection.target_id.to_string();

        let response = self
            .client
            .post(&url)
            .header(TICKET_HEADER, connection.session_token.as_str())
            .json(&serde_json::json!({
                "action": request.action,
                "idempotency_key": request.idempotency_key,
            }))
            .send()
            .await
            .map_err(|e| SentinelError::action(request.action.name(), &target_name, e.to_string()))?;

        if !response.status().is_success() {
            return Err(SentinelError::action(
                request.action.name(),
                &target_name,
                format!("action returned {}", response.status()),
            ));
        }

        let body: ActionResponse = response
            .json()
            .await
            .map_err(|e| SentinelError::action(request.action.name(), &target_name, e.to_string()))?;

        Ok(match body.status.as_str() {
            "applied" => ActionOutcome::Applied,
            "already_applied" => ActionOutcome::AlreadyApplied,
            _ => ActionOutcome::Rejected {
                reason: body.reason.unwrap_or(body.status),
            },
        })
    }
}
