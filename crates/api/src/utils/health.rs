//! Health report served by `GET /health`

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Overall state reported to load balancers and operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Ok,
    /// The database answers but a background component is down.
    Degraded,
    /// The database does not answer.
    Unavailable,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: HealthState,
    pub components: Vec<ComponentHealth>,
    pub checked_at: DateTime<Utc>,
}

impl HealthStatus {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { status: HealthState::Ok, components: Vec::new(), checked_at: now }
    }

    /// Add a component; returns self for chaining.
    pub fn add_component(mut self, component: ComponentHealth) -> Self {
        self.components.push(component);
        self
    }

    /// Derive `status` from the components. Only a failing required
    /// component makes the service unavailable.
    pub fn evaluate(mut self) -> Self {
        let required_down = self.components.iter().any(|c| c.required && !c.is_healthy);
        let optional_down = self.components.iter().any(|c| !c.required && !c.is_healthy);
        self.status = if required_down {
            HealthState::Unavailable
        } else if optional_down {
            HealthState::Degraded
        } else {
            HealthState::Ok
        };
        self
    }

    pub fn is_available(&self) -> bool {
        self.status != HealthState::Unavailable
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    pub name: &'static str,
    pub is_healthy: bool,
    #[serde(skip)]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentHealth {
    pub fn healthy(name: &'static str) -> Self {
        Self { name, is_healthy: true, required: false, message: None }
    }

    pub fn unhealthy(name: &'static str, message: impl Into<String>) -> Self {
        Self { name, is_healthy: false, required: false, message: Some(message.into()) }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}
