// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Circuit Breaker
//!
//! Per-provider failure tracker gating LLM provider eligibility.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Stop calling a failing provider for a cooldown period
//!
//! # State Machine
//!
//! ```text
//! CLOSED --failure_threshold reached--> OPEN
//! OPEN   --recovery_timeout elapsed & queried--> HALF_OPEN
//! HALF_OPEN --success--> CLOSED
//! any    --failure--> failure_count += 1 (OPEN once threshold reached)
//! ```
//!
//! There is no terminal state. All reads and transitions of one breaker are
//! serialized by a single async mutex; no lock is ever held across a
//! provider call.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Breaker tuning, immutable once a breaker is built
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Cooldown before an open circuit admits a trial call
    #[serde(default = "default_recovery_timeout_secs")]
    pub recovery_timeout_secs: u64,

    /// Bypass the breaker entirely (always executable, never transitions)
    #[serde(default)]
    pub disable: bool,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout_secs() -> u64 {
    300
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_timeout_secs(),
            disable: false,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    total_failures: u64,
    total_successes: u64,
}

/// Point-in-time view of a breaker, for health reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitBreakerSnapshot {
    pub provider_name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub total_failures: u64,
    pub total_successes: u64,
}

pub struct CircuitBreaker {
    provider_name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(provider_name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            provider_name: provider_name.into(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_time: None,
                total_failures: 0,
                total_successes: 0,
            }),
        }
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Whether a call may be attempted now.
    ///
    /// Querying an OPEN breaker after the recovery timeout moves it to
    /// HALF_OPEN and admits the call.
    pub async fn can_execute(&self) -> bool {
        if self.config.disable {
            return true;
        }

        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let recovered = inner
                    .last_failure_time
                    .map(|at| at.elapsed() > self.config.recovery_timeout())
                    .unwrap_or(true);

                if recovered {
                    inner.state = CircuitState::HalfOpen;
                    info!(
                        provider = %self.provider_name,
                        "Circuit breaker transitioned to HALF-OPEN"
                    );
                }
                recovered
            }
        }
    }

    pub async fn record_success(&self) {
        if self.config.disable {
            return;
        }

        let mut inner = self.inner.lock().await;
        if inner.state != CircuitState::Closed {
            info!(provider = %self.provider_name, "Circuit breaker CLOSED");
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.total_successes += 1;
    }

    pub async fn record_failure(&self) {
        if self.config.disable {
            return;
        }

        let mut inner = self.inner.lock().await;
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.total_failures += 1;
        inner.last_failure_time = Some(Instant::now());

        if inner.failure_count >= self.config.failure_threshold
            && inner.state != CircuitState::Open
        {
            inner.state = CircuitState::Open;
            metrics::counter!(
                "gtm_circuit_breaker_opened_total",
                "provider" => self.provider_name.clone()
            )
            .increment(1);
            warn!(
                provider = %self.provider_name,
                failure_count = inner.failure_count,
                recovery_timeout_secs = self.config.recovery_timeout_secs,
                "Circuit breaker OPENED"
            );
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    pub async fn failure_count(&self) -> u32 {
        self.inner.lock().await.failure_count
    }

    pub async fn snapshot(&self) -> CircuitBreakerSnapshot {
        let inner = self.inner.lock().await;
        CircuitBreakerSnapshot {
            provider_name: self.provider_name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            total_failures: inner.total_failures,
            total_successes: inner.total_successes,
        }
    }
}
