// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! LLM orchestration and resilience layer for go-to-market content
//! generation: provider failover behind circuit breakers, cached website
//! fetching, context sufficiency and the analysis pipeline.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain, infrastructure and application layers of the engine

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
