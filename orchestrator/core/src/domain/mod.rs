// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Pure types, state machines and the anti-corruption traits implemented by
//! infrastructure adapters.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** LLM, website, context and analysis vocabulary

pub mod analysis;
pub mod circuit_breaker;
pub mod context;
pub mod engine_config;
pub mod llm;
pub mod website;
