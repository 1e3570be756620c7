// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the AEGIS GTM CLI

pub mod analyze;
pub mod cache;
pub mod config;
pub mod providers;
pub mod website;

pub use self::analyze::AnalyzeCommand;
pub use self::cache::CacheCommand;
pub use self::config::ConfigCommand;
pub use self::providers::ProvidersCommand;
pub use self::website::WebsiteCommand;
