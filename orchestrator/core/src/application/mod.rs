// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod analysis_service;
pub mod context_resolver;

// Re-export use cases for convenience
pub use analysis_service::{AnalysisService, ContextualVariables, EmailVariables, ProductOverviewVariables};
pub use context_resolver::ContextResolver;
