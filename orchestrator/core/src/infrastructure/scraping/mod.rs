// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Scraping provider adapters

pub mod firecrawl;

pub use firecrawl::FirecrawlAdapter;
