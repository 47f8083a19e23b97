//! Per-service request and token accounting.
//!
//! Token counts are estimates derived from character counts (roughly four
//! characters per token). They approximate provider usage for display; they
//! are not billing-accurate.

use std::collections::BTreeMap;

use crate::domain::catalog::Catalog;

/// Characters assumed per token when estimating usage.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimates the token count for `char_count` characters.
pub fn estimate_tokens(char_count: usize) -> u64 {
    (char_count / CHARS_PER_TOKEN) as u64
}

/// Cumulative counters for one service.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ServiceUsage {
    pub requests: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl ServiceUsage {
    /// Returns the estimated spend in USD for these counters.
    pub fn cost(&self, input_cost_per_1k: f64, output_cost_per_1k: f64) -> f64 {
        self.input_tokens as f64 / 1000.0 * input_cost_per_1k
            + self.output_tokens as f64 / 1000.0 * output_cost_per_1k
    }
}

/// Usage counters keyed by service name.
///
/// Counters only grow: the meter exposes no way to decrement or reset them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UsageMeter {
    services: BTreeMap<String, ServiceUsage>,
}

impl UsageMeter {
    /// Records one completed request against `service_name`.
    pub fn record(&mut self, service_name: &str, input_tokens: u64, output_tokens: u64) {
        let usage = self.services.entry(service_name.to_string()).or_default();
        usage.requests = usage.requests.saturating_add(1);
        usage.input_tokens = usage.input_tokens.saturating_add(input_tokens);
        usage.output_tokens = usage.output_tokens.saturating_add(output_tokens);
    }

    /// Returns counters for `service_name`, zeroed when never used.
    pub fn get(&self, service_name: &str) -> ServiceUsage {
        self.services
            .get(service_name)
            .copied()
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ServiceUsage)> {
        self.services
            .iter()
            .map(|(name, usage)| (name.as_str(), usage))
    }

    /// Returns estimated spend for `service_name`, or `None` when the service
    /// is not in `catalog`.
    pub fn cost(&self, catalog: &Catalog, service_name: &str) -> Option<f64> {
        let service = catalog.find_service(service_name)?;

        Some(
            self.get(service_name)
                .cost(service.input_cost, service.output_cost),
        )
    }

    /// Renders one display line per used service.
    pub fn summary_lines(&self, catalog: &Catalog) -> Vec<String> {
        self.iter()
            .filter(|(_, usage)| usage.requests > 0)
            .map(|(name, usage)| {
                let cost = self.cost(catalog, name).unwrap_or_default();

                format!(
                    "{name} (API Requests: {}, Tokens in/out: {}/{}, Cost: ${cost:.2})",
                    usage.requests, usage.input_tokens, usage.output_tokens
                )
            })
            .collect()
    }
}
