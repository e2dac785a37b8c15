//! Counterparty master-data checks.

use crate::{
    classify::NAME_PREFIX_LEN,
    detector::{Detector, ScanContext},
    error::ReconResult,
    finding::{Category, Finding, FindingType},
    store::ReconStore,
};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

pub struct MissingClients;
pub struct SimilarClientNames;

/// Cheap similarity key: first few characters, trimmed and lower-cased.
pub fn fuzzy_name_key(name: &str) -> String {
    name.trim().to_lowercase().chars().take(NAME_PREFIX_LEN).collect()
}

impl Detector for MissingClients {
    fn name(&self) -> &'static str {
        "missing_clients"
    }

    fn category(&self) -> Category {
        Category::Clients
    }

    fn detect(&self, store: &ReconStore, ctx: &ScanContext) -> ReconResult<Vec<Finding>> {
        // Counterparty (first spelling seen) → its orders, keyed case-insensitively.
        let mut seen: BTreeMap<String, (String, Vec<String>)> = BTreeMap::new();
        for order in store.completed_orders(&ctx.window, None)? {
            let Some(name) = order.counterparty.as_deref().map(str::trim) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            seen.entry(name.to_lowercase())
                .or_insert_with(|| (name.to_string(), Vec::new()))
                .1
                .push(order.order_number);
        }
        if seen.is_empty() {
            return Ok(Vec::new());
        }

        let names: Vec<String> = seen.keys().cloned().collect();
        let known = store.known_client_nicknames(&names)?;

        let findings = seen
            .into_iter()
            .filter(|(key, _)| !known.contains(key))
            .map(|(_, (name, orders))| {
                Finding::builder(&ctx.scan_id, FindingType::MissingClient)
                    .terminal_ref(name)
                    .details(json!({
                        "order_count": orders.len(),
                        "orders": orders,
                    }))
                    .build()
            })
            .collect();
        Ok(findings)
    }
}

impl Detector for SimilarClientNames {
    fn name(&self) -> &'static str {
        "similar_client_names"
    }

    fn category(&self) -> Category {
        Category::Clients
    }

    /// Groups sharing a fuzzy key with more than one distinct spelling.
    fn detect(&self, store: &ReconStore, ctx: &ScanContext) -> ReconResult<Vec<Finding>> {
        let mut groups: BTreeMap<String, Vec<(i64, String)>> = BTreeMap::new();
        for client in store.active_clients()? {
            let key = fuzzy_name_key(&client.name);
            if key.is_empty() {
                continue;
            }
            groups.entry(key).or_default().push((client.client_id, client.name));
        }

        let mut findings = Vec::new();
        for (key, members) in groups {
            let distinct: BTreeSet<&str> = members.iter().map(|(_, n)| n.as_str()).collect();
            if distinct.len() < 2 {
                continue;
            }
            let refs: Vec<String> = members.iter().map(|(id, _)| format!("client#{id}")).collect();
            let ids: Vec<i64> = members.iter().map(|(id, _)| *id).collect();
            findings.push(
                Finding::builder(&ctx.scan_id, FindingType::PossibleDuplicateClient)
                    .erp_ref(refs.join(", "))
                    .details(json!({
                        "key": key,
                        "names": distinct,
                        "client_ids": ids,
                    }))
                    .build(),
            );
        }
        Ok(findings)
    }
}
