//! Turns a container inventory snapshot into canonical host entries.

use std::collections::HashSet;

use crate::types::{ContainerRecord, HostEntry};

/// Synthesize one [`HostEntry`] per claimed IP address.
///
/// Containers are walked in inventory order and their network attachments
/// in the order the inventory reader produced. The first attachment to
/// claim an IP wins; later attachments with the same IP are dropped, not
/// merged. Pure function of its inputs: an unchanged snapshot always
/// yields the same output.
pub fn synthesize(containers: &[ContainerRecord], domain_base: &str) -> Vec<HostEntry> {
    let mut entries = Vec::new();
    let mut seen_ips: HashSet<&str> = HashSet::new();

    for container in containers {
        for attachment in &container.networks {
            let ip = attachment.ip_address.as_str();
            if ip.is_empty() || seen_ips.contains(ip) {
                continue;
            }

            let mut candidates: Vec<&str> = Vec::new();
            if !container.name.is_empty() {
                candidates.push(&container.name);
            }
            if !container.hostname.is_empty() && container.hostname != container.name {
                candidates.push(&container.hostname);
            }
            for alias in &attachment.aliases {
                if !alias.is_empty() && !candidates.contains(&alias.as_str()) {
                    candidates.push(alias);
                }
            }

            // An attachment that yields no names does not claim its IP.
            if candidates.is_empty() {
                continue;
            }

            let mut names: Vec<String> = Vec::new();
            for candidate in candidates {
                // Keep only the portion before any embedded domain suffix.
                let short = candidate.split('.').next().unwrap_or(candidate);
                for name in [short.to_string(), format!("{}.{}", short, domain_base)] {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }

            seen_ips.insert(ip);
            entries.push(HostEntry {
                ip: ip.to_string(),
                names,
            });
        }
    }

    entries
}
