//! Deterministic names for derived resources
//!
//! Names are pure functions of the workload name and zone token, which is what
//! lets a later event find (and delete) what an earlier event created.
//!
//! Entry-point names only keep the first three characters of the zone token.
//! Two zone tokens sharing that prefix (`edge-public` and `edge-private`)
//! map to the same Ingress name, so configured zone tokens must differ within
//! their first three characters.

const EXPOSURE_SUFFIX: &str = "-svc";
const ENTRY_POINT_SUFFIX: &str = "-ing";
const ZONE_PREFIX_LEN: usize = 3;

/// Name of the Service exposing a workload: `<workload>-svc`
pub fn exposure_name(workload: &str) -> String {
    format!("{}{}", workload, EXPOSURE_SUFFIX)
}

/// Name of the Ingress for one zone: `<workload>-<zone prefix>-ing`
pub fn entry_point_name(workload: &str, zone_token: &str) -> String {
    format!("{}-{}{}", workload, zone_prefix(zone_token), ENTRY_POINT_SUFFIX)
}

/// First three characters of a zone token, or the whole token if shorter
pub fn zone_prefix(zone_token: &str) -> &str {
    match zone_token.char_indices().nth(ZONE_PREFIX_LEN) {
        Some((idx, _)) => &zone_token[..idx],
        None => zone_token,
    }
}

pub fn ingress_class_name(zone_token: &str, suffix: &str) -> String {
    format!("{}{}", zone_token, suffix)
}

/// Host of a workload under one domain suffix.
///
/// A subdomain ending in `.` and a suffix starting with `.` share a single
/// dot (`orders.` + `.example.com` is `orders.example.com`); every other pair
/// is concatenated as is.
pub fn host_name(subdomain: &str, domain: &str) -> String {
    match (subdomain.strip_suffix('.'), domain.starts_with('.')) {
        (Some(label), true) => format!("{}{}", label, domain),
        _ => format!("{}{}", subdomain, domain),
    }
}
