//! Content gateway resolution.

/// Turns an owner's comma-separated node configuration into an ordered list
/// of gateway base URLs.
///
/// Entries are trimmed and lose any trailing `/`. Empty entries and repeats
/// are dropped; the first occurrence keeps its position.
///
/// ```rust
/// use core_playback::gateway::resolve_gateways;
///
/// let gateways = resolve_gateways(" https://a.node/, https://b.node ,,https://a.node");
/// assert_eq!(gateways, vec!["https://a.node", "https://b.node"]);
/// ```
pub fn resolve_gateways(endpoint_config: &str) -> Vec<String> {
    let mut gateways: Vec<String> = Vec::new();

    for entry in endpoint_config.split(',') {
        let gateway = entry.trim().trim_end_matches('/');
        if gateway.is_empty() || gateways.iter().any(|known| known == gateway) {
            continue;
        }
        gateways.push(gateway.to_string());
    }

    gateways
}
