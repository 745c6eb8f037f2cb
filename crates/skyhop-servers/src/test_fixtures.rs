//! Shared builders for directory tests

use crate::server::{ConnectingDomain, Server};
use skyhop_common::{ServerFeature, ServerFeatures};

pub(crate) fn domain(id: &str) -> ConnectingDomain {
    ConnectingDomain {
        id: id.to_string(),
        domain: format!("{id}.example.test"),
        entry_ip: Some("10.0.0.1".to_string()),
        exit_ip: Some("10.0.0.2".to_string()),
        online: true,
        label: None,
        public_key_x25519: Some("pubkey".to_string()),
        entry_per_protocol: None,
    }
}

pub(crate) fn server(id: &str, exit_country: &str, score: f64) -> Server {
    Server {
        server_id: id.to_string(),
        server_name: format!("{exit_country}#{id}"),
        exit_country: exit_country.to_string(),
        entry_country: exit_country.to_string(),
        city: None,
        state: None,
        gateway_name: None,
        features: ServerFeatures::default(),
        tier: 2,
        score,
        load: 50,
        online: true,
        connecting_domains: vec![domain(&format!("{id}-d1"))],
    }
}

pub(crate) fn secure_core_server(id: &str, entry: &str, exit: &str, score: f64) -> Server {
    let mut s = server(id, exit, score);
    s.entry_country = entry.to_string();
    s.features = ServerFeatures::of(&[ServerFeature::SecureCore]);
    s
}

pub(crate) fn gateway_server(id: &str, gateway_name: &str, score: f64) -> Server {
    let mut s = server(id, "US", score);
    s.gateway_name = Some(gateway_name.to_string());
    s.features = ServerFeatures::of(&[ServerFeature::Restricted]);
    s
}

pub(crate) fn free_server(id: &str, exit_country: &str, score: f64) -> Server {
    let mut s = server(id, exit_country, score);
    s.tier = 0;
    s
}
