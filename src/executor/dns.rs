//! DNS executor (§4.3): resolve a record against a custom resolver
//! server:port rather than the system resolver, the way a dedicated uptime
//! probe must (so a resolver outage is itself observable).

use async_trait::async_trait;
use chrono::Utc;
use hickory_resolver::config::{NameServerConfig, ResolverConfig, ResolverOpts};
use hickory_resolver::proto::rr::rdata::SOA;
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::{Name, TokioAsyncResolver};
use serde::Deserialize;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::config_codec::{decode, Validator};
use crate::error::ConfigError;
use crate::model::{Monitor, ProbeOutcome, Proxy, Status};

use super::{ExecutionContext, Executor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordKind {
    A,
    Aaaa,
    Cname,
    Mx,
    Ns,
    Txt,
    Ptr,
    Srv,
    Caa,
    Soa,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DnsConfig {
    pub host: String,
    pub resolver: String,
    pub record_type: RecordKind,
}

pub struct DnsExecutor;

#[async_trait]
impl Executor for DnsExecutor {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: DnsConfig = decode(config)?;
        let mut v = Validator::new();
        v.require_non_empty("host", &parsed.host);
        v.require_non_empty("resolver", &parsed.resolver);
        if SocketAddr::from_str(&parsed.resolver).is_err() {
            v.fail("resolver", "must be a host:port socket address");
        }
        v.into_result()
    }

    async fn execute(&self, ctx: ExecutionContext, monitor: &Monitor, _proxy: Option<&Proxy>) -> ProbeOutcome {
        let start = Utc::now();
        let config: DnsConfig = match decode(&monitor.config) {
            Ok(c) => c,
            Err(e) => return ProbeOutcome::new(Status::Down, format!("connection string validation failed: {e}"), start),
        };

        let resolver_addr: SocketAddr = match SocketAddr::from_str(&config.resolver) {
            Ok(a) => a,
            Err(e) => return ProbeOutcome::new(Status::Down, format!("connection string validation failed: invalid resolver: {e}"), start),
        };

        let mut resolver_config = ResolverConfig::new();
        resolver_config.add_name_server(NameServerConfig::new(resolver_addr, Protocol::Udp));
        let resolver = TokioAsyncResolver::tokio(resolver_config, ResolverOpts::default());

        let name = match Name::from_str(&config.host) {
            Ok(n) => n,
            Err(e) => return ProbeOutcome::new(Status::Down, format!("invalid hostname: {e}"), start),
        };

        let lookup = ctx.race(lookup_records(&resolver, name, config.record_type)).await;
        let records = match lookup {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => return ProbeOutcome::new(Status::Down, e, start),
            Err(e) => return ProbeOutcome::new(Status::Down, e.to_string(), start),
        };

        if records.is_empty() {
            return ProbeOutcome::new(Status::Down, format!("No {:?} records found", config.record_type), start);
        }

        ProbeOutcome::new(
            Status::Up,
            format!("{:?} records: {}", config.record_type, records.join(", ")),
            start,
        )
    }
}

async fn lookup_records(resolver: &TokioAsyncResolver, name: Name, kind: RecordKind) -> Result<Vec<String>, String> {
    let record_type = match kind {
        RecordKind::A => RecordType::A,
        RecordKind::Aaaa => RecordType::AAAA,
        RecordKind::Cname => RecordType::CNAME,
        RecordKind::Mx => RecordType::MX,
        RecordKind::Ns => RecordType::NS,
        RecordKind::Txt => RecordType::TXT,
        RecordKind::Ptr => RecordType::PTR,
        RecordKind::Srv => RecordType::SRV,
        RecordKind::Caa => RecordType::CAA,
        RecordKind::Soa => RecordType::SOA,
    };

    let lookup = resolver
        .lookup(name, record_type)
        .await
        .map_err(|e| format!("DNS lookup failed: {e}"))?;

    Ok(lookup
        .record_iter()
        .filter_map(|r| r.data().map(render_rdata))
        .collect())
}

fn render_rdata(data: &RData) -> String {
    match data {
        RData::A(ip) => ip.to_string(),
        RData::AAAA(ip) => ip.to_string(),
        RData::CNAME(name) => name.to_string(),
        RData::MX(mx) => format!("{} {}", mx.preference(), mx.exchange()),
        RData::NS(name) => name.to_string(),
        RData::TXT(txt) => txt.to_string(),
        RData::PTR(name) => name.to_string(),
        RData::SRV(srv) => format!("{} {} {} {}", srv.priority(), srv.weight(), srv.port(), srv.target()),
        RData::CAA(caa) => format!("{caa}"),
        RData::SOA(soa) => format_soa(soa),
        other => format!("{other:?}"),
    }
}

fn format_soa(soa: &SOA) -> String {
    format!(
        "{} {} {} {} {} {} {}",
        soa.mname(),
        soa.rname(),
        soa.serial(),
        soa.refresh(),
        soa.retry(),
        soa.expire(),
        soa.minimum()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_non_socket_resolver() {
        let blob = serde_json::json!({"host": "example.com", "resolver": "8.8.8.8", "record_type": "A"});
        assert!(DnsExecutor.validate(&blob).is_err());
    }

    #[test]
    fn validate_accepts_well_formed_config() {
        let blob = serde_json::json!({"host": "example.com", "resolver": "8.8.8.8:53", "record_type": "A"});
        assert!(DnsExecutor.validate(&blob).is_ok());
    }
}
