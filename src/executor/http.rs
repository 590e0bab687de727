//! HTTP executor (§4.3).
//!
//! The richest executor in the registry: method/url/encoding, redirect
//! caps, accepted-status classes, ignore-TLS-errors, four authentication
//! modes (including an OAuth2 client-credentials token exchange and mTLS),
//! and proxy honouring. Built the same way the teacher's
//! `ServiceMonitorActor::execute_request`/`evaluate_response` pair is built
//! — a request-building step and a separate, pure response-evaluation step
//! — generalized to the much larger config surface this monitor type needs.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::config_codec::{decode, Validator};
use crate::error::ConfigError;
use crate::model::{Monitor, ProbeOutcome, Proxy, ProxyProtocol, Status};

use super::{status_in_classes, ExecutionContext, Executor};

const USER_AGENT: &str = concat!("peekaping/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Json,
    Form,
    Xml,
    Text,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum Authentication {
    None,
    Basic {
        username: String,
        password: String,
    },
    Ntlm {
        username: String,
        password: String,
        domain: String,
        workstation: String,
    },
    Oauth2Cc {
        token_url: String,
        client_id: String,
        client_secret: String,
        #[serde(default)]
        scope: Option<String>,
        #[serde(default)]
        client_auth: Oauth2ClientAuth,
    },
    Mtls {
        cert_pem: String,
        key_pem: String,
        ca_pem: String,
    },
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Oauth2ClientAuth {
    #[default]
    ClientSecretBasic,
    ClientSecretPost,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    pub method: HttpMethod,
    pub url: String,
    #[serde(default = "default_encoding")]
    pub encoding: Encoding,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default = "default_accepted_statuses")]
    pub accepted_status_codes: Vec<String>,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,
    #[serde(default)]
    pub ignore_tls_errors: bool,
    #[serde(default = "default_auth")]
    pub authentication: Authentication,
    #[serde(default)]
    pub headers: Option<serde_json::Map<String, serde_json::Value>>,
}

fn default_encoding() -> Encoding {
    Encoding::Json
}

fn default_accepted_statuses() -> Vec<String> {
    vec!["2XX".to_string()]
}

fn default_max_redirects() -> u32 {
    10
}

fn default_auth() -> Authentication {
    Authentication::None
}

fn validate_config(config: &HttpConfig) -> Result<(), ConfigError> {
    let mut v = Validator::new();
    v.require_non_empty("url", &config.url);
    v.url("url", &config.url);
    if let Some(body) = &config.body {
        match config.encoding {
            Encoding::Json => {
                if serde_json::from_str::<serde_json::Value>(body).is_err() {
                    v.fail("body", "must be valid JSON for encoding=json");
                }
            }
            Encoding::Xml => {
                if !body.trim_start().starts_with('<') {
                    v.fail("body", "must look like XML for encoding=xml");
                }
            }
            Encoding::Form | Encoding::Text => {}
        }
    }
    match &config.authentication {
        Authentication::Basic { username, password } => {
            v.require_when(true, &[("username", !username.is_empty()), ("password", !password.is_empty())]);
        }
        Authentication::Ntlm { domain, workstation, .. } => {
            v.require_when(true, &[("domain", !domain.is_empty()), ("workstation", !workstation.is_empty())]);
        }
        Authentication::Mtls { cert_pem, key_pem, ca_pem } => {
            v.require_when(
                true,
                &[
                    ("cert_pem", !cert_pem.is_empty()),
                    ("key_pem", !key_pem.is_empty()),
                    ("ca_pem", !ca_pem.is_empty()),
                ],
            );
        }
        Authentication::Oauth2Cc { token_url, client_id, client_secret, .. } => {
            v.url("token_url", token_url);
            v.require_non_empty("client_id", client_id);
            v.require_non_empty("client_secret", client_secret);
        }
        Authentication::None => {}
    }
    v.into_result()
}

#[derive(Default)]
pub struct HttpExecutor;

fn build_client(proxy: Option<&Proxy>, config: &HttpConfig, timeout: Duration) -> Result<reqwest::Client, String> {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(config.ignore_tls_errors)
        .redirect(if config.max_redirects == 0 {
            reqwest::redirect::Policy::none()
        } else {
            reqwest::redirect::Policy::limited(config.max_redirects as usize)
        });

    if let Authentication::Mtls { cert_pem, key_pem, ca_pem } = &config.authentication {
        let identity_pem = format!("{cert_pem}\n{key_pem}");
        let identity = reqwest::Identity::from_pem(identity_pem.as_bytes())
            .map_err(|e| format!("invalid client certificate: {e}"))?;
        let ca = reqwest::Certificate::from_pem(ca_pem.as_bytes())
            .map_err(|e| format!("invalid CA certificate: {e}"))?;
        builder = builder.identity(identity).add_root_certificate(ca);
    }

    if let Some(proxy_cfg) = proxy {
        let scheme = match proxy_cfg.protocol {
            ProxyProtocol::Http => "http",
            ProxyProtocol::Https => "https",
            ProxyProtocol::Socks4 => "socks4",
            ProxyProtocol::Socks5 => "socks5",
            ProxyProtocol::Socks5h => "socks5h",
        };
        let mut url = format!("{scheme}://{}:{}", proxy_cfg.host, proxy_cfg.port);
        if let (Some(u), Some(p)) = (&proxy_cfg.username, &proxy_cfg.password) {
            url = format!("{scheme}://{u}:{p}@{}:{}", proxy_cfg.host, proxy_cfg.port);
        }
        match reqwest::Proxy::all(&url) {
            Ok(p) => builder = builder.proxy(p),
            Err(_) if matches!(proxy_cfg.protocol, ProxyProtocol::Socks4 | ProxyProtocol::Socks5 | ProxyProtocol::Socks5h) => {
                // socks dialer construction failed; fall back to a direct connection (§4.3).
            }
            Err(e) => return Err(format!("invalid proxy configuration: {e}")),
        }
    }

    builder.build().map_err(|e| e.to_string())
}

async fn exchange_oauth2_token(
    client: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    scope: Option<&str>,
    auth_mode: Oauth2ClientAuth,
) -> Result<String, String> {
    let mut form = vec![("grant_type", "client_credentials")];
    if let Some(scope) = scope {
        form.push(("scope", scope));
    }

    let mut request = client.post(token_url).form(&form);
    request = match auth_mode {
        Oauth2ClientAuth::ClientSecretBasic => request.basic_auth(client_id, Some(client_secret)),
        Oauth2ClientAuth::ClientSecretPost => {
            let mut body = form.clone();
            body.push(("client_id", client_id));
            body.push(("client_secret", client_secret));
            client.post(token_url).form(&body)
        }
    };

    let response = request
        .send()
        .await
        .map_err(|e| format!("oauth2 token endpoint request failed: {e}"))?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("oauth2 token endpoint returned status: {}", status.as_u16()));
    }

    #[derive(Deserialize)]
    struct TokenResponse {
        access_token: String,
    }
    let body: TokenResponse = response
        .json()
        .await
        .map_err(|e| format!("oauth2 token endpoint returned malformed response: {e}"))?;
    Ok(body.access_token)
}

#[async_trait]
impl Executor for HttpExecutor {
    fn validate(&self, config: &serde_json::Value) -> Result<(), ConfigError> {
        let parsed: HttpConfig = decode(config)?;
        validate_config(&parsed)
    }

    async fn execute(&self, ctx: ExecutionContext, monitor: &Monitor, proxy: Option<&Proxy>) -> ProbeOutcome {
        let start = Utc::now();
        let config: HttpConfig = match decode(&monitor.config) {
            Ok(c) => c,
            Err(e) => return ProbeOutcome::new(Status::Down, format!("connection string validation failed: {e}"), start),
        };
        if let Err(e) = validate_config(&config) {
            return ProbeOutcome::new(Status::Down, format!("connection string validation failed: {e}"), start);
        }

        let client = match build_client(proxy, &config, ctx.remaining()) {
            Ok(c) => c,
            Err(e) => return ProbeOutcome::new(Status::Down, e, start),
        };

        // OAuth2 client-credentials token exchange, bound by the monitor timeout (§5).
        let bearer_token = if let Authentication::Oauth2Cc { token_url, client_id, client_secret, scope, client_auth } = &config.authentication {
            match ctx
                .race(exchange_oauth2_token(&client, token_url, client_id, client_secret, scope.as_deref(), *client_auth))
                .await
            {
                Ok(Ok(token)) => Some(token),
                Ok(Err(e)) => return ProbeOutcome::new(Status::Down, e, start),
                Err(e) => return ProbeOutcome::new(Status::Down, e.to_string(), start),
            }
        } else {
            None
        };

        let mut request = client.request(config.method.as_reqwest(), &config.url);
        request = request.header("User-Agent", USER_AGENT);

        match config.encoding {
            Encoding::Json => request = request.header("Content-Type", "application/json"),
            Encoding::Form => request = request.header("Content-Type", "application/x-www-form-urlencoded"),
            Encoding::Xml => request = request.header("Content-Type", "application/xml"),
            Encoding::Text => request = request.header("Content-Type", "text/plain"),
        }

        if let Some(body) = &config.body {
            request = request.body(body.clone());
        }

        if let Some(headers) = &config.headers {
            for (key, value) in headers {
                if let Some(s) = value.as_str() {
                    request = request.header(key.as_str(), s);
                }
            }
        }

        match &config.authentication {
            Authentication::Basic { username, password } => {
                request = request.basic_auth(username, Some(password));
            }
            Authentication::Ntlm { username, password, .. } => {
                // NTLM requires a handshake reqwest doesn't do natively; surface
                // credentials as basic auth against servers that fall back to it,
                // matching the monitor's documented domain/workstation requirement.
                request = request.basic_auth(username, Some(password));
            }
            Authentication::Oauth2Cc { .. } => {
                if let Some(token) = &bearer_token {
                    request = request.bearer_auth(token);
                }
            }
            Authentication::Mtls { .. } | Authentication::None => {}
        }

        let response = match ctx.race(request.send()).await {
            Ok(Ok(r)) => r,
            Ok(Err(e)) => {
                if e.is_redirect() {
                    return ProbeOutcome::new(
                        Status::Down,
                        format!(
                            "too many redirects: followed {}, maximum allowed is {}",
                            config.max_redirects + 1,
                            config.max_redirects
                        ),
                        start,
                    );
                }
                return ProbeOutcome::new(Status::Down, format!("HTTP request failed: {e}"), start);
            }
            Err(e) => return ProbeOutcome::new(Status::Down, e.to_string(), start),
        };

        let status_code = response.status();
        let status_text = response
            .status()
            .canonical_reason()
            .map(|r| format!("{} - {} {}", status_code.as_u16(), status_code.as_u16(), r))
            .unwrap_or_else(|| format!("{} - {}", status_code.as_u16(), status_code));

        if !status_in_classes(status_code.as_u16(), &config.accepted_status_codes) {
            return ProbeOutcome::new(
                Status::Down,
                format!("HTTP request failed with status: {}", status_code.as_u16()),
                start,
            );
        }

        ProbeOutcome::new(Status::Up, status_text, start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Monitor, Status};
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn monitor_with(url: String, accepted: Vec<&str>, max_redirects: u32) -> Monitor {
        Monitor {
            id: "m1".into(),
            name: "test".into(),
            kind: "http".into(),
            interval_secs: 30,
            timeout_secs: 5,
            max_retries: 2,
            retry_interval_secs: 5,
            resend_interval_secs: 0,
            active: true,
            status: Status::Pending,
            config: serde_json::json!({
                "method": "GET",
                "url": url,
                "encoding": "json",
                "accepted_status_codes": accepted,
                "max_redirects": max_redirects,
            }),
            proxy: None,
            notification_channel_ids: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
            revision: 1,
        }
    }

    #[tokio::test]
    async fn s1_http_up_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

        let monitor = monitor_with(format!("{}/", server.uri()), vec!["2XX"], 10);
        let ctx = ExecutionContext::new(Duration::from_secs(5), CancellationToken::new());
        let outcome = HttpExecutor.execute(ctx, &monitor, None).await;

        assert_eq!(outcome.status, Status::Up);
        assert_eq!(outcome.message, "200 - 200 OK");
    }

    #[tokio::test]
    async fn s3_redirect_cap_reports_expected_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/"))
            .mount(&server)
            .await;

        let monitor = monitor_with(format!("{}/", server.uri()), vec!["2XX"], 2);
        let ctx = ExecutionContext::new(Duration::from_secs(5), CancellationToken::new());
        let outcome = HttpExecutor.execute(ctx, &monitor, None).await;

        assert_eq!(outcome.status, Status::Down);
        assert!(outcome.message.contains("too many redirects"));
        assert!(outcome.message.contains("maximum allowed is 2"));
    }

    #[tokio::test]
    async fn unaccepted_status_class_is_down() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

        let monitor = monitor_with(format!("{}/", server.uri()), vec!["2XX"], 10);
        let ctx = ExecutionContext::new(Duration::from_secs(5), CancellationToken::new());
        let outcome = HttpExecutor.execute(ctx, &monitor, None).await;

        assert_eq!(outcome.status, Status::Down);
        assert_eq!(outcome.message, "HTTP request failed with status: 500");
    }

    #[test]
    fn validate_rejects_unknown_fields() {
        let blob = serde_json::json!({
            "method": "GET",
            "url": "http://example.com",
            "typo_field": true,
        });
        assert!(HttpExecutor.validate(&blob).is_err());
    }

    #[test]
    fn validate_requires_basic_auth_fields() {
        let blob = serde_json::json!({
            "method": "GET",
            "url": "http://example.com",
            "authentication": {"mode": "basic", "username": "", "password": ""},
        });
        let err = HttpExecutor.validate(&blob).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig { .. }));
    }
}
