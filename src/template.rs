//! Template rendering (§4.9, §9 open question).
//!
//! The teacher's channel templates mix ad-hoc `format!` strings per alert
//! kind (`alerts.rs`, `discord.rs`); here every channel shares one small
//! mustache-style `{{ var }}` renderer instead, settling the spec's open
//! question in favor of the simplest syntax that covers every channel
//! shown in §4.9. Liquid-style control tags are out of scope: undefined
//! variables render as the empty string, there is no conditional logic.

use std::collections::HashMap;

use crate::model::{Heartbeat, Monitor};

/// Builds the placeholder set named in §4.9:
/// `{msg, status, monitor.name, monitor.url, heartbeat.time, heartbeat.latency}`.
pub fn placeholders(monitor: &Monitor, heartbeat: &Heartbeat) -> HashMap<&'static str, String> {
    let url = monitor
        .config
        .get("url")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    HashMap::from([
        ("msg", heartbeat.message.clone()),
        ("status", heartbeat.status.to_string()),
        ("monitor.name", monitor.name.clone()),
        ("monitor.url", url),
        ("heartbeat.time", heartbeat.timestamp.to_rfc3339()),
        ("heartbeat.latency", heartbeat.latency_ms.to_string()),
    ])
}

/// Renders `{{ var }}` placeholders against `vars`. Unknown variables and
/// malformed tags render as the empty string; rendering never fails.
pub fn render(template: &str, vars: &HashMap<&'static str, String>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        output.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        match after_open.find("}}") {
            Some(close) => {
                let key = after_open[..close].trim();
                if let Some(value) = vars.get(key) {
                    output.push_str(value);
                }
                rest = &after_open[close + 2..];
            }
            None => {
                rest = "";
                break;
            }
        }
    }
    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::model::Status;

    fn sample() -> (Monitor, Heartbeat) {
        let monitor = Monitor {
            id: "m1".into(),
            name: "API".into(),
            kind: "http".into(),
            interval_secs: 30,
            timeout_secs: 5,
            max_retries: 1,
            retry_interval_secs: 0,
            resend_interval_secs: 0,
            active: true,
            status: Status::Up,
            config: serde_json::json!({"url": "https://example.com"}),
            proxy: None,
            notification_channel_ids: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
            revision: 1,
        };
        let heartbeat = Heartbeat {
            monitor_id: "m1".into(),
            sequence: 1,
            timestamp: Utc::now(),
            status: Status::Down,
            message: "connection refused".into(),
            latency_ms: 12,
            retries: 1,
            important: true,
        };
        (monitor, heartbeat)
    }

    #[test]
    fn renders_known_placeholders() {
        let (monitor, heartbeat) = sample();
        let vars = placeholders(&monitor, &heartbeat);
        let rendered = render("{{monitor.name}} is {{status}}: {{msg}}", &vars);
        assert_eq!(rendered, "API is down: connection refused");
    }

    #[test]
    fn unknown_variable_renders_empty() {
        let vars = HashMap::new();
        assert_eq!(render("before {{nope}} after", &vars), "before  after");
    }

    #[test]
    fn unterminated_tag_is_dropped_not_panicking() {
        let vars = HashMap::new();
        assert_eq!(render("before {{oops", &vars), "before ");
    }
}
