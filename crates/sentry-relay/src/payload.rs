//! Sentry webhook payload decoding.
//!
//! The raw body is decoded once into one of four typed variants. Every field
//! falls back to [`UNKNOWN`] while decoding, so formatters only ever see
//! fully-populated structures. Unexpected types (a number where a string was
//! expected, an object replaced by a string, ...) are treated as absent rather
//! than failing the request.

use serde::de::{self, DeserializeOwned, Unexpected};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Fallback for any field missing from the payload.
pub const UNKNOWN: &str = "Unknown";

/// Webhook category sent in the `Sentry-Hook-Resource` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// Issue alert rule fired (`event_alert`)
    EventAlert,
    /// Metric alert changed state (`metric_alert`)
    MetricAlert,
    /// Issue lifecycle update (`issue`)
    Issue,
    /// Raw error event (`error`)
    Error,
}

impl ResourceType {
    /// Parse a header value. Unsupported resources yield `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "event_alert" => Some(Self::EventAlert),
            "metric_alert" => Some(Self::MetricAlert),
            "issue" => Some(Self::Issue),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Header value for this resource.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EventAlert => "event_alert",
            Self::MetricAlert => "metric_alert",
            Self::Issue => "issue",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A received webhook: resource type, action, and the resource-specific data.
#[derive(Debug, Clone)]
pub struct WebhookEnvelope {
    pub resource: ResourceType,
    pub action: String,
    pub data: Value,
}

impl WebhookEnvelope {
    /// Parse a raw webhook body.
    ///
    /// Fails only when the body is not a JSON object.
    pub fn from_slice(resource: ResourceType, body: &[u8]) -> Result<Self, serde_json::Error> {
        let mut fields = match serde_json::from_slice::<Value>(body)? {
            Value::Object(fields) => fields,
            other => {
                return Err(de::Error::invalid_type(
                    Unexpected::Other(json_kind(&other)),
                    &"a JSON object",
                ))
            }
        };

        let action = fields.remove("action").and_then(scalar_text);
        Ok(Self {
            resource,
            action: pick([action.as_deref()]),
            data: fields.remove("data").unwrap_or(Value::Null),
        })
    }

    /// Decode `data` into the typed payload for this resource.
    #[must_use]
    pub fn decode(&self) -> SentryPayload {
        match self.resource {
            ResourceType::EventAlert => SentryPayload::IssueAlert(IssueAlert::from_raw(
                lenient_from::<RawEventAlertData>(&self.data),
            )),
            ResourceType::MetricAlert => SentryPayload::MetricAlert(MetricAlert::new(
                &self.action,
                lenient_from::<RawMetricAlertData>(&self.data),
            )),
            ResourceType::Issue => SentryPayload::Issue(IssueUpdate::new(
                &self.action,
                lenient_from::<RawIssueData>(&self.data).issue,
            )),
            ResourceType::Error => SentryPayload::Error(ErrorEvent::from_raw(
                lenient_from::<RawErrorData>(&self.data).error,
            )),
        }
    }
}

/// Decoded payload, one variant per supported resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentryPayload {
    IssueAlert(IssueAlert),
    MetricAlert(MetricAlert),
    Issue(IssueUpdate),
    Error(ErrorEvent),
}

impl SentryPayload {
    /// Resource this payload was decoded from.
    #[must_use]
    pub const fn resource(&self) -> ResourceType {
        match self {
            Self::IssueAlert(_) => ResourceType::EventAlert,
            Self::MetricAlert(_) => ResourceType::MetricAlert,
            Self::Issue(_) => ResourceType::Issue,
            Self::Error(_) => ResourceType::Error,
        }
    }

    /// Title shown in the message header.
    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::IssueAlert(alert) => &alert.title,
            Self::MetricAlert(alert) => &alert.title,
            Self::Issue(issue) => &issue.title,
            Self::Error(error) => &error.title,
        }
    }
}

/// An issue alert rule fired for an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueAlert {
    pub title: String,
    pub rule: String,
    pub level: String,
    pub environment: String,
    pub culprit: String,
    pub user: String,
    pub web_url: Option<String>,
}

impl IssueAlert {
    fn from_raw(raw: RawEventAlertData) -> Self {
        let event = raw.event;
        Self {
            title: pick([event.title.as_deref(), event.message.as_deref()]),
            rule: pick([raw.triggered_rule.as_deref()]),
            level: pick([event.level.as_deref()]),
            environment: pick([event.environment.as_deref()]),
            culprit: pick([event.culprit.as_deref()]),
            user: event.user.identity(),
            web_url: present(event.web_url),
        }
    }
}

/// A metric alert changed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricAlert {
    pub title: String,
    /// Webhook action: `critical`, `warning` or `resolved`.
    pub status: String,
    pub description: String,
    pub web_url: Option<String>,
}

impl MetricAlert {
    fn new(action: &str, raw: RawMetricAlertData) -> Self {
        Self {
            title: pick([
                raw.description_title.as_deref(),
                raw.metric_alert.title.as_deref(),
                raw.metric_alert.alert_rule.name.as_deref(),
            ]),
            status: action.to_string(),
            description: pick([raw.description_text.as_deref()]),
            web_url: present(raw.web_url),
        }
    }
}

/// An issue was created, resolved, assigned, ignored or archived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueUpdate {
    pub title: String,
    pub action: String,
    pub status: String,
    pub project: String,
    pub level: String,
    pub event_count: String,
    pub user_count: String,
    pub culprit: String,
    pub web_url: Option<String>,
}

impl IssueUpdate {
    fn new(action: &str, raw: RawIssue) -> Self {
        Self {
            title: pick([raw.title.as_deref()]),
            action: action.to_string(),
            status: pick([raw.status.as_deref()]),
            project: pick([raw.project.name.as_deref(), raw.project.slug.as_deref()]),
            level: pick([raw.level.as_deref()]),
            event_count: pick([raw.count.as_deref()]),
            user_count: pick([raw.user_count.as_deref()]),
            culprit: pick([raw.culprit.as_deref()]),
            web_url: present(raw.web_url),
        }
    }
}

/// A raw error event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    pub title: String,
    pub level: String,
    pub environment: String,
    pub culprit: String,
    pub user: String,
    pub exception: Option<ExceptionDetail>,
    pub web_url: Option<String>,
}

/// Type and message of the outermost exception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionDetail {
    pub kind: String,
    pub value: String,
}

impl ErrorEvent {
    fn from_raw(raw: RawEvent) -> Self {
        // Sentry lists chained exceptions innermost first.
        let exception = raw.exception.values.into_iter().last().and_then(|exc| {
            present(exc.value).map(|value| ExceptionDetail {
                kind: pick([exc.kind.as_deref()]),
                value,
            })
        });

        Self {
            title: pick([raw.title.as_deref(), raw.message.as_deref()]),
            level: pick([raw.level.as_deref()]),
            environment: pick([raw.environment.as_deref()]),
            culprit: pick([raw.culprit.as_deref()]),
            user: raw.user.identity(),
            exception,
            web_url: present(raw.web_url),
        }
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEventAlertData {
    #[serde(deserialize_with = "lenient")]
    event: RawEvent,
    #[serde(deserialize_with = "text")]
    triggered_rule: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawErrorData {
    #[serde(deserialize_with = "lenient")]
    error: RawEvent,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEvent {
    #[serde(deserialize_with = "text")]
    title: Option<String>,
    #[serde(deserialize_with = "text")]
    message: Option<String>,
    #[serde(deserialize_with = "text")]
    level: Option<String>,
    #[serde(deserialize_with = "text")]
    environment: Option<String>,
    #[serde(deserialize_with = "text")]
    culprit: Option<String>,
    #[serde(deserialize_with = "text")]
    web_url: Option<String>,
    #[serde(deserialize_with = "lenient")]
    user: RawUser,
    #[serde(deserialize_with = "lenient")]
    exception: RawException,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawUser {
    #[serde(deserialize_with = "text")]
    email: Option<String>,
    #[serde(deserialize_with = "text")]
    ip_address: Option<String>,
}

impl RawUser {
    fn identity(&self) -> String {
        pick([self.email.as_deref(), self.ip_address.as_deref()])
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawException {
    #[serde(deserialize_with = "lenient_list")]
    values: Vec<RawExceptionValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawExceptionValue {
    #[serde(rename = "type", deserialize_with = "text")]
    kind: Option<String>,
    #[serde(deserialize_with = "text")]
    value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMetricAlertData {
    #[serde(deserialize_with = "text")]
    description_title: Option<String>,
    #[serde(deserialize_with = "text")]
    description_text: Option<String>,
    #[serde(deserialize_with = "text")]
    web_url: Option<String>,
    #[serde(deserialize_with = "lenient")]
    metric_alert: RawMetricAlert,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMetricAlert {
    #[serde(deserialize_with = "text")]
    title: Option<String>,
    #[serde(deserialize_with = "lenient")]
    alert_rule: RawAlertRule,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAlertRule {
    #[serde(deserialize_with = "text")]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawIssueData {
    #[serde(deserialize_with = "lenient")]
    issue: RawIssue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawIssue {
    #[serde(deserialize_with = "text")]
    title: Option<String>,
    #[serde(deserialize_with = "text")]
    status: Option<String>,
    #[serde(deserialize_with = "text")]
    level: Option<String>,
    #[serde(deserialize_with = "text")]
    culprit: Option<String>,
    #[serde(deserialize_with = "text")]
    count: Option<String>,
    #[serde(rename = "userCount", deserialize_with = "text")]
    user_count: Option<String>,
    #[serde(deserialize_with = "text")]
    web_url: Option<String>,
    #[serde(deserialize_with = "lenient")]
    project: RawProject,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProject {
    #[serde(deserialize_with = "text")]
    name: Option<String>,
    #[serde(deserialize_with = "text")]
    slug: Option<String>,
}

// =============================================================================
// Decoding helpers
// =============================================================================

/// First non-empty candidate, or [`UNKNOWN`].
fn pick<const N: usize>(candidates: [Option<&str>; N]) -> String {
    candidates
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .map_or_else(|| UNKNOWN.to_string(), str::to_string)
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Decode a nested object, falling back to the default for anything that is
/// not a well-formed JSON object. Arrays are rejected too, since serde would
/// otherwise read struct fields from them by position.
fn lenient_from<T: DeserializeOwned + Default>(value: &Value) -> T {
    match value {
        Value::Object(_) => T::deserialize(value).unwrap_or_default(),
        _ => T::default(),
    }
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Scalar leaf as a string; numbers and booleans are stringified, anything
/// else is absent.
fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Value::deserialize(deserializer).map(scalar_text)
}

/// Nested structure that degrades to its default when malformed.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(lenient_from(&value))
}

/// List of nested structures; a non-array yields an empty list and malformed
/// entries degrade to their default individually.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.iter().map(lenient_from).collect(),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(resource: ResourceType, body: &Value) -> SentryPayload {
        WebhookEnvelope::from_slice(resource, body.to_string().as_bytes())
            .unwrap()
            .decode()
    }

    #[test]
    fn test_resource_type_parse() {
        assert_eq!(ResourceType::parse("event_alert"), Some(ResourceType::EventAlert));
        assert_eq!(ResourceType::parse("metric_alert"), Some(ResourceType::MetricAlert));
        assert_eq!(ResourceType::parse("issue"), Some(ResourceType::Issue));
        assert_eq!(ResourceType::parse("error"), Some(ResourceType::Error));
        assert_eq!(ResourceType::parse("installation"), None);
        assert_eq!(ResourceType::parse("Issue"), None);
        assert_eq!(ResourceType::Issue.to_string(), "issue");
    }

    #[test]
    fn test_non_object_body_fails() {
        assert!(WebhookEnvelope::from_slice(ResourceType::Issue, b"not json").is_err());
        assert!(WebhookEnvelope::from_slice(ResourceType::Issue, b"[1,2]").is_err());
        assert!(WebhookEnvelope::from_slice(
            ResourceType::Issue,
            br#"["resolved", {"issue": {"title": "X"}}]"#
        )
        .is_err());
        assert!(WebhookEnvelope::from_slice(ResourceType::Issue, b"\"issue\"").is_err());
        assert!(WebhookEnvelope::from_slice(ResourceType::Issue, b"null").is_err());
    }

    #[test]
    fn test_nested_arrays_are_not_read_positionally() {
        let payload = decode(
            ResourceType::Error,
            &json!({"data": {"error": ["Boom", "message", "fatal"]}}),
        );
        assert_eq!(payload.title(), UNKNOWN);

        let payload = decode(
            ResourceType::Error,
            &json!({"data": {"error": {"exception": {"values": [["Kind", "value"]]}}}}),
        );
        let SentryPayload::Error(error) = payload else {
            panic!("expected error payload");
        };
        assert!(error.exception.is_none());
    }

    #[test]
    fn test_missing_action_and_data() {
        let envelope = WebhookEnvelope::from_slice(ResourceType::Issue, b"{}").unwrap();
        assert_eq!(envelope.action, UNKNOWN);
        assert!(envelope.data.is_null());

        let SentryPayload::Issue(issue) = envelope.decode() else {
            panic!("expected issue payload");
        };
        assert_eq!(issue.title, UNKNOWN);
        assert_eq!(issue.status, UNKNOWN);
        assert_eq!(issue.project, UNKNOWN);
        assert_eq!(issue.event_count, UNKNOWN);
        assert!(issue.web_url.is_none());
    }

    #[test]
    fn test_event_alert_decode() {
        let payload = decode(
            ResourceType::EventAlert,
            &json!({
                "action": "triggered",
                "data": {
                    "triggered_rule": "High error rate",
                    "event": {
                        "title": "TypeError: x is undefined",
                        "level": "error",
                        "environment": "production",
                        "culprit": "app/main.js",
                        "user": {"ip_address": "10.0.0.1"},
                        "web_url": "https://sentry.io/e/1/"
                    }
                }
            }),
        );

        assert_eq!(payload.resource(), ResourceType::EventAlert);
        let SentryPayload::IssueAlert(alert) = payload else {
            panic!("expected issue alert");
        };
        assert_eq!(alert.title, "TypeError: x is undefined");
        assert_eq!(alert.rule, "High error rate");
        assert_eq!(alert.user, "10.0.0.1");
        assert_eq!(alert.web_url.as_deref(), Some("https://sentry.io/e/1/"));
    }

    #[test]
    fn test_user_prefers_email() {
        let payload = decode(
            ResourceType::Error,
            &json!({"data": {"error": {"user": {"email": "a@b.c", "ip_address": "10.0.0.1"}}}}),
        );
        let SentryPayload::Error(error) = payload else {
            panic!("expected error payload");
        };
        assert_eq!(error.user, "a@b.c");
    }

    #[test]
    fn test_empty_strings_fall_through() {
        let payload = decode(
            ResourceType::Error,
            &json!({"data": {"error": {"title": "", "user": {"email": ""}, "web_url": ""}}}),
        );
        let SentryPayload::Error(error) = payload else {
            panic!("expected error payload");
        };
        assert_eq!(error.title, UNKNOWN);
        assert_eq!(error.user, UNKNOWN);
        assert!(error.web_url.is_none());
    }

    #[test]
    fn test_counts_accept_numbers_and_strings() {
        let payload = decode(
            ResourceType::Issue,
            &json!({"action": "created", "data": {"issue": {"count": "12", "userCount": 3}}}),
        );
        let SentryPayload::Issue(issue) = payload else {
            panic!("expected issue payload");
        };
        assert_eq!(issue.event_count, "12");
        assert_eq!(issue.user_count, "3");
        assert_eq!(issue.action, "created");
    }

    #[test]
    fn test_wrong_types_degrade_to_unknown() {
        let payload = decode(
            ResourceType::Error,
            &json!({"data": {"error": {"title": {"nested": true}, "user": "someone", "exception": 7}}}),
        );
        let SentryPayload::Error(error) = payload else {
            panic!("expected error payload");
        };
        assert_eq!(error.title, UNKNOWN);
        assert_eq!(error.user, UNKNOWN);
        assert!(error.exception.is_none());

        let payload = decode(ResourceType::Issue, &json!({"data": "oops"}));
        assert_eq!(payload.title(), UNKNOWN);
    }

    #[test]
    fn test_exception_uses_last_value() {
        let payload = decode(
            ResourceType::Error,
            &json!({"data": {"error": {"exception": {"values": [
                {"type": "IOError", "value": "disk full"},
                {"type": "RuntimeError", "value": "save failed"}
            ]}}}}),
        );
        let SentryPayload::Error(error) = payload else {
            panic!("expected error payload");
        };
        assert_eq!(
            error.exception,
            Some(ExceptionDetail {
                kind: "RuntimeError".to_string(),
                value: "save failed".to_string(),
            })
        );
    }

    #[test]
    fn test_exception_without_value_is_dropped() {
        let payload = decode(
            ResourceType::Error,
            &json!({"data": {"error": {"exception": {"values": [{"type": "ValueError"}]}}}}),
        );
        let SentryPayload::Error(error) = payload else {
            panic!("expected error payload");
        };
        assert!(error.exception.is_none());
    }

    #[test]
    fn test_metric_alert_title_chain() {
        let payload = decode(
            ResourceType::MetricAlert,
            &json!({"action": "critical", "data": {"metric_alert": {"alert_rule": {"name": "p95 latency"}}}}),
        );
        let SentryPayload::MetricAlert(alert) = payload else {
            panic!("expected metric alert");
        };
        assert_eq!(alert.title, "p95 latency");
        assert_eq!(alert.status, "critical");
        assert_eq!(alert.description, UNKNOWN);
    }

    #[test]
    fn test_metric_alert_title_prefers_alert_title_over_rule_name() {
        let payload = decode(
            ResourceType::MetricAlert,
            &json!({"action": "warning", "data": {"metric_alert": {
                "title": "Latency above threshold",
                "alert_rule": {"name": "p95 latency"}
            }}}),
        );
        assert_eq!(payload.title(), "Latency above threshold");
    }

    #[test]
    fn test_metric_alert_title_prefers_description_title() {
        let payload = decode(
            ResourceType::MetricAlert,
            &json!({"action": "resolved", "data": {
                "description_title": "Resolved: p95 latency",
                "metric_alert": {
                    "title": "Latency above threshold",
                    "alert_rule": {"name": "p95 latency"}
                }
            }}),
        );
        assert_eq!(payload.title(), "Resolved: p95 latency");

        let payload = decode(
            ResourceType::MetricAlert,
            &json!({"data": {
                "description_title": "",
                "metric_alert": {"title": "Latency above threshold"}
            }}),
        );
        assert_eq!(payload.title(), "Latency above threshold");
    }

    #[test]
    fn test_issue_project_falls_back_to_slug() {
        let payload = decode(
            ResourceType::Issue,
            &json!({"data": {"issue": {"project": {"slug": "web-frontend"}}}}),
        );
        let SentryPayload::Issue(issue) = payload else {
            panic!("expected issue payload");
        };
        assert_eq!(issue.project, "web-frontend");
    }
}
