//! Block Kit formatting for decoded Sentry payloads.
//!
//! Each formatter is a pure function of its payload. Optional blocks (link,
//! exception detail) are only emitted when their source value is present.
//! Payload text is escaped before it is embedded in Slack markdown.

use crate::blocks::{escape_mrkdwn, DisplayBlock};
use crate::payload::{ErrorEvent, IssueAlert, IssueUpdate, MetricAlert, SentryPayload};

/// Header icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    Alert,
    Warning,
    Success,
    Muted,
}

impl Icon {
    /// Slack emoji shortcode.
    #[must_use]
    pub const fn emoji(self) -> &'static str {
        match self {
            Self::Alert => ":red_circle:",
            Self::Warning => ":warning:",
            Self::Success => ":white_check_mark:",
            Self::Muted => ":no_bell:",
        }
    }

    /// Issue alerts: `error`/`fatal` events alert, everything else warns.
    #[must_use]
    pub fn for_level(level: &str) -> Self {
        match level {
            "error" | "fatal" => Self::Alert,
            _ => Self::Warning,
        }
    }

    /// Metric alerts are keyed by the webhook action.
    #[must_use]
    pub fn for_metric_action(action: &str) -> Self {
        match action {
            "critical" => Self::Alert,
            "resolved" => Self::Success,
            _ => Self::Warning,
        }
    }

    /// Issue updates are keyed by the issue status.
    #[must_use]
    pub fn for_issue_status(status: &str) -> Self {
        match status {
            "resolved" => Self::Success,
            "ignored" => Self::Muted,
            _ => Self::Alert,
        }
    }
}

/// Format any decoded payload.
#[must_use]
pub fn format_payload(payload: &SentryPayload) -> Vec<DisplayBlock> {
    match payload {
        SentryPayload::IssueAlert(alert) => format_issue_alert(alert),
        SentryPayload::MetricAlert(alert) => format_metric_alert(alert),
        SentryPayload::Issue(issue) => format_issue(issue),
        SentryPayload::Error(error) => format_error(error),
    }
}

/// Header, field grid, optional link.
#[must_use]
pub fn format_issue_alert(alert: &IssueAlert) -> Vec<DisplayBlock> {
    let icon = Icon::for_level(&alert.level);

    let mut blocks = vec![
        DisplayBlock::text(format!(
            "{} *{}*\nRule: {}",
            icon.emoji(),
            escape_mrkdwn(&alert.title),
            escape_mrkdwn(&alert.rule)
        )),
        DisplayBlock::fields([
            ("Environment", escape_mrkdwn(&alert.environment)),
            ("Level", escape_mrkdwn(&alert.level)),
            ("Culprit", escape_mrkdwn(&alert.culprit)),
            ("User", escape_mrkdwn(&alert.user)),
        ]),
    ];
    push_link(&mut blocks, alert.web_url.as_deref());
    blocks
}

/// Header, description, optional link.
#[must_use]
pub fn format_metric_alert(alert: &MetricAlert) -> Vec<DisplayBlock> {
    let icon = Icon::for_metric_action(&alert.status);

    let mut blocks = vec![
        DisplayBlock::text(format!(
            "{} *{}*\nStatus: {}",
            icon.emoji(),
            escape_mrkdwn(&alert.title),
            escape_mrkdwn(&alert.status)
        )),
        DisplayBlock::text(escape_mrkdwn(&alert.description)),
    ];
    push_link(&mut blocks, alert.web_url.as_deref());
    blocks
}

/// Header, field grid, culprit, optional link.
#[must_use]
pub fn format_issue(issue: &IssueUpdate) -> Vec<DisplayBlock> {
    let icon = Icon::for_issue_status(&issue.status);

    let mut blocks = vec![
        DisplayBlock::text(format!(
            "{} *{}*\nAction: {} | Status: {}",
            icon.emoji(),
            escape_mrkdwn(&issue.title),
            escape_mrkdwn(&issue.action),
            escape_mrkdwn(&issue.status)
        )),
        DisplayBlock::fields([
            ("Project", escape_mrkdwn(&issue.project)),
            ("Level", escape_mrkdwn(&issue.level)),
            ("Events", escape_mrkdwn(&issue.event_count)),
            ("Users Affected", escape_mrkdwn(&issue.user_count)),
        ]),
        DisplayBlock::text(format!("*Culprit:*\n{}", escape_mrkdwn(&issue.culprit))),
    ];
    push_link(&mut blocks, issue.web_url.as_deref());
    blocks
}

/// Header, field grid, optional exception, optional link.
#[must_use]
pub fn format_error(error: &ErrorEvent) -> Vec<DisplayBlock> {
    let mut blocks = vec![
        DisplayBlock::text(format!(
            "{} *{}*",
            Icon::Alert.emoji(),
            escape_mrkdwn(&error.title)
        )),
        DisplayBlock::fields([
            ("Environment", escape_mrkdwn(&error.environment)),
            ("Level", escape_mrkdwn(&error.level)),
            ("Culprit", escape_mrkdwn(&error.culprit)),
            ("User", escape_mrkdwn(&error.user)),
        ]),
    ];
    if let Some(exception) = &error.exception {
        blocks.push(DisplayBlock::text(format!(
            "*{}:* {}",
            escape_mrkdwn(&exception.kind),
            escape_mrkdwn(&exception.value)
        )));
    }
    push_link(&mut blocks, error.web_url.as_deref());
    blocks
}

fn push_link(blocks: &mut Vec<DisplayBlock>, url: Option<&str>) {
    if let Some(url) = url.filter(|u| !u.is_empty()) {
        blocks.push(DisplayBlock::link(url));
    }
}
