//! Rendering of notification messages from alert groups.
//!
//! A [`Message`] is rendered exactly once per group flush and handed to
//! every channel of the receiver unchanged. Channels format transport
//! specifics themselves; title and body here are plain text.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use vigil_alerts::{Alert, LABEL_ALERTNAME, LABEL_SERVICE};

/// Delivery status of a rendered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// At least one alert in the group is still active.
    Firing,
    /// Every alert in the group has resolved.
    Resolved,
}

impl MessageStatus {
    /// Returns the status as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Firing => "firing",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A notification rendered from one group flush.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Whether the group is firing or fully resolved.
    pub status: MessageStatus,
    /// One-line summary, e.g. `[FIRING:2] ErrorBudgetBurn (checkout)`.
    pub title: String,
    /// Multi-line plain-text body.
    pub body: String,
    /// Canonical key of the notification group.
    pub group_key: String,
    /// Label values the group is keyed by.
    pub group_labels: HashMap<String, String>,
    /// Labels shared by every alert in the group.
    pub common_labels: HashMap<String, String>,
    /// Annotations shared by every alert in the group.
    pub common_annotations: HashMap<String, String>,
    /// The alerts in the group, in group order.
    pub alerts: Vec<Alert>,
}

impl Message {
    /// Renders the notification for a group flush.
    ///
    /// The title follows the `[FIRING:2] <alertname> (<service>)` shape,
    /// falling back to `[RESOLVED]` when nothing is active. The body
    /// lists the group labels, whatever labels and annotations are
    /// shared by every member, and one line per alert.
    #[must_use]
    pub fn render(
        group_key: &str,
        group_labels: &HashMap<String, String>,
        alerts: &[Alert],
    ) -> Self {
        let firing = alerts.iter().filter(|a| a.is_active()).count();
        let status = if firing > 0 {
            MessageStatus::Firing
        } else {
            MessageStatus::Resolved
        };
        let (common_labels, common_annotations) = common_maps(alerts);

        let title = render_title(status, firing, group_labels, &common_labels, alerts);
        let body = render_body(group_labels, &common_labels, &common_annotations, alerts);

        Self {
            status,
            title,
            body,
            group_key: group_key.to_string(),
            group_labels: group_labels.clone(),
            common_labels,
            common_annotations,
            alerts: alerts.to_vec(),
        }
    }
}

fn render_title(
    status: MessageStatus,
    firing: usize,
    group_labels: &HashMap<String, String>,
    common_labels: &HashMap<String, String>,
    alerts: &[Alert],
) -> String {
    let tag = match status {
        MessageStatus::Firing => format!("[FIRING:{firing}]"),
        MessageStatus::Resolved => "[RESOLVED]".to_string(),
    };
    let name = title_label(LABEL_ALERTNAME, group_labels, common_labels, alerts)
        .unwrap_or_else(|| "alerts".to_string());

    match title_label(LABEL_SERVICE, group_labels, common_labels, alerts) {
        Some(service) => format!("{tag} {name} ({service})"),
        None => format!("{tag} {name}"),
    }
}

/// Prefers the group's value for a label, then the common set, then the
/// first alert carrying a non-empty value.
fn title_label(
    name: &str,
    group_labels: &HashMap<String, String>,
    common_labels: &HashMap<String, String>,
    alerts: &[Alert],
) -> Option<String> {
    for value in [group_labels.get(name), common_labels.get(name)]
        .into_iter()
        .flatten()
    {
        if !value.is_empty() {
            return Some(value.clone());
        }
    }
    alerts
        .iter()
        .find_map(|a| a.label(name).filter(|v| !v.is_empty()).map(str::to_string))
}

fn render_body(
    group_labels: &HashMap<String, String>,
    common_labels: &HashMap<String, String>,
    common_annotations: &HashMap<String, String>,
    alerts: &[Alert],
) -> String {
    let mut body = String::new();

    push_section(&mut body, "Group labels:", group_labels);
    push_section(&mut body, "Common labels:", common_labels);
    push_section(&mut body, "Common annotations:", common_annotations);

    body.push_str("Alerts:\n");
    for alert in alerts {
        body.push_str(&alert_line(alert, common_labels));
        body.push('\n');
    }
    body
}

fn push_section(body: &mut String, heading: &str, map: &HashMap<String, String>) {
    if map.is_empty() {
        return;
    }
    body.push_str(heading);
    body.push('\n');
    for (name, value) in map.iter().collect::<BTreeMap<_, _>>() {
        body.push_str(&format!("  {name} = {value}\n"));
    }
    body.push('\n');
}

/// One body line per alert: state, distinguishing labels, observed value.
///
/// Labels already listed in the common section are left out of the line.
fn alert_line(alert: &Alert, common_labels: &HashMap<String, String>) -> String {
    let distinct: BTreeMap<&String, &String> = alert
        .labels
        .iter()
        .filter(|(name, value)| common_labels.get(*name) != Some(*value))
        .collect();

    let mut line = format!("- {}", alert.state);
    for (name, value) in distinct {
        line.push_str(&format!(" {name}={value:?}"));
    }
    line.push_str(&format!(" (value {:.2})", alert.value));
    line
}

/// Labels and annotations that hold with the same value on every alert.
fn common_maps(alerts: &[Alert]) -> (HashMap<String, String>, HashMap<String, String>) {
    let Some(first) = alerts.first() else {
        return (HashMap::new(), HashMap::new());
    };

    let labels = first
        .labels
        .iter()
        .filter(|(name, value)| alerts.iter().all(|a| a.labels.get(*name) == Some(*value)))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    let annotations = first
        .annotations
        .iter()
        .filter(|(name, value)| {
            alerts
                .iter()
                .all(|a| a.annotations.get(*name) == Some(*value))
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    (labels, annotations)
}
