//! The system event catalog.
//!
//! A [`SystemEvent`] is an immutable, typed message flowing through the
//! engine. Events carry no identity of their own; the event queue assigns
//! arrival-order sequence numbers used as FIFO tie-breakers within a
//! priority band (see [`crate::queue::EventQueue`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Coarse scheduling priority attached by the producer at emit time.
///
/// This is out-of-band metadata, not part of the wire payload: it governs
/// only which lane of the event queue an event lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPriorityBand {
    Low,
    Normal,
    High,
}

impl Default for EventPriorityBand {
    fn default() -> Self {
        EventPriorityBand::Normal
    }
}

/// The incremental delta carried by `ISSUE_UPDATED`.
///
/// Fixed to this shape per the canonical catalog: the source alternated
/// between this and ad-hoc test shapes, so callers may not emit anything
/// else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueUpdateDelta {
    pub before: Value,
    pub after: Value,
    #[serde(rename = "changedFields")]
    pub changed_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataArrivedPayload {
    pub source: String,
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(rename = "pondEntryId")]
    pub pond_entry_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRequestReceivedPayload {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub content: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueCreatedPayload {
    #[serde(rename = "issueId")]
    pub issue_id: String,
    pub issue: Value,
    #[serde(rename = "createdBy")]
    pub created_by: String,
    #[serde(default, rename = "sourceWorkflow", skip_serializing_if = "Option::is_none")]
    pub source_workflow: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueUpdatedPayload {
    #[serde(rename = "issueId")]
    pub issue_id: String,
    pub updates: IssueUpdateDelta,
    #[serde(rename = "updatedBy")]
    pub updated_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueStatusChangedPayload {
    #[serde(rename = "issueId")]
    pub issue_id: String,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub issue: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighPriorityIssueDetectedPayload {
    #[serde(rename = "issueId")]
    pub issue_id: String,
    pub priority: i32,
    pub reason: String,
    #[serde(default, rename = "requiredAction", skip_serializing_if = "Option::is_none")]
    pub required_action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeExtractablePayload {
    #[serde(rename = "sourceType")]
    pub source_type: String,
    #[serde(rename = "sourceId")]
    pub source_id: String,
    pub confidence: f64,
    pub reason: String,
    #[serde(default, rename = "suggestedCategory", skip_serializing_if = "Option::is_none")]
    pub suggested_category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFrom {
    #[serde(rename = "type")]
    pub source_type: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeCreatedPayload {
    #[serde(rename = "knowledgeId")]
    pub knowledge_id: String,
    pub knowledge: Value,
    #[serde(rename = "sourceWorkflow")]
    pub source_workflow: String,
    #[serde(rename = "extractedFrom")]
    pub extracted_from: ExtractedFrom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveSummary {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub perspective_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuesClusterDetectedPayload {
    #[serde(rename = "clusterId")]
    pub cluster_id: String,
    #[serde(rename = "issueIds")]
    pub issue_ids: Vec<String>,
    pub perspective: PerspectiveSummary,
    #[serde(rename = "autoCreate")]
    pub auto_create: bool,
    #[serde(default, rename = "suggestedPriority", skip_serializing_if = "Option::is_none")]
    pub suggested_priority: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveTriggeredPayload {
    pub perspective: Value,
    #[serde(rename = "triggerReason")]
    pub trigger_reason: String,
    pub source: String,
    #[serde(default, rename = "suggestedIssues", skip_serializing_if = "Option::is_none")]
    pub suggested_issues: Option<Vec<String>>,
    #[serde(default, rename = "flowId", skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowCreatedPayload {
    #[serde(rename = "flowId")]
    pub flow_id: String,
    pub flow: Value,
    #[serde(rename = "createdBy")]
    pub created_by: String,
    #[serde(default, rename = "sourceWorkflow", skip_serializing_if = "Option::is_none")]
    pub source_workflow: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowStatusChangedPayload {
    #[serde(rename = "flowId")]
    pub flow_id: String,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Resolved per §9 Open Questions: symmetric with `FlowStatusChangedPayload`
/// and `HighPriorityFlowDetectedPayload` since the source table had no row
/// for this event despite it being named in the §3.1 catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowPriorityUpdatedPayload {
    #[serde(rename = "flowId")]
    pub flow_id: String,
    pub from: i32,
    pub to: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighPriorityFlowDetectedPayload {
    #[serde(rename = "flowId")]
    pub flow_id: String,
    pub priority: i32,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueStalledPayload {
    #[serde(rename = "issueId")]
    pub issue_id: String,
    #[serde(rename = "stalledDays")]
    pub stalled_days: i64,
    #[serde(rename = "lastUpdate")]
    pub last_update: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PondCapacityWarningPayload {
    pub usage: u64,
    pub capacity: u64,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleTriggeredPayload {
    #[serde(rename = "scheduleId")]
    pub schedule_id: String,
    #[serde(default, rename = "scheduleName", skip_serializing_if = "Option::is_none")]
    pub schedule_name: Option<String>,
    #[serde(rename = "originalRequest")]
    pub original_request: String,
    /// The caller-supplied template payload, carried through opaquely.
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringPatternDetectedPayload {
    #[serde(rename = "patternType")]
    pub pattern_type: String,
    pub description: String,
    pub occurrences: i64,
    pub confidence: f64,
    pub entities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMaintenanceDuePayload {
    #[serde(rename = "maintenanceType")]
    pub maintenance_type: String,
    #[serde(rename = "dueSince")]
    pub due_since: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdleTimeDetectedPayload {
    #[serde(rename = "idleSinceSeconds")]
    pub idle_since_seconds: i64,
    #[serde(rename = "lastActivityAt")]
    pub last_activity_at: DateTime<Utc>,
}

/// The closed catalog of event types the engine understands.
///
/// Workflow predicates and executors are the only consumers of a payload's
/// internal shape; the engine itself treats payloads opaquely and only
/// dispatches on `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemEvent {
    DataArrived(DataArrivedPayload),
    UserRequestReceived(UserRequestReceivedPayload),
    IssueCreated(IssueCreatedPayload),
    IssueUpdated(IssueUpdatedPayload),
    IssueStatusChanged(IssueStatusChangedPayload),
    HighPriorityIssueDetected(HighPriorityIssueDetectedPayload),
    KnowledgeExtractable(KnowledgeExtractablePayload),
    KnowledgeCreated(KnowledgeCreatedPayload),
    RecurringPatternDetected(RecurringPatternDetectedPayload),
    IssuesClusterDetected(IssuesClusterDetectedPayload),
    PerspectiveTriggered(PerspectiveTriggeredPayload),
    FlowCreated(FlowCreatedPayload),
    FlowStatusChanged(FlowStatusChangedPayload),
    FlowPriorityUpdated(FlowPriorityUpdatedPayload),
    HighPriorityFlowDetected(HighPriorityFlowDetectedPayload),
    IssueStalled(IssueStalledPayload),
    PondCapacityWarning(PondCapacityWarningPayload),
    ScheduleTriggered(ScheduleTriggeredPayload),
    ScheduledTimeReached(ScheduleTriggeredPayload),
    SystemMaintenanceDue(SystemMaintenanceDuePayload),
    IdleTimeDetected(IdleTimeDetectedPayload),
}

impl SystemEvent {
    /// The discriminator string used for registry lookups, matching the
    /// catalog's `SCREAMING_SNAKE_CASE` symbols exactly.
    pub fn event_type(&self) -> &'static str {
        match self {
            SystemEvent::DataArrived(_) => "DATA_ARRIVED",
            SystemEvent::UserRequestReceived(_) => "USER_REQUEST_RECEIVED",
            SystemEvent::IssueCreated(_) => "ISSUE_CREATED",
            SystemEvent::IssueUpdated(_) => "ISSUE_UPDATED",
            SystemEvent::IssueStatusChanged(_) => "ISSUE_STATUS_CHANGED",
            SystemEvent::HighPriorityIssueDetected(_) => "HIGH_PRIORITY_ISSUE_DETECTED",
            SystemEvent::KnowledgeExtractable(_) => "KNOWLEDGE_EXTRACTABLE",
            SystemEvent::KnowledgeCreated(_) => "KNOWLEDGE_CREATED",
            SystemEvent::RecurringPatternDetected(_) => "RECURRING_PATTERN_DETECTED",
            SystemEvent::IssuesClusterDetected(_) => "ISSUES_CLUSTER_DETECTED",
            SystemEvent::PerspectiveTriggered(_) => "PERSPECTIVE_TRIGGERED",
            SystemEvent::FlowCreated(_) => "FLOW_CREATED",
            SystemEvent::FlowStatusChanged(_) => "FLOW_STATUS_CHANGED",
            SystemEvent::FlowPriorityUpdated(_) => "FLOW_PRIORITY_UPDATED",
            SystemEvent::HighPriorityFlowDetected(_) => "HIGH_PRIORITY_FLOW_DETECTED",
            SystemEvent::IssueStalled(_) => "ISSUE_STALLED",
            SystemEvent::PondCapacityWarning(_) => "POND_CAPACITY_WARNING",
            SystemEvent::ScheduleTriggered(_) => "SCHEDULE_TRIGGERED",
            SystemEvent::ScheduledTimeReached(_) => "SCHEDULED_TIME_REACHED",
            SystemEvent::SystemMaintenanceDue(_) => "SYSTEM_MAINTENANCE_DUE",
            SystemEvent::IdleTimeDetected(_) => "IDLE_TIME_DETECTED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_type_matches_tag() {
        let event = SystemEvent::DataArrived(DataArrivedPayload {
            source: "inbox".into(),
            content: json!({"text": "hi"}),
            format: None,
            pond_entry_id: "pe-1".into(),
            timestamp: Utc::now(),
        });
        assert_eq!(event.event_type(), "DATA_ARRIVED");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "DATA_ARRIVED");
    }

    #[test]
    fn issue_updated_round_trip() {
        let event = SystemEvent::IssueUpdated(IssueUpdatedPayload {
            issue_id: "iss-1".into(),
            updates: IssueUpdateDelta {
                before: json!({"priority": 1}),
                after: json!({"priority": 5}),
                changed_fields: vec!["priority".into()],
            },
            updated_by: "workflow-x".into(),
        });
        let encoded = serde_json::to_string(&event).unwrap();
        let decoded: SystemEvent = serde_json::from_str(&encoded).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn priority_band_default_is_normal() {
        assert_eq!(EventPriorityBand::default(), EventPriorityBand::Normal);
        assert!(EventPriorityBand::High > EventPriorityBand::Normal);
        assert!(EventPriorityBand::Normal > EventPriorityBand::Low);
    }
}
