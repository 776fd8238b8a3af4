//! Given an event, returns the ordered list of matching workflows.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crate::event::SystemEvent;

use super::definition::WorkflowDefinition;
use super::registry::WorkflowRegistry;

/// The resolver's output: the ordered list of workflows that should run
/// for this event, plus timing/debug counters.
pub struct Resolution<'a> {
    pub workflows: Vec<&'a WorkflowDefinition>,
    pub resolution_time: Duration,
    pub candidates_considered: usize,
    pub predicates_rejected: usize,
    pub predicates_panicked: usize,
}

/// Resolves events to ordered workflow lists.
///
/// Algorithm (§4.2):
/// 1. `C0 = registry.find_by_event_type(event.type)`.
/// 2. Filter by predicate; a panicking predicate is treated as `false`
///    and logged.
/// 3. Sort survivors by `triggers.priority` descending, stable on ties
///    (registration order preserved).
pub struct WorkflowResolver;

impl WorkflowResolver {
    #[tracing::instrument(skip(registry, event), fields(event_type = event.event_type()))]
    pub fn resolve<'a>(registry: &'a WorkflowRegistry, event: &SystemEvent) -> Resolution<'a> {
        let started = Instant::now();
        let candidates = registry.find_by_event_type(event.event_type());
        let candidates_considered = candidates.len();

        let mut predicates_rejected = 0;
        let mut predicates_panicked = 0;

        let mut survivors: Vec<&WorkflowDefinition> = candidates
            .into_iter()
            .filter(|def| match &def.triggers.condition {
                None => true,
                Some(condition) => {
                    let cond = condition.clone();
                    let event_ref = event;
                    match catch_unwind(AssertUnwindSafe(|| cond(event_ref))) {
                        Ok(true) => true,
                        Ok(false) => {
                            predicates_rejected += 1;
                            false
                        }
                        Err(_) => {
                            predicates_panicked += 1;
                            tracing::warn!(
                                workflow = %def.name,
                                "workflow predicate panicked; treating as false"
                            );
                            false
                        }
                    }
                }
            })
            .collect();

        // Stable sort: equal priorities keep registration/candidate order.
        survivors.sort_by(|a, b| b.triggers.priority.cmp(&a.triggers.priority));

        Resolution {
            workflows: survivors,
            resolution_time: started.elapsed(),
            candidates_considered,
            predicates_rejected,
            predicates_panicked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DataArrivedPayload, IssueUpdatedPayload, IssueUpdateDelta};
    use crate::workflow::{WorkflowDefinition, WorkflowResult};
    use serde_json::json;

    fn data_arrived() -> SystemEvent {
        SystemEvent::DataArrived(DataArrivedPayload {
            source: "test".into(),
            content: json!({}),
            format: None,
            pond_entry_id: "p1".into(),
            timestamp: chrono::Utc::now(),
        })
    }

    fn noop_def(name: &str, event_type: &'static str, priority: i32) -> WorkflowDefinition {
        WorkflowDefinition::builder(name, "test")
            .on_event(event_type)
            .priority(priority)
            .build(|_event, context, _emitter| {
                Box::pin(async move { WorkflowResult::success(context, None) })
            })
    }

    #[test]
    fn empty_registry_resolves_to_empty() {
        let registry = WorkflowRegistry::new();
        let resolution = WorkflowResolver::resolve(&registry, &data_arrived());
        assert!(resolution.workflows.is_empty());
    }

    #[test]
    fn scenario_a_fan_out_by_priority() {
        let mut registry = WorkflowRegistry::new();
        registry.register(noop_def("low", "DATA_ARRIVED", 10));
        registry.register(noop_def("high", "DATA_ARRIVED", 100));
        registry.register(noop_def("mid", "DATA_ARRIVED", 50));

        let resolution = WorkflowResolver::resolve(&registry, &data_arrived());
        let names: Vec<&str> = resolution.workflows.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["high", "mid", "low"]);
    }

    #[test]
    fn priority_ties_preserve_registration_order() {
        let mut registry = WorkflowRegistry::new();
        registry.register(noop_def("first", "DATA_ARRIVED", 5));
        registry.register(noop_def("second", "DATA_ARRIVED", 5));
        registry.register(noop_def("third", "DATA_ARRIVED", 5));

        let resolution = WorkflowResolver::resolve(&registry, &data_arrived());
        let names: Vec<&str> = resolution.workflows.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn scenario_b_predicate_filtering() {
        let mut registry = WorkflowRegistry::new();
        let def = WorkflowDefinition::builder("w1", "reacts to priority changes")
            .on_event("ISSUE_UPDATED")
            .priority(0)
            .condition(|event| match event {
                SystemEvent::IssueUpdated(payload) => payload
                    .updates
                    .changed_fields
                    .iter()
                    .any(|f| f == "priority"),
                _ => false,
            })
            .build(|_event, context, _emitter| {
                Box::pin(async move { WorkflowResult::success(context, None) })
            });
        registry.register(def);

        let priority_changed = SystemEvent::IssueUpdated(IssueUpdatedPayload {
            issue_id: "i1".into(),
            updates: IssueUpdateDelta {
                before: json!({}),
                after: json!({}),
                changed_fields: vec!["priority".into()],
            },
            updated_by: "tester".into(),
        });
        let description_changed = SystemEvent::IssueUpdated(IssueUpdatedPayload {
            issue_id: "i1".into(),
            updates: IssueUpdateDelta {
                before: json!({}),
                after: json!({}),
                changed_fields: vec!["description".into()],
            },
            updated_by: "tester".into(),
        });

        assert_eq!(WorkflowResolver::resolve(&registry, &priority_changed).workflows.len(), 1);
        assert_eq!(WorkflowResolver::resolve(&registry, &description_changed).workflows.len(), 0);
    }

    #[test]
    fn panicking_predicate_is_treated_as_false() {
        let mut registry = WorkflowRegistry::new();
        let def = WorkflowDefinition::builder("panics", "bad predicate")
            .on_event("DATA_ARRIVED")
            .priority(0)
            .condition(|_event| panic!("boom"))
            .build(|_event, context, _emitter| {
                Box::pin(async move { WorkflowResult::success(context, None) })
            });
        registry.register(def);

        let resolution = WorkflowResolver::resolve(&registry, &data_arrived());
        assert!(resolution.workflows.is_empty());
        assert_eq!(resolution.predicates_panicked, 1);
    }
}
