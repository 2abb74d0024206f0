//! Property-based tests for the schema aggregate.
//!
//! Random command sequences, including rejected ones, check that:
//! - field ids are assigned strictly increasing and never reused
//! - version equals replayed events plus raised events
//! - replaying the stored history reproduces the live state
//! - a deleted schema rejects every further command

use std::sync::Arc;

use proptest::prelude::*;
use schemafold::schema::{
    FieldId, FieldRegistry, SchemaAggregate, SchemaCommand, SchemaError, SchemaEvent,
    SchemaLifecycle, StringFieldProperties,
};
use schemafold::{AggregateRoot, CommandContext, EventRecord, ReplayPolicy, encode_domain_event};

// =============================================================================
// HELPER STRATEGIES
// =============================================================================

/// One step of an editing session. Field references are small numbers so
/// that sequences hit live, deleted and never-assigned ids alike.
#[derive(Debug, Clone)]
enum Step {
    Create,
    AddField(u8),
    DeleteField(u8),
    HideField(u8),
    Publish,
    Delete,
}

impl Step {
    fn command(&self) -> SchemaCommand {
        match self {
            Step::Create => SchemaCommand::Create {
                name: "blog".into(),
            },
            Step::AddField(n) => SchemaCommand::AddField {
                name: format!("field{n}"),
                properties: StringFieldProperties::default().into(),
            },
            Step::DeleteField(id) => SchemaCommand::DeleteField {
                field_id: FieldId(u64::from(*id)),
            },
            Step::HideField(id) => SchemaCommand::HideField {
                field_id: FieldId(u64::from(*id)),
            },
            Step::Publish => SchemaCommand::Publish,
            Step::Delete => SchemaCommand::Delete,
        }
    }
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        1 => Just(Step::Create),
        5 => (0u8..6).prop_map(Step::AddField),
        3 => (0u8..8).prop_map(Step::DeleteField),
        2 => (0u8..8).prop_map(Step::HideField),
        1 => Just(Step::Publish),
        1 => Just(Step::Delete),
    ]
}

fn steps_strategy() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(step_strategy(), 0..40)
}

fn new_root() -> AggregateRoot<SchemaAggregate> {
    AggregateRoot::new(
        "blog",
        SchemaAggregate::new(Arc::new(FieldRegistry::default())),
    )
}

/// Execute every step, ignoring rejections.
fn run(root: &mut AggregateRoot<SchemaAggregate>, steps: &[Step]) {
    for step in steps {
        let _ = root.execute(step.command());
    }
}

fn created_then(steps: Vec<Step>) -> Vec<Step> {
    std::iter::once(Step::Create).chain(steps).collect()
}

fn encode(root: &AggregateRoot<SchemaAggregate>) -> Vec<EventRecord> {
    let ctx = CommandContext::default();
    root.uncommitted()
        .iter()
        .enumerate()
        .map(|(i, e)| encode_domain_event::<SchemaAggregate>(e, &ctx, "blog", i as u64).unwrap())
        .collect()
}

fn replay(records: &[EventRecord]) -> AggregateRoot<SchemaAggregate> {
    AggregateRoot::load(
        "blog",
        SchemaAggregate::new(Arc::new(FieldRegistry::default())),
        records,
        ReplayPolicy::Reject,
    )
    .unwrap()
}

// =============================================================================
// FIELD ID PROPERTIES
// =============================================================================

proptest! {
    /// Every FieldAdded carries the next id, regardless of deletions.
    #[test]
    fn field_ids_strictly_increase(steps in steps_strategy()) {
        let mut root = new_root();
        run(&mut root, &created_then(steps));

        let ids: Vec<u64> = root
            .uncommitted()
            .iter()
            .filter_map(|e| match e {
                SchemaEvent::FieldAdded { field_id, .. } => Some(field_id.0),
                _ => None,
            })
            .collect();

        prop_assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids not increasing: {:?}", ids);
        let expected: Vec<u64> = (1..=ids.len() as u64).collect();
        prop_assert_eq!(&ids, &expected);

        let schema = root.state().schema().unwrap();
        prop_assert_eq!(schema.next_field_id(), ids.len() as u64);
        prop_assert!(schema.fields().all(|f| f.id().0 >= 1 && f.id().0 <= schema.next_field_id()));
    }

    /// Ids assigned after a reload continue where the history left off.
    #[test]
    fn field_ids_survive_replay(history in steps_strategy(), more in steps_strategy()) {
        let mut first = new_root();
        run(&mut first, &created_then(history));
        let before = first.state().schema().unwrap().next_field_id();

        let mut root = replay(&encode(&first));
        run(&mut root, &more);

        let mut next = before;
        for event in root.uncommitted() {
            if let SchemaEvent::FieldAdded { field_id, .. } = event {
                prop_assert_eq!(field_id.0, next + 1);
                next = field_id.0;
            }
        }
    }
}

// =============================================================================
// VERSION AND REPLAY PROPERTIES
// =============================================================================

proptest! {
    /// Version after replaying N events and raising M more is N + M.
    #[test]
    fn version_counts_replayed_and_raised(history in steps_strategy(), more in steps_strategy()) {
        let mut first = new_root();
        run(&mut first, &created_then(history));
        let records = encode(&first);
        let replayed = records.len() as u64;

        let mut root = replay(&records);
        prop_assert_eq!(root.version(), replayed);

        run(&mut root, &more);
        prop_assert_eq!(root.version(), replayed + root.uncommitted().len() as u64);
        prop_assert_eq!(root.committed_version(), replayed);
    }

    /// Replaying the same history always yields the live state.
    #[test]
    fn replay_reproduces_live_state(steps in steps_strategy()) {
        let mut live = new_root();
        run(&mut live, &steps);
        let records = encode(&live);

        let first = replay(&records);
        let second = replay(&records);

        prop_assert_eq!(first.version(), live.version());
        prop_assert_eq!(first.state().schema(), live.state().schema());
        prop_assert_eq!(first.state().schema(), second.state().schema());
        prop_assert_eq!(first.state().lifecycle(), live.state().lifecycle());
    }
}

// =============================================================================
// LIFECYCLE PROPERTIES
// =============================================================================

proptest! {
    /// Once deleted, every command is rejected and nothing is raised.
    #[test]
    fn deleted_schema_is_terminal(before in steps_strategy(), after in steps_strategy()) {
        let mut root = new_root();
        run(&mut root, &created_then(before));
        let _ = root.execute(SchemaCommand::Delete);
        prop_assert_eq!(root.state().lifecycle(), SchemaLifecycle::Deleted);

        let version = root.version();
        for step in &after {
            let rejected = matches!(
                root.execute(step.command()),
                Err(SchemaError::InvalidState(_))
            );
            prop_assert!(rejected, "{:?} was not rejected after Delete", step);
        }
        prop_assert_eq!(root.version(), version);
    }

    /// Before Create, every command other than Create is rejected.
    #[test]
    fn uncreated_schema_accepts_only_create(steps in steps_strategy()) {
        let mut root = new_root();
        for step in steps.iter().filter(|s| !matches!(s, Step::Create)) {
            let rejected = matches!(
                root.execute(step.command()),
                Err(SchemaError::InvalidState(_))
            );
            prop_assert!(rejected, "{:?} was accepted before Create", step);
        }
        prop_assert_eq!(root.version(), 0);
        prop_assert_eq!(root.state().lifecycle(), SchemaLifecycle::Uninitialized);
    }
}
