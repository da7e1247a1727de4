use chrono::Utc;
use proptest::prelude::*;
use serde_json::{Map, Value};
use std::sync::Arc;

use sdk::{InMemorySnapshotStore, SystemClock};
use tripsquad_engine::config::MemoryConfig;
use tripsquad_engine::conductor::WorkflowState;
use tripsquad_engine::memory::{
    Chunker, KindSelector, MemoryDraft, MemoryGateway, MemoryKind, MemoryQuery, MemoryRecord,
    Metadata,
};

fn draft(id: bool, kind: bool, content: bool, metadata: Option<(bool, bool)>) -> MemoryDraft {
    MemoryDraft {
        id: id.then(|| "mem_1".to_string()),
        kind: kind.then(|| "destination".to_string()),
        content: content.then(|| "Tokyo travel notes".to_string()),
        metadata: metadata.map(|(source, created_at)| {
            let mut map = Map::new();
            if source {
                map.insert("source".into(), Value::String("test".into()));
            }
            if created_at {
                map.insert("created_at".into(), Value::String(Utc::now().to_rfc3339()));
            }
            map
        }),
    }
}

proptest! {
    // Every missing required field is reported, and nothing else.
    #[test]
    fn test_validation_reports_every_missing_field(
        id in any::<bool>(),
        kind in any::<bool>(),
        content in any::<bool>(),
        metadata in proptest::option::of((any::<bool>(), any::<bool>())),
    ) {
        let mut expected = Vec::new();
        if !id { expected.push("id"); }
        if !kind { expected.push("kind"); }
        if !content { expected.push("content"); }
        match metadata {
            None => expected.push("metadata"),
            Some((source, created_at)) => {
                if !source { expected.push("metadata.source"); }
                if !created_at { expected.push("metadata.created_at"); }
            }
        }

        let result = draft(id, kind, content, metadata).validate();
        if expected.is_empty() {
            prop_assert!(result.is_ok());
        } else {
            let err = result.unwrap_err();
            prop_assert_eq!(err.fields, expected);
        }
    }

    // Any label routes to exactly one of the seven partitions.
    #[test]
    fn test_routing_is_total(label in "\\PC{0,24}") {
        let kind = MemoryKind::route(&label);
        prop_assert!(MemoryKind::ALL.contains(&kind));
        match MemoryKind::from_label(&label) {
            Some(known) => prop_assert_eq!(kind, known),
            None => prop_assert_eq!(kind, MemoryKind::FALLBACK),
        }
    }

    // A record is found under its own kind and under no other.
    #[test]
    fn test_records_stay_in_their_partition(kind_index in 0usize..7, word in "[a-z]{4,10}") {
        let kind = MemoryKind::ALL[kind_index];
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let gateway = MemoryGateway::new(
                &MemoryConfig::default(),
                Arc::new(SystemClock),
                Arc::new(InMemorySnapshotStore::new()),
            );
            let record = MemoryRecord::new(
                "mem_routed",
                kind,
                format!("note about {}", word),
                Metadata::new("test", Utc::now()),
            );
            gateway.add_record(record).await.unwrap();

            for other in MemoryKind::ALL {
                let outcome = gateway
                    .query_memory(&MemoryQuery::new(word.clone()).kind(KindSelector::Kind(other)))
                    .await
                    .unwrap();
                if other == kind {
                    prop_assert_eq!(outcome.results.len(), 1);
                    prop_assert_eq!(outcome.results[0].fragment.id.as_str(), "mem_routed");
                } else {
                    prop_assert!(outcome.results.is_empty());
                }
            }
            Ok(())
        })?;
    }

    // Chunks never split a sentence and rejoin to the normalised content.
    #[test]
    fn test_chunks_rejoin_to_original(
        sentences in proptest::collection::vec("[a-z]{1,12}( [a-z]{1,12}){0,6}\\.", 1..20),
        max in 10usize..120,
    ) {
        let content = sentences.join(" ");
        let record = MemoryRecord::new(
            "mem_chunked",
            MemoryKind::Trip,
            content.clone(),
            Metadata::new("test", Utc::now()),
        );
        let fragments = Chunker::new(max).chunk(record);

        let rejoined: Vec<&str> = fragments.iter().map(|f| f.content.as_str()).collect();
        prop_assert_eq!(rejoined.join(" "), content.clone());

        if content.chars().count() > max {
            for (i, fragment) in fragments.iter().enumerate() {
                prop_assert_eq!(fragment.metadata.chunk_index, Some(i));
                prop_assert_eq!(fragment.metadata.chunk_count, Some(fragments.len()));
                let len = fragment.content.chars().count();
                let single_sentence = sentences.iter().any(|s| s == &fragment.content);
                prop_assert!(len <= max || single_sentence);
            }
        }
    }

    // Results come back best first and never exceed the limit.
    #[test]
    fn test_ranking_is_monotonic(
        contents in proptest::collection::vec(
            proptest::collection::vec(prop_oneof!["tokyo", "food", "temple", "budget", "night"], 1..6),
            1..25,
        ),
        limit in 1usize..10,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let gateway = MemoryGateway::new(
                &MemoryConfig::default(),
                Arc::new(SystemClock),
                Arc::new(InMemorySnapshotStore::new()),
            );
            let kinds = [MemoryKind::Trip, MemoryKind::Destination, MemoryKind::Budget];
            for (i, words) in contents.iter().enumerate() {
                let record = MemoryRecord::new(
                    format!("mem_{}", i),
                    kinds[i % kinds.len()],
                    words.join(" "),
                    Metadata::new("test", Utc::now()),
                );
                gateway.add_record(record).await.unwrap();
            }

            let outcome = gateway
                .query_memory(&MemoryQuery::new("tokyo food").kind(KindSelector::All).limit(limit))
                .await
                .unwrap();

            prop_assert!(outcome.results.len() <= limit);
            prop_assert!(outcome.results.len() <= outcome.total_candidates);
            for pair in outcome.results.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
            for hit in &outcome.results {
                prop_assert!((0.0..=1.0).contains(&hit.score));
            }
            Ok(())
        })?;
    }

    // Transitions only ever move forward along the happy path or into ERROR.
    #[test]
    fn test_workflow_never_moves_backwards(from in 0usize..7, to in 0usize..7) {
        let states = [
            WorkflowState::Idle,
            WorkflowState::Planning,
            WorkflowState::Validation,
            WorkflowState::Refinement,
            WorkflowState::Finalization,
            WorkflowState::Completed,
            WorkflowState::Error,
        ];
        let (from, to) = (states[from], states[to]);
        if from.can_transition_to(to) {
            prop_assert!(!from.is_terminal());
            prop_assert!(to == WorkflowState::Error || from.successor() == Some(to));
        }
    }
}
