//! Slot lifecycle tests over real HTTP.

use super::{init_test_env, test_executor, test_history_config};
use rappit_core::coordinator::{Coordinator, RetryPolicy, SlotState};
use rappit_core::formatter::ContentKind;
use rappit_core::history::{HistoryFilter, HistoryStore};
use rappit_core::models::{HttpMethod, OutcomeKind, RequestSpec};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn get(url: String) -> RequestSpec {
    RequestSpec::builder(HttpMethod::GET, url)
        .timeout(Duration::from_secs(5))
        .build()
        .expect("Failed to build request")
}

async fn slow_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"{"id":1,"name":"Ada"}"#, "application/json"),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_send_formats_and_persists() {
    init_test_env();
    let server = slow_server().await;
    let dir = TempDir::new().unwrap();
    let history_path = dir.path().join("history.jsonl");

    let history = Arc::new(
        HistoryStore::open(&history_path, test_history_config(50))
            .await
            .unwrap(),
    );
    let coordinator = Coordinator::new(Arc::new(test_executor(10)), Arc::clone(&history));
    let slot = coordinator.open_slot();

    let completion = slot
        .send(get(format!("{}/json", server.uri())))
        .await
        .unwrap();

    let formatted = completion.formatted.expect("Expected a formatted response");
    assert_eq!(formatted.content_kind, ContentKind::Json);
    assert!(formatted
        .pretty_text
        .as_deref()
        .unwrap()
        .contains("\"name\": \"Ada\""));
    assert_eq!(formatted.find("ada", false).len(), 1);

    let entry = completion.history.unwrap();
    assert_eq!(entry.id, 1);
    drop(coordinator);
    drop(history);

    let reopened = HistoryStore::open(&history_path, test_history_config(50))
        .await
        .unwrap();
    let loaded = reopened.get(1).expect("Entry should survive a reopen");
    assert_eq!(loaded.outcome.status_code(), Some(200));
    assert_eq!(
        loaded.formatted.as_ref().map(|f| f.find("ada", false).len()),
        Some(1)
    );
}

#[tokio::test]
async fn test_cancel_records_exactly_one_cancelled_entry() {
    init_test_env();
    let server = slow_server().await;
    let history = Arc::new(HistoryStore::in_memory(test_history_config(50)));
    let coordinator = Coordinator::new(Arc::new(test_executor(10)), Arc::clone(&history));
    let slot = coordinator.open_slot();

    let execution = slot.send(get(format!("{}/slow", server.uri())));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(slot.cancel());

    let completion = execution.await.unwrap();
    assert_eq!(completion.outcome.kind(), OutcomeKind::Cancelled);
    assert!(completion.outcome.elapsed() < Duration::from_secs(3));
    assert_eq!(slot.state(), SlotState::Cancelled { execution: 1 });

    let entries = history.list(&HistoryFilter::new());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome.kind(), OutcomeKind::Cancelled);
    assert!(entries[0].formatted.is_none());
}

#[tokio::test]
async fn test_new_send_supersedes_previous() {
    init_test_env();
    let server = slow_server().await;
    let history = Arc::new(HistoryStore::in_memory(test_history_config(50)));
    let coordinator = Coordinator::new(Arc::new(test_executor(10)), Arc::clone(&history));
    let slot = coordinator.open_slot();

    let first = slot.send(get(format!("{}/slow", server.uri())));
    let second = slot.send(get(format!("{}/json", server.uri())));

    let first = first.await.unwrap();
    let second = second.await.unwrap();

    assert_eq!(first.outcome.kind(), OutcomeKind::Cancelled);
    assert!(second.outcome.is_success());
    assert_eq!(
        slot.state(),
        SlotState::Completed {
            execution: 2,
            outcome: OutcomeKind::Success
        }
    );
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn test_concurrent_slots_get_unique_increasing_ids() {
    init_test_env();
    let server = slow_server().await;
    let history = Arc::new(HistoryStore::in_memory(test_history_config(100)));
    let coordinator = Coordinator::new(Arc::new(test_executor(10)), Arc::clone(&history));

    let executions: Vec<_> = (0..8)
        .map(|_| {
            coordinator
                .open_slot()
                .send(get(format!("{}/json", server.uri())))
        })
        .collect();

    for execution in executions {
        execution.await.unwrap().history.unwrap();
    }

    let ids: Vec<u64> = history
        .list(&HistoryFilter::new())
        .iter()
        .rev()
        .map(|e| e.id)
        .collect();
    assert_eq!(ids, (1..=8).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_timeout_is_retried_then_recorded_once() {
    init_test_env();
    let server = slow_server().await;
    let history = Arc::new(HistoryStore::in_memory(test_history_config(50)));
    let coordinator = Coordinator::new(Arc::new(test_executor(10)), Arc::clone(&history))
        .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(10), 1.0));
    let slot = coordinator.open_slot();

    let spec = RequestSpec::builder(HttpMethod::GET, format!("{}/slow", server.uri()))
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();

    let completion = slot.send(spec).await.unwrap();

    assert_eq!(completion.outcome.kind(), OutcomeKind::Timeout);
    assert_eq!(history.len(), 1);
    assert_eq!(
        server
            .received_requests()
            .await
            .map(|requests| requests.len()),
        Some(2)
    );
}
