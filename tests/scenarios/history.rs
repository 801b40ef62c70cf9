//! Test: History - finished runs are saved and listed

use crate::helpers::*;
use flowline::core::RunStatus;
use flowline::persistence::{InMemoryPersistence, PersistenceBackend};
use serde_json::json;

const TINY: &str = r#"
name: "tiny"
steps:
  - name: "only"
    outputs: [value]
"#;

async fn check_backend(store: &dyn PersistenceBackend) {
    let ok = run_yaml(
        TINY,
        ScriptedExecutor::new().returns("only", json!({ "value": 1 })),
        json!({}),
    )
    .await;
    let failed = run_yaml(TINY, ScriptedExecutor::new().fails("only", "boom"), json!({})).await;

    store.save_run(&ok).await.unwrap();
    store.save_run(&failed).await.unwrap();

    let runs = store.list_runs("tiny").await.unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].run_id, failed.run_id);
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert_eq!(runs[1].succeeded_steps, 1);
    assert_eq!(runs[1].total_steps, 1);

    let loaded = store.load_run(ok.run_id).await.unwrap().unwrap();
    assert_eq!(loaded.output("only", "value"), Some(&json!(1)));
    assert_eq!(store.list_workflows().await.unwrap(), vec!["tiny"]);
}

#[tokio::test]
async fn test_in_memory_history() {
    check_backend(&InMemoryPersistence::new()).await;
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_sqlite_history() {
    let store = flowline::persistence::SqliteRunStore::new(":memory:")
        .await
        .unwrap();
    check_backend(&store).await;
}
