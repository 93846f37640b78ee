use super::*;
use crate::llm::LlmRequest;
use crate::media::{FrameExtractionRequest, SeekUnit};
use crate::schedule::types::TaskParams;
use chrono::Duration;
use uuid::Uuid;

fn create_test_task(params: TaskParams) -> Task {
    Task::new(format!("run_{}", Uuid::new_v4()), params)
}

fn frame_params() -> TaskParams {
    TaskParams::ExtractFrame(FrameExtractionRequest {
        video_url: "https://x/video.mp4".to_string(),
        timestamp: 1.0,
        unit: SeekUnit::Sec,
    })
}

fn llm_params() -> TaskParams {
    TaskParams::RunLlm(LlmRequest::new("gpt-4o", "hi"))
}

#[tokio::test]
async fn test_create_and_get_task() {
    let storage = InMemoryTaskStorage::new();
    let task = create_test_task(frame_params());

    storage.create(&task).await.unwrap();
    let retrieved = storage.get(&task.id).await.unwrap().unwrap();

    assert_eq!(task.id, retrieved.id);
    assert_eq!(retrieved.status, TaskStatus::Triggered);
    assert!(storage.create(&task).await.is_err());
    assert!(storage.get("run_missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_claim_next_takes_oldest_of_matching_type() {
    let storage = InMemoryTaskStorage::new();

    let mut older = create_test_task(frame_params());
    older.created_at = Utc::now() - Duration::seconds(10);
    let newer = create_test_task(frame_params());
    let other_type = create_test_task(llm_params());

    storage.create(&newer).await.unwrap();
    storage.create(&other_type).await.unwrap();
    storage.create(&older).await.unwrap();

    let claimed = storage.claim_next(TaskType::ExtractFrame).await.unwrap().unwrap();
    assert_eq!(claimed.id, older.id);
    assert_eq!(claimed.status, TaskStatus::Running);
    assert!(claimed.started_at.is_some());

    let claimed = storage.claim_next(TaskType::ExtractFrame).await.unwrap().unwrap();
    assert_eq!(claimed.id, newer.id);

    assert!(storage.claim_next(TaskType::ExtractFrame).await.unwrap().is_none());
    assert_eq!(storage.claim_next(TaskType::RunLlm).await.unwrap().unwrap().id, other_type.id);
}

#[tokio::test]
async fn test_save_requires_existing_task() {
    let storage = InMemoryTaskStorage::new();
    let mut task = create_test_task(llm_params());
    assert!(storage.save(&task).await.is_err());

    storage.create(&task).await.unwrap();
    task.status = TaskStatus::Failed;
    task.error = Some("ConfigError: OPENAI_API_KEY not set".to_string());
    storage.save(&task).await.unwrap();

    let failed = storage.get_by_status(TaskStatus::Failed).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].error.as_deref(), Some("ConfigError: OPENAI_API_KEY not set"));
}

#[tokio::test]
async fn test_cleanup_old_only_removes_stale_terminal_runs() {
    let storage = InMemoryTaskStorage::new();

    let mut stale_done = create_test_task(llm_params());
    stale_done.status = TaskStatus::Completed;
    stale_done.updated_at = Utc::now() - Duration::hours(25);

    let mut stale_running = create_test_task(llm_params());
    stale_running.status = TaskStatus::Running;
    stale_running.updated_at = Utc::now() - Duration::hours(25);

    let mut fresh_failed = create_test_task(llm_params());
    fresh_failed.status = TaskStatus::Failed;

    for task in [&stale_done, &stale_running, &fresh_failed] {
        storage.create(task).await.unwrap();
    }

    let cleaned = storage.cleanup_old(Utc::now() - Duration::hours(24)).await.unwrap();
    assert_eq!(cleaned, 1);
    assert!(storage.get(&stale_done.id).await.unwrap().is_none());
    assert!(storage.get(&stale_running.id).await.unwrap().is_some());
    assert!(storage.get(&fresh_failed.id).await.unwrap().is_some());
}
