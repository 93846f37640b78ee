use super::*;
use crate::config::{Environment, ExecutionConfig, RetryPolicy};
use crate::error::TaskError;
use crate::llm::{LlmRequest, LlmResult};
use crate::storage::task::InMemoryTaskStorage;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::sleep;

/// Echoes the user message back, optionally failing the first attempts,
/// stalling, or panicking.
struct EchoProcessor {
    calls: Arc<AtomicU32>,
    failures_before_success: u32,
    stall: Option<Duration>,
    panics: bool,
    ceiling: Option<Duration>,
}

impl EchoProcessor {
    fn new() -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            failures_before_success: 0,
            stall: None,
            panics: false,
            ceiling: Some(Duration::from_secs(5)),
        }
    }
}

#[async_trait]
impl TaskProcessor for EchoProcessor {
    fn task_type(&self) -> TaskType {
        TaskType::RunLlm
    }

    fn max_duration(&self) -> Option<Duration> {
        self.ceiling
    }

    fn validate_params(&self, params: &TaskParams) -> Result<(), TaskError> {
        match params {
            TaskParams::RunLlm(request) => request.validate().map(|_| ()),
            _ => Err(TaskError::Validation("expected run-llm params".to_string())),
        }
    }

    async fn process(&self, task: &Task) -> Result<TaskResult, TaskError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(stall) = self.stall {
            sleep(stall).await;
        }
        if self.panics {
            panic!("processor blew up");
        }
        if call <= self.failures_before_success {
            return Err(TaskError::Provider {
                provider: crate::llm::ProviderKind::OpenAi,
                status: 503,
                body: "overloaded".to_string(),
            });
        }
        let TaskParams::RunLlm(request) = &task.params else {
            unreachable!()
        };
        Ok(TaskResult::RunLlm(LlmResult {
            text: request.user_message.to_uppercase(),
            model: request.model.clone(),
            tokens_used: 1,
        }))
    }
}

fn fast_retry(environment: Environment) -> ExecutionConfig {
    ExecutionConfig {
        environment,
        retry: RetryPolicy {
            min_timeout: Duration::from_millis(10),
            max_timeout: Duration::from_millis(40),
            ..RetryPolicy::default()
        },
        ..ExecutionConfig::default()
    }
}

fn manager(processor: EchoProcessor, config: ExecutionConfig) -> Arc<TaskManager> {
    let mut manager = TaskManager::new(Arc::new(InMemoryTaskStorage::new()), config);
    manager.register_processor(Arc::new(processor));
    Arc::new(manager)
}

fn llm_params(message: &str) -> TaskParams {
    TaskParams::RunLlm(LlmRequest::new("gpt-4o", message))
}

async fn claim_and_process(manager: &TaskManager, id: &str) -> Result<Task> {
    let claimed = manager.get_next_task(TaskType::RunLlm).await?.unwrap();
    assert_eq!(claimed.id, id);
    assert_eq!(claimed.status, TaskStatus::Running);
    manager.process_task(claimed).await
}

#[tokio::test]
async fn test_complete_task_lifecycle() -> Result<()> {
    let manager = manager(EchoProcessor::new(), ExecutionConfig::default());
    let scheduler = Arc::new(TaskScheduler::new(manager.clone()).with_poll_interval(Duration::from_millis(20)));
    scheduler.spawn_workers().await;

    let _scheduler_handle = tokio::spawn({
        let scheduler = scheduler.clone();
        async move {
            let _ = scheduler.run().await;
        }
    });

    let handle = manager.enqueue(llm_params("hello")).await?;
    assert!(handle.id.starts_with("run_"));
    assert_eq!(handle.status, TaskStatus::Triggered);

    let mut finished = None;
    for _ in 0..100 {
        if let Some(run) = manager.retrieve(&handle.id).await? {
            if run.status.is_terminal() {
                finished = Some(run);
                break;
            }
        }
        sleep(Duration::from_millis(20)).await;
    }

    let run = finished.expect("run should finish");
    assert_eq!(run.status, TaskStatus::Completed);
    assert_eq!(run.output.unwrap()["text"], "HELLO");
    assert!(run.error.is_none());
    Ok(())
}

#[tokio::test]
async fn test_enqueue_validates_before_storing() -> Result<()> {
    let manager = manager(EchoProcessor::new(), ExecutionConfig::default());

    let err = manager.enqueue(llm_params("   ")).await.unwrap_err();
    assert!(matches!(err, TaskError::Validation(_)));

    let err = manager
        .enqueue(TaskParams::RunLlm(LlmRequest::new("llama-3", "hi")))
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::UnknownModel(_)));

    assert!(manager.storage().get_by_status(TaskStatus::Triggered).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unregistered_task_type_is_rejected() {
    let manager = manager(EchoProcessor::new(), ExecutionConfig::default());
    let err = manager
        .trigger("extract-frame", serde_json::json!({ "videoUrl": "https://x/video.mp4" }))
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::Config(_)));
}

#[tokio::test]
async fn test_retrieve_unknown_run() -> Result<()> {
    let manager = manager(EchoProcessor::new(), ExecutionConfig::default());
    assert!(manager.retrieve("run_missing").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_production_retries_from_scratch() -> Result<()> {
    let mut processor = EchoProcessor::new();
    processor.failures_before_success = 1;
    let calls = processor.calls.clone();
    let manager = manager(processor, fast_retry(Environment::Production));

    let task = manager.create_task(llm_params("again")).await?;
    let done = claim_and_process(&manager, &task.id).await?;

    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(done.attempts, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(done.completed_at.is_some());
    Ok(())
}

#[tokio::test]
async fn test_production_gives_up_after_max_attempts() -> Result<()> {
    let mut processor = EchoProcessor::new();
    processor.failures_before_success = u32::MAX;
    let calls = processor.calls.clone();
    let manager = manager(processor, fast_retry(Environment::Production));

    let task = manager.create_task(llm_params("never")).await?;
    let done = claim_and_process(&manager, &task.id).await?;

    assert_eq!(done.status, TaskStatus::Failed);
    assert_eq!(done.attempts, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(done.error.as_deref(), Some("OpenAI API error: 503 - overloaded"));

    let stored = manager.get_task(&task.id).await?.unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn test_development_runs_once() -> Result<()> {
    let mut processor = EchoProcessor::new();
    processor.failures_before_success = 1;
    let calls = processor.calls.clone();
    let manager = manager(processor, fast_retry(Environment::Development));

    let task = manager.create_task(llm_params("once")).await?;
    let done = claim_and_process(&manager, &task.id).await?;

    assert_eq!(done.status, TaskStatus::Failed);
    assert_eq!(done.attempts, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_ceiling_abandons_attempt() -> Result<()> {
    let mut processor = EchoProcessor::new();
    processor.stall = Some(Duration::from_secs(30));
    processor.ceiling = Some(Duration::from_millis(50));
    let manager = manager(processor, ExecutionConfig::default());

    let task = manager.create_task(llm_params("slow")).await?;
    let done = claim_and_process(&manager, &task.id).await?;

    assert_eq!(done.status, TaskStatus::Failed);
    assert!(done.error.unwrap().contains("duration limit"));
    Ok(())
}

#[tokio::test]
async fn test_default_ceiling_applies_without_task_limit() -> Result<()> {
    let mut processor = EchoProcessor::new();
    processor.stall = Some(Duration::from_secs(30));
    processor.ceiling = None;
    let config = ExecutionConfig {
        default_max_duration: Duration::from_millis(50),
        ..ExecutionConfig::default()
    };
    let manager = manager(processor, config);

    let task = manager.create_task(llm_params("slow")).await?;
    let done = claim_and_process(&manager, &task.id).await?;

    assert_eq!(done.status, TaskStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn test_project_cap_tightens_task_limit() -> Result<()> {
    let mut processor = EchoProcessor::new();
    processor.stall = Some(Duration::from_secs(30));
    processor.ceiling = Some(TaskType::RunLlm.max_duration());
    let config = ExecutionConfig {
        default_max_duration: Duration::from_millis(50),
        ..ExecutionConfig::default()
    };
    let manager = manager(processor, config);

    let task = manager.create_task(llm_params("slow")).await?;
    let done = claim_and_process(&manager, &task.id).await?;

    assert_eq!(done.status, TaskStatus::Failed);
    assert!(done.error.unwrap().contains("duration limit"));
    Ok(())
}

#[tokio::test]
async fn test_panicking_task_is_failed_and_worker_survives() -> Result<()> {
    let mut processor = EchoProcessor::new();
    processor.panics = true;
    let manager = manager(processor, ExecutionConfig::default());
    let worker = scheduler::TaskWorker::new(manager.clone(), TaskType::RunLlm);

    let task = manager.create_task(llm_params("boom")).await?;
    assert!(worker.process_next_task().await?);

    let stored = manager.get_task(&task.id).await?.unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert!(stored.error.unwrap().starts_with("task execution aborted"));

    assert!(!worker.process_next_task().await?);
    Ok(())
}

#[tokio::test]
async fn test_cleanup_respects_retention() -> Result<()> {
    let manager = manager(EchoProcessor::new(), ExecutionConfig::default());

    let task = manager.create_task(llm_params("old")).await?;
    let mut done = claim_and_process(&manager, &task.id).await?;
    assert_eq!(manager.cleanup_tasks().await?, 0);

    done.updated_at = chrono::Utc::now() - chrono::Duration::hours(25);
    manager.storage().save(&done).await?;
    assert_eq!(manager.cleanup_tasks().await?, 1);
    assert!(manager.retrieve(&task.id).await?.is_none());
    Ok(())
}

#[test]
fn test_create_scheduler_registers_processors() {
    let scheduler = create_scheduler(
        InMemoryTaskStorage::new(),
        vec![Arc::new(EchoProcessor::new())],
        ExecutionConfig::default(),
    );
    assert_eq!(scheduler.task_manager().registered_types(), vec![TaskType::RunLlm]);
}
