use flowtask_rs::config::AppConfig;
use flowtask_rs::llm::{LlmRequest, LlmRouter};
use flowtask_rs::schedule::{
    create_scheduler, RunLlmProcessor, TaskDispatcher, TaskParams, TaskProcessor,
};
use flowtask_rs::storage::task::InMemoryTaskStorage;
use std::sync::Arc;
use std::time::Duration;

// Usage: cargo run --example run_llm_task -- <model> <message>
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    flowtask_rs::init_env();

    let mut args = std::env::args().skip(1);
    let model = args.next().unwrap_or_else(|| "gemini-1.5-flash".to_string());
    let message = args.next().unwrap_or_else(|| "Say hello in five words.".to_string());

    let config = AppConfig::from_env()?;
    let router = Arc::new(LlmRouter::new(&config.providers));
    let processors: Vec<Arc<dyn TaskProcessor>> = vec![Arc::new(RunLlmProcessor::new(router))];

    let scheduler = create_scheduler(InMemoryTaskStorage::new(), processors, config.execution.clone())
        .with_poll_interval(Duration::from_millis(100));
    scheduler.spawn_workers().await;
    let task_manager = scheduler.task_manager().clone();
    tokio::spawn(async move {
        let _ = scheduler.run().await;
    });

    let handle = task_manager
        .enqueue(TaskParams::RunLlm(LlmRequest::new(model, message)))
        .await?;
    println!("Triggered run: {}", handle.id);

    loop {
        tokio::time::sleep(Duration::from_millis(250)).await;
        let Some(run) = task_manager.retrieve(&handle.id).await? else {
            anyhow::bail!("run {} disappeared", handle.id);
        };
        if run.status.is_terminal() {
            println!("{}", serde_json::to_string_pretty(&run)?);
            return Ok(());
        }
    }
}
