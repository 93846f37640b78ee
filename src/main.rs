#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use tracing::info;
use std::sync::Arc;
use flowtask_rs::{
    config::AppConfig,
    llm::LlmRouter,
    media::FfmpegDecoder,
    schedule::{
        create_scheduler, ExtractFrameProcessor, RunLlmProcessor, TaskDispatcher, TaskProcessor,
        TriggerClient,
    },
    storage::task::InMemoryTaskStorage,
    utils::logger,
    AppContext, LOG_PATH,
};

#[tokio::main]
async fn main() -> Result<()> {
    flowtask_rs::init_env();

    // logging first, everything below reports through it
    let _guard = logger::init(LOG_PATH.to_string())?;

    info!("Starting flowtask service ({})...", env!("GIT_HASH"));

    let config = AppConfig::from_env()?;
    info!("Loaded configuration: {:?}", config);

    let dispatcher: Arc<dyn TaskDispatcher> = match &config.execution.trigger {
        Some(trigger) => {
            info!("Dispatching runs to remote execution service at {}", trigger.api_url);
            Arc::new(TriggerClient::new(trigger))
        }
        None => {
            info!("Initializing local execution service...");
            tokio::fs::create_dir_all(&config.media.temp_dir).await?;

            let router = Arc::new(LlmRouter::new(&config.providers));
            let decoder = Arc::new(FfmpegDecoder::new(&config.media));
            let processors: Vec<Arc<dyn TaskProcessor>> = vec![
                Arc::new(ExtractFrameProcessor::new(&config.media, decoder)),
                Arc::new(RunLlmProcessor::new(router)),
            ];

            let scheduler = create_scheduler(InMemoryTaskStorage::new(), processors, config.execution.clone());
            scheduler.spawn_workers().await;
            let task_manager = scheduler.task_manager().clone();

            tokio::spawn(async move {
                if let Err(e) = scheduler.run().await {
                    tracing::error!("Scheduler error: {}", e);
                }
            });

            task_manager
        }
    };

    let ctx = Arc::new(AppContext { dispatcher });

    info!("Starting HTTP server at http://{}", config.server_addr);
    match flowtask_rs::web::start_server(ctx, config.server_addr).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            tracing::error!("Server error: {}", e);
            return Err(e);
        }
    }

    Ok(())
}
