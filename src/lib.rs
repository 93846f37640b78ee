pub mod config;
pub mod error;
pub mod llm;
pub mod media;
pub mod schedule;
pub mod storage;
pub mod utils;
pub mod web;
#[cfg(test)]
pub(crate) mod testing;

use std::{env, sync::Arc};
use once_cell::sync::Lazy;
use schedule::TaskDispatcher;

pub struct AppContext {
    pub dispatcher: Arc<dyn TaskDispatcher>,
}

const LOG_DIR: &str = "./logs";

pub static LOG_PATH: Lazy<String> = Lazy::new(|| {
    match env::var("LOG_DIR") {
        Ok(path) => path,
        Err(_) => {
            dotenv::var("LOG_DIR").unwrap_or_else(|_| LOG_DIR.to_string())
        }
    }
});

pub fn init_env() {
    dotenv::dotenv().ok();

    // make sure the log directory exists
    std::fs::create_dir_all(LOG_PATH.as_str()).unwrap_or_else(|e| {
        eprintln!("Failed to create log directory: {}", e);
    });
}
