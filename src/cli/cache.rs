//! `imagecraft cache info|clear`

use std::process::ExitCode;

use super::{CacheAction, EXIT_SUCCESS};
use crate::cache::CacheStore;
use crate::config::ImagecraftConfig;
use crate::mcp::tools::analysis::format_cache_info;

pub fn run_cache(config: &ImagecraftConfig, action: CacheAction) -> ExitCode {
    let store = CacheStore::new(config.cache.resolved_dir(), config.cache.ttl());

    match action {
        CacheAction::Info => {
            print!("{}", format_cache_info(&store.stats()));
            if !config.cache.enabled {
                println!("\nNote: the cache is disabled in the current configuration.");
            }
        }
        CacheAction::Clear => {
            let removed = store.clear();
            println!("Removed {} cached files from {}", removed, store.root().display());
        }
    }

    ExitCode::from(EXIT_SUCCESS)
}
