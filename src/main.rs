//! Operator CLI for the translation cache and provider.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::error;

use shopfront_i18n::config::PipelineConfig;
use shopfront_i18n::translate::HttpBatchTranslator;
use shopfront_i18n::{init_tracing, Pipeline};

#[derive(Parser)]
#[command(name = "shopfront-i18n", version, about = "Storefront translation pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Translate each TEXT argument, one result per line.
    Translate {
        /// Target language code.
        #[arg(long)]
        to: String,
        /// Source language code, or "auto".
        #[arg(long)]
        from: Option<String>,
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Print cache counters, size, and latency percentiles as JSON.
    Stats,
    /// Delete expired cache entries.
    Sweep,
    /// Delete every cache entry, forcing re-translation.
    Clear,
    /// Delete cached translations into one language.
    Invalidate {
        #[arg(long)]
        lang: String,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let config = match PipelineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(2);
        }
    };
    let provider = match HttpBatchTranslator::new(&config.provider) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            error!(error = %e, "provider client init failed");
            std::process::exit(1);
        }
    };

    let pipeline = Pipeline::start(&config, provider);
    let service = pipeline.service();

    match cli.command {
        Command::Translate { to, from, text } => {
            for line in service.translate_batch(&text, &to, from.as_deref()).await {
                println!("{line}");
            }
        }
        Command::Stats => {
            let stats = service.cache_stats().await;
            let report = serde_json::json!({
                "hit_rate": stats.hit_rate(),
                "cache": stats,
                "latency": pipeline.metrics().summary(),
            });
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => error!(error = %e, "stats serialization failed"),
            }
        }
        Command::Sweep => println!("removed {}", service.sweep_cache().await),
        Command::Clear => println!("removed {}", service.clear_cache().await),
        Command::Invalidate { lang } => {
            println!("removed {}", service.invalidate_language(&lang).await)
        }
    }

    pipeline.shutdown().await;
}
