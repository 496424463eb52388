use clap::Parser;
use colored::Colorize;
use ig_media_resolver::{
    log_error_card, log_resolution_card, setup_logging, LogConfig, MediaKind, ResolverConfig,
    ResolverService,
};
use std::error::Error;
use std::time::Duration;

/// Resolve Instagram post, reel or share links into downloadable media.
#[derive(Parser, Debug)]
#[command(name = "resolve_cli")]
struct Args {
    /// Post, reel or share URLs
    #[arg(required = true)]
    urls: Vec<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 15)]
    timeout: u64,

    /// Override the GraphQL doc_id
    #[arg(long)]
    doc_id: Option<String>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    setup_logging(LogConfig {
        log_level: args.log_level.clone(),
        file_output: false,
        ..Default::default()
    })?;

    let mut config =
        ResolverConfig::from_env().with_request_timeout(Duration::from_secs(args.timeout));
    if let Some(doc_id) = args.doc_id {
        config = config.with_doc_id(doc_id);
    }
    let service = ResolverService::new_with_config(config)?;

    let urls: Vec<&str> = args.urls.iter().map(String::as_str).collect();
    let results = service.resolve_batch(&urls).await;

    for (url, result) in urls.iter().zip(results) {
        match result {
            Ok(resolution) => {
                if args.json {
                    println!("{}", serde_json::to_string_pretty(&resolution)?);
                    continue;
                }
                log_resolution_card(&resolution, url);
                println!("\n{} {}", "Resolved".bold().green(), url);
                println!("{}: {}", "Post".bold(), resolution.post);
                for item in &resolution.items {
                    let label = match item.kind {
                        MediaKind::Video => "video".cyan(),
                        MediaKind::Image => "image".magenta(),
                    };
                    println!("  [{}] {} -> {}", label, item.filename, item.url);
                }
            }
            Err(e) => {
                log_error_card(url, &e);
                println!(
                    "\n{} {} ({}): {}",
                    "Failed".bold().red(),
                    url,
                    e.status_code(),
                    e
                );
            }
        }
    }

    Ok(())
}
