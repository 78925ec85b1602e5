// src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

mod address;
mod browser;
mod cli;
mod crawl;
mod db;
mod detail;
mod export;
mod fetcher;
mod listing;
mod net;
mod shop;
mod ssl;

use cli::{Cli, Command, CrawlArgs, FetchMode};
use fetcher::Fetcher;
use shop::Summary;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with_target(false)
        .init();

    match Cli::parse().command {
        Command::Crawl(args) => run_crawl(args).await,
        Command::FixSsl { path } => run_fix_ssl(path),
    }
}

async fn run_crawl(args: CrawlArgs) -> Result<()> {
    info!(started = %chrono::Local::now().format("%Y-%m-%d %H:%M:%S"), "crawl start");

    // ── 1) DB 는 먼저 붙여 본다(수집 후 실패하면 아까우니까)
    let store = match &args.database_url {
        Some(url) => {
            let store = db::ShopStore::connect(url, &args.table).await?;
            store.ensure_table().await?;
            Some(store)
        }
        None => None,
    };

    // ── 2) 페이지 가져오기 방식
    let fetcher = match args.fetcher {
        FetchMode::Http => Fetcher::http(args.http_config())?,
        FetchMode::Browser => {
            if args.concurrency > 1 {
                warn!(concurrency = args.concurrency, "browser fetcher serializes page loads");
            }
            Fetcher::browser(browser::BrowserSession::launch(args.browser_config()).await?)
        }
    };
    let checker = ssl::SslChecker::new(args.ssl_check, Duration::from_secs(args.ssl_timeout_secs))?;
    info!(fetcher = ?args.fetcher, ssl = ?checker.mode(), "ready");

    // ── 3) 수집
    let result = crawl::crawl(&args.crawl_config(), &fetcher, &checker).await;
    if let Err(e) = fetcher.close().await {
        warn!(error = %format!("{e:#}"), "browser shutdown failed");
    }
    let shops = result?;

    // ── 4) 저장
    let out = PathBuf::from(export::render_path(&args.output));
    export::write(&shops, &out, args.format, args.encoding)?;
    info!(path = %out.display(), rows = shops.len(), encoding = ?args.encoding, "saved");

    if let Some(store) = store {
        store.insert_all(&shops).await.context("database save failed")?;
        store.close().await;
    }

    // ── 5) 콘솔 프리뷰 + 통계
    println!("[collected {} / {}]\n", shops.len(), args.max_records);
    for s in shops.iter().take(args.preview) {
        println!("- {s}");
    }
    println!("\n{}", Summary::of(&shops));

    info!("done");
    Ok(())
}

fn run_fix_ssl(path: PathBuf) -> Result<()> {
    let report = export::repair_ssl_column(&path)?;
    info!(path = %path.display(), rows = report.rows, "ssl column rewritten");
    println!("SSL=True before: {}", report.before);
    println!("SSL=True after:  {}", report.after);
    Ok(())
}
