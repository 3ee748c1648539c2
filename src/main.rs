//! CLI entry point for the archive client.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use archive_client_core::api::{CustomHeader, ServerClient};
use archive_client_core::download::{DownloadListener, DownloadScheduler};
use archive_client_core::{ClientConfig, ClientContext};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

mod cli;

use cli::{Args, Command, HeadersCommand, ListArgs};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = load_config(&args)?;
    let context = ClientContext::builder(config)
        .build()
        .await
        .context("failed to start client")?;

    let result = run(&context, args.command).await;
    context.shutdown().await;
    result
}

fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::load_default()?,
    };
    if let Some(server) = &args.server {
        config.server_address.clone_from(server);
    }
    if let Some(api_key) = &args.api_key {
        config.api_key.clone_from(api_key);
    }
    if let Command::List(list) = &args.command
        && list.local
    {
        config.local_mode = true;
    }
    if config.server_address.is_empty() {
        warn!("no server configured; pass --server or set server_address in the config file");
    }
    Ok(config)
}

async fn run(context: &ClientContext, command: Command) -> Result<()> {
    let client = context.client();
    match command {
        Command::Info => {
            let info = client
                .server_info()
                .await
                .context("server information unavailable")?;
            println!("{} {}", info.name, info.version);
            println!("archives per page: {}", info.page_size());
            println!("tracks progress:   {}", info.server_tracks_progress);
            println!("nofun mode:        {}", info.nofun_mode);
        }
        Command::List(list) => list_archives(context, &list).await?,
        Command::Extract { id, force } => {
            let pages = client
                .extract_archive(&id, force)
                .await
                .context("extraction failed")?;
            for page in pages {
                println!("{}", client.page_url(&page));
            }
        }
        Command::Download {
            id,
            overwrite,
            resume_from,
        } => download(client, context.downloads(), &id, overwrite, resume_from).await?,
        Command::DeleteLocal { id } => {
            if !context.downloads().delete_archive(&id).await {
                bail!("could not delete local copy of {id}");
            }
            info!(archive = %id, "local copy deleted");
        }
        Command::Categories => {
            if !context.categories().refresh().await {
                bail!("could not load categories");
            }
            for category in context.categories().latest().unwrap_or_default().iter() {
                let kind = if category.search.is_empty() {
                    format!("{} archives", category.archives.len())
                } else {
                    format!("search: {}", category.search)
                };
                let pin = if category.pinned { " [pinned]" } else { "" };
                println!("{}\t{}{}\t{}", category.id, category.name, pin, kind);
            }
        }
        Command::CategoryAdd { category, archive } => {
            if !client.add_to_category(&category, &archive).await {
                bail!("could not add {archive} to {category}");
            }
        }
        Command::CategoryRemove { category, archive } => {
            if !client.remove_from_category(&category, &archive).await {
                bail!("could not remove {archive} from {category}");
            }
        }
        Command::Stats { min_weight } => {
            let stats = client
                .database_stats(min_weight)
                .await
                .context("tag statistics unavailable")?;
            for tag in stats {
                if tag.namespace.is_empty() {
                    println!("{}\t{}", tag.weight, tag.text);
                } else {
                    println!("{}\t{}:{}", tag.weight, tag.namespace, tag.text);
                }
            }
        }
        Command::ClearTemp => {
            if !client.clear_temp_folder().await {
                bail!("could not clear the server temp folder");
            }
        }
        Command::Headers(command) => manage_headers(context, command).await?,
    }
    Ok(())
}

async fn list_archives(context: &ClientContext, list: &ListArgs) -> Result<()> {
    let (_scope, client) = context.screen_scope();
    let mut selector = context.listing(client.clone());
    if let Some(info) = client.server_info().await {
        selector.set_page_size(info.page_size());
    }
    selector.batch(|s| {
        s.set_filter(list.filter.clone().unwrap_or_default());
        s.set_category_id(list.category.clone().unwrap_or_default());
        s.set_random_count(list.random.unwrap_or(0));
        s.set_new_only(list.new_only);
        s.set_sort(list.sort.into());
        s.set_direction(list.order.into());
        s.mark_initialized();
    });
    debug!(strategy = ?selector.active_kind(), "listing");

    let mut shown = 0usize;
    for _ in 0..list.pages {
        let Some(page) = selector.next_page().await else {
            break;
        };
        for archive in &page.archives {
            let marker = if archive.isnew { "*" } else { " " };
            println!("{marker} {}\t{}", archive.id, archive.title);
        }
        shown += page.archives.len();
        info!(shown, total = page.total, "page loaded");
    }
    Ok(())
}

enum DownloadEnd {
    Complete,
    Cancelled,
}

struct ProgressListener {
    id: String,
    bar: ProgressBar,
    ends: mpsc::UnboundedSender<DownloadEnd>,
}

impl DownloadListener for ProgressListener {
    fn on_progress(&self, id: &str, pages: usize) {
        if id == self.id {
            self.bar.set_position(pages as u64);
        }
    }

    fn on_complete(&self, id: &str) {
        if id == self.id {
            let _ = self.ends.send(DownloadEnd::Complete);
        }
    }

    fn on_cancelled(&self, id: &str) {
        if id == self.id {
            let _ = self.ends.send(DownloadEnd::Cancelled);
        }
    }
}

async fn download(
    client: &ServerClient,
    scheduler: &DownloadScheduler,
    id: &str,
    overwrite: bool,
    resume_from: Option<usize>,
) -> Result<()> {
    let pages = client.archive(id).await.map_or(0, |a| a.pagecount);
    let bar = ProgressBar::new(pages);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} pages {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message(id.to_string());

    let (ends, mut ended) = mpsc::unbounded_channel();
    let listener = scheduler.add_listener(Arc::new(ProgressListener {
        id: id.to_string(),
        bar: bar.clone(),
        ends,
    }));

    let started = match resume_from {
        Some(from) => scheduler.resume_download(id, from),
        None => scheduler.download(id, overwrite),
    };
    if !started {
        scheduler.remove_listener(listener);
        bar.finish_and_clear();
        bail!("download of {id} did not start (already running or nothing to resume)");
    }

    let end = loop {
        tokio::select! {
            end = ended.recv() => break end,
            _ = tokio::signal::ctrl_c() => {
                scheduler.cancel_download(id);
            }
            () = tokio::time::sleep(Duration::from_millis(250)) => {
                if !scheduler.is_downloading(id) {
                    // The task may have finished right before its event went out.
                    scheduler.flush_events().await;
                    break ended.try_recv().ok();
                }
            }
        }
    };
    scheduler.remove_listener(listener);

    match end {
        Some(DownloadEnd::Complete) => {
            bar.finish();
            info!(
                archive = %id,
                pages = scheduler.downloaded_page_count(id),
                path = %scheduler.storage().archive_dir(id).display(),
                "download complete"
            );
            Ok(())
        }
        Some(DownloadEnd::Cancelled) => {
            bar.abandon_with_message("cancelled");
            bail!("download of {id} cancelled");
        }
        None => {
            bar.abandon_with_message("failed");
            bail!(
                "download of {id} stopped after {} pages; resume with --resume-from",
                scheduler.downloaded_page_count(id)
            );
        }
    }
}

async fn manage_headers(context: &ClientContext, command: HeadersCommand) -> Result<()> {
    match command {
        HeadersCommand::List => {
            for header in context.custom_headers() {
                println!("{}: {}", header.name, header.value);
            }
        }
        HeadersCommand::Set { name, value } => {
            let mut headers = context.custom_headers();
            headers.push(CustomHeader::new(name, value));
            context.set_custom_headers(headers).await?;
        }
        HeadersCommand::Clear => context.set_custom_headers(Vec::new()).await?,
    }
    Ok(())
}
