use std::{process::ExitCode, sync::Mutex, time::Duration};

use clap::{CommandFactory, Parser};
use haystack::{
    DataDir,
    catalog,
    cli::{Cli, Command, FetchArgs, LogLevel, SearchArgs},
    corpus::{Corpus, FetchInfo},
    corpus_db::settings,
    error,
    pipeline,
    search,
    telemetry::{self, ApiClient, ClientOptions},
};
use kdam::BarExt;
use tracing_subscriber::EnvFilter;

fn init_tracing(level: LogLevel) {
    let filter = if let Ok(env) = std::env::var("HAYSTACK_LOG") {
        EnvFilter::new(env)
    } else {
        EnvFilter::new(level.as_filter())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        return ExitCode::FAILURE;
    };

    match run(cli.data_dir.as_deref(), command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(
    data_dir: Option<&std::path::Path>,
    command: Command,
) -> error::Result<()> {
    if let Command::Completions(args) = &command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(data_dir)?;

    match command {
        Command::FetchConfigs(args) => cmd_fetch(&data_dir, &args),
        Command::Search(args) => cmd_search(&data_dir, &args),
        Command::Status(args) => cmd_status(&data_dir, args.json),
        Command::Completions(_) => Ok(()),
    }
}

fn cmd_fetch(data_dir: &DataDir, args: &FetchArgs) -> error::Result<()> {
    let token = telemetry::resolve_token(&args.access_token)?;
    let options = ClientOptions {
        timeout: Duration::from_secs(args.timeout),
        retries: args.retries,
        ..ClientOptions::default()
    };
    let client = ApiClient::new(&args.apiserver, token, options)?;

    let feed = telemetry::device_status_feed(&client)?;
    let devices = catalog::list_devices(feed, args.include_inactive);
    eprintln!("Fetching configs for {} device(s)...", devices.len());

    let progress = Mutex::new(kdam::tqdm!(
        total = devices.len(),
        desc = "Fetching configs"
    ));
    let devices = pipeline::populate(devices, |device| {
        let nodes = telemetry::config_nodes(&client, &device.serial_number)?;
        if let Ok(mut bar) = progress.lock() {
            if let Err(e) = bar.update(1) {
                tracing::debug!("progress bar update failed: {e}");
            }
        }
        Ok(nodes)
    });
    eprintln!();
    let devices = devices?;

    let info = FetchInfo {
        apiserver: client.base_url().to_string(),
        include_inactive: args.include_inactive,
    };

    // Build the new generation off to the side; the active corpus stays
    // untouched until promotion.
    let staged = data_dir.stage_corpus()?;
    match Corpus::build(&staged, &devices, &info) {
        Ok(corpus) => drop(corpus),
        Err(e) => {
            data_dir.discard(&staged);
            return Err(e);
        }
    }
    data_dir.promote(&staged)?;

    eprintln!(
        "Stored {} device config(s) from {}",
        devices.len(),
        info.apiserver
    );
    Ok(())
}

fn cmd_search(data_dir: &DataDir, args: &SearchArgs) -> error::Result<()> {
    let corpus = Corpus::open(&data_dir.require_corpus()?)?;

    let results =
        search::search(&args.queries, |query| corpus.retrieve(query))?;

    let mut stdout = std::io::stdout().lock();
    if args.json {
        search::format_json(&results, &args.queries, &mut stdout)?;
    } else {
        search::format_table(&results, &mut stdout)?;
    }
    Ok(())
}

fn cmd_status(data_dir: &DataDir, json: bool) -> error::Result<()> {
    let corpus = Corpus::open(&data_dir.require_corpus()?)?;
    let db = corpus.db();

    let devices = db.device_count()?;
    let apiserver = db.get_setting_or(settings::APISERVER, "unknown")?;
    let fetched_at = db.get_setting_or(settings::FETCHED_AT, "unknown")?;
    let include_inactive =
        db.get_setting_or(settings::INCLUDE_INACTIVE, "false")?;

    if json {
        let status = serde_json::json!({
            "data_dir": data_dir.root().display().to_string(),
            "corpus": corpus.dir().display().to_string(),
            "devices": devices,
            "apiserver": apiserver,
            "fetched_at": fetched_at,
            "include_inactive": include_inactive == "true",
        });
        println!("{status}");
    } else {
        println!("Data directory: {}", data_dir.root().display());
        println!("Corpus: {}", corpus.dir().display());
        println!("API server: {apiserver}");
        println!("Fetched at: {fetched_at}");
        println!("Inactive devices included: {include_inactive}");
        println!("Devices: {devices}");
    }
    Ok(())
}
