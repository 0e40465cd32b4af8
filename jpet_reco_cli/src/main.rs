use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use libjpet_reco::config::Config;
use libjpet_reco::process::{create_subsets, process_subset};
use libjpet_reco::worker_status::{BarColor, WorkerStatus};

fn make_template_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config)?;
    let mut file = File::create(path)?;
    file.write_all(yaml_str.as_bytes())?;
    Ok(())
}

fn bar_style(color: &BarColor) -> ProgressStyle {
    let template = match color {
        BarColor::CYAN => "{prefix} [{bar:40.cyan/blue}] {pos:>3}% {msg}",
        BarColor::MAGENTA => "{prefix} [{bar:40.magenta/blue}] {pos:>3}% {msg}",
        BarColor::RED => "{prefix} [{bar:40.red/blue}] {pos:>3}% {msg}",
    };
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

fn update_bar(bar: &ProgressBar, status: &WorkerStatus) {
    bar.set_style(bar_style(&status.color));
    bar.set_message(status.file_name.clone());
    bar.set_position((status.progress * 100.0) as u64);
}

fn main() {
    // Create a cli
    let matches = Command::new("jpet_reco_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    if let Err(e) = LogWrapper::new(pb_manager.clone(), logger).try_init() {
        eprintln!("Could not create logging/progress: {e}");
        return;
    }

    // Parse the cli
    let config_path = match matches.get_one::<String>("path") {
        Some(p) => PathBuf::from(p),
        None => {
            log::error!("A configuration path is required");
            return;
        }
    };

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        match make_template_config(&config_path) {
            Ok(()) => log::info!("Done."),
            Err(e) => log::error!("Could not write template config: {e}"),
        }
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    if !config.is_n_threads_valid() {
        log::error!("n_threads must be at least 1, found {}", config.n_threads);
        return;
    }
    if !config.mc.is_window_width_valid() {
        log::error!(
            "mc.window_width must be a positive number of ps, found {}",
            config.mc.window_width
        );
        return;
    }
    if let Err(e) = config.check_output_format() {
        log::error!("{e}");
        return;
    }
    log::info!("Config successfully loaded.");
    log::info!("Input files: {}", config.input_files.len());
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    log::info!("Output Format: {:?}", config.output_format);
    if let Some(map) = &config.unpacker.tdc_map_path {
        log::info!("TDC Map Path: {}", map.to_string_lossy());
    }
    log::info!("Number of workers: {}", config.n_threads);

    // Spawn the workers!
    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    let mut workers = Vec::new();
    let mut bars = Vec::new();
    for (idx, subset) in create_subsets(&config).into_iter().enumerate() {
        // Dont make empty workers
        if subset.is_empty() {
            continue;
        }
        let bar = pb_manager.add(ProgressBar::new(100));
        bar.set_style(bar_style(&BarColor::default()));
        bar.set_prefix(format!("Worker {idx}"));
        bars.push((idx, bar));
        let conf = config.clone();
        let worker_tx = tx.clone();
        workers.push(std::thread::spawn(move || {
            process_subset(conf, worker_tx, idx, subset)
        }));
    }
    drop(tx);

    // Poll for progress until every worker has hung up
    loop {
        match rx.recv_timeout(Duration::from_millis(500)) {
            Ok(status) => {
                if let Some((_, bar)) = bars.iter().find(|(id, _)| *id == status.worker_id) {
                    update_bar(bar, &status);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => (),
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    let mut failed = false;
    for worker in workers {
        match worker.join() {
            Ok(Ok(())) => (),
            Ok(Err(e)) => {
                failed = true;
                log::error!("Processor error: {e}")
            }
            Err(_) => {
                failed = true;
                log::error!("An error occured joining one of the workers!")
            }
        }
    }
    for (_, bar) in bars {
        bar.finish();
    }

    if failed {
        log::error!("Processing finished with errors, check the log above.");
    } else {
        log::info!("Successfully reconstructed all files!");
    }
    log::info!("Done.");
}
