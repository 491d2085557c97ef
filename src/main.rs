mod audio;
mod config;
mod control;
mod error;
mod loop_controller;
mod player;
mod session;
mod shuffle;
mod terminal;
mod track_store;

use std::{io, path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use audio::audio_decoder::SymphoniaDecoder;
use audio::audio_output::{list_output_devices, select_output_device, start_output_stream};
use clap::Parser;
use config::{config_file_path, load_or_create_config, OutputConfig, MAX_TRACKS};
use control::ControlLoop;
use error::{AppError, AppResult};
use log::{debug, info};
use session::Session;
use shuffle::Shuffler;
use terminal::{file_lines, info_lines, write_lines, write_progress, CrosstermInput, TerminalGuard};
use track_store::TrackStore;

/// Loop-synchronized, cross-faded A/B/X listening comparisons.
#[derive(Parser, Debug)]
#[command(name = "abxloop", version)]
struct Cli {
    /// Blind test: shuffle all tracks and hide their names
    #[arg(short = 'b')]
    blind: bool,

    /// Blind test with reference: track 1 stays in place as the reference
    #[arg(short = 'r')]
    reference_blind: bool,

    /// List output devices and exit
    #[arg(short = 'l')]
    list_devices: bool,

    /// Output device index, as shown by -l
    #[arg(short = 'd', value_name = "N")]
    device: Option<usize>,

    /// Output sample rate; every track is resampled to it
    #[arg(
        short = 'o',
        value_name = "HZ",
        value_parser = clap::value_parser!(u32).range(8_000..=384_000)
    )]
    output_rate: Option<u32>,

    /// Verbose logging. Only warnings and errors are shown while the session
    /// screen is up
    #[arg(short = 'v')]
    verbose: bool,

    /// Audio files to compare (at most 10)
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,
}

impl Cli {
    fn is_blind(&self) -> bool {
        self.blind || self.reference_blind
    }
}

fn check_file_count(count: usize) -> AppResult<()> {
    if count == 0 {
        return Err(AppError::Configuration("no input files".to_string()));
    }
    if count > MAX_TRACKS {
        return Err(AppError::Configuration(format!(
            "too many files, got {}, max {}",
            count, MAX_TRACKS
        )));
    }
    Ok(())
}

/// Resampling target: the command line wins, then the config file. `None` keeps
/// the source rate.
fn output_sample_rate(cli_rate: Option<u32>, output: &OutputConfig) -> Option<u32> {
    cli_rate.or(match output.sample_rate_hz {
        0 => None,
        rate => Some(rate),
    })
}

fn init_logging(verbose: bool) {
    let mut clog = colog::default_builder();
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    clog.filter(None, level);
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));
}

/// Routes SIGINT to a cooperative stop so the terminal is restored on the way out.
///
/// Raw mode delivers a Ctrl-C keystroke as a key instead; this covers signals sent
/// from outside the terminal.
fn install_interrupt_handler(session: &Arc<Session>) -> AppResult<()> {
    let session = Arc::clone(session);
    ctrlc::set_handler(move || session.player().stop())
        .map_err(|err| AppError::Resource(format!("cannot install interrupt handler: {}", err)))
}

fn run(cli: &Cli) -> AppResult<()> {
    let host = cpal::default_host();
    if cli.list_devices {
        for (index, name) in list_output_devices(&host)?.iter().enumerate() {
            println!("{:2}: {}", index, name);
        }
        return Ok(());
    }
    check_file_count(cli.files.len())?;

    let config = load_or_create_config(&config_file_path())?;
    debug!("Config: {:?}", config);

    let decoder = SymphoniaDecoder::new(
        output_sample_rate(cli.output_rate, &config.output),
        config.output.resampler_quality,
        config.playback.max_track_secs,
    );
    let mut tracks = TrackStore::load(&cli.files, &decoder, config.playback.fade_ms)?;
    if cli.is_blind() {
        let mut shuffler = Shuffler::from_entropy()?;
        tracks.shuffle(&mut shuffler, cli.reference_blind);
    }
    let names: Vec<String> = tracks
        .tracks()
        .iter()
        .map(|track| track.name().to_string())
        .collect();
    info!(
        "Loaded {} tracks: {} frames (+{} padding), {} channels, {} Hz",
        tracks.len(),
        tracks.reference_length(),
        tracks.padding_frames(),
        tracks.channels(),
        tracks.sample_rate()
    );
    for (slot, track) in tracks.tracks().iter().enumerate() {
        debug!(
            "Track {}: {} frames of {} at {} Hz",
            slot + 1,
            track.source_frames(),
            track.frames(),
            track.sample_rate()
        );
    }

    let session = Arc::new(Session::new(tracks, &config.playback));
    install_interrupt_handler(&session)?;
    let device = select_output_device(&host, cli.device)?;
    let stream = start_output_stream(&device, Arc::clone(&session))?;

    {
        let terminal = TerminalGuard::enter()?;
        if !cli.verbose {
            terminal.clear()?;
        }
        let mut stdout = io::stdout();
        write_lines(
            &mut stdout,
            &info_lines(
                &names,
                cli.reference_blind,
                cli.is_blind(),
                session.player().channels(),
                session.player().sample_rate(),
            ),
        )?;

        let control = ControlLoop::new(
            Arc::clone(&session),
            Duration::from_millis(u64::from(config.playback.input_poll_ms)),
        );
        control.run(&mut CrosstermInput, |snapshot| {
            write_progress(&mut stdout, snapshot)
        })?;
    }
    drop(stream);

    if cli.is_blind() {
        for line in file_lines(&names, false, false) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // Help and version go to stdout and are not failures.
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}
