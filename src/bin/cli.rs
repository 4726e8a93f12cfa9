//! trackplay CLI: headless playback and WAV export.
//!
//! Usage:
//!   tp-cli path/to/file.mod
//!   tp-cli path/to/file.xm --wav output.wav

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tp_master::{Backend, Controller, FrameInfo, Interpolation, PlayerConfig, RenderOptions, TickStatus};

#[derive(Parser, Debug)]
#[command(name = "tp-cli", version, about = "Play tracker modules or render them to WAV")]
struct Args {
    /// Module file (MOD or XM)
    file: PathBuf,

    /// TOML config file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Render to this WAV file instead of playing
    #[arg(long)]
    wav: Option<PathBuf>,

    /// Longest WAV render in seconds
    #[arg(long, default_value_t = 300)]
    max_seconds: u32,

    #[arg(long)]
    sample_rate: Option<u32>,

    /// Discard audio instead of opening a device
    #[arg(long)]
    null: bool,

    /// Nearest-sample instead of linear interpolation
    #[arg(long)]
    nearest: bool,

    /// Stereo separation in percent
    #[arg(long)]
    separation: Option<u8>,

    /// Loop the song (until interrupted, or up to --max-seconds with --wav)
    #[arg(long = "loop")]
    loop_song: bool,

    /// Sub-song to play
    #[arg(long, default_value_t = 0)]
    sequence: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = load_config(&args)?;
    let data = fs::read(&args.file).with_context(|| format!("cannot read {}", args.file.display()))?;

    match &args.wav {
        Some(path) => render(&args, &config, &data, path),
        None => play(&args, config, &data),
    }
}

fn load_config(args: &Args) -> Result<PlayerConfig> {
    let mut config = match &args.config {
        Some(path) => PlayerConfig::from_path(path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => PlayerConfig::default(),
    };
    if let Some(rate) = args.sample_rate {
        config.sample_rate = rate;
    }
    if args.null {
        config.backend = Backend::Null;
    }
    if args.nearest {
        config.interpolation = Interpolation::Nearest;
    }
    if let Some(separation) = args.separation {
        config.stereo_separation = separation;
    }
    config.validate()?;
    Ok(config)
}

fn print_module(controller: &Controller) -> Result<()> {
    let vars = controller.module_vars()?;
    println!("Title:       {}", controller.module_name()?);
    println!("Type:        {}", controller.module_type()?);
    println!("Channels:    {}", vars.channels);
    println!("Patterns:    {}", vars.patterns);
    println!("Orders:      {}", vars.length);
    println!("Instruments: {}", vars.instruments);
    for (i, seq) in controller.sequences().iter().enumerate() {
        println!(
            "Sequence {i}:  order {:02X}, {}:{:02}",
            seq.entry,
            seq.duration_ms / 60_000,
            seq.duration_ms / 1000 % 60
        );
    }
    if let Some(comment) = controller.comment()? {
        println!("\n{comment}");
    }
    println!();
    Ok(())
}

fn play(args: &Args, config: PlayerConfig, data: &[u8]) -> Result<()> {
    let mut controller = Controller::new(config);
    controller.init_player()?;
    controller.load(data)?;
    print_module(&controller)?;
    controller.set_sequence(args.sequence)?;
    controller.start()?;

    let mut ticks: u64 = 0;
    loop {
        if controller.tick(args.loop_song)? == TickStatus::EndOfSong {
            break;
        }
        ticks += 1;
        if ticks % 4 == 0 {
            print_position(controller.snapshot()?, controller.time_ms()?);
        }
    }
    println!("\rDone.                                   ");
    if let Some(stats) = controller.output_stats() {
        println!("Played {} frames, {} underruns", stats.frames_played, stats.underruns);
    }

    controller.release()?;
    controller.deinit_player()?;
    Ok(())
}

fn print_position(info: &FrameInfo, time_ms: u64) {
    print!(
        "\r{:02}:{:02} | Ord: {:02X} | Pat: {:02X} | Row: {:02X} | Spd: {} | BPM: {}",
        time_ms / 60_000,
        time_ms / 1000 % 60,
        info.order,
        info.pattern,
        info.row,
        info.speed,
        info.bpm
    );
    let _ = std::io::stdout().flush();
}

fn render(args: &Args, config: &PlayerConfig, data: &[u8], path: &Path) -> Result<()> {
    let module = tp_formats::load(data)?;
    println!("Rendering \"{}\" to {} at {} Hz...", module.title, path.display(), config.sample_rate);

    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let options = RenderOptions {
        sequence: args.sequence,
        loop_song: args.loop_song,
    };
    let frames = tp_master::render_to_wav(
        Arc::new(module),
        config.engine_config(config.sample_rate),
        options,
        args.max_seconds,
        &mut writer,
    )?;
    writer.flush()?;

    let seconds = frames as f64 / config.sample_rate as f64;
    println!("Wrote {frames} frames ({seconds:.1}s)");
    Ok(())
}
