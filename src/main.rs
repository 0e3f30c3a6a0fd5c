//! Demo orchestrator: wires a frame source through the rasterizer and
//! prints the resulting text to the terminal.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Parser, Subcommand};

use asciiview::ascii::rasterize_with_stride;
use asciiview::config::Config;
use asciiview::source::{convert_image_bytes, CameraSource, FrameSource, LoopingVideoSource};

#[derive(Parser)]
#[command(name = "asciiview", about = "Render images, media files, and camera feeds as ASCII text")]
struct Cli {
    /// Path to a config file (default: ~/.config/asciiview/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Target render width in pixels
    #[arg(long, global = true)]
    width: Option<u32>,

    /// Target render height in pixels
    #[arg(long, global = true)]
    height: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a single still image and print it once
    Image {
        /// Path to the image file
        path: PathBuf,
    },
    /// Play a media file on a loop
    Video {
        /// Path to the media file
        path: PathBuf,
    },
    /// Render the live camera feed
    Camera {
        /// Camera device index
        #[arg(long)]
        device: Option<u32>,
        /// Disable selfie mirroring
        #[arg(long)]
        no_mirror: bool,
    },
}

/// Global flag for handling Ctrl+C across the application
static CTRLC_RECEIVED: AtomicBool = AtomicBool::new(false);

fn setup_ctrlc_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| {
        CTRLC_RECEIVED.store(true, Ordering::SeqCst);
        eprintln!("\nReceived Ctrl+C, shutting down...");
    })
}

fn main() {
    env_logger::init();
    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(cli.config.as_deref())?;

    let mut source_config = config.source_config();
    if let Some(width) = cli.width {
        source_config.width = width;
    }
    if let Some(height) = cli.height {
        source_config.height = height;
    }
    let row_stride = config.ascii.row_stride;

    match cli.command {
        Command::Image { path } => {
            let bytes = std::fs::read(&path)?;
            let frame = convert_image_bytes(&bytes, source_config.width, source_config.height)?;
            print!("{}", frame);
            Ok(())
        }
        Command::Video { path } => {
            source_config.locator = Some(path.to_string_lossy().into_owned());
            let mut source = LoopingVideoSource::new();
            run_continuous(&mut source, source_config, row_stride)
        }
        Command::Camera { device, no_mirror } => {
            let device = device.unwrap_or(config.camera.device);
            let mirror = !no_mirror && config.camera.mirror;
            let mut source = CameraSource::new(device, mirror);
            run_continuous(&mut source, source_config, row_stride)
        }
    }
}

/// Drive a continuous source until Ctrl+C: each delivered frame is
/// rasterized and drawn over the previous one.
fn run_continuous<S: FrameSource>(
    source: &mut S,
    config: asciiview::source::SourceConfig,
    row_stride: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    setup_ctrlc_handler()?;

    source.add_frame_listener(Box::new(move |frame| {
        let text = rasterize_with_stride(frame, row_stride);
        let mut stdout = std::io::stdout().lock();
        // Home the cursor instead of clearing to avoid flicker
        let _ = write!(stdout, "\x1b[H{}", text);
        let _ = stdout.flush();
    }));

    source.init(config)?;
    // Clear once before the first frame lands
    print!("\x1b[2J");
    std::io::stdout().flush()?;
    source.start();

    while !CTRLC_RECEIVED.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(50));
    }

    source.stop();
    Ok(())
}
