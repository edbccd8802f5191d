//! autolabel - resolve an input descriptor and read from it

use anyhow::{anyhow, Context, Result};
use autolabel::{Frame, Frames, Source, SourceConfig, SourceError, SourceFactory, StreamSource};
use clap::Parser;
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path, URL, rtsp:// or rtmp:// URI, screen:<index>, or glob(<pattern>).
    descriptor: String,
    /// Capture interval: frames for video files, milliseconds for live sources.
    #[arg(long, allow_negative_numbers = true)]
    interval: Option<i64>,
    /// Capture a window of this many seconds from a streaming source.
    #[arg(long, value_name = "SECS", conflicts_with = "follow")]
    slice: Option<f64>,
    /// Save sliced frames as JPEG into the capture directory.
    #[arg(long, requires = "slice")]
    save: bool,
    /// Capture continuously until end of stream or Ctrl-C.
    #[arg(long)]
    follow: bool,
    /// How deep to walk directories, CSV listings and globs.
    #[arg(long, default_value_t = 1)]
    max_depth: usize,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, value_enum, default_value_t = ui::UiMode::Auto, value_name = "MODE")]
    ui: ui::UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::new(args.ui, is_tty, !stdout_is_tty);

    let config = SourceConfig::load().context("load configuration")?;
    let slice = args
        .slice
        .map(|secs| {
            Duration::try_from_secs_f64(secs)
                .map_err(|_| anyhow!("--slice must be a non-negative number of seconds"))
        })
        .transpose()?;

    let factory = SourceFactory::new(config);
    let mut source = {
        let mut stage = ui.stage("Resolve input");
        let created = match args.interval {
            Some(interval) => factory.create_with_interval(&args.descriptor, interval),
            None => factory.create(&args.descriptor),
        };
        if created.is_err() {
            stage.fail();
        }
        created?
    };
    println!("{} {}", source.kind(), source.resolved().local_reference());

    if source.is_enumerable() {
        return print_tree(source, 1, args.max_depth);
    }
    let outcome = run(&ui, &mut source, &args, slice);
    source.release();
    outcome
}

fn run(ui: &ui::Ui, source: &mut Source, args: &Args, slice: Option<Duration>) -> Result<()> {
    if let Some(stream) = source.as_stream_mut() {
        return run_stream(ui, stream, args, slice);
    }
    match source {
        Source::Image(image) => {
            let _stage = ui.stage("Decode image");
            let frame = image.data()?;
            println!("{}x{}", frame.width, frame.height);
        }
        Source::PointCloud(cloud) => {
            if let Err(err) = cloud.data() {
                println!("{}", err);
            }
        }
        _ => {}
    }
    Ok(())
}

fn run_stream(
    ui: &ui::Ui,
    stream: &mut dyn StreamSource,
    args: &Args,
    slice: Option<Duration>,
) -> Result<()> {
    let reference = stream.resolved().local_reference().to_string();

    if let Some(window) = slice {
        let frames = {
            let _stage = ui.stage(&format!("Slice {:.2}s", window.as_secs_f64()));
            stream.slice(window, args.save)?
        };
        for frame in &frames {
            print_frame(frame);
        }
        println!("{} frames", frames.len());
        return Ok(());
    }

    if args.follow {
        let stop = Arc::new(AtomicBool::new(false));
        let handler_stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            handler_stop.store(true, Ordering::SeqCst);
        })
        .context("install Ctrl-C handler")?;

        let mut counter = ui.frame_counter(&reference);
        for frame in Frames::new(stream) {
            let frame = frame?;
            counter.tick();
            log::debug!("frame {} at {:?}", counter.count(), frame.timestamp());
            if stop.load(Ordering::SeqCst) {
                log::info!("stop requested after {} frames", counter.count());
                break;
            }
        }
        println!("{} frames", counter.count());
        return Ok(());
    }

    let frame = {
        let _stage = ui.stage("Capture frame");
        stream.capture()?
    };
    print_frame(&frame);
    Ok(())
}

fn print_tree(source: Source, depth: usize, max_depth: usize) -> Result<()> {
    if depth > max_depth {
        return Ok(());
    }
    let Some(children) = source.into_children() else {
        return Ok(());
    };
    let indent = "  ".repeat(depth);
    for child in children? {
        match child {
            Ok(child) => {
                println!(
                    "{}{} {}",
                    indent,
                    child.kind(),
                    child.resolved().local_reference()
                );
                if child.is_enumerable() {
                    if let Err(err) = print_tree(child, depth + 1, max_depth) {
                        log::error!("{}", err);
                        println!("{}  error: {}", indent, err);
                    }
                }
            }
            Err(err) => {
                log::error!("{}", err);
                println!("{}error: {}", indent, describe_error(&err));
            }
        }
    }
    Ok(())
}

fn describe_error(err: &SourceError) -> String {
    match err {
        SourceError::Unclassified { reference } => format!("unrecognised input {}", reference),
        other => other.to_string(),
    }
}

fn print_frame(frame: &Frame) {
    println!(
        "{}x{} @ {}ms",
        frame.width,
        frame.height,
        frame.timestamp().as_millis()
    );
}
