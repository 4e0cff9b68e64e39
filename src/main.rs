use clap::{Parser, Subcommand};
use microscale::imaging::{ExiftoolBackend, JpegtranBackend, Quality, StripStyle};
use microscale::process::{Operations, Pipeline, check_image};
use microscale::{config, output, scan};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Input paths shared by commands that read images.
#[derive(clap::Args, Clone)]
struct InputArgs {
    /// JPEG files or directories containing them
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,
}

#[derive(clap::Args, Clone)]
struct ProcessArgs {
    #[command(flatten)]
    inputs: InputArgs,

    /// Crop wide images to the target aspect ratio
    #[arg(long)]
    crop: bool,

    /// Remove an existing scale-bar strip from the bottom
    #[arg(long)]
    descale: bool,

    /// Rotate 180°
    #[arg(long)]
    rotate: bool,

    /// Do not add a scale bar
    #[arg(long)]
    no_scale: bool,

    /// Do not copy EXIF/IPTC/XMP metadata to the output
    #[arg(long, visible_alias = "no-iptc")]
    no_metadata: bool,

    /// Parallel workers (0 or 1 = one at a time; default: config, else all cores)
    #[arg(short, long)]
    jobs: Option<usize>,
}

fn version_string() -> &'static str {
    let describe = env!("MICROSCALE_GIT_DESCRIBE");
    if describe.is_empty() {
        env!("CARGO_PKG_VERSION")
    } else {
        // Leaked once at startup
        Box::leak(format!("{} ({})", env!("CARGO_PKG_VERSION"), describe).into_boxed_str())
    }
}

#[derive(Parser)]
#[command(name = "microscale")]
#[command(about = "Lossless crop, descale, rotate and scale bars for microscope JPEGs")]
#[command(long_about = "\
Lossless crop, descale, rotate and scale bars for microscope JPEGs

All pixel transforms go through jpegtran and never re-encode the image.
Metadata is merged back with exiftool.

Stages (each optional, always in this order):

  descale   abc_.jpg  → abc#.jpg    remove the bottom strip
  crop      abc.jpg   → abc#.jpg    trim to the target width/height ratio
  rotate    in place                180°
  scale     abc#.jpg  → abc_.jpg    append a scale bar for the lens in the name

The lens code is field 3 of the `_`-separated file name:

  2555v1_vi_s_N4_25112210990_39_.jpg   → lens n4

Run 'microscale gen-config' to generate a documented microscale.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (default: ./microscale.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Transform images
    Process(ProcessArgs),
    /// Show lens, density and scale bar per image without writing anything
    Check(InputArgs),
    /// Print a stock microscale.toml with all options documented
    GenConfig,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let mut config = config::load_config(cli.config.as_deref(), &std::env::current_dir()?)?;
    let backend = JpegtranBackend::with_program(config.tools.jpegtran.clone());

    match cli.command {
        Command::Process(args) => {
            if let Some(jobs) = args.jobs {
                config.processing.max_processes = Some(jobs);
            }
            let files = scan::collect_inputs(&args.inputs.paths, args.inputs.recursive)?;
            let ops = Operations {
                crop: args.crop,
                descale: args.descale,
                rotate: args.rotate,
                scale_bar: !args.no_scale,
                copy_metadata: !args.no_metadata,
            };
            let style = if ops.scale_bar {
                StripStyle::load(
                    config.scale_bar.font.as_deref(),
                    config.scale_bar.font_size,
                    Quality::new(config.scale_bar.quality),
                )
            } else {
                StripStyle::without_font(Quality::new(config.scale_bar.quality))
            };
            let metadata = ExiftoolBackend::with_program(config.tools.exiftool.clone());
            let pipeline = Pipeline {
                backend: &backend,
                metadata: &metadata,
                config: &config,
                style: &style,
                ops,
            };

            let threads = config::effective_threads(&config.processing);
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_process_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let report = pipeline.process_batch(&files, threads, Some(tx));
            printer.join().ok();
            output::print_batch_summary(&report);

            if !report.is_success() {
                std::process::exit(1);
            }
        }
        Command::Check(args) => {
            let files = scan::collect_inputs(&args.paths, args.recursive)?;
            let mut failed = false;
            for (i, path) in files.iter().enumerate() {
                let result = check_image(&backend, &config, path);
                failed |= result.is_err();
                output::print_check_result(i + 1, path, &result);
            }
            if failed {
                std::process::exit(1);
            }
        }
        Command::GenConfig => unreachable!("handled above"),
    }

    Ok(())
}
