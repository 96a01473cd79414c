//! `vmp-sim` command line entry point

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::time::Duration;
use vmp_core::{Dimensions, Phase, PipelineConfig, Rect, UploadStatus};
use vmp_sim::{init_tracing, run_canvas, run_load, run_transform, run_upload, LoadPlan};
use vmp_transform::{parse_hex_color, CropRegion, TransformOptions, DEFAULT_CROP_OUTPUT, DEFAULT_MATTE_CANVAS};

fn pixels(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).value_parser(value_parser!(u32)).help(help)
}

fn quality_arg() -> Arg {
    Arg::new("quality")
        .long("quality")
        .default_value("90")
        .value_parser(value_parser!(u8).range(1..=100))
}

fn cli() -> Command {
    Command::new("vmp-sim")
        .version(vmp_core::VERSION)
        .about("Vehicle media pipeline simulator")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Pipeline configuration (TOML)"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("load")
                .about("Scroll a column of placeholders over a directory of images")
                .arg(Arg::new("dir").required(true).value_parser(value_parser!(PathBuf)))
                .arg(
                    Arg::new("width")
                        .long("width")
                        .value_parser(value_parser!(u32))
                        .requires("height")
                        .help("Target width of transformed assets"),
                )
                .arg(
                    Arg::new("height")
                        .long("height")
                        .value_parser(value_parser!(u32))
                        .requires("width")
                        .help("Target height of transformed assets"),
                )
                .arg(
                    Arg::new("quality")
                        .long("quality")
                        .value_parser(value_parser!(u8).range(1..=100))
                        .help("JPEG quality hint"),
                )
                .arg(
                    Arg::new("require-transform")
                        .long("require-transform")
                        .action(ArgAction::SetTrue)
                        .help("Fail assets whose transform fails instead of showing the source"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print outcomes as JSON"),
                ),
        )
        .subcommand(
            Command::new("upload")
                .about("Validate files into one batch and copy it to a destination")
                .arg(
                    Arg::new("files")
                        .required(true)
                        .num_args(1..)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("dest")
                        .long("dest")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Destination directory"),
                )
                .arg(
                    Arg::new("concurrency")
                        .long("concurrency")
                        .value_parser(value_parser!(usize))
                        .help("Parallel uploads (overrides the configuration)"),
                )
                .arg(
                    Arg::new("chunk-delay-ms")
                        .long("chunk-delay-ms")
                        .value_parser(value_parser!(u64))
                        .help("Pause after every written chunk"),
                ),
        )
        .subcommand(
            Command::new("canvas")
                .about("Extend or crop a studio shot onto a fixed-height canvas")
                .arg(Arg::new("input").required(true).value_parser(value_parser!(PathBuf)))
                .arg(Arg::new("output").required(true).value_parser(value_parser!(PathBuf)))
                .arg(
                    Arg::new("height")
                        .long("height")
                        .required(true)
                        .value_parser(value_parser!(u32))
                        .help("Canvas height in pixels"),
                )
                .arg(quality_arg()),
        )
        .subcommand(
            Command::new("crop")
                .about("Cut a region out of an image and centre it on a black canvas")
                .arg(Arg::new("input").required(true).value_parser(value_parser!(PathBuf)))
                .arg(Arg::new("output").required(true).value_parser(value_parser!(PathBuf)))
                .arg(pixels("x", "Left edge of the region").default_value("0"))
                .arg(pixels("y", "Top edge of the region").default_value("0"))
                .arg(pixels("width", "Region width (0 = image width)").default_value("0"))
                .arg(pixels("height", "Region height (0 = image height)").default_value("0"))
                .arg(
                    Arg::new("scale")
                        .long("scale")
                        .default_value("1.0")
                        .value_parser(value_parser!(f32))
                        .help("Scale applied to the region before fitting"),
                )
                .arg(pixels("out-width", "Canvas width"))
                .arg(pixels("out-height", "Canvas height"))
                .arg(quality_arg()),
        )
        .subcommand(
            Command::new("matte")
                .about("Fit an image inside a padded, coloured canvas")
                .arg(Arg::new("input").required(true).value_parser(value_parser!(PathBuf)))
                .arg(Arg::new("output").required(true).value_parser(value_parser!(PathBuf)))
                .arg(pixels("canvas-width", "Canvas width"))
                .arg(pixels("canvas-height", "Canvas height"))
                .arg(
                    Arg::new("padding")
                        .long("padding")
                        .default_value("0")
                        .value_parser(value_parser!(f32))
                        .help("Margin per side, percent of the canvas (0 up to 50)"),
                )
                .arg(
                    Arg::new("color")
                        .long("color")
                        .default_value("#000000")
                        .value_parser(parse_hex_color)
                        .help("Canvas colour as #RRGGBB"),
                )
                .arg(quality_arg()),
        )
        .subcommand(
            Command::new("config")
                .about("Print the effective configuration")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<PipelineConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => PipelineConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

async fn load(args: &ArgMatches, config: &PipelineConfig) -> anyhow::Result<bool> {
    let dir = args.get_one::<PathBuf>("dir").context("missing <dir>")?;
    let mut plan = LoadPlan::new(dir).with_viewport(Rect::new(0.0, 0.0, 1280.0, 800.0));
    if let (Some(width), Some(height)) = (args.get_one::<u32>("width"), args.get_one::<u32>("height")) {
        plan = plan.with_target(*width, *height);
    }
    if let Some(quality) = args.get_one::<u8>("quality") {
        plan = plan.with_quality(*quality);
    }
    plan.require_transform = args.get_flag("require-transform");

    let report = run_load(&plan, config).await?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report.outcomes)?);
    } else {
        println!("Load Report:");
        for outcome in &report.outcomes {
            let detail = match outcome.state.phase {
                Phase::Ready => outcome.state.resolved_locator.clone().unwrap_or_default(),
                _ => outcome.state.error_message.clone().unwrap_or_default(),
            };
            println!(
                "  {:<32} {:<12} {:>6}ms  {}",
                outcome.name,
                format!("{:?}", outcome.state.phase),
                outcome.state.elapsed_ms.unwrap_or(0),
                detail
            );
        }
        println!("  Scroll steps: {}", report.scroll_steps);
        println!("  Ready: {}", report.count(Phase::Ready));
        println!("  Failed: {}", report.count(Phase::Error));
        println!("  Cached entries: {}", report.cached_entries);
        if let Some(pool) = report.pool {
            println!(
                "  Transforms: {} completed, {} failed, peak {} of {} workers",
                pool.completed, pool.failed, pool.peak_active, pool.workers
            );
        }
    }
    Ok(report.count(Phase::Error) == 0)
}

async fn upload(args: &ArgMatches, config: &PipelineConfig) -> anyhow::Result<bool> {
    let files: Vec<PathBuf> = args.get_many::<PathBuf>("files").into_iter().flatten().cloned().collect();
    let dest = args.get_one::<PathBuf>("dest").context("missing --dest")?;
    let mut upload_config = config.upload.clone();
    if let Some(concurrency) = args.get_one::<usize>("concurrency") {
        upload_config.concurrency = (*concurrency).max(1);
    }
    let chunk_delay = args.get_one::<u64>("chunk-delay-ms").map(|ms| Duration::from_millis(*ms));

    let report = run_upload(&files, dest, &upload_config, chunk_delay).await?;

    println!("Upload Report:");
    for rejection in &report.rejected {
        println!("  rejected  {rejection}");
    }
    for item in &report.snapshot.items {
        println!(
            "  {:<9} {:<32} {:>6.1}%  {}",
            format!("{:?}", item.status),
            item.display_name,
            item.effective_percent(),
            item.error.as_deref().unwrap_or_default()
        );
    }
    println!("  Aggregate: {:.1}%", report.snapshot.aggregate_percent);
    if let Some(notice) = &report.snapshot.error_notice {
        println!("  Notice: {notice}");
    }
    Ok(report.snapshot.count(UploadStatus::Error) == 0)
}

async fn canvas(args: &ArgMatches, config: &PipelineConfig) -> anyhow::Result<bool> {
    let (input, output) = paths(args)?;
    let height = *args.get_one::<u32>("height").context("missing --height")?;
    let quality = *args.get_one::<u8>("quality").context("missing --quality")?;

    let written = run_canvas(input, output, height, quality, config).await?;
    println!("Wrote {} ({written} bytes)", output.display());
    Ok(true)
}

fn paths(args: &ArgMatches) -> anyhow::Result<(&PathBuf, &PathBuf)> {
    let input = args.get_one::<PathBuf>("input").context("missing <input>")?;
    let output = args.get_one::<PathBuf>("output").context("missing <output>")?;
    Ok((input, output))
}

fn dimensions(args: &ArgMatches, width: &str, height: &str, default: Dimensions) -> Dimensions {
    Dimensions::new(
        args.get_one::<u32>(width).copied().unwrap_or(default.width),
        args.get_one::<u32>(height).copied().unwrap_or(default.height),
    )
}

async fn crop(args: &ArgMatches, config: &PipelineConfig) -> anyhow::Result<bool> {
    let (input, output) = paths(args)?;
    let coordinate = |name: &str| args.get_one::<u32>(name).copied().unwrap_or(0);
    let region = CropRegion::new(coordinate("x"), coordinate("y"), coordinate("width"), coordinate("height"));
    let scale = *args.get_one::<f32>("scale").context("missing --scale")?;
    let canvas = dimensions(args, "out-width", "out-height", DEFAULT_CROP_OUTPUT);
    let quality = *args.get_one::<u8>("quality").context("missing --quality")?;

    let options = TransformOptions::crop(region, scale, canvas, quality);
    let written = run_transform(input, output, options, config).await?;
    println!("Wrote {} ({written} bytes)", output.display());
    Ok(true)
}

async fn matte(args: &ArgMatches, config: &PipelineConfig) -> anyhow::Result<bool> {
    let (input, output) = paths(args)?;
    let canvas = dimensions(args, "canvas-width", "canvas-height", DEFAULT_MATTE_CANVAS);
    let padding = *args.get_one::<f32>("padding").context("missing --padding")?;
    let color = *args.get_one::<[u8; 3]>("color").context("missing --color")?;
    let quality = *args.get_one::<u8>("quality").context("missing --quality")?;

    let options = TransformOptions::matte(canvas, padding, color, quality);
    let written = run_transform(input, output, options, config).await?;
    println!("Wrote {} ({written} bytes)", output.display());
    Ok(true)
}

fn print_config(args: &ArgMatches, config: &PipelineConfig) -> anyhow::Result<bool> {
    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        print!("{}", config.to_toml_string());
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"), "info");
    let config = load_config(&matches)?;

    let ok = match matches.subcommand() {
        Some(("load", args)) => load(args, &config).await?,
        Some(("upload", args)) => upload(args, &config).await?,
        Some(("canvas", args)) => canvas(args, &config).await?,
        Some(("crop", args)) => crop(args, &config).await?,
        Some(("matte", args)) => matte(args, &config).await?,
        Some(("config", args)) => print_config(args, &config)?,
        _ => true,
    };

    std::process::exit(if ok { 0 } else { 1 });
}
