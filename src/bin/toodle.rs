use std::{
    path::{Path, PathBuf},
    rc::Rc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use toodle::Surface as _;

#[derive(Parser, Debug)]
#[command(name = "toodle", version)]
struct Cli {
    /// Log debug output to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a script and report errors.
    Check(CheckArgs),
    /// Play a script headlessly and print frame statistics as JSON.
    Run(RunArgs),
    /// Print the geometry of the first steps as JSON lines.
    Dump(DumpArgs),
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// Script file.
    script: PathBuf,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Script file.
    script: PathBuf,

    /// Write the final canvas to this PNG.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Player config JSON. Flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Display time to simulate, in seconds.
    #[arg(long, default_value_t = 2.0)]
    seconds: f64,

    /// Simulated display refresh rate.
    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    #[arg(long)]
    speed: Option<u32>,

    #[arg(long, value_enum)]
    loop_mode: Option<LoopChoice>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[arg(long)]
    pixel_ratio: Option<f64>,
}

#[derive(Parser, Debug)]
struct DumpArgs {
    /// Script file.
    script: PathBuf,

    /// Number of steps to run.
    #[arg(long, default_value_t = 1)]
    steps: u64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LoopChoice {
    None,
    Wrap,
    Reverse,
}

impl From<LoopChoice> for toodle::LoopMode {
    fn from(c: LoopChoice) -> Self {
        match c {
            LoopChoice::None => Self::NoLoop,
            LoopChoice::Wrap => Self::Wrap,
            LoopChoice::Reverse => Self::Reverse,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Check(args) => cmd_check(args),
        Command::Run(args) => cmd_run(args),
        Command::Dump(args) => cmd_dump(args),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn read_script(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("read script '{}'", path.display()))
}

fn cmd_check(args: CheckArgs) -> anyhow::Result<()> {
    let source = read_script(&args.script)?;
    let runtime: Rc<dyn toodle::Runtime> = Rc::new(toodle::ScriptRuntime::new());
    let raw = runtime
        .compile(&source)
        .map_err(|e| anyhow::anyhow!("{}:{}", args.script.display(), e.message()))?;
    let _image = toodle::Image::adopt(Rc::clone(&runtime), raw);
    eprintln!("ok {}", args.script.display());
    Ok(())
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let source = read_script(&args.script)?;
    let mut config = match &args.config {
        Some(path) => toodle::PlayerConfig::from_json_path(path)?,
        None => toodle::PlayerConfig::default(),
    };
    if let Some(speed) = args.speed {
        config.playback_speed = speed;
    }
    if let Some(mode) = args.loop_mode {
        config.loop_mode = mode.into();
    }
    if let Some(w) = args.width {
        config.viewport.width = w;
    }
    if let Some(h) = args.height {
        config.viewport.height = h;
    }
    if let Some(r) = args.pixel_ratio {
        config.viewport.pixel_ratio = r;
    }
    config.validate()?;

    let mut display = toodle::HeadlessDisplay::new(args.fps)?;
    let mut player =
        toodle::Player::new(Rc::new(toodle::ScriptRuntime::new()), display.host(), &config)?;
    player.set_source(source);
    let summary = display.run_for(&mut player, args.seconds);

    for line in player.output().lines() {
        let tag = if line.is_err { "error" } else { "out" };
        eprintln!("{}: {tag}: {}", args.script.display(), line.text);
    }

    if let Some(out) = &args.out {
        let frame = player
            .surface()
            .snapshot()
            .context("surface has no pixels")?;
        if let Some(parent) = out.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output dir '{}'", parent.display()))?;
        }
        frame.save_png(out)?;
        eprintln!("wrote {}", out.display());
    }

    let report = serde_json::json!({
        "run": summary,
        "frames": player.stats(),
        "evaluation": player.evaluation_state(),
        "t": player.t().0,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    player.teardown();
    Ok(())
}

fn cmd_dump(args: DumpArgs) -> anyhow::Result<()> {
    let source = read_script(&args.script)?;
    let runtime: Rc<dyn toodle::Runtime> = Rc::new(toodle::ScriptRuntime::new());
    let raw = runtime
        .compile(&source)
        .map_err(|e| anyhow::anyhow!("{}:{}", args.script.display(), e.message()))?;
    let image = toodle::Image::adopt(Rc::clone(&runtime), raw);
    let started = runtime.start(image.raw())?;
    let env = toodle::Environment::adopt(Rc::clone(&runtime), started.environment);
    println!(
        "{}",
        serde_json::json!({
            "setup": { "background": started.background, "output": started.output }
        })
    );
    for step in 0..args.steps {
        let out = runtime
            .step(env.raw())
            .with_context(|| format!("step {step}"))?;
        println!("{}", serde_json::json!({ "step": step, "output": out }));
    }
    Ok(())
}
