use std::path::PathBuf;

use anyhow::Context as _;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "inkclock", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the clock once to a grayscale PNG.
    Render(RenderArgs),
    /// Generate an SVG template from a layout config.
    Scaffold(ScaffoldArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Directory holding `<name>.svg` templates and `<name>.json` layouts.
    #[arg(long)]
    templates: PathBuf,

    #[arg(long, value_enum, default_value_t = OrientationChoice::Landscape)]
    orientation: OrientationChoice,

    #[arg(long, value_enum, default_value_t = ThemeChoice::Light)]
    theme: ThemeChoice,

    /// IANA timezone identifier.
    #[arg(long, default_value = "UTC")]
    timezone: String,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct ScaffoldArgs {
    /// Layout config JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output SVG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OrientationChoice {
    Landscape,
    Portrait,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ThemeChoice {
    Light,
    Dark,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Scaffold(args) => cmd_scaffold(args),
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let store = inkclock::TemplateStore::new(&args.templates);
    let orientation = match args.orientation {
        OrientationChoice::Landscape => inkclock::Orientation::Landscape,
        OrientationChoice::Portrait => inkclock::Orientation::Portrait,
    };
    let theme = match args.theme {
        ThemeChoice::Light => inkclock::Theme::Light,
        ThemeChoice::Dark => inkclock::Theme::Dark,
    };

    let resolved = inkclock::resolve(
        Utc::now(),
        &args.timezone,
        &inkclock::ResolveOptions::default(),
    )?;
    let layout = store.load_layout(orientation.layout_name())?;
    let template = store.load(&layout.template_name)?;
    let bitmap = inkclock::render_themed(&template, &layout, &resolved, theme)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, bitmap.encode_png()?)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_scaffold(args: ScaffoldArgs) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(&args.in_path)
        .with_context(|| format!("read layout '{}'", args.in_path.display()))?;
    let layout = inkclock::layout::parse(&source)?;

    std::fs::write(&args.out, layout.scaffold_svg())
        .with_context(|| format!("write template '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}
