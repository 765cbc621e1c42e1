use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use restyle_core::{
    config::ConfigBuilder,
    controller::{Controller, LifecycleState},
    init,
    presets::{find_preset, STYLE_PRESETS},
    ui, Config, GenerationClient, SelectedImage,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom style prompt (ignored when --style is given)
    #[arg(trailing_var_arg = true)]
    prompt: Vec<String>,

    /// Image to restyle. Without it the studio window opens
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Preset style to apply, see --list-styles
    #[arg(short, long)]
    style: Option<String>,

    /// Override the model defined in .env
    #[arg(short, long)]
    model: Option<String>,

    /// Directory the result is written to
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// List the preset styles and exit
    #[arg(long)]
    list_styles: bool,
}

fn main() -> Result<()> {
    // Setup
    init();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "restyle=info,restyle_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    tracing::debug!(?args, "starting");

    if args.list_styles {
        println!("Available styles:");
        for preset in STYLE_PRESETS {
            println!("  {}", preset);
        }
        return Ok(());
    }

    // Load config and override model if specified via CLI
    let mut builder = ConfigBuilder::from_config(&Config::load());
    if let Some(m) = &args.model {
        builder = builder.with_model(m);
    }
    let config = builder.build().context("Invalid configuration")?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;

    match &args.input {
        Some(input) => run_headless(&args, input, config, runtime.handle().clone()),
        None => {
            ui::run_studio(config, runtime.handle().clone()).context("Studio window failed")?;
            Ok(())
        }
    }
}

/// Restyles one image without opening a window.
fn run_headless(
    args: &Args,
    input: &PathBuf,
    config: Config,
    runtime: tokio::runtime::Handle,
) -> Result<()> {
    let prompt = match &args.style {
        Some(style) => match find_preset(style) {
            Some(preset) => preset.to_string(),
            None => bail!(
                "Unknown style '{}'. Use --list-styles to see the presets",
                style
            ),
        },
        None => args.prompt.join(" "),
    };

    let image = SelectedImage::from_path(input)
        .with_context(|| format!("Failed to load {}", input.display()))?;

    let model = config.model_name.clone();
    tracing::info!(input = %input.display(), %prompt, %model, "restyling without window");
    let mut controller = Controller::new(GenerationClient::new(config), runtime);
    controller.select_image(image);
    controller.set_prompt(prompt);
    controller.generate();

    // Send to API
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .template("{spinner:.green} {msg}")?,
    );
    spinner.set_message(format!("Restyling with {}...", model));
    spinner.enable_steady_tick(Duration::from_millis(100));

    while controller.is_loading() {
        controller.wait_for_completion(Duration::from_millis(250));
    }
    spinner.finish_and_clear();

    match controller.lifecycle() {
        LifecycleState::Succeeded => {
            let path = controller
                .download(&args.out_dir)
                .context("Failed to save the result")?;
            if let Some(path) = path {
                println!("Saved {}", path.display());
            }
            Ok(())
        }
        _ => bail!(
            "{}",
            controller.error().unwrap_or("Generation did not finish")
        ),
    }
}
