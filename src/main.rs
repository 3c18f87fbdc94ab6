use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use atelier_config::{SETTINGS_FILE, Settings, default_data_dir};
use atelier_history::{FsBlobStore, HistoryLog};
use atelier_provider::{ProviderClient, ProviderConfig};
use atelier_runtime::{Session, WatchConfig};
use atelier_task::{
  AspectRatio, GenerationConfig, ImageInput, OutputFormat, Resolution, TaskState, TaskView,
};
use atelier_upload::HttpBlobUploader;

/// Atelier - a client for asynchronous remote image generation
#[derive(Parser)]
#[command(name = "atelier")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.atelier)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Submit a generation job and poll it to completion
  Generate {
    /// Text prompt for the image
    prompt: String,

    /// Aspect ratio (1:1, 3:4, 4:3, 9:16, 16:9)
    #[arg(long, default_value = "1:1")]
    aspect_ratio: String,

    /// Resolution (1K, 2K, 4K)
    #[arg(long, default_value = "4K")]
    resolution: String,

    /// Output format (png, jpg)
    #[arg(long, default_value = "png")]
    format: String,

    /// Reference image: a URL or a local file path (repeatable)
    #[arg(long = "image")]
    images: Vec<String>,

    /// Submit without waiting for the result
    #[arg(long)]
    no_wait: bool,
  },

  /// Run one status check for a task from the history
  Check {
    /// Task id (default: the most recent history entry)
    task_id: Option<String>,
  },

  /// Inspect the local task history
  History {
    #[command(subcommand)]
    action: HistoryAction,
  },
}

#[derive(Subcommand)]
enum HistoryAction {
  /// List history entries, most recent first
  List,

  /// Print one entry as JSON
  Show { task_id: String },

  /// Drop all history entries
  Clear,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
    )
    .init();

  let cli = Cli::parse();
  let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);

  let mut settings = Settings::load(&data_dir.join(SETTINGS_FILE))
    .with_context(|| format!("failed to load settings from {}", data_dir.display()))?;
  settings.apply_env();

  match cli.command {
    Some(command) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run(command, settings, data_dir))
    }
    None => {
      println!("atelier - use --help to see available commands");
      Ok(())
    }
  }
}

async fn run(command: Commands, settings: Settings, data_dir: PathBuf) -> Result<()> {
  let session = build_session(&settings, &data_dir);

  match command {
    Commands::Generate {
      prompt,
      aspect_ratio,
      resolution,
      format,
      images,
      no_wait,
    } => {
      let config = GenerationConfig {
        prompt,
        aspect_ratio: aspect_ratio.parse::<AspectRatio>()?,
        resolution: resolution.parse::<Resolution>()?,
        output_format: format.parse::<OutputFormat>()?,
        image_inputs: images.into_iter().map(parse_image_input).collect(),
      };

      if settings.provider.api_key.is_empty() {
        bail!(
          "no API key configured; set ATELIER_API_KEY or provider.api_key in {}",
          data_dir.join(SETTINGS_FILE).display()
        );
      }

      let task_id = session.submit(config).await?;
      println!("submitted task {task_id}");

      if no_wait {
        println!("not waiting; run `atelier check {task_id}` to poll manually");
        return Ok(());
      }

      let view = session.wait_until_settled().await;
      report_view(&view)
    }

    Commands::Check { task_id } => {
      let task_id = match task_id {
        Some(id) => id,
        None => session
          .history()
          .first()
          .map(|e| e.task_id.clone())
          .context("history is empty, nothing to check")?,
      };
      session
        .select_history_entry(&task_id)
        .with_context(|| format!("unknown task '{task_id}'"))?;
      // One manual check only; the CLI exits instead of keeping a watch.
      session.stop_watching();
      session.check_now().await?;
      report_view(&session.live())
    }

    Commands::History { action } => match action {
      HistoryAction::List => {
        let entries = session.history();
        if entries.is_empty() {
          println!("history is empty");
        }
        for entry in entries {
          println!(
            "{}  {:<10}  {}  {}",
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            entry.state,
            entry.task_id,
            truncate(&entry.prompt, 60),
          );
        }
        Ok(())
      }
      HistoryAction::Show { task_id } => {
        let entries = session.history();
        let entry = entries
          .iter()
          .find(|e| e.task_id == task_id)
          .with_context(|| format!("no history entry for task '{task_id}'"))?;
        println!("{}", serde_json::to_string_pretty(entry)?);
        Ok(())
      }
      HistoryAction::Clear => {
        session.clear_history();
        println!("history cleared");
        Ok(())
      }
    },
  }
}

fn build_session(settings: &Settings, data_dir: &Path) -> Session {
  let client = ProviderClient::new(ProviderConfig {
    base_url: settings.provider.base_url.clone(),
    api_key: settings.provider.api_key.clone(),
    model: settings.provider.model.clone(),
  });

  let uploader = HttpBlobUploader::new(
    settings.upload.endpoint.clone(),
    settings.upload.token.clone(),
  )
  .with_propagation_delay(Duration::from_millis(settings.upload.propagation_delay_ms));

  let history = Arc::new(HistoryLog::new(Arc::new(FsBlobStore::new(data_dir))));

  Session::new(
    Arc::new(client),
    Arc::new(uploader),
    history,
    WatchConfig {
      interval: Duration::from_secs(settings.poll_interval_secs),
      initial_delay: Duration::from_millis(settings.initial_delay_ms),
    },
  )
}

fn parse_image_input(value: String) -> ImageInput {
  if value.starts_with("http://") || value.starts_with("https://") {
    ImageInput::Url(value)
  } else {
    ImageInput::File(PathBuf::from(value))
  }
}

fn report_view(view: &TaskView) -> Result<()> {
  match view.state {
    TaskState::Succeeded => {
      println!(
        "succeeded: {}",
        view.result_url.as_deref().unwrap_or("<missing>")
      );
      Ok(())
    }
    TaskState::Failed => {
      bail!(
        "generation failed: {}",
        view.error.as_deref().unwrap_or("unknown error")
      )
    }
    other => {
      println!("task is still {other}");
      Ok(())
    }
  }
}

fn truncate(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let cut: String = s.chars().take(max).collect();
    format!("{cut}…")
  }
}
