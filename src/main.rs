use clap::{ArgAction, Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;

use todo_sync::config::Config;
use todo_sync::logging;
use todo_sync::remote::ApiRequest;
use todo_sync::sync::{SchedulePolicy, SyncTrigger};
use todo_sync::todo::{InsertOutcome, Todo, TodoFilter, TodoList, TodoUpdate};
use todo_sync::OfflineEngine;

#[derive(Parser, Debug)]
#[command(name = "todo-sync")]
#[command(about = "Offline-first client for a remote todo service")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/todo-sync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Remote todo service url (overrides config)
  #[arg(short, long)]
  remote: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List todos
  List {
    /// Only todos still to do
    #[arg(long, conflicts_with = "completed")]
    active: bool,
    /// Only finished todos
    #[arg(long)]
    completed: bool,
  },
  /// Add a todo (queued if the remote is unreachable)
  Add { title: String },
  /// Rename a todo; an empty title removes it
  Edit { id: i64, title: String },
  /// Mark a todo completed or active
  Toggle {
    id: i64,
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    completed: bool,
  },
  /// Mark every todo completed or active
  ToggleAll {
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    completed: bool,
  },
  /// Remove a todo
  Remove { id: i64 },
  /// Remove every completed todo
  ClearCompleted,
  /// Show total, active and completed counts
  Count,
  /// Seed the cache for the configured version and drop older versions
  Install,
  /// Show todos waiting to be synced
  Pending,
  /// Replay queued todos now
  Sync,
  /// Show connectivity, cache and queue state
  Status,
  /// Keep syncing in the background until interrupted
  Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;

  // Override remote if specified on command line
  if let Some(url) = args.remote {
    config.remote.url = url;
  }

  let _log_guard = logging::init(&config.data_dir()?)?;

  let mut engine = OfflineEngine::open(&config).await?;
  let result = run(&mut engine, &config, args.command).await;
  engine.shutdown().await;

  result
}

async fn run(engine: &mut OfflineEngine, config: &Config, command: Command) -> Result<()> {
  let client = engine.client();

  match command {
    Command::List { active, completed } => {
      let filter = if active {
        TodoFilter::by_completed(false)
      } else if completed {
        TodoFilter::by_completed(true)
      } else {
        TodoFilter::all()
      };
      print_list(&client.find(&filter).await?);
    }
    Command::Add { title } => {
      let todo = Todo::new(title);
      match client.insert(&todo).await? {
        InsertOutcome::Confirmed(todo) => println!("Added #{}: {}", todo.id, todo.title),
        InsertOutcome::Queued => println!(
          "Offline: queued #{}: {} (will sync when back online)",
          todo.id, todo.title
        ),
      }
    }
    Command::Edit { id, title } => {
      let title = title.trim();
      if title.is_empty() {
        client.remove(&TodoFilter::by_id(id)).await?;
        println!("Removed #{}", id);
      } else {
        let todo = client.update(&TodoUpdate::title(id, title)).await?;
        println!("Renamed #{}: {}", todo.id, todo.title);
      }
    }
    Command::Toggle { id, completed } => {
      let todo = client.update(&TodoUpdate::completed(id, completed)).await?;
      println!("{} #{}: {}", checkbox(todo.completed), todo.id, todo.title);
    }
    Command::ToggleAll { completed } => {
      let changed = client.toggle_all(completed).await?;
      println!("Updated {} todos", changed);
    }
    Command::Remove { id } => {
      client.remove(&TodoFilter::by_id(id)).await?;
      println!("Removed #{}", id);
    }
    Command::ClearCompleted => {
      let remaining = client.remove_completed().await?;
      println!("{} todos remaining", remaining.len());
    }
    Command::Count => {
      let counts = client.count().await?;
      println!(
        "total: {}, active: {}, completed: {}",
        counts.total, counts.active, counts.completed
      );
    }
    Command::Install => {
      engine.install().await?;
      let deleted = engine.activate().await?;
      println!("Cache {} ready", engine.namespace());
      for name in deleted {
        println!("Deleted stale cache {}", name);
      }
    }
    Command::Pending => {
      let pending = engine.queue().list_all().await?;
      if pending.is_empty() {
        println!("Nothing waiting to sync");
      }
      for todo in pending {
        println!("{} {} (#{})", checkbox(todo.completed), todo.title, todo.id);
      }
    }
    Command::Sync => {
      let handle = engine.spawn_scheduler(SchedulePolicy::default());
      let outcome = handle.request(SyncTrigger::Manual).await?;
      println!("Synced {} todos", outcome.replayed);
    }
    Command::Status => {
      let seeded = engine.cache().is_seeded(engine.namespace()).await?;
      let snapshot = engine
        .interceptor()
        .cache()
        .lookup(&ApiRequest::get("/todos"))
        .await?;
      println!("remote:  {} ({:?})", config.remote.url, engine.probe().await);
      println!(
        "cache:   {}{}",
        engine.namespace(),
        if seeded { "" } else { " (not installed)" }
      );
      match snapshot {
        Some(cached) => println!("offline: todo list cached {}", cached.stored_at.to_rfc3339()),
        None => println!("offline: no cached todo list"),
      }
      println!("pending: {}", engine.queue().len().await?);
    }
    Command::Watch => {
      engine.spawn_scheduler(config.sync.policy());
      println!("Watching for connectivity; press Ctrl-C to stop");
      tokio::signal::ctrl_c().await?;
      let state = engine.coordinator().state();
      if let Some(at) = state.last_succeeded {
        println!("Last successful sync: {}", at.to_rfc3339());
      }
    }
  }

  Ok(())
}

fn checkbox(completed: bool) -> &'static str {
  if completed {
    "[x]"
  } else {
    "[ ]"
  }
}

fn print_list(list: &TodoList) {
  for todo in &list.items {
    let pending = if todo.is_synced() { "" } else { "  (not synced)" };
    println!("{} {} (#{}){}", checkbox(todo.completed), todo.title, todo.id, pending);
  }

  println!("{} items left", list.counts.active);
  if let Some(date) = list.date {
    println!("as of {}", date.to_rfc2822());
  }
}
