use clap::{Arg, ArgAction, ArgMatches, Command};
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

mod adapters;
mod application;
mod domain;
mod ports;

use adapters::{
    api::{ApiClient, HttpRepository},
    cache::MokaCacheAdapter,
    config::FileConfigStore,
    media::JpegPhotoEncoder,
    tui::{run_tui, App},
};
use application::{
    AppError, ChatPoller, ExpandState, ProjectService, Session, StatusUpdateFlow,
    StatusUpdateService,
};
use domain::{Frequency, FrequencyFilter, Project, ProjectId, StatusUpdateId};
use ports::ConfigStore;

const TOKEN_ENV: &str = "SITETRACK_TOKEN";
const API_URL_ENV: &str = "SITETRACK_API_URL";

fn cli() -> Command {
    Command::new("sitetrack")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A terminal client for SiteTrack construction projects")
        .long_about("Browse a project's milestones and tasks as a tree, Gantt chart or Kanban board,\npost status updates with site photos and follow the project chat.\n\nRun without a subcommand and with --project to open the interactive view.")
        .arg(
            Arg::new("token")
                .long("token")
                .value_name("TOKEN")
                .help("API token (can also be set via SITETRACK_TOKEN env var)")
                .global(true),
        )
        .arg(
            Arg::new("api_url")
                .long("api-url")
                .value_name("URL")
                .help("API base URL (can also be set via SITETRACK_API_URL env var)")
                .global(true),
        )
        .arg(
            Arg::new("project")
                .long("project")
                .value_name("PROJECT_ID")
                .help("Project to open in the interactive view"),
        )
        .subcommand(
            Command::new("project")
                .about("Project operations")
                .subcommand(
                    Command::new("show")
                        .about("Show a project as JSON")
                        .arg(
                            Arg::new("project_id")
                                .help("Project ID to fetch")
                                .required(true)
                                .index(1),
                        )
                        .arg(
                            Arg::new("view")
                                .long("view")
                                .value_parser(["tree", "gantt", "kanban"])
                                .default_value("tree")
                                .help("Projection to print"),
                        ),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Status update operations")
                .subcommand(
                    Command::new("list")
                        .about("List status updates as JSON")
                        .arg(project_arg())
                        .arg(
                            Arg::new("frequency")
                                .long("frequency")
                                .value_parser(["all", "daily", "weekly", "monthly"])
                                .default_value("all")
                                .help("Only list updates of this frequency"),
                        ),
                )
                .subcommand(
                    Command::new("create")
                        .about("Post a status update")
                        .arg(project_arg())
                        .arg(
                            Arg::new("title")
                                .long("title")
                                .required(true)
                                .help("Update title"),
                        )
                        .arg(
                            Arg::new("frequency")
                                .long("frequency")
                                .value_parser(["daily", "weekly", "monthly"])
                                .default_value("daily"),
                        )
                        .arg(Arg::new("description").long("description"))
                        .arg(
                            Arg::new("photo")
                                .long("photo")
                                .value_name("PATH")
                                .action(ArgAction::Append)
                                .value_parser(clap::value_parser!(PathBuf))
                                .help("Site photo to attach (repeatable, at most 10)"),
                        )
                        .arg(
                            Arg::new("task")
                                .long("task")
                                .value_name("TASK_ID")
                                .action(ArgAction::Append)
                                .help("Task this update covers (repeatable)"),
                        )
                        .arg(Arg::new("issues").long("issues"))
                        .arg(Arg::new("next_steps").long("next-steps"))
                        .arg(Arg::new("weather").long("weather"))
                        .arg(
                            Arg::new("public")
                                .long("public")
                                .action(ArgAction::SetTrue)
                                .help("Make the update visible to the client"),
                        ),
                )
                .subcommand(
                    Command::new("delete")
                        .about("Delete a status update")
                        .arg(
                            Arg::new("update_id")
                                .help("Status update ID")
                                .required(true)
                                .index(1),
                        ),
                )
                .subcommand(
                    Command::new("gantt")
                        .about("Print the status-update Gantt items as JSON")
                        .arg(project_arg())
                        .arg(
                            Arg::new("view")
                                .long("view")
                                .value_parser(["daily", "weekly", "monthly"])
                                .default_value("weekly"),
                        ),
                ),
        )
        .subcommand(
            Command::new("chat")
                .about("Project chat")
                .subcommand(
                    Command::new("watch")
                        .about("Print new chat messages until Ctrl-C")
                        .arg(project_arg()),
                ),
        )
        .subcommand(Command::new("logout").about("Remove the stored API token"))
}

fn project_arg() -> Arg {
    Arg::new("project_id")
        .help("Project ID")
        .required(true)
        .index(1)
}

fn project_id(matches: &ArgMatches) -> ProjectId {
    matches
        .get_one::<String>("project_id")
        .map(String::as_str)
        .unwrap_or_default()
        .into()
}

fn exit_with(context: &str, error: AppError) -> ! {
    tracing::error!("{}: {}", context, error);
    eprintln!("❌ {context}: {}", error.user_message());
    std::process::exit(1);
}

struct Services {
    projects: Arc<ProjectService>,
    status_updates: Arc<StatusUpdateService>,
    repository: Arc<HttpRepository>,
    poll_interval: Duration,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("sitetrack-cli.log")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let matches = cli().get_matches();
    let config_store = Arc::new(FileConfigStore::new()?);

    // needs no session
    if let Some(("logout", _)) = matches.subcommand() {
        if let Err(e) = Session::sign_out(config_store.as_ref()).await {
            exit_with("Failed to sign out", e);
        }
        println!("Signed out.");
        return Ok(());
    }

    let explicit_token = matches
        .get_one::<String>("token")
        .cloned()
        .or_else(|| std::env::var(TOKEN_ENV).ok());
    let (session, mut config) = match Session::hydrate(config_store.as_ref(), explicit_token).await
    {
        Ok(hydrated) => hydrated,
        Err(AppError::AuthenticationRequired) => {
            eprintln!("❌ No SiteTrack API token found!");
            eprintln!();
            eprintln!("To get started:");
            eprintln!("1. Run: export SITETRACK_TOKEN=your_token_here");
            eprintln!("2. Or run: sitetrack --token your_token_here");
            eprintln!();
            std::process::exit(1);
        }
        Err(e) => exit_with("Failed to load configuration", e),
    };

    if let Some(url) = matches.get_one::<String>("api_url") {
        config.api_base_url = url.clone();
    } else if let Ok(url) = std::env::var(API_URL_ENV) {
        config.api_base_url = url;
    }

    let client = match ApiClient::new(&config.api_base_url, session) {
        Ok(client) => client,
        Err(e) => exit_with("Failed to create API client", e.into()),
    };
    let repository = Arc::new(HttpRepository::new(client));
    let project_cache: Arc<MokaCacheAdapter<ProjectId, Project>> =
        Arc::new(MokaCacheAdapter::new(config.cache_ttl_seconds, 100));

    let services = Services {
        projects: Arc::new(ProjectService::new(repository.clone(), project_cache)),
        status_updates: Arc::new(StatusUpdateService::new(
            repository.clone(),
            Arc::new(JpegPhotoEncoder::default()),
        )),
        repository,
        poll_interval: Duration::from_secs(config.chat_poll_interval_secs.max(1)),
    };

    match matches.subcommand() {
        Some(("project", project_matches)) => match project_matches.subcommand() {
            Some(("show", show_matches)) => show_project(&services, show_matches).await?,
            _ => {
                eprintln!("❌ Unknown project subcommand");
                std::process::exit(1);
            }
        },
        Some(("status", status_matches)) => match status_matches.subcommand() {
            Some(("list", list_matches)) => list_status_updates(&services, list_matches).await?,
            Some(("create", create_matches)) => {
                create_status_update(&services, create_matches).await?
            }
            Some(("delete", delete_matches)) => {
                let id: StatusUpdateId = delete_matches
                    .get_one::<String>("update_id")
                    .map(String::as_str)
                    .unwrap_or_default()
                    .into();
                if let Err(e) = services.status_updates.delete(&id).await {
                    exit_with("Failed to delete status update", e);
                }
                println!("Deleted status update {id}");
            }
            Some(("gantt", gantt_matches)) => {
                let view: Frequency = gantt_matches
                    .get_one::<String>("view")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(Frequency::Weekly);
                match services
                    .status_updates
                    .gantt(&project_id(gantt_matches), view)
                    .await
                {
                    Ok(items) => println!("{}", serde_json::to_string_pretty(&items)?),
                    Err(e) => exit_with("Failed to load Gantt data", e),
                }
            }
            _ => {
                eprintln!("❌ Unknown status subcommand");
                std::process::exit(1);
            }
        },
        Some(("chat", chat_matches)) => match chat_matches.subcommand() {
            Some(("watch", watch_matches)) => watch_chat(&services, watch_matches).await?,
            _ => {
                eprintln!("❌ Unknown chat subcommand");
                std::process::exit(1);
            }
        },
        None => {
            let project = matches
                .get_one::<String>("project")
                .map(|id| ProjectId::from(id.as_str()))
                .or_else(|| config.default_project.clone());

            let Some(project) = project else {
                exit_with("Cannot open the project view", AppError::ProjectNotSelected);
            };

            if config.default_project.as_ref() != Some(&project) {
                config.default_project = Some(project.clone());
                if let Err(e) = config_store.save_config(&config).await {
                    tracing::warn!("Could not remember default project: {}", e);
                }
            }

            let poller = ChatPoller::new(services.repository.clone(), project.clone())
                .with_interval(services.poll_interval);
            let app = App::new(
                services.projects.clone(),
                services.status_updates.clone(),
                poller,
                project,
            );

            if let Err(e) = run_tui(app).await {
                match e.downcast_ref::<AppError>() {
                    Some(app_error) => eprintln!("❌ {}", app_error.user_message()),
                    None => eprintln!("❌ Application error: {e}"),
                }
                std::process::exit(1);
            }
        }
        _ => {
            eprintln!("❌ Unknown command");
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn show_project(services: &Services, matches: &ArgMatches) -> Result<()> {
    let id = project_id(matches);
    let overview = services.projects.load_overview(&id, false).await;

    for (section, error) in &overview.failures {
        eprintln!("⚠ Could not load {section:?}: {}", error.user_message());
    }
    if overview.project.is_none() && overview.milestones.is_empty() && overview.tasks.is_empty() {
        std::process::exit(1);
    }

    let view = match matches.get_one::<String>("view").map(String::as_str) {
        Some("gantt") => serde_json::to_value(overview.gantt())?,
        Some("kanban") => serde_json::to_value(overview.kanban())?,
        _ => serde_json::to_value(overview.tree(&ExpandState::default()))?,
    };

    let output = serde_json::json!({
        "project": overview.project,
        "stats": overview.stats(),
        "view": view,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn list_status_updates(services: &Services, matches: &ArgMatches) -> Result<()> {
    let filter: FrequencyFilter = matches
        .get_one::<String>("frequency")
        .and_then(|f| f.parse().ok())
        .unwrap_or_default();

    match services.status_updates.list(&project_id(matches), filter).await {
        Ok(updates) => println!("{}", serde_json::to_string_pretty(&updates)?),
        Err(e) => exit_with("Failed to list status updates", e),
    }
    Ok(())
}

async fn create_status_update(services: &Services, matches: &ArgMatches) -> Result<()> {
    let project = project_id(matches);
    let text = |name: &str| matches.get_one::<String>(name).cloned().unwrap_or_default();

    let mut flow = StatusUpdateFlow::new();
    flow.open();
    if let Some(draft) = flow.draft_mut() {
        draft.title = text("title");
        draft.description = text("description");
        draft.issues = text("issues");
        draft.next_steps = text("next_steps");
        draft.weather = text("weather");
        draft.is_public = matches.get_flag("public");
        draft.frequency = matches
            .get_one::<String>("frequency")
            .and_then(|f| f.parse().ok())
            .unwrap_or_default();
        for task in matches.get_many::<String>("task").into_iter().flatten() {
            draft.toggle_task(&task.as_str().into());
        }

        let photos: Vec<PathBuf> = matches
            .get_many::<PathBuf>("photo")
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        if !photos.is_empty() {
            let report = services.status_updates.attach_photo_files(draft, &photos).await;
            for (name, error) in &report.failed {
                eprintln!("⚠ Skipped {name}: {error}");
            }
            if report.dropped > 0 {
                eprintln!("⚠ Only 10 photos per update, {} dropped", report.dropped);
            }
        }
    }

    let payload = match flow.begin_submit(&project) {
        Ok(payload) => payload,
        Err(e) => exit_with("Invalid status update", e),
    };
    let outcome = services.status_updates.create(&payload).await;
    flow.finish_submit(&outcome);

    match outcome {
        Ok(update) => println!("{}", serde_json::to_string_pretty(&update)?),
        Err(e) => exit_with("Failed to create status update", e),
    }
    Ok(())
}

async fn watch_chat(services: &Services, matches: &ArgMatches) -> Result<()> {
    let (tx, mut rx) = mpsc::channel(32);
    let watch = ChatPoller::new(services.repository.clone(), project_id(matches))
        .with_interval(services.poll_interval)
        .start(tx);

    loop {
        tokio::select! {
            batch = rx.recv() => match batch {
                Some(messages) => {
                    for message in messages {
                        println!(
                            "[{}] {}: {}",
                            message.created_at.format("%Y-%m-%d %H:%M"),
                            message.sender_name(),
                            message.content
                        );
                    }
                }
                None => {
                    eprintln!("❌ Chat polling stopped, check your token and try again");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    watch.stop().await;
    Ok(())
}
