use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use todolist::config::TodoConfig;
use todolist::controller::TaskError;
use todolist::controller::auth::AuthController;
use todolist::controller::draft::{SAVE_FAILED_MESSAGE, TaskDraftController};
use todolist::controller::task_list::TaskListController;
use todolist::core::task::{DueDate, InvalidDueDate, Task};
use todolist::session::firebase::FirebaseAuthClient;
use todolist::session::keyring::{self, StoredSession};
use todolist::session::{Session, SessionProvider};
use todolist::store::firestore::FirestoreTaskStore;

/// Personal to-do list synced with a remote document store.
#[derive(Parser, Debug)]
#[command(name = "todolist")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Save the backend project and API key
    Config { project_id: String, api_key: String },
    /// Create an account and sign in
    Signup {
        email: String,
        password: String,
        username: String,
    },
    /// Sign in to an existing account
    Signin { email: String, password: String },
    /// Forget the stored session
    Signout,
    /// Show the signed-in user
    Whoami,
    /// List your tasks
    List,
    /// Add a task
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Due date as YYYY-MM-DD
        #[arg(long, value_parser = parse_due)]
        due: Option<DueDate>,
    },
    /// Change fields of an existing task
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Due date as YYYY-MM-DD, or "none" to clear it
        #[arg(long, value_parser = parse_due)]
        due: Option<DueDate>,
    },
    /// Mark a task finished
    Done { id: String },
    /// Mark a task unfinished
    Undone { id: String },
    /// Delete a task
    Rm { id: String },
}

/// `--due` value: an ISO date, or "none" for no due date.
fn parse_due(value: &str) -> Result<DueDate, String> {
    if value.eq_ignore_ascii_case("none") {
        return Ok(DueDate::Unset);
    }
    value.parse().map_err(|e: InvalidDueDate| e.to_string())
}

fn init_logging(debug: bool) {
    // Journal logging (`journalctl --user -t todolist -f`): this crate at
    // info/debug, everything else at warn.
    struct FilteredJournal {
        inner: systemd_journal_logger::JournalLog,
    }

    impl log::Log for FilteredJournal {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            if metadata.target().starts_with("todolist") {
                let max = if todolist::debug_logging() {
                    log::LevelFilter::Debug
                } else {
                    log::LevelFilter::Info
                };
                metadata.level() <= max
            } else {
                metadata.level() <= log::LevelFilter::Warn
            }
        }
        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                self.inner.log(record);
            }
        }
        fn flush(&self) {
            self.inner.flush();
        }
    }

    todolist::set_debug_logging(debug);

    let journal = match systemd_journal_logger::JournalLog::new() {
        Ok(j) => j.with_syslog_identifier("todolist".to_string()),
        Err(e) => {
            eprintln!("journal logging unavailable: {}", e);
            return;
        }
    };
    if log::set_boxed_logger(Box::new(FilteredJournal { inner: journal })).is_ok() {
        // Global max must be Debug so crate debug logs can pass when toggled
        log::set_max_level(log::LevelFilter::Debug);
    }
}

fn print_tasks(session: &Session, tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks for {}.", session.display_name);
        return;
    }
    let today = chrono::Local::now().date_naive();
    for task in tasks {
        let check = if task.is_finished { "x" } else { " " };
        let due = match task.due_date {
            DueDate::On(date) if task.is_overdue(today) => format!("  due {} (overdue)", date),
            DueDate::On(date) => format!("  due {}", date),
            DueDate::Unset => String::new(),
        };
        println!("[{}] {}{}  {}", check, task.name, due, task.id);
        if !task.description.is_empty() {
            println!("      {}", task.description);
        }
    }
}

async fn remember(config: &TodoConfig, session: &Session) {
    if !config.remember_session {
        return;
    }
    if let Err(e) = keyring::store_session(&config.project_id, &StoredSession::from(session)).await
    {
        log::warn!("Session not saved: {}", e);
    }
}

/// Resume the stored session, or explain how to get one.
async fn resume(config: &TodoConfig, auth: &mut AuthController) -> Result<Session, String> {
    let stored = keyring::load_session(&config.project_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("Not signed in. Run `todolist signin EMAIL PASSWORD`.")?;
    let session = auth
        .restore(&stored.refresh_token, &stored.display_name)
        .await
        .map_err(|e| format!("Session expired ({}). Sign in again.", e))?;
    remember(config, &session).await;
    Ok(session)
}

fn apply_edits(
    draft: &mut TaskDraftController,
    name: Option<String>,
    description: Option<String>,
    due: Option<DueDate>,
) {
    if let Some(name) = name {
        draft.set_name(name);
    }
    if let Some(description) = description {
        draft.set_description(description);
    }
    if let Some(due) = due {
        draft.set_due_date(due);
    }
}

async fn run(command: Command, config_path: &std::path::Path, config: TodoConfig) -> Result<(), String> {
    if let Command::Config { project_id, api_key } = command {
        let updated = TodoConfig {
            project_id,
            api_key,
            ..config
        };
        updated.save(config_path).map_err(|e| e.to_string())?;
        println!("Saved {}", config_path.display());
        return Ok(());
    }

    if !config.backend_ready() {
        return Err("Backend not configured. Run `todolist config PROJECT_ID API_KEY`.".into());
    }

    let backend = FirebaseAuthClient::new(&config.api_key).map_err(|e| e.to_string())?;
    let mut auth = AuthController::new(Arc::new(backend));

    let session = match command {
        Command::Signup {
            email,
            password,
            username,
        } => {
            let session = auth
                .sign_up(&email, &password, &username)
                .await
                .map_err(|e| e.to_string())?;
            remember(&config, &session).await;
            println!("Welcome, {}!", auth.display_name());
            return Ok(());
        }
        Command::Signin { email, password } => {
            let session = auth
                .sign_in(&email, &password)
                .await
                .map_err(|e| e.to_string())?;
            remember(&config, &session).await;
            println!("Signed in as {}.", auth.display_name());
            return Ok(());
        }
        Command::Signout => {
            keyring::delete_session(&config.project_id)
                .await
                .map_err(|e| e.to_string())?;
            auth.sign_out();
            println!("Signed out.");
            return Ok(());
        }
        _ => resume(&config, &mut auth).await?,
    };

    let store = Arc::new(
        FirestoreTaskStore::new(&config.project_id, &config.collection)
            .map_err(|e| e.to_string())?,
    );
    store.set_id_token(Some(session.credentials.id_token.clone()));
    let list = TaskListController::new(store.clone());
    let user_id = auth.user_id();

    let result = match command {
        Command::Whoami => {
            println!("{} ({})", auth.display_name(), user_id);
            return Ok(());
        }
        Command::List => list.load_tasks(&user_id).await,
        Command::Add {
            name,
            description,
            due,
        } => {
            let mut draft = TaskDraftController::new(store);
            apply_edits(&mut draft, Some(name), description, due);
            save_draft(&mut draft, &list, &user_id).await
        }
        Command::Edit {
            id,
            name,
            description,
            due,
        } => {
            let mut draft = TaskDraftController::new(store);
            draft.load(&id).await.map_err(|e| e.to_string())?;
            apply_edits(&mut draft, name, description, due);
            save_draft(&mut draft, &list, &user_id).await
        }
        Command::Done { id } => list.set_completion(&id, true, &user_id).await,
        Command::Undone { id } => list.set_completion(&id, false, &user_id).await,
        Command::Rm { id } => list.delete(&id, &user_id).await,
        Command::Config { .. } | Command::Signup { .. } | Command::Signin { .. } | Command::Signout => {
            return Ok(());
        }
    };

    result.map_err(|e| e.to_string())?;
    print_tasks(&session, &list.tasks());
    Ok(())
}

async fn save_draft(
    draft: &mut TaskDraftController,
    list: &TaskListController,
    user_id: &str,
) -> Result<(), TaskError> {
    match draft.save(user_id).await {
        Ok(task) => {
            println!("Saved {}", task.id);
            list.load_tasks(user_id).await
        }
        Err(e) => {
            eprintln!("{}", SAVE_FAILED_MESSAGE);
            Err(e)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = TodoConfig::default_path();
    let config = TodoConfig::load(&config_path);
    init_logging(config.debug_logging);

    match run(cli.command, &config_path, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}
