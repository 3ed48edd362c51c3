use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use taskpad::models::{Credentials, TaskDraft, TaskStatus, UserForm, UserPatch};
use taskpad::workflow::{Route, WorkflowResult};
use taskpad::{Config, Taskpad};

#[derive(Parser)]
#[command(name = "taskpad")]
#[command(about = "Manage your tasks on a My Task backend", long_about = None)]
struct Cli {
    /// Backend base URL
    #[arg(long, env = "API_BASE_URL")]
    base_url: Option<String>,

    /// Directory for the secure session store
    #[arg(long, env = "TASKPAD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Passphrase sealing the secure store (defaults to a per-device key)
    #[arg(long, env = "TASKPAD_SECRET_PASSPHRASE", hide_env_values = true)]
    secret_passphrase: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign in and remember the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign out and forget the session
    Logout,
    /// Show whether a session is stored
    Status,
    /// Manage tasks
    Tasks {
        #[command(subcommand)]
        action: TaskCommands,
    },
    /// Manage your profile
    Profile {
        #[command(subcommand)]
        action: ProfileCommands,
    },
}

#[derive(Subcommand)]
enum TaskCommands {
    List,
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        category: String,
        /// Low, Medium, High, pending, in-progress or completed
        #[arg(long, default_value = "pending")]
        status: String,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    Show {
        /// Ignore the cached copy
        #[arg(long)]
        refresh: bool,
    },
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Permanently delete your account
    Delete,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Print the notice of a workflow result and turn failures into errors.
fn report<T>(result: WorkflowResult<T>) -> Result<T> {
    match result {
        Ok(outcome) => {
            if let Some(notice) = &outcome.notice {
                println!("{}", notice);
            }
            if outcome.route == Some(Route::Login) {
                println!("Run `taskpad login` to continue.");
            }
            Ok(outcome.value)
        }
        Err(failure) => {
            eprintln!("{}", failure.notice());
            if failure.requires_login() {
                eprintln!("Run `taskpad login` to sign in again.");
            }
            Err(failure.into())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = Config::resolve(cli.base_url.as_deref(), cli.data_dir, cli.secret_passphrase)?;

    let app = Taskpad::open(&config).await?;

    match cli.command {
        Commands::Signup {
            name,
            email,
            password,
        } => {
            let user = report(app.auth.sign_up(&UserForm { name, email, password }).await)?;
            println!("Account #{} ({})", user.user_id, user.email);
        }
        Commands::Login { email, password } => {
            let session = report(app.auth.login(&Credentials { email, password }).await)?;
            if let Some(user_id) = session.user_id {
                println!("Signed in as user #{}", user_id);
            }
        }
        Commands::Logout => {
            app.auth.restore_session().await;
            report(app.auth.sign_out().await)?;
        }
        Commands::Status => {
            let outcome = app.auth.restore_session().await;
            match outcome.value.user_id() {
                Some(user_id) => println!("Signed in as user #{}", user_id),
                None => println!("Not signed in"),
            }
        }
        Commands::Tasks { action } => {
            if !app.auth.restore_session().await.value.is_authenticated() {
                anyhow::bail!("Not signed in. Run `taskpad login` first.");
            }
            match action {
                TaskCommands::List => {
                    let tasks = report(app.tasks.list().await)?;
                    if tasks.is_empty() {
                        println!("No tasks");
                    }
                    for task in tasks {
                        println!(
                            "#{:<6} [{}] {} ({})",
                            task.task_id.map(|id| id.to_string()).unwrap_or_default(),
                            task.status,
                            task.title,
                            task.category
                        );
                    }
                }
                TaskCommands::Add {
                    title,
                    category,
                    status,
                } => {
                    let status: TaskStatus = status.parse()?;
                    let draft = TaskDraft::new(title, category, status);
                    report(app.tasks.create(&draft).await)?;
                }
                TaskCommands::Delete { id } => {
                    report(app.tasks.delete(id).await)?;
                }
            }
        }
        Commands::Profile { action } => {
            app.auth.restore_session().await;
            match action {
                ProfileCommands::Show { refresh } => {
                    let user = report(app.auth.load_profile(refresh).await)?;
                    println!("#{} {} <{}>", user.user_id, user.name, user.email);
                }
                ProfileCommands::Update {
                    name,
                    email,
                    password,
                } => {
                    let patch = UserPatch {
                        name,
                        email,
                        password,
                    };
                    report(app.auth.update_profile(&patch).await)?;
                }
                ProfileCommands::Delete => {
                    report(app.auth.delete_account().await)?;
                }
            }
        }
    }

    Ok(())
}
