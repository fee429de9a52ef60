use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use yatube_server::application::auth_service::{AuthService, Registration};
use yatube_server::application::group_service::GroupService;
use yatube_server::data::group_repository::PostgresGroupRepository;
use yatube_server::data::user_repository::PostgresUserRepository;
use yatube_server::domain::group::NewGroup;
use yatube_server::infrastructure::config::AppConfig;
use yatube_server::infrastructure::database::{create_pool, run_migrations};
use yatube_server::infrastructure::logging::init_logging;
use yatube_server::infrastructure::security::JwtKeys;

/// Management commands for a Yatube database.
#[derive(Parser, Debug)]
#[command(name = "yatube-cli", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending database migrations.
    Migrate,
    /// Create a user with access to the admin pages.
    CreateSuperuser {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long)]
        password: String,
    },
    CreateGroup {
        #[arg(long)]
        title: String,
        #[arg(long)]
        slug: String,
        #[arg(long)]
        description: String,
    },
    ListGroups {
        /// Only groups whose description contains this text.
        #[arg(long)]
        search: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Cli::parse();

    let database_url = AppConfig::database_url_from_env()?;
    let pool = create_pool(&database_url)
        .await
        .context("failed to connect to database")?;

    match args.command {
        Command::Migrate => {
            run_migrations(&pool).await?;
            println!("Migrations applied.");
        }
        Command::CreateSuperuser {
            username,
            email,
            password,
        } => {
            let config = AppConfig::from_env()?;
            let auth = AuthService::new(
                Arc::new(PostgresUserRepository::new(pool)),
                JwtKeys::new(
                    config.jwt_secret,
                    chrono::Duration::hours(config.session_ttl_hours),
                ),
            );
            let user = auth
                .create_superuser(Registration {
                    username,
                    email,
                    password: password.clone(),
                    password_confirmation: password,
                    ..Registration::default()
                })
                .await?;
            println!("Superuser {} created (id {}).", user.username, user.id);
        }
        Command::CreateGroup {
            title,
            slug,
            description,
        } => {
            let groups = GroupService::new(Arc::new(PostgresGroupRepository::new(pool)));
            let group = groups
                .create(NewGroup {
                    title,
                    slug,
                    description,
                })
                .await?;
            println!("Group created: [{}] {} (/group/{}/)", group.id, group, group.slug);
        }
        Command::ListGroups { search } => {
            let groups = GroupService::new(Arc::new(PostgresGroupRepository::new(pool)));
            let groups = groups.list(search.as_deref()).await?;
            println!("Groups ({})", groups.len());
            for group in groups {
                println!("- [{}] {} ({}): {}", group.id, group.title, group.slug, group.description);
            }
        }
    }

    Ok(())
}
