use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use doc_vault::authz::Role;
use doc_vault::db;
use doc_vault::utils::hash_password;

#[derive(Parser, Debug)]
#[command(author, version, about = "doc-vault operator tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new empty reversible migration with the provided name
    MakeMigration { name: String },
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Roll back the last applied migration
    MigrateRollback,
    /// Add a department
    CreateDepartment { name: String },
    /// Add a document category
    CreateCategory {
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Add a user with explicit roles (registration only ever grants `employee`)
    CreateUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Department id
        #[arg(long)]
        department: i64,
        /// admin, manager or employee; repeat for several
        #[arg(long = "role", required = true)]
        roles: Vec<Role>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try the working directory first, then the crate-local `.env`.
    if dotenv().is_err() {
        let crate_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MakeMigration { name } => {
            let (up, down) = make_migration_files(&name)?;
            println!("Created migration: {}", up.display());
            println!("Created migration: {}", down.display());
        }
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::MigrateRollback => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            let applied = applied_versions(&pool).await?;
            let Some(last) = applied.iter().max().copied() else {
                anyhow::bail!("no migrations were rolled back");
            };
            let target = applied.iter().filter(|v| **v < last).max().copied().unwrap_or(0);
            migrator.undo(&pool, target).await.context("rollback failed")?;
            println!("Rolled back migration {last}");
        }
        Commands::CreateDepartment { name } => {
            let pool = db::connect(&database_url()?).await?;
            let id = db::departments::create_department(&pool, &name).await?;
            println!("Created department {id}: {name}");
        }
        Commands::CreateCategory { title, description } => {
            let pool = db::connect(&database_url()?).await?;
            let id = db::categories::create_category(&pool, &title, description.as_deref()).await?;
            println!("Created category {id}: {title}");
        }
        Commands::CreateUser {
            name,
            email,
            password,
            department,
            roles,
        } => {
            let pool = db::connect(&database_url()?).await?;
            if !db::departments::department_exists(&pool, department).await? {
                anyhow::bail!("department {department} does not exist");
            }
            if db::users::email_taken(&pool, &email).await? {
                anyhow::bail!("email {email} is already registered");
            }
            let password_hash = hash_password(&password)?;
            let id = db::users::create_user(
                &pool,
                db::users::NewUser {
                    name: &name,
                    email: &email,
                    password_hash: &password_hash,
                    department_id: department,
                },
                &roles,
            )
            .await?;
            let roles = roles.iter().map(Role::as_str).collect::<Vec<_>>().join(", ");
            println!("Created user {id}: {email} [{roles}]");
        }
    }

    Ok(())
}

fn make_migration_files(name: &str) -> anyhow::Result<(PathBuf, PathBuf)> {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let sanitized = sanitize_name(name);
    let up = Path::new("migrations").join(format!("{timestamp}_{sanitized}.up.sql"));
    let down = Path::new("migrations").join(format!("{timestamp}_{sanitized}.down.sql"));

    for path in [&up, &down] {
        if path.exists() {
            anyhow::bail!("migration already exists: {}", path.display());
        }
    }

    fs::write(&up, "-- Write your migration SQL here\n")
        .with_context(|| format!("failed to create migration at {}", up.display()))?;
    fs::write(&down, "-- Undo the matching .up.sql here\n")
        .with_context(|| format!("failed to create migration at {}", down.display()))?;

    Ok((up, down))
}

fn database_url() -> anyhow::Result<String> {
    std::env::var("DATABASE_URL").context("DATABASE_URL not set")
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url()?)
        .await
        .context("failed to connect to database")
}

async fn applied_versions(pool: &SqlitePool) -> anyhow::Result<HashSet<i64>> {
    // Nothing is applied until the bookkeeping table exists.
    let table: Option<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'")
            .fetch_optional(pool)
            .await?;
    if table.is_none() {
        return Ok(HashSet::new());
    }

    let versions = sqlx::query_scalar::<_, i64>("SELECT version FROM _sqlx_migrations WHERE success = 1")
        .fetch_all(pool)
        .await?;
    Ok(versions.into_iter().collect())
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    let applied = applied_versions(pool).await?;

    println!("{:<8} {:<20} Name", "Status", "Version");
    for migration in migrator.iter().filter(|m| m.migration_type.is_up_migration()) {
        let status = if applied.contains(&migration.version) { "applied" } else { "pending" };
        let desc = migration.description.trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '_',
        })
        .collect()
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // ./migrations when run from the repo root, else the crate-local folder.
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {display}"))
}
