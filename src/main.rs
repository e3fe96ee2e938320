use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use clinic_session::accounts::{AccountError, SignIn};
use clinic_session::app::{Clinic, StartupError};
use clinic_session::config::{ClinicConfig, ConfigError};
use clinic_session::identity::IdentityProvider;
use clinic_session::identity::memory::MemoryIdentityProvider;
use clinic_session::nav::menu_for;
use clinic_session::navigator::Navigator;
use clinic_session::profile::memory::MemoryProfileStore;
use clinic_session::role::{Capability, Role};
use clinic_session::routes::{CLINIC_ROUTES, Guard};
use clinic_session::session::{Session, SessionHandle};
use tracing_subscriber::EnvFilter;

const SESSION_WAIT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error("timed out waiting for the session to resolve")]
    SessionTimeout,
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "clinic-session", about = "Clinic session resolver and route authorizer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the route table.
    Routes,
    /// Sign in and print the authorization outcome for each path.
    Check(CheckCommand),
    /// Create an account with a role.
    Signup(SignupCommand),
    /// Sign in and print the navigation menu.
    Menu(MenuCommand),
    /// Walk the session scenarios against seeded in-memory backends.
    Demo,
}

#[derive(Args, Debug)]
struct Credentials {
    #[arg(long, env = "CLINIC_EMAIL")]
    email: String,
    #[arg(long, env = "CLINIC_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args, Debug)]
struct CheckCommand {
    #[command(flatten)]
    credentials: Credentials,
    /// Paths to check; defaults to every route.
    #[arg(long = "path")]
    paths: Vec<String>,
}

#[derive(Args, Debug)]
struct SignupCommand {
    #[command(flatten)]
    credentials: Credentials,
    #[arg(long)]
    role: Role,
}

#[derive(Args, Debug)]
struct MenuCommand {
    #[command(flatten)]
    credentials: Credentials,
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Routes => {
            run_routes();
            Ok(())
        }
        Command::Check(check) => run_check(check).await,
        Command::Signup(signup) => run_signup(signup).await,
        Command::Menu(menu) => run_menu(menu).await,
        Command::Demo => run_demo().await,
    }
}

async fn configured_clinic() -> Result<Clinic, CliError> {
    let config = ClinicConfig::from_env()?;
    Ok(Clinic::from_config(&config).await?)
}

fn run_routes() {
    for route in CLINIC_ROUTES {
        let access = match route.guard {
            Guard::Public => "public".to_owned(),
            Guard::Roles(&[]) => "signed in".to_owned(),
            Guard::Roles(roles) => roles.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(", "),
        };
        println!("{:<18} {:<20} {access}", route.pattern, route.name);
    }
}

/// Sign in, then wait until the resolver has caught up with the new identity.
async fn sign_in(clinic: &Clinic, session: &SessionHandle, credentials: &Credentials) -> Result<SignIn, CliError> {
    let signed = clinic.accounts().sign_in_with_password(&credentials.email, &credentials.password, None).await?;
    wait_for_user(session, &signed.identity.uid).await?;
    Ok(signed)
}

async fn wait_for_user(session: &SessionHandle, uid: &str) -> Result<Session, CliError> {
    let mut rx = session.subscribe();
    let waited = tokio::time::timeout(
        Duration::from_secs(SESSION_WAIT_SECS),
        rx.wait_for(|s| s.is_resolved() && s.uid() == Some(uid)),
    )
    .await;
    match waited {
        Ok(Ok(session)) => Ok(session.clone()),
        Ok(Err(_)) | Err(_) => Err(CliError::SessionTimeout),
    }
}

fn default_paths(uid: &str) -> Vec<String> {
    CLINIC_ROUTES.iter().map(|route| route.pattern.replace(":id", uid)).collect()
}

async fn run_check(check: CheckCommand) -> Result<(), CliError> {
    let clinic = configured_clinic().await?;
    let session = clinic.session();
    let signed = sign_in(&clinic, &session, &check.credentials).await?;
    println!("signed in as {} ({})", signed.identity.uid, signed.role);

    let paths = if check.paths.is_empty() { default_paths(&signed.identity.uid) } else { check.paths };
    let mut navigator = clinic.navigator(session);
    for path in paths {
        println!("{path:<24} -> {}", navigator.navigate(&path));
    }
    Ok(())
}

async fn run_signup(signup: SignupCommand) -> Result<(), CliError> {
    let clinic = configured_clinic().await?;
    let credentials = &signup.credentials;
    let signed = clinic.accounts().register(&credentials.email, &credentials.password, signup.role).await?;
    println!("created {} as {} (home {})", signed.identity.uid, signed.role, signed.destination);
    Ok(())
}

async fn run_menu(menu: MenuCommand) -> Result<(), CliError> {
    let clinic = configured_clinic().await?;
    let session = clinic.session();
    let signed = sign_in(&clinic, &session, &menu.credentials).await?;
    let entries = menu_for(&clinic.routes(), &session.current(), &signed.destination);

    if menu.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for entry in entries {
            let marker = if entry.current { "*" } else { " " };
            println!("{marker} {:<18} {}", entry.label, entry.href);
        }
    }
    Ok(())
}

// =============================================================================
// DEMO
// =============================================================================

const DEMO_PASSWORD: &str = "demo-pass";
const DEMO_PATHS: &[&str] = &["/", "/marcar-consulta", "/agenda", "/medicos", "/pacientes"];

async fn run_demo() -> Result<(), CliError> {
    let config = ClinicConfig::from_env()?;
    let provider = Arc::new(MemoryIdentityProvider::new());
    let clinic = Clinic::new(
        Arc::clone(&provider) as Arc<dyn IdentityProvider>,
        Arc::new(MemoryProfileStore::new()),
        config.resolver_options(),
    );
    let session = clinic.session();
    let mut navigator = clinic.navigator(session.clone());

    for (email, role) in
        [("admin@clinic.test", Role::Admin), ("doctor@clinic.test", Role::Doctor), ("patient@clinic.test", Role::Patient)]
    {
        clinic.accounts().register(email, DEMO_PASSWORD, role).await?;
    }
    let orphan = provider
        .sign_up("orphan@clinic.test", DEMO_PASSWORD)
        .await
        .map_err(|e| CliError::Account(e.into()))?;
    clinic.accounts().sign_out().await?;

    println!("== signed out");
    wait_signed_out(&session).await?;
    println!("  /agenda -> {} (return to {:?})", navigator.navigate("/agenda"), navigator.return_to());

    for email in ["admin@clinic.test", "doctor@clinic.test", "patient@clinic.test"] {
        let signed = clinic.accounts().sign_in_with_password(email, DEMO_PASSWORD, None).await?;
        let resolved = wait_for_user(&session, &signed.identity.uid).await?;
        println!("== {email} ({})", signed.role);
        print_walk(&mut navigator, &resolved);
    }

    println!("== orphan@clinic.test (no profile)");
    match clinic.accounts().sign_in_with_password("orphan@clinic.test", DEMO_PASSWORD, None).await {
        Err(AccountError::ProfileNotFound(_)) => println!("  sign-in reports: no profile"),
        other => println!("  unexpected sign-in result: {other:?}"),
    }
    let resolved = wait_for_user(&session, &orphan.uid).await?;
    print_walk(&mut navigator, &resolved);

    println!("== sign out while on {}", navigator.current_path());
    clinic.accounts().sign_out().await?;
    wait_signed_out(&session).await?;
    println!("  refresh -> {}", navigator.refresh());
    Ok(())
}

fn print_walk(navigator: &mut Navigator, session: &Session) {
    for path in DEMO_PATHS {
        println!("  {path:<18} -> {}", navigator.navigate(path));
    }
    let capabilities: Vec<_> =
        Capability::ALL.into_iter().filter(|c| session.can(*c)).map(|c| format!("{c:?}")).collect();
    println!("  capabilities: {}", if capabilities.is_empty() { "none".to_owned() } else { capabilities.join(", ") });
}

async fn wait_signed_out(session: &SessionHandle) -> Result<(), CliError> {
    let mut rx = session.subscribe();
    match tokio::time::timeout(
        Duration::from_secs(SESSION_WAIT_SECS),
        rx.wait_for(|s| s.is_resolved() && s.identity.is_none()),
    )
    .await
    {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(_)) | Err(_) => Err(CliError::SessionTimeout),
    }
}
