mod accreditation;
mod backend;
mod certificate;
mod certificates;
mod cli_messages;
mod config;
mod consts;
mod dashboard;
mod environment;
mod logging;
mod models;
mod network;
mod probe;
mod profile;
mod register;
mod session;
mod validation;
mod webinars;

use crate::accreditation::DirectorySource;
use crate::backend::{BackendClient, SharedBackend};
use crate::certificates::CertificateFilter;
use crate::cli_messages::{print_field, progress_bar};
use crate::config::get_config_path;
use crate::consts::cli_consts::cpd::DEFAULT_REQUIRED_POINTS;
use crate::environment::Environment;
use crate::models::{AccreditationBody, Profile};
use crate::probe::ConnectionStatus;
use crate::profile::ProfileEdit;
use crate::register::SignUpRequest;
use crate::session::{Session, SessionError, SessionState};
use crate::webinars::{StatusFilter, WebinarFilter};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about = "Track continuing professional development (CPD) points", long_about = None)]
/// Command-line arguments
struct Args {
    /// Backend service URL
    #[arg(long, env = "CPD_BACKEND_URL", global = true, default_value = "", hide_default_value = true)]
    backend_url: String,

    /// Public (anonymous) API key of the backend
    #[arg(long, env = "CPD_BACKEND_ANON_KEY", global = true, default_value = "", hide_default_value = true, hide_env_values = true)]
    anon_key: String,

    /// Site origin used in the email confirmation link
    #[arg(long, env = "CPD_SITE_URL", global = true)]
    site_url: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account
    Signup {
        #[arg(long)]
        email: String,

        #[arg(long, env = "CPD_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long, env = "CPD_CONFIRM_PASSWORD", hide_env_values = true)]
        confirm_password: String,

        #[arg(long)]
        full_name: String,

        #[arg(long)]
        profession: Option<String>,

        #[arg(long)]
        license_number: Option<String>,

        /// Annual CPD points target
        #[arg(long, default_value_t = DEFAULT_REQUIRED_POINTS, allow_negative_numbers = true)]
        required_points: i64,
    },
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,

        #[arg(long, env = "CPD_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and clear the stored session
    Logout,
    /// Use the built-in default user without signing in
    Offline,
    /// Show who is signed in
    Whoami,
    /// Show or edit your profile
    Profile {
        #[command(subcommand)]
        action: Option<ProfileCommand>,
    },
    /// Check the connection to the backend
    Status {
        /// Keep checking and report every change
        #[arg(long)]
        watch: bool,
    },
    /// Browse, register for and complete webinars
    Webinars {
        #[command(subcommand)]
        action: WebinarCommand,
    },
    /// List and export earned certificates
    Certificates {
        #[command(subcommand)]
        action: CertificateCommand,
    },
    /// Show CPD progress
    Dashboard,
    /// List accreditation bodies
    Bodies {
        #[arg(long)]
        search: Option<String>,
    },
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Show your profile and progress
    Show,
    /// Change profile fields
    Update {
        #[arg(long)]
        full_name: Option<String>,

        #[arg(long)]
        profession: Option<String>,

        #[arg(long)]
        license_number: Option<String>,

        #[arg(long, allow_negative_numbers = true)]
        required_points: Option<i64>,
    },
}

#[derive(Subcommand)]
enum WebinarCommand {
    /// List webinars
    List {
        /// Search title, description and presenter
        #[arg(long)]
        search: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long, value_enum)]
        status: Option<StatusFilter>,
    },
    /// Show one webinar
    Show { id: String },
    /// Register for a webinar
    Register { id: String },
    /// Mark a registered webinar completed and earn its points
    Complete { id: String },
}

#[derive(Subcommand)]
enum CertificateCommand {
    /// List completed webinars and their certificates
    List {
        #[arg(long)]
        search: Option<String>,

        #[arg(long)]
        category: Option<String>,
    },
    /// Save a certificate as a PDF file
    Export {
        /// Id of the completed registration, as shown by `certificates list`
        id: String,

        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },
}

impl Command {
    /// Commands that can do something useful without backend settings.
    fn works_unconfigured(&self) -> bool {
        matches!(
            self,
            Command::Logout
                | Command::Offline
                | Command::Whoami
                | Command::Bodies { .. }
                | Command::Profile {
                    action: None | Some(ProfileCommand::Show)
                }
        )
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    logging::init(logging::get_rust_log_level());

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_cmd_error!(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let environment = Environment::new(&args.backend_url, &args.anon_key, args.site_url.as_deref());
    log::debug!("Using {:?}", environment);

    let config_path = get_config_path()?;
    let client = BackendClient::new(environment.clone()).map_err(|e| e.user_message())?;
    let backend: SharedBackend = Arc::new(client);
    let mut session = Session::new(backend.clone(), &config_path);

    if !args.command.works_unconfigured() {
        if !environment.is_configured() {
            return Err(Box::from(
                "Backend is not configured. Set CPD_BACKEND_URL and CPD_BACKEND_ANON_KEY.",
            ));
        }
        environment.validate()?;
    }

    match args.command {
        Command::Signup {
            email,
            password,
            confirm_password,
            full_name,
            profession,
            license_number,
            required_points,
        } => {
            let request = SignUpRequest {
                email,
                password,
                confirm_password,
                full_name,
                profession,
                license_number,
                required_points,
            };
            signup(&request, &environment, &backend).await
        }
        Command::Login { email, password } => {
            match session.sign_in(&email, &password).await {
                Ok(SessionState::Authenticated(profile)) => {
                    print_cmd_success!("Logged in.", "Welcome back, {}", profile.full_name);
                    Ok(())
                }
                Ok(_) => Err(Box::from(
                    "Signed in, but your profile could not be loaded. Please try again.",
                )),
                Err(e) => Err(e.user_message().into()),
            }
        }
        Command::Logout => {
            println!("Logging out and clearing session file...");
            if environment.is_configured() {
                session.initialize().await;
            }
            session.sign_out().await;
            print_cmd_success!("Logged out.", "");
            Ok(())
        }
        Command::Offline => {
            let profile = session.use_default_user().map_err(|e| e.user_message())?;
            print_cmd_info!(
                "Offline mode enabled.",
                "Using {} <{}> until `cpd logout`",
                profile.full_name,
                profile.email
            );
            Ok(())
        }
        Command::Whoami => {
            session.initialize().await;
            whoami(&session)
        }
        Command::Profile { action } => {
            session.initialize().await;
            match action {
                None | Some(ProfileCommand::Show) => {
                    if environment.is_configured() && !session.state().is_offline() {
                        session.reload_profile().await.map_err(|e| e.user_message())?;
                    }
                    let profile = session.current_user().map_err(|e| e.user_message())?;
                    print_profile(profile);
                    Ok(())
                }
                Some(ProfileCommand::Update {
                    full_name,
                    profession,
                    license_number,
                    required_points,
                }) => {
                    let update = ProfileEdit {
                        full_name,
                        profession,
                        license_number,
                        required_points,
                    }
                    .into_update()?;
                    let profile = session
                        .update_profile(&update)
                        .await
                        .map_err(|e| e.user_message())?;
                    print_cmd_success!("Profile updated successfully.", "");
                    print_profile(profile);
                    Ok(())
                }
            }
        }
        Command::Status { watch } => status(&backend, watch).await,
        Command::Webinars { action } => {
            session.initialize().await;
            webinar_command(action, &mut session).await
        }
        Command::Certificates { action } => {
            session.initialize().await;
            certificate_command(action, &session).await
        }
        Command::Dashboard => {
            session.initialize().await;
            dashboard(&session).await
        }
        Command::Bodies { search } => {
            let (source, found) = if environment.is_configured() {
                accreditation::load_directory(backend.as_ref(), search.as_deref()).await
            } else {
                (
                    DirectorySource::Sample,
                    accreditation::sample_directory(search.as_deref()),
                )
            };
            print_directory(source, &found);
            Ok(())
        }
    }
}

async fn signup(
    request: &SignUpRequest,
    environment: &Environment,
    backend: &SharedBackend,
) -> Result<(), Box<dyn Error>> {
    print_cmd_info!("Creating account", "{} on {}", request.email, environment);
    let user = register::register_user(request, backend.as_ref())
        .await
        .map_err(|e| e.user_message())?;
    log::debug!("Created user {}", user.id);
    print_cmd_success!(
        "Registration successful!",
        "Please check your email to confirm your account, then run `cpd login`."
    );
    Ok(())
}

fn whoami(session: &Session) -> Result<(), Box<dyn Error>> {
    match session.snapshot() {
        SessionState::Authenticated(profile) => {
            println!("{} <{}>", profile.full_name, profile.email);
            if let Some(expires_at) = session
                .auth_session()
                .and_then(|auth| auth.expires_at)
                .and_then(|secs| chrono::DateTime::<Utc>::from_timestamp(secs, 0))
            {
                print_field("Session expires", &expires_at.format("%Y-%m-%d %H:%M UTC").to_string());
            }
            Ok(())
        }
        SessionState::Offline(profile) => {
            println!("{} <{}>", profile.full_name, profile.email);
            print_field("Mode", session.state().describe());
            Ok(())
        }
        state @ (SessionState::Anonymous | SessionState::Uninitialized) => {
            log::debug!("Session is {}", state.describe());
            Err(SessionError::NotSignedIn.user_message().into())
        }
    }
}

fn print_profile(profile: &Profile) {
    println!("{}", profile.full_name);
    print_field("Email", &profile.email);
    print_field("Profession", profile.profession.as_deref().unwrap_or("-"));
    print_field("License number", profile.license_number.as_deref().unwrap_or("-"));
    print_field("Member since", &profile.created_at.format("%B %-d, %Y").to_string());
    print_field(
        "CPD points",
        &format!(
            "{} / {}",
            profile.total_cpd_points, profile.required_annual_points
        ),
    );
    print_field("Progress", &progress_bar(profile.progress_percent(), 30));
    if profile.requirement_met() {
        print_field("Status", "Annual requirement met");
    }
}

async fn status(backend: &SharedBackend, watch: bool) -> Result<(), Box<dyn Error>> {
    let report = |status: &ConnectionStatus| match status {
        ConnectionStatus::Connected => print_cmd_success!("Connected to server.", ""),
        ConnectionStatus::Disconnected(reason) => {
            print_cmd_warn!("Cannot connect to server.", "{}", reason)
        }
    };

    if watch {
        probe::watch_connection(backend.as_ref(), probe::default_watch_interval(), |status| {
            report(status);
            true
        })
        .await;
        return Ok(());
    }

    let status = probe::check_connection(backend.as_ref()).await;
    report(&status);
    if status.is_connected() {
        Ok(())
    } else {
        Err(Box::from("Connection check failed"))
    }
}

async fn webinar_command(action: WebinarCommand, session: &mut Session) -> Result<(), Box<dyn Error>> {
    let user = session.current_user().map_err(|e| e.user_message())?.clone();
    let backend = session.backend().clone();

    match action {
        WebinarCommand::List {
            search,
            category,
            status,
        } => {
            let catalog = webinars::load_catalog(backend.as_ref(), &user.id)
                .await
                .map_err(|e| e.user_message())?;
            let categories = webinars::categories(catalog.iter().map(|l| &l.webinar));
            let filter = WebinarFilter {
                search,
                category,
                status,
            };
            let listings = filter.apply(catalog);

            if !categories.is_empty() {
                print_field("Categories", &categories.join(", "));
            }
            if listings.is_empty() {
                println!("No webinars found matching your criteria.");
            }
            for listing in &listings {
                let w = &listing.webinar;
                println!(
                    "{}  {}  {} ({} pts, {})  [{}]",
                    w.id,
                    w.date.format("%Y-%m-%d"),
                    w.title,
                    w.cpd_points,
                    w.category,
                    listing.status_label()
                );
            }
            Ok(())
        }
        WebinarCommand::Show { id } => {
            let listing = webinars::webinar_detail(backend.as_ref(), &user.id, &id)
                .await
                .map_err(|e| e.user_message())?;
            let w = &listing.webinar;
            println!("{}", w.title);
            print_field("Presenter", &w.presenter);
            print_field("Date", &w.date.format("%B %-d, %Y %H:%M UTC").to_string());
            print_field("Duration", &format!("{} minutes", w.duration_minutes));
            print_field("CPD points", &w.cpd_points.to_string());
            print_field("Category", &w.category);
            print_field("Accreditation body", &w.accreditation_body);
            print_field("Status", listing.status_label());
            if let Some(registration) = &listing.registration {
                if registration.has_certificate() {
                    print_field("Certificate", &format!("cpd certificates export {} --out FILE", registration.id));
                }
            }
            if !w.description.is_empty() {
                println!();
                println!("{}", w.description);
            }
            Ok(())
        }
        WebinarCommand::Register { id } => {
            webinars::register_for_webinar(backend.as_ref(), &user.id, &id)
                .await
                .map_err(|e| e.user_message())?;
            print_cmd_success!("Successfully registered for webinar.", "");
            Ok(())
        }
        WebinarCommand::Complete { id } => {
            let outcome = webinars::complete_webinar(session, &id, Utc::now())
                .await
                .map_err(|e| e.user_message())?;
            if let Some(reason) = &outcome.certificate_error {
                print_cmd_warn!("Failed to generate certificate.", "{}", reason);
            }
            print_cmd_success!(
                "Webinar completed!",
                "You earned {} CPD points. Total: {} ({}%)",
                outcome.points_awarded,
                outcome.new_total,
                outcome.progress_percent
            );
            Ok(())
        }
    }
}

async fn certificate_command(action: CertificateCommand, session: &Session) -> Result<(), Box<dyn Error>> {
    let user = session.current_user().map_err(|e| e.user_message())?;
    let backend = session.backend().as_ref();

    match action {
        CertificateCommand::List { search, category } => {
            let filter = CertificateFilter { search, category };
            let entries = certificates::load_certificates(backend, &user.id, &filter)
                .await
                .map_err(|e| e.user_message())?;
            if entries.is_empty() {
                println!("No certificates found.");
            }
            for entry in &entries {
                let completed = entry
                    .registration
                    .completed_at
                    .map(|at| at.format("%Y-%m-%d").to_string())
                    .unwrap_or_default();
                println!(
                    "{}  {}  {} ({} pts, {}){}",
                    entry.registration.id,
                    completed,
                    entry.webinar.title,
                    entry.webinar.cpd_points,
                    entry.webinar.category,
                    if entry.registration.has_certificate() {
                        ""
                    } else {
                        "  [no certificate]"
                    }
                );
            }
            Ok(())
        }
        CertificateCommand::Export { id, out } => {
            let written = certificates::export_certificate(backend, &user.id, &id, &out)
                .await
                .map_err(|e| e.user_message())?;
            print_cmd_success!(
                "Certificate saved.",
                "{} ({} bytes)",
                out.display(),
                written
            );
            Ok(())
        }
    }
}

async fn dashboard(session: &Session) -> Result<(), Box<dyn Error>> {
    let user = session.current_user().map_err(|e| e.user_message())?;
    let dashboard = dashboard::load_dashboard(session.backend().as_ref(), user, Utc::now())
        .await
        .map_err(|e| e.user_message())?;

    println!("Welcome, {}", dashboard.full_name);
    print_field(
        "CPD points",
        &format!("{} / {}", dashboard.total_points, dashboard.required_points),
    );
    print_field("Progress", &progress_bar(dashboard.progress_percent, 30));
    if dashboard.points_remaining > 0 {
        print_field("Remaining", &format!("{} points", dashboard.points_remaining));
    } else {
        print_field("Remaining", "Annual requirement met");
    }
    print_field("Completed webinars", &dashboard.completed_count.to_string());

    if !dashboard.points_by_category.is_empty() {
        println!("\nPoints by category");
        for (category, points) in &dashboard.points_by_category {
            print_field(category, &points.to_string());
        }
    }
    if !dashboard.points_by_month.is_empty() {
        println!("\nPoints by month");
        for (month, points) in &dashboard.points_by_month {
            print_field(month, &points.to_string());
        }
    }

    println!("\nUpcoming webinars");
    if dashboard.upcoming.is_empty() {
        println!("  No upcoming webinars.");
    }
    for webinar in &dashboard.upcoming {
        println!(
            "  {}  {}  {} ({} pts)",
            webinar.id,
            webinar.date.format("%Y-%m-%d"),
            webinar.title,
            webinar.cpd_points
        );
    }
    Ok(())
}

fn print_directory(source: DirectorySource, bodies: &[AccreditationBody]) {
    if source == DirectorySource::Sample {
        print_cmd_info!("Showing the sample directory.", "");
    }
    if bodies.is_empty() {
        println!("No accreditation bodies found.");
    }
    for body in bodies {
        println!("{}", body.name);
        print_field("Website", &body.website_url);
        print_field("Submit activities", &body.submission_url);
        if !body.description.is_empty() {
            println!("  {}", body.description);
        }
    }
}
