//! Command handlers and runtime assembly.

use std::io::{self, Write};
use std::sync::Arc;

use access_control::{dashboard_routes, AccessEvaluator, DenyAllClaims, PROFILE_COMPLETION_ROUTE, PUBLIC_ROUTES};
use anyhow::{bail, Context, Result};
use auth_lifecycle::{AuthRuntime, AuthState, ErrorKind, GateConfig, ProfileFields};
use identity_provider::{HttpPasswordlessProvider, PasswordlessProvider, SessionValidator};
use request_orchestrator::{ApiClient, ProfileApi, ProfileService};
use tracing::{debug, info};

/// Assembles the full gate. One cookie-carrying HTTP client is shared by
/// the auth endpoints and the backend API, so the session cookie set at
/// login rides every subsequent call.
pub fn build_runtime(auth_url: &str, api_url: &str) -> Result<AuthRuntime> {
    let http_client = reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .context("building the shared HTTP client")?;

    let provider: Arc<dyn PasswordlessProvider> =
        Arc::new(HttpPasswordlessProvider::new(http_client.clone(), auth_url));

    let api_client = Arc::new(ApiClient::new(
        http_client,
        api_url,
        SessionValidator::new(provider.clone()),
    ));
    api_client.set_redirect_callback(Box::new(|reason| {
        info!(?reason, "Backend demanded a return to the login surface");
    }));

    let profiles: Arc<dyn ProfileService> = Arc::new(ProfileApi::new(api_client));
    let evaluator = Arc::new(AccessEvaluator::new(Arc::new(DenyAllClaims)));

    let runtime = AuthRuntime::new(provider, profiles, evaluator, GateConfig::default());
    runtime.set_state_callback(Box::new(|payload| {
        info!(state = ?payload.state, user_id = ?payload.user_id, "Auth state changed");
    }));

    Ok(runtime)
}

/// `status`: resolve the stored session and print the snapshot. Startup
/// errors land in the snapshot's error slot, so they are printed either
/// way.
pub async fn status(runtime: &AuthRuntime) -> Result<()> {
    if let Err(err) = runtime.initialize().await {
        debug!(error = %err, "Startup probe reported an error");
    }
    print_snapshot(runtime)
}

/// `login`: the interactive send, verify and complete-profile loop.
pub async fn login(runtime: &AuthRuntime) -> Result<()> {
    match runtime.initialize().await {
        Ok(state) if state.is_authenticated() => {
            println!("Already signed in.");
            return print_snapshot(runtime);
        }
        Ok(_) => {}
        Err(err) => println!("Warning: {err}"),
    }

    runtime.start_background_tasks();

    let email = prompt("Email: ").await?;
    runtime.send_otp(&email).await?;
    println!("Code sent. Enter it below, or type \"resend\" for a new one.");

    loop {
        let entry = prompt("Code: ").await?;
        if entry.eq_ignore_ascii_case("resend") {
            match runtime.resend_otp().await {
                Ok(()) => println!("Code resent."),
                Err(err) => println!("{err}"),
            }
            continue;
        }

        match runtime.verify_otp(&entry).await {
            Ok(AuthState::AuthenticatedIncompleteProfile) => {
                complete_profile(runtime).await?;
                break;
            }
            Ok(_) => break,
            Err(err) if err.kind() == ErrorKind::Transient => {
                runtime.stop_background_tasks();
                return Err(err.into());
            }
            Err(err) => {
                println!("{err}");
                if runtime.state() != AuthState::OtpPending {
                    runtime.stop_background_tasks();
                    bail!("The login flow ended. Run `clarity-gate login` again.");
                }
            }
        }
    }

    println!("Signed in.");
    print_snapshot(runtime)?;
    runtime.stop_background_tasks();
    Ok(())
}

/// `logout`: clear the session locally and, best-effort, at the provider.
pub async fn logout(runtime: &AuthRuntime) -> Result<()> {
    if let Err(err) = runtime.initialize().await {
        debug!(error = %err, "Startup probe reported an error");
    }
    runtime.sign_out().await;
    println!("Signed out.");
    Ok(())
}

/// `routes`: answer the route table for whoever is currently signed in.
pub async fn routes(runtime: &AuthRuntime) -> Result<()> {
    if let Err(err) = runtime.initialize().await {
        debug!(error = %err, "Startup probe reported an error");
    }

    for route in PUBLIC_ROUTES
        .iter()
        .copied()
        .chain(std::iter::once(PROFILE_COMPLETION_ROUTE))
        .chain(dashboard_routes())
    {
        let verdict = if runtime.can_access_route(route).await {
            "allow"
        } else {
            "deny"
        };
        println!("{route:<18} {verdict}");
    }
    Ok(())
}

async fn complete_profile(runtime: &AuthRuntime) -> Result<()> {
    println!("Your profile needs a few details before the dashboard unlocks.");
    loop {
        let fields = ProfileFields {
            first_name: prompt("First name: ").await?,
            last_name: prompt("Last name: ").await?,
            company: prompt("Company: ").await?,
            job_title: prompt("Job title: ").await?,
        };
        match runtime.update_profile(&fields).await {
            Ok(_) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Validation => println!("{err}"),
            Err(err) => return Err(err.into()),
        }
    }
}

fn print_snapshot(runtime: &AuthRuntime) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&runtime.snapshot())?);
    Ok(())
}

async fn prompt(label: &str) -> Result<String> {
    let label = label.to_string();
    tokio::task::spawn_blocking(move || -> Result<String> {
        print!("{label}");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input.trim().to_string())
    })
    .await?
}
