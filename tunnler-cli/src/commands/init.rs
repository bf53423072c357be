//! Credential setup command

use anyhow::{Result, bail};
use clap::Args;
use dialoguer::{Input, Password, theme::ColorfulTheme};
use tunnler_core::{CredentialStore, Credentials};

use super::setup::{print_header, print_step, print_success};

/// Arguments for the init command
#[derive(Debug, Args)]
pub struct InitArgs {
    /// Cloudflare API token (prompted if omitted)
    #[arg(short = 'a', long)]
    pub api_key: Option<String>,

    /// Cloudflare account ID (prompted if omitted)
    #[arg(short = 'i', long)]
    pub account_id: Option<String>,

    /// Default zone for new tunnels, e.g. example.com
    #[arg(short, long)]
    pub zone: Option<String>,
}

/// Check the collected values and assemble credentials
pub fn build_credentials(
    api_key: &str,
    account_id: &str,
    zone: Option<&str>,
) -> Result<Credentials> {
    let api_key = api_key.trim();
    let account_id = account_id.trim();
    if api_key.is_empty() {
        bail!("API key cannot be empty");
    }
    if account_id.is_empty() {
        bail!("Account ID cannot be empty");
    }
    let default_zone = zone
        .map(str::trim)
        .filter(|z| !z.is_empty())
        .map(String::from);

    Ok(Credentials {
        api_key: api_key.to_string(),
        account_id: account_id.to_string(),
        default_zone,
    })
}

/// Run the init command
pub fn run(args: InitArgs) -> Result<()> {
    run_with_store(args, &CredentialStore::default())
}

fn run_with_store(args: InitArgs, store: &CredentialStore) -> Result<()> {
    print_header("TUNNLER SETUP");

    let theme = ColorfulTheme::default();

    let api_key = match args.api_key {
        Some(key) => key,
        None => Password::with_theme(&theme)
            .with_prompt("Cloudflare API token")
            .interact()?,
    };

    let account_id = match args.account_id {
        Some(id) => id,
        None => Input::with_theme(&theme)
            .with_prompt("Cloudflare account ID")
            .interact_text()?,
    };

    let zone = match args.zone {
        Some(zone) => Some(zone),
        None => {
            let zone: String = Input::with_theme(&theme)
                .with_prompt("Default zone (leave empty to pass --zone each time)")
                .allow_empty(true)
                .interact_text()?;
            Some(zone)
        }
    };

    let credentials = build_credentials(&api_key, &account_id, zone.as_deref())?;

    print_step("Saving credentials...");
    let path = store.save(&credentials)?;
    println!("OK");

    print_success(&format!("Credentials saved to {}", path.display()));
    Ok(())
}
