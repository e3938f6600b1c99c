//! Account management CLI commands: list, add, remove.
//!
//! Changes are written to the account registry snapshot in the database. A
//! running server picks them up on its next start.

use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use secrecy::SecretString;

use switchboard_core::registry::AccountFilter;
use switchboard_core::storage::Durability;
use switchboard_types::account::{AccountStatus, AccountView, CreateAccountRequest};

use crate::cli::AccountsCommand;
use crate::state::AppState;

pub async fn handle_accounts_command(cmd: AccountsCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        AccountsCommand::List { all } => list_accounts(state, all, json).await,
        AccountsCommand::Add {
            id,
            name,
            token,
            phone_id,
            business_id,
            inactive,
        } => {
            let secret_token = SecretString::from(token);
            let phone_id = resolve_phone_id(state, phone_id, &business_id, &secret_token).await?;
            let request = CreateAccountRequest {
                id,
                display_name: name,
                secret_token,
                external_phone_id: phone_id,
                external_business_id: business_id,
                status: inactive.then_some(AccountStatus::Inactive),
            };
            add_account(state, request, json).await
        }
        AccountsCommand::Remove { id } => remove_account(state, &id, json).await,
    }
}

/// Use the given phone number id, or ask the provider for the first number
/// registered under the business account.
async fn resolve_phone_id(
    state: &AppState,
    phone_id: Option<String>,
    business_id: &str,
    token: &SecretString,
) -> Result<String> {
    if let Some(phone_id) = phone_id.filter(|p| !p.trim().is_empty()) {
        return Ok(phone_id);
    }
    if business_id.trim().is_empty() {
        bail!("pass --phone-id, or --business-id to look it up");
    }

    let found = state
        .sender
        .discover_phone_number_id(business_id, token)
        .await
        .with_context(|| format!("failed to look up phone numbers of business '{business_id}'"))?;
    found.with_context(|| format!("business account '{business_id}' has no phone numbers"))
}

async fn list_accounts(state: &AppState, all: bool, json: bool) -> Result<()> {
    let filter = if all { AccountFilter::All } else { AccountFilter::ActiveOnly };
    let accounts = state.registry.list(filter).await;
    let default_id = state.registry.default_account_id();

    if json {
        let out = serde_json::json!({
            "accounts": accounts,
            "default_account_id": default_id,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if accounts.is_empty() {
        println!();
        println!(
            "  {} No accounts registered. Add one with: {}",
            style("i").blue().bold(),
            style("swbd accounts add main --name Main --token ... --phone-id ...").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Name").fg(Color::White),
        Cell::new("Phone number ID").fg(Color::White),
        Cell::new("Business ID").fg(Color::White),
        Cell::new("Status").fg(Color::White),
    ]);

    for account in &accounts {
        let id = if account.id == default_id {
            format!("{} (default)", account.id)
        } else {
            account.id.clone()
        };
        let status_color = match account.status {
            AccountStatus::Active => Color::Green,
            AccountStatus::Inactive => Color::DarkGrey,
        };
        table.add_row(vec![
            Cell::new(id).fg(Color::Cyan),
            Cell::new(&account.name),
            Cell::new(&account.phone_number_id),
            Cell::new(&account.business_account_id).fg(Color::DarkGrey),
            Cell::new(account.status.to_string()).fg(status_color),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} account{}",
        style(accounts.len()).bold(),
        if accounts.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

async fn add_account(state: &AppState, request: CreateAccountRequest, json: bool) -> Result<()> {
    let mutation = state.registry.add(request.into_account()).await?;
    print_mutation("added", &mutation.value, &mutation.durability, json)
}

async fn remove_account(state: &AppState, id: &str, json: bool) -> Result<()> {
    let mutation = state.registry.remove(id).await?;
    print_mutation("removed", &mutation.value, &mutation.durability, json)
}

fn print_mutation(action: &str, account: &AccountView, durability: &Durability, json: bool) -> Result<()> {
    if json {
        let out = serde_json::json!({
            "action": action,
            "account": account,
            "persisted": durability.is_durable(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!(
        "  {} Account '{}' {action}",
        style("✓").green().bold(),
        style(&account.id).bold()
    );
    if !durability.is_durable() {
        println!(
            "  {} Not saved to the database; the change is lost on exit",
            style("!").yellow().bold()
        );
    }
    Ok(())
}
