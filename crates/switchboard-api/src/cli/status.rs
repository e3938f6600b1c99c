//! Relay status command.

use anyhow::Result;
use console::style;

use switchboard_core::registry::AccountFilter;
use switchboard_infra::sqlite::DATABASE_FILE;
use switchboard_types::account::AccountStatus;
use switchboard_types::config::UnroutablePolicy;

use crate::state::AppState;

/// Display accounts, storage and webhook settings.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let accounts = state.registry.list(AccountFilter::All).await;
    let active = accounts.iter().filter(|a| a.status == AccountStatus::Active).count();
    let durable = state.store.has_durable();
    let enforcing = state.webhooks.verifier().is_enforcing();
    let policy = match state.registry.policy() {
        UnroutablePolicy::RouteToDefault => "route_to_default",
        UnroutablePolicy::Reject => "reject",
    };

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "accounts": {
                "total": accounts.len(),
                "active": active,
                "default": state.registry.default_account_id(),
            },
            "durable": durable,
            "retention": state.store.retention(),
            "signature_enforced": enforcing,
            "unroutable_policy": policy,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!("  {} Switchboard v{}", style("⚡").bold(), env!("CARGO_PKG_VERSION"));
    println!();

    println!("  {}", style("── Accounts ──").dim());
    println!("  Total:   {}", style(accounts.len()).bold());
    println!("  Active:  {}", style(active).green());
    println!("  Default: {}", style(state.registry.default_account_id()).cyan());
    println!();

    println!("  {}", style("── Webhook ──").dim());
    if enforcing {
        println!("  Signatures: {}", style("enforced").green());
    } else {
        println!("  Signatures: {}", style("not checked (no app_secret)").yellow());
    }
    println!("  Unroutable: {policy}");
    println!();

    println!("  {}", style("── Storage ──").dim());
    println!("  Data dir:  {}", style(state.data_dir.display()).dim());
    if durable {
        println!("  Database:  {}", style(format!("{DATABASE_FILE} (SQLite, WAL mode)")).dim());
    } else {
        println!("  Database:  {}", style("unavailable, in-memory only").yellow());
    }
    println!("  Retention: {} messages per conversation", state.store.retention());
    println!();

    Ok(())
}
