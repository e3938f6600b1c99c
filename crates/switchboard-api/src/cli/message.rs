//! Messaging CLI commands: send, history.

use anyhow::{Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use switchboard_core::phone;
use switchboard_core::send::SendRequest;
use switchboard_types::message::Direction;
use switchboard_types::provider::{MessageKind, SendOutcome};

use crate::state::AppState;

pub async fn send(
    state: &AppState,
    to: String,
    message: Option<String>,
    account: Option<&str>,
    template: bool,
    json: bool,
) -> Result<()> {
    let sender = state.sender.resolve_sender(account, None, None).await?;
    let request = SendRequest {
        to,
        text: message.unwrap_or_default(),
        kind: if template { MessageKind::Template } else { MessageKind::Text },
    };

    let report = state.sender.send_and_record(&sender, &request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.outcome)?);
    }

    match report.outcome {
        SendOutcome::Accepted {
            external_message_id,
            phone_number,
            account_id,
            ..
        } => {
            if !json {
                println!(
                    "  {} Sent to {} from '{}' ({})",
                    style("✓").green().bold(),
                    style(&phone_number).bold(),
                    account_id,
                    style(external_message_id.as_deref().unwrap_or("no message id")).dim()
                );
            }
            Ok(())
        }
        SendOutcome::Failed {
            error_message,
            phone_number,
            ..
        } => bail!("send to {phone_number} failed: {error_message}"),
    }
}

pub async fn history(state: &AppState, raw_phone: &str, account: Option<&str>, json: bool) -> Result<()> {
    let account_id = account.unwrap_or_else(|| state.registry.default_account_id());
    state.registry.get(account_id).await?;

    let phone_number = phone::normalize(raw_phone);
    if phone_number.is_empty() {
        bail!("'{raw_phone}' is not a phone number");
    }
    let messages = state.store.get(account_id, &phone_number).await;

    if json {
        let out = serde_json::json!({
            "account_id": account_id,
            "phone_number": phone_number,
            "messages": messages,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {} via '{}'",
        style(phone::contact_name(&phone_number)).bold(),
        style(&phone_number).dim(),
        account_id
    );
    println!();

    if messages.is_empty() {
        println!("  {} No messages stored.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Time").fg(Color::White),
        Cell::new("").fg(Color::White),
        Cell::new("Text").fg(Color::White),
    ]);

    for message in &messages {
        let (arrow, color) = match message.direction {
            Direction::Incoming => ("←", Color::Cyan),
            Direction::Outgoing => ("→", Color::Green),
        };
        table.add_row(vec![
            Cell::new(message.timestamp.format("%Y-%m-%d %H:%M").to_string()).fg(Color::DarkGrey),
            Cell::new(arrow).fg(color),
            Cell::new(&message.text),
        ]);
    }

    println!("{table}");
    println!();
    println!(
        "  {} message{}",
        style(messages.len()).bold(),
        if messages.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}
