//! Commands that need no relay state: normalize, sign.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use console::style;
use secrecy::ExposeSecret;

use switchboard_core::phone;
use switchboard_core::webhook::signature::sign_with;
use switchboard_infra::config::{load_relay_config, resolve_data_dir};

pub fn normalize(raw: &str, json: bool) -> Result<()> {
    let canonical = phone::normalize(raw);
    if canonical.is_empty() {
        bail!("'{raw}' is not a phone number");
    }

    if json {
        let out = serde_json::json!({
            "input": raw,
            "phone_number": canonical,
            "display_name": phone::contact_name(&canonical),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{canonical}");
    }
    Ok(())
}

/// Print `sha256=<hex>` for a body, as a provider would send it.
pub async fn sign(body: Option<String>, file: Option<&Path>, secret: Option<String>, json: bool) -> Result<()> {
    let secret = match secret.filter(|s| !s.is_empty()) {
        Some(secret) => secret,
        None => load_relay_config(&resolve_data_dir())
            .await
            .app_secret
            .map(|s| s.expose_secret().to_string())
            .filter(|s| !s.is_empty())
            .context("no app secret: pass --secret or set app_secret in config.toml")?,
    };

    let body = match (body, file) {
        (Some(body), _) => body.into_bytes(),
        (None, Some(path)) => tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, None) => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("failed to read body from stdin")?;
            buf
        }
    };

    let signature = sign_with(&secret, &body);
    if json {
        println!("{}", serde_json::json!({ "header": "X-Hub-Signature-256", "value": signature }));
    } else {
        println!("{signature}");
        eprintln!(
            "  {} signed {} byte{}",
            style("✓").green().bold(),
            body.len(),
            if body.len() == 1 { "" } else { "s" }
        );
    }
    Ok(())
}
