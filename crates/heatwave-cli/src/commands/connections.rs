use anyhow::{bail, Result};
use chrono::{DateTime, Duration, Utc};
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use heatwave_core::token::REFRESH_BUFFER_MINUTES;
use heatwave_core::{Platform, ProviderConnection, TokenStore};
use serde_json::json;

pub struct ConnectArgs {
    pub provider: String,
    pub profile: String,
    pub user_id: String,
    pub username: String,
    pub token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

fn parse_provider(raw: &str) -> Result<Platform> {
    match Platform::from_str(raw) {
        Some(platform) => Ok(platform),
        None => bail!(
            "Unknown provider '{}'. Valid providers: {}",
            raw,
            Platform::iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

pub fn connect(store: &dyn TokenStore, args: ConnectArgs) -> Result<()> {
    let platform = parse_provider(&args.provider)?;
    if args.token.trim().is_empty() {
        bail!("Access token must not be empty");
    }

    let mut connection = ProviderConnection::new(
        &args.profile,
        platform,
        &args.user_id,
        &args.username,
        args.token,
    );
    connection.raw_user_data = json!({
        "id": &args.user_id,
        "username": &args.username,
    });
    if let Some(refresh) = args.refresh_token.filter(|t| !t.is_empty()) {
        connection = connection.with_refresh_token(refresh);
    }
    if let Some(secs) = args.expires_in {
        connection = connection.with_expires_at(Utc::now() + Duration::seconds(secs));
    }

    store.put(&connection)?;

    println!(
        "{}",
        format!(
            "✓ Connected {} as {} for profile {}",
            platform.display_name(),
            args.username,
            args.profile
        )
        .green()
    );
    Ok(())
}

pub fn disconnect(store: &dyn TokenStore, provider: &str, profile: &str) -> Result<()> {
    let platform = parse_provider(provider)?;

    if store.remove(profile, platform)? {
        println!(
            "{}",
            format!("✓ Disconnected {} from profile {}", platform.display_name(), profile).green()
        );
    } else {
        println!(
            "{}",
            format!("No {} connection for profile {}", platform.display_name(), profile)
                .bright_black()
        );
    }
    Ok(())
}

pub fn list(store: &dyn TokenStore, profile: &str, json: bool) -> Result<()> {
    let connections = store.connections(profile)?;
    let now = Utc::now();

    if json {
        // tokens are never serialized
        println!("{}", serde_json::to_string_pretty(&connections)?);
        return Ok(());
    }

    if connections.is_empty() {
        println!(
            "{}",
            format!("No connections for profile {}", profile).bright_black()
        );
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Provider", "Username", "User ID", "Token", "Refresh", "Expires"]);

    for conn in &connections {
        table.add_row(vec![
            conn.platform.display_name().to_string(),
            conn.external_username.clone(),
            conn.external_user_id.clone(),
            mask_token(&conn.access_token),
            if conn.refresh_token.is_some() { "yes" } else { "no" }.to_string(),
            expiry_state(conn.expires_at, now),
        ]);
    }

    println!("{table}");
    Ok(())
}

fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    if token.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("{visible}****")
    }
}

fn expiry_state(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match expires_at {
        None => "never".to_string(),
        Some(at) if at <= now => format!("expired {}", at.format("%Y-%m-%d %H:%M")),
        Some(at) if at - Duration::minutes(REFRESH_BUFFER_MINUTES) <= now => {
            format!("refresh due {}", at.format("%Y-%m-%d %H:%M"))
        }
        Some(at) => at.format("%Y-%m-%d %H:%M").to_string(),
    }
}
