//! Subcommand handlers

use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, NaiveDateTime, Utc};
use clap::ArgMatches;
use mailout_core::services::list_title;
use mailout_core::workflow::{site_datetime, ContentPublishListener, ContentRepository};
use mailout_core::{ConnectionForm, JsonContentRepository, MailoutServices, SignupForm, SignupFormRules};
use mailout_types::{ContactListRef, ContentItem, Notice, SendRequest};
use std::sync::Arc;

fn arg(matches: &ArgMatches, name: &str) -> String {
    matches.get_one::<String>(name).cloned().unwrap_or_default()
}

fn print_notices(notices: &[Notice]) {
    for notice in notices {
        if notice.is_error() {
            eprintln!("error: {}", notice);
        } else {
            println!("{}", notice);
        }
    }
}

pub async fn connections(services: &MailoutServices, matches: &ArgMatches) -> anyhow::Result<()> {
    match matches.subcommand() {
        Some(("list", _)) => {
            let connections = services.store.all();
            if connections.is_empty() {
                println!("No connections.");
            }
            for connection in connections {
                println!("{} ({}), expires {}", connection.id, connection.name, connection.expires);
                for list in &connection.lists {
                    println!("  {}  {} [{}]", connection.list_ref(&list.list_id), list.name, list.membership_count);
                }
            }
        }
        Some(("add", sub)) => {
            let pending = services.admin.add(&ConnectionForm {
                name: arg(sub, "name"),
                api_key: arg(sub, "api-key"),
                secret: arg(sub, "secret"),
                sender_from_name: arg(sub, "from-name"),
                sender_from_email: arg(sub, "from-email"),
                sender_replyto_email: arg(sub, "reply-to"),
            })?;
            println!("Added connection {}", pending.connection_id);
            println!("Authorize it at: {}", pending.authorization_url);
        }
        Some(("authorize", sub)) => {
            let connection = services.admin.authorize(&arg(sub, "id"), &arg(sub, "code")).await?;
            println!("Authorized {} with {} contact lists", connection.id, connection.lists.len());
        }
        Some(("refresh", sub)) => {
            let connection = services.store.require(&arg(sub, "id"))?;
            let connection = services.tokens.refresh_at(&connection, Utc::now().timestamp()).await?;
            println!("Refreshed {}; token expires at {}", connection.id, connection.expires);
        }
        Some(("delete", sub)) => {
            let removed = services.admin.delete(&arg(sub, "id"))?;
            println!("Deleted connection {}", removed.id);
        }
        _ => bail!("Unknown connections subcommand"),
    }

    Ok(())
}

pub async fn lists(services: &MailoutServices, matches: &ArgMatches) -> anyhow::Result<()> {
    let Some(("resolve", sub)) = matches.subcommand() else {
        bail!("Unknown lists subcommand");
    };

    let connection = services.store.require(&arg(sub, "connection"))?;
    let connection = services.tokens.ensure_valid(connection, false).await;
    let title = list_title(sub.get_one::<String>("prefix").map(String::as_str), &arg(sub, "title"));

    let resolved = services.resolver.resolve(&connection, &title).await?;
    let verb = if resolved.created { "Created" } else { "Found" };
    println!("{} {} -> {}", verb, resolved.name, resolved.list_ref(&connection.id));

    Ok(())
}

pub async fn send(services: &MailoutServices, matches: &ArgMatches) -> anyhow::Result<()> {
    let item_path = arg(matches, "item");
    let json = std::fs::read_to_string(&item_path).with_context(|| format!("Failed to read {}", item_path))?;
    let mut item: ContentItem = serde_json::from_str(&json).with_context(|| format!("Failed to parse {}", item_path))?;

    item.mailout.send = match matches.get_one::<String>("at") {
        Some(raw) => SendRequest::Later(parse_site_datetime(services, raw)?),
        None => SendRequest::Now,
    };

    let repository = Arc::new(JsonContentRepository::new(arg(matches, "content-dir"))?);
    let trigger = services.trigger(repository.clone());

    let notices = trigger.before_save(&mut item).await;
    print_notices(&notices);

    repository.save(&item).await?;
    std::fs::write(&item_path, serde_json::to_string_pretty(&item)?)
        .with_context(|| format!("Failed to write {}", item_path))?;

    let report = trigger.after_save(&item, matches.get_flag("update")).await;
    print_notices(&report.notices);

    if let Some(html) = &report.rendered_html {
        println!("{}", html);
    }

    if report.has_errors() {
        bail!("Mailout for {} finished with errors", item.id);
    }

    Ok(())
}

fn parse_site_datetime(services: &MailoutServices, raw: &str) -> anyhow::Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M")
        .with_context(|| format!("Expected \"YYYY-MM-DD HH:MM\", got \"{}\"", raw))?;
    let offset = services.config().site.offset()?;

    site_datetime(naive, offset).ok_or_else(|| anyhow!("{} is not a valid local time", raw))
}

pub async fn subscribe(services: &MailoutServices, matches: &ArgMatches) -> anyhow::Result<()> {
    let lists = matches
        .get_many::<String>("list")
        .into_iter()
        .flatten()
        .map(|raw| raw.parse::<ContactListRef>())
        .collect::<Result<Vec<_>, _>>()?;

    let form = SignupForm {
        email: arg(matches, "email"),
        confirm_email: matches.get_one::<String>("confirm-email").cloned(),
        first_name: matches.get_one::<String>("first-name").cloned(),
        last_name: matches.get_one::<String>("last-name").cloned(),
        lists,
    };
    let rules = SignupFormRules {
        require_lists: true,
        ..Default::default()
    };

    let outcome = services.subscriptions.submit(&form, &rules).await?;
    print_notices(&outcome.notices);

    if outcome.has_errors() {
        bail!("{}", outcome.message);
    }

    Ok(())
}
