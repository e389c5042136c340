//! Mailout command line
//!
//! Operator entry point for managing provider connections and running
//! mailouts and signups outside the CMS.

mod commands;

use clap::{Arg, ArgAction, Command};
use mailout_core::{MailoutConfig, MailoutServices};

fn connections_command() -> Command {
    Command::new("connections")
        .about("Manage provider connections")
        .subcommand_required(true)
        .subcommand(Command::new("list").about("List stored connections and their contact lists"))
        .subcommand(
            Command::new("add")
                .about("Add a connection and print its authorization URL")
                .arg(Arg::new("name").long("name").value_name("NAME").required(true).help("Display name; the id is derived from it"))
                .arg(Arg::new("api-key").long("api-key").value_name("KEY").required(true).env("MAILOUT_API_KEY"))
                .arg(Arg::new("secret").long("secret").value_name("SECRET").required(true).env("MAILOUT_API_SECRET"))
                .arg(Arg::new("from-name").long("from-name").value_name("NAME").default_value(""))
                .arg(Arg::new("from-email").long("from-email").value_name("EMAIL").default_value(""))
                .arg(Arg::new("reply-to").long("reply-to").value_name("EMAIL").default_value("")),
        )
        .subcommand(
            Command::new("authorize")
                .about("Complete authorization with the code from the provider callback")
                .arg(Arg::new("id").required(true).help("Connection id (the OAuth state)"))
                .arg(Arg::new("code").long("code").value_name("CODE").required(true)),
        )
        .subcommand(
            Command::new("refresh")
                .about("Force a token refresh and list snapshot")
                .arg(Arg::new("id").required(true)),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete a connection")
                .arg(Arg::new("id").required(true)),
        )
}

fn cli() -> Command {
    Command::new("mailout")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Email marketing mailouts for published content")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("./mailout.json")
                .global(true),
        )
        .subcommand(connections_command())
        .subcommand(
            Command::new("lists")
                .about("Contact list helpers")
                .subcommand_required(true)
                .subcommand(
                    Command::new("resolve")
                        .about("Find a contact list by name, creating it when missing")
                        .arg(Arg::new("connection").long("connection").value_name("ID").required(true))
                        .arg(Arg::new("title").long("title").value_name("TITLE").required(true))
                        .arg(Arg::new("prefix").long("prefix").value_name("PREFIX")),
                ),
        )
        .subcommand(
            Command::new("send")
                .about("Run the save hooks for a content item and send its mailout")
                .arg(Arg::new("item").long("item").value_name("FILE").required(true).help("Content item JSON file"))
                .arg(
                    Arg::new("content-dir")
                        .long("content-dir")
                        .value_name("DIR")
                        .default_value("./content")
                        .help("Directory of referenced content items"),
                )
                .arg(
                    Arg::new("at")
                        .long("at")
                        .value_name("DATETIME")
                        .help("Schedule for \"YYYY-MM-DD HH:MM\" in the site timezone instead of sending now"),
                )
                .arg(
                    Arg::new("update")
                        .long("update")
                        .action(ArgAction::SetTrue)
                        .help("Treat the save as an update of existing content"),
                ),
        )
        .subcommand(
            Command::new("subscribe")
                .about("Sign a contact up to contact lists")
                .arg(Arg::new("email").long("email").value_name("EMAIL").required(true))
                .arg(Arg::new("confirm-email").long("confirm-email").value_name("EMAIL"))
                .arg(Arg::new("first-name").long("first-name").value_name("NAME"))
                .arg(Arg::new("last-name").long("last-name").value_name("NAME"))
                .arg(
                    Arg::new("list")
                        .long("list")
                        .value_name("CONNECTION:LIST")
                        .action(ArgAction::Append)
                        .required(true),
                ),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with INFO as default if RUST_LOG not set
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("./mailout.json");
    let config = MailoutConfig::from_file(config_path)?;
    log::info!("Loaded configuration from {}", config_path);

    let services = MailoutServices::from_config(config)?;
    log::info!("Using connection store {}", services.config().store_path.display());

    match matches.subcommand() {
        Some(("connections", sub)) => commands::connections(&services, sub).await,
        Some(("lists", sub)) => commands::lists(&services, sub).await,
        Some(("send", sub)) => commands::send(&services, sub).await,
        Some(("subscribe", sub)) => commands::subscribe(&services, sub).await,
        _ => unreachable!("subcommand_required is set"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn test_subscribe_collects_repeated_lists() {
        let matches = cli()
            .try_get_matches_from([
                "mailout", "subscribe", "--email", "a@b.com", "--list", "main:100", "--list", "main:200",
            ])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        let lists: Vec<&String> = sub.get_many::<String>("list").unwrap().collect();

        assert_eq!(lists, vec!["main:100", "main:200"]);
        assert_eq!(matches.get_one::<String>("config").unwrap(), "./mailout.json");
    }
}
