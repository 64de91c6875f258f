//!
//! electrix CLI binary
//! -------------------
//! Offline RUT helpers plus login and account provisioning against the hosted
//! backend, using the same configuration variables as the server.

use std::env;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde_json::json;
use tracing_subscriber::{EnvFilter, fmt};

use electrix::backend::{http_client, GoTrueClient, RestProfileStore, RowAuth};
use electrix::config::Config;
use electrix::identity::{login, IdentityService, Role, SessionStore};
use electrix::provisioning::{AccountInput, ClientAccountInput, Provisioner, RegistrationForm, MIN_PASSWORD_LEN};
use electrix::rut;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} clean <rut>\n  {program} format <rut>\n  {program} validate <rut>\n  {program} register --nombre <name> --rut <rut> --password <p> --confirm-password <p> [--telefono <t>] [--especialidad <s>]\n  {program} login <identifier> --password <p>\n  {program} create-account --operator <identifier> --password <p> --nombre <name> --rut <rut> --account-password <p> [--email <e>] [--rol <r>] [--especialidad <s>] [--telefono <t>]\n  {program} create-client-account --operator <identifier> --password <p> --login <id> --client-id <uuid> --account-password <p>\n\nFlags:\n  --strategy <isolated|capture_restore>   Override ELECTRIX_PROVISIONING\n  -h, --help                              Show this help\n\nEnvironment:\n  ELECTRIX_BACKEND_URL, ELECTRIX_ANON_KEY, ELECTRIX_HTTP_TIMEOUT_SECS, ELECTRIX_PROVISIONING"
    );
}

/// `--flag value` pairs after the positional arguments.
struct Flags(Vec<(String, String)>);

impl Flags {
    fn parse(args: &[String]) -> Result<(Vec<String>, Flags)> {
        let mut positional = Vec::new();
        let mut flags = Vec::new();
        let mut i = 0;
        while i < args.len() {
            let a = &args[i];
            if let Some(name) = a.strip_prefix("--") {
                let value = args.get(i + 1).ok_or_else(|| anyhow!("--{} requires a value", name))?;
                flags.push((name.to_string(), value.clone()));
                i += 2;
            } else {
                positional.push(a.clone());
                i += 1;
            }
        }
        Ok((positional, Flags(flags)))
    }

    fn get(&self, name: &str) -> Option<String> {
        self.0.iter().rev().find(|(k, _)| k == name).map(|(_, v)| v.clone())
    }

    fn require(&self, name: &str) -> Result<String> {
        self.get(name).ok_or_else(|| anyhow!("--{} is required", name))
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);
    if args.is_empty() || args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage(&program);
        return Ok(());
    }
    let command = args.remove(0);
    let (positional, flags) = match Flags::parse(&args) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}", e);
            print_usage(&program);
            std::process::exit(2);
        }
    };

    match command.as_str() {
        "clean" | "format" | "validate" => {
            let Some(input) = positional.first() else {
                eprintln!("{} requires a RUT", command);
                std::process::exit(2);
            };
            match command.as_str() {
                "clean" => println!("{}", rut::clean(input)),
                "format" => println!("{}", rut::format(input)),
                _ => {
                    let ok = rut::validate(input);
                    println!("{}", if ok { "valid" } else { "invalid" });
                    if !ok { std::process::exit(1); }
                }
            }
            Ok(())
        }
        "register" | "login" | "create-account" | "create-client-account" => {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to build Tokio runtime")?;
            let result = rt.block_on(run_remote(&command, &positional, &flags));
            match result {
                Ok(val) => {
                    let s = serde_json::to_string_pretty(&val).unwrap_or_else(|_| val.to_string());
                    println!("{}", s);
                    Ok(())
                }
                Err(err) => {
                    eprintln!("Error: {}", err);
                    std::process::exit(1);
                }
            }
        }
        unk => {
            eprintln!("Unrecognized command: {}", unk);
            print_usage(&program);
            std::process::exit(2);
        }
    }
}

async fn run_remote(command: &str, positional: &[String], flags: &Flags) -> Result<serde_json::Value> {
    let mut config = Config::from_env()?;
    if let Some(s) = flags.get("strategy") {
        config.provisioning = s.parse().map_err(|e: String| anyhow!(e))?;
    }
    let http = http_client(config.http_timeout)?;
    let sessions = SessionStore::persistent();
    let identity = Arc::new(GoTrueClient::new(&config.backend_url, &config.anon_key, http.clone(), sessions.clone())?);
    let profiles = Arc::new(RestProfileStore::new(&config.backend_url, &config.anon_key, http, RowAuth::Session(sessions))?);

    if command == "register" {
        let form = RegistrationForm {
            display_name: flags.require("nombre")?,
            rut: flags.require("rut")?,
            phone: flags.get("telefono"),
            specialty: flags.get("especialidad"),
            password: flags.require("password")?,
            confirm_password: flags.require("confirm-password")?,
        };
        let provisioner = Provisioner::new(identity, profiles).with_strategy(config.provisioning);
        let account = provisioner.register(&form).await?;
        return Ok(json!({"account": account, "next": "login"}));
    }

    let operator = match command {
        "login" => positional.first().cloned().ok_or_else(|| anyhow!("login requires an identifier"))?,
        _ => flags.require("operator")?,
    };
    let outcome = login(identity.as_ref(), profiles.as_ref(), &operator, &flags.require("password")?).await?;
    let caps = outcome.capabilities;
    let whoami = json!({
        "user": outcome.session.user.id,
        "email": outcome.session.user.email,
        "profile": outcome.profile,
        "role": caps.role,
        "is_admin": caps.is_admin,
        "is_supervisor": caps.is_supervisor,
        "can_view_income": caps.can_view_income,
    });
    if command == "login" {
        return Ok(whoami);
    }

    let account_password = flags.require("account-password")?;
    if account_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(anyhow!("--account-password must have at least {} characters", MIN_PASSWORD_LEN));
    }
    let provisioner = Provisioner::new(identity.clone(), profiles).with_strategy(config.provisioning);
    let account = if command == "create-account" {
        let input = AccountInput {
            display_name: flags.require("nombre")?,
            identity_number: flags.require("rut")?,
            email: flags.get("email"),
            password: account_password.clone(),
            role: flags.get("rol").map(|r| r.parse::<Role>()).transpose().map_err(|e: String| anyhow!(e))?,
            specialty: flags.get("especialidad"),
            phone: flags.get("telefono"),
        };
        provisioner.create_account(&input).await?
    } else {
        let client_id = flags.require("client-id")?;
        let input = ClientAccountInput {
            login: flags.require("login")?,
            password: account_password.clone(),
            client_id: client_id.parse().with_context(|| format!("invalid --client-id '{}'", client_id))?,
        };
        provisioner.create_client_account(&input).await?
    };
    let still_signed_in = identity.get_session().map(|s| s.user.id);
    Ok(json!({"account": account, "operator": whoami, "active_session": still_signed_in}))
}
