mod broker;
mod cli;
mod config;
mod display;
mod picker;
mod ports;
mod reconcile;
mod remote;
mod state;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::Colorize;

use broker::Broker;
use cli::{Cli, Command};
use config::Config;
use ports::{OsPortAllocator, PortAllocator, RangePortAllocator};
use remote::Remote;
use state::ClientRecord;

fn main() -> Result<()> {
    clap_complete::CompleteEnv::with_factory(Cli::command).complete();

    let cli = Cli::parse();
    let cfg = Config::load();

    if cli.no_color {
        colored::control::set_override(false);
    }

    match cli.command {
        Command::Add { client, specs } => cmd_add(&client, &specs, &cfg),
        Command::Reconnect { client, specs } => cmd_reconnect(client, &specs, &cfg),
        Command::List { client } => cmd_list(client, &cfg),
        Command::Check { specs } => cmd_check(&specs),
        Command::Remove { client } => cmd_remove(client, &cfg),
        Command::Config => cmd_config(&cfg),
        Command::Completions { shell } => cmd_completions(shell, &cfg),
        Command::ListClientNames => cmd_list_client_names(&cfg),
    }
}

/// Parse declarations, pointing at the offending string on failure.
fn parse_specs(specs: &[String]) -> Result<Vec<Remote>> {
    specs
        .iter()
        .map(|s| {
            s.parse::<Remote>()
                .with_context(|| format!("bad tunnel declaration '{}'", s))
        })
        .collect()
}

/// Ephemeral-port policy: a configured range, or the OS picker when unset.
fn allocator(cfg: &Config) -> Result<Box<dyn PortAllocator>> {
    if cfg.port_min == 0 {
        Ok(Box::new(OsPortAllocator))
    } else {
        Ok(Box::new(RangePortAllocator::new(cfg.port_min, cfg.port_max)?))
    }
}

fn cmd_add(client: &str, specs: &[String], cfg: &Config) -> Result<()> {
    let declared = parse_specs(specs)?;
    let dir = cfg.state_dir()?;
    let alloc = allocator(cfg)?;

    let mut record = state::load(&dir, client)?.unwrap_or_else(|| ClientRecord {
        name: client.to_string(),
        tunnels: Vec::new(),
    });

    for mut tunnel in declared {
        match &tunnel.local {
            Some(l) if !l.random => {
                if !ports::is_port_free(l.port) {
                    println!("  {} local port {} is already in use", "⚠".yellow(), l.port);
                }
            }
            _ => tunnel.assign_local_port(alloc.allocate()?),
        }
        if let Some(l) = &tunnel.local {
            println!(
                "{} {} {}",
                "●".green(),
                tunnel.to_string().green().bold(),
                format!("local port {}", l.port).dimmed()
            );
        }
        record.tunnels.push(tunnel);
    }

    state::save(&dir, &record)?;
    println!(
        "{} {} tunnel(s) recorded for {}",
        "✓".green(),
        record.tunnels.len(),
        client.bold()
    );
    Ok(())
}

fn cmd_reconnect(client: Option<String>, specs: &[String], cfg: &Config) -> Result<()> {
    let dir = cfg.state_dir()?;
    let client = match client {
        Some(n) => n,
        None => {
            let names = state::list(&dir)?;
            let idx = picker::pick("Reconnect client", &names)?;
            names[idx].clone()
        }
    };
    let declared = parse_specs(specs)?;

    let broker = Broker::new();
    if let Some(record) = state::load(&dir, &client)? {
        broker.restore(&client, record.tunnels);
    }

    let alloc = allocator(cfg)?;
    let outcome = broker.handle_reconnect(&client, declared, alloc.as_ref())?;

    if outcome.reestablished.is_empty() {
        println!("{}", "Nothing to re-establish.".dimmed());
    } else {
        for tunnel in &outcome.reestablished {
            println!(
                "{} {} {}",
                "●".green(),
                tunnel.to_string().green().bold(),
                "re-established".green()
            );
        }
    }

    state::save(
        &dir,
        &ClientRecord {
            name: client.clone(),
            tunnels: outcome.active.clone(),
        },
    )?;
    println!(
        "{} {} active tunnel(s) recorded for {}",
        "✓".green(),
        outcome.active.len(),
        client.bold()
    );
    Ok(())
}

fn cmd_list(client: Option<String>, cfg: &Config) -> Result<()> {
    let dir = cfg.state_dir()?;
    match client {
        Some(n) => {
            let record = state::load(&dir, &n)?
                .ok_or_else(|| anyhow::anyhow!("no record for client '{}'", n))?;
            display::print_record(&record);
        }
        None => {
            let mut records = Vec::new();
            for name in state::list(&dir)? {
                if let Some(record) = state::load(&dir, &name)? {
                    records.push(record);
                }
            }
            display::print_records(&records);
        }
    }
    Ok(())
}

fn cmd_check(specs: &[String]) -> Result<()> {
    let mut bad = 0;
    for s in specs {
        match s.parse::<Remote>() {
            Ok(tunnel) => println!(
                "  {} {}  {}",
                "✓".green(),
                s,
                format!("→ {}", tunnel).dimmed()
            ),
            Err(e) => {
                bad += 1;
                println!("  {} {}  {}", "✗".red(), s.red(), e.to_string().dimmed());
            }
        }
    }
    if bad > 0 {
        anyhow::bail!("{} invalid declaration(s)", bad);
    }
    Ok(())
}

fn cmd_remove(client: Option<String>, cfg: &Config) -> Result<()> {
    let dir = cfg.state_dir()?;
    let client = match client {
        Some(n) => n,
        None => {
            let names = state::list(&dir)?;
            let idx = picker::pick("Remove client", &names)?;
            names[idx].clone()
        }
    };

    let record = state::load(&dir, &client)?
        .ok_or_else(|| anyhow::anyhow!("no record for client '{}'", client))?;

    if !record.tunnels.is_empty() {
        println!("{}", "Will remove:".dimmed());
        for tunnel in &record.tunnels {
            println!("  {}", tunnel.to_string().dimmed());
        }
        println!();
    }

    let confirmed = dialoguer::Confirm::new()
        .with_prompt(format!("Remove {}?", client))
        .default(false)
        .interact()
        .context("failed to read confirmation")?;

    if !confirmed {
        println!("Cancelled.");
        return Ok(());
    }

    state::remove(&dir, &client)?;
    println!("{} {} removed", "✓".green(), client.bold());
    Ok(())
}

fn cmd_config(cfg: &Config) -> Result<()> {
    let path = Config::init()?;
    let editor = cfg.resolve_editor();

    let status = std::process::Command::new(&editor)
        .arg(&path)
        .status()
        .with_context(|| format!("failed to launch editor '{}'", editor))?;

    if !status.success() {
        anyhow::bail!("editor exited with {}", status);
    }

    Ok(())
}

fn cmd_completions(shell: Option<clap_complete::Shell>, cfg: &Config) -> Result<()> {
    let shell = match shell {
        Some(s) => s,
        None => {
            let name = cfg.shell.as_deref().ok_or_else(|| {
                anyhow::anyhow!(
                    "no shell specified — use `burrow completions <shell>` or set `shell` in ~/.burrow/config.toml"
                )
            })?;
            name.parse::<clap_complete::Shell>()
                .map_err(|_| anyhow::anyhow!("unknown shell '{}' in config", name))?
        }
    };

    let shell_name = match shell {
        clap_complete::Shell::Bash => "bash",
        clap_complete::Shell::Zsh => "zsh",
        clap_complete::Shell::Fish => "fish",
        clap_complete::Shell::Elvish => "elvish",
        clap_complete::Shell::PowerShell => "powershell",
        _ => anyhow::bail!("unsupported shell"),
    };
    unsafe { std::env::set_var("COMPLETE", shell_name) };
    clap_complete::CompleteEnv::with_factory(Cli::command).complete();
    Ok(())
}

fn cmd_list_client_names(cfg: &Config) -> Result<()> {
    let dir = cfg.state_dir()?;
    for name in state::list(&dir)? {
        println!("{}", name);
    }
    Ok(())
}
