mod shell;

use std::path::PathBuf;

use anyhow::{Result, anyhow, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};

use dialogue_builder::console::command_interface::execute_command;
use dialogue_builder::persistence::settings::AppSettings;
use dialogue_builder::session::EditorSession;

fn cli() -> Command {
    Command::new("dialogue-builder")
        .about("Build branching NPC dialogue trees stored on this machine")
        .arg(
            Arg::new("data_dir")
                .long("data-dir")
                .value_name("DIR")
                .global(true)
                .help("Use DIR for local storage instead of the configured data directory"),
        )
        .subcommand_required(false)
        .subcommand(Command::new("shell").about("Interactive editor with autosave (default)"))
        .subcommand(Command::new("list").about("List NPCs and their conversations"))
        .subcommand(Command::new("show").about("Show one NPC in detail").arg(Arg::new("npc").required(true)))
        .subcommand(
            Command::new("exec")
                .about("Run one editor command and save, e.g. `exec npc add \"Old Tom\"`")
                .arg(Arg::new("command").required(true).num_args(1..).trailing_var_arg(true)),
        )
        .subcommand(
            Command::new("export")
                .about("Export all NPCs as JSON")
                .arg(Arg::new("out").long("out").value_name("DIR").help("Directory for the export file"))
                .arg(Arg::new("stdout").long("stdout").action(ArgAction::SetTrue).help("Print instead of writing a file")),
        )
        .subcommand(
            Command::new("import")
                .about("Replace all NPCs with the contents of a .json export")
                .arg(Arg::new("file").required(true)),
        )
        .subcommand(Command::new("stats").about("Show id allocator counters"))
        .subcommand(Command::new("versions").about("List saved backups, newest first"))
        .subcommand(
            Command::new("restore")
                .about("Replace all NPCs with a saved backup")
                .arg(Arg::new("file").required(true)),
        )
        .subcommand(
            Command::new("reset")
                .about("Delete all NPCs and reset id counters (a backup is kept)")
                .arg(Arg::new("yes").long("yes").action(ArgAction::SetTrue).help("Skip the confirmation check")),
        )
        .subcommand(
            Command::new("settings")
                .about("Show or change persisted settings")
                .subcommand(Command::new("show"))
                .subcommand(Command::new("set-data-dir").arg(Arg::new("dir").required(true)))
                .subcommand(Command::new("set-export-dir").arg(Arg::new("dir").required(true)))
                .subcommand(Command::new("set-autosave-ms").arg(Arg::new("ms").required(true)))
                .subcommand(Command::new("set-rescan-secs").arg(Arg::new("secs").required(true))),
        )
}

fn effective_settings(matches: &ArgMatches) -> AppSettings {
    let mut settings = AppSettings::load().unwrap_or_else(|e| {
        log::warn!("settings unreadable, using defaults: {}", e);
        AppSettings::default()
    });
    if let Some(dir) = matches.get_one::<String>("data_dir") {
        settings.data_override = Some(PathBuf::from(dir));
    }
    settings
}

fn run_settings(sub: &ArgMatches, mut settings: AppSettings) -> Result<()> {
    match sub.subcommand() {
        Some(("set-data-dir", m)) => {
            settings.data_override = m.get_one::<String>("dir").map(PathBuf::from);
        }
        Some(("set-export-dir", m)) => {
            settings.export_override = m.get_one::<String>("dir").map(PathBuf::from);
        }
        Some(("set-autosave-ms", m)) => {
            let raw = m.get_one::<String>("ms").ok_or_else(|| anyhow!("missing value"))?;
            settings.autosave_debounce_ms = raw.parse()?;
        }
        Some(("set-rescan-secs", m)) => {
            let raw = m.get_one::<String>("secs").ok_or_else(|| anyhow!("missing value"))?;
            settings.rescan_interval_secs = raw.parse()?;
        }
        _ => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            println!("settings file: {}", AppSettings::settings_dir().join("settings.json").display());
            return Ok(());
        }
    }
    let path = settings.save()?;
    println!("Saved {}", path.display());
    Ok(())
}

fn run(matches: &ArgMatches) -> Result<()> {
    let settings = effective_settings(matches);
    if let Some(("settings", sub)) = matches.subcommand() {
        return run_settings(sub, settings);
    }

    let mut session = EditorSession::open(&settings);
    match matches.subcommand() {
        None | Some(("shell", _)) => shell::run(session, &settings),
        Some(("list", _)) => {
            for line in execute_command(&mut session, "list")?.lines {
                println!("{}", line);
            }
            Ok(())
        }
        Some(("show", m)) => {
            let npc = m.get_one::<String>("npc").ok_or_else(|| anyhow!("missing npc id"))?;
            let outcome = execute_command(&mut session, &format!("show \"{}\"", npc))?;
            for line in outcome.lines {
                println!("{}", line);
            }
            Ok(())
        }
        Some(("exec", m)) => {
            let words: Vec<String> = m
                .get_many::<String>("command")
                .map(|vals| vals.map(|w| if w.contains(char::is_whitespace) { format!("\"{}\"", w) } else { w.clone() }).collect())
                .unwrap_or_default();
            let outcome = execute_command(&mut session, &words.join(" "))?;
            for line in &outcome.lines {
                println!("{}", line);
            }
            if outcome.mutated {
                session.save()?;
            }
            Ok(())
        }
        Some(("export", m)) => {
            if m.get_flag("stdout") {
                println!("{}", session.service().export_as_text()?);
                return Ok(());
            }
            let dir = m.get_one::<String>("out").map(PathBuf::from).unwrap_or_else(|| settings.export_dir());
            let path = session.service().export_to_dir(&dir)?;
            println!("Exported to {}", path.display());
            Ok(())
        }
        Some(("import", m)) => {
            let file = m.get_one::<String>("file").ok_or_else(|| anyhow!("missing file"))?;
            match session.service().import_from_path(&PathBuf::from(file)) {
                Ok(count) => {
                    session.reload();
                    println!("Imported {} NPCs", count);
                    Ok(())
                }
                Err(e) => bail!("Import failed, nothing was changed: {}", e),
            }
        }
        Some(("stats", _)) => {
            println!("{}", serde_json::to_string_pretty(&session.id_stats())?);
            Ok(())
        }
        Some(("versions", _)) => {
            let versions = session.service().list_versions()?;
            if versions.is_empty() {
                println!("No backups in {}", session.service().backup_dir().display());
            }
            for p in versions {
                println!("{}", p.display());
            }
            Ok(())
        }
        Some(("restore", m)) => {
            let file = m.get_one::<String>("file").ok_or_else(|| anyhow!("missing file"))?;
            let npcs = session.service().load_version(&PathBuf::from(file))?;
            session.service().save_all(&npcs)?;
            session.reload();
            println!("Restored {} NPCs from {}", npcs.len(), file);
            Ok(())
        }
        Some(("reset", m)) => {
            if !m.get_flag("yes") {
                bail!("reset deletes every NPC; re-run with --yes to confirm");
            }
            match session.reset_all()? {
                Some(backup) => println!("All data cleared. Backup saved to {}", backup.display()),
                None => println!("All data cleared."),
            }
            Ok(())
        }
        Some((other, _)) => bail!("unknown command {}", other),
    }
}

fn main() {
    env_logger::init();
    let matches = cli().get_matches();
    if let Err(e) = run(&matches) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
