use std::path::Path;

use anyhow::Result;
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;

use dialogue_builder::console::command_interface::{HELP, execute_command};
use dialogue_builder::ids::spawn_periodic_rescan;
use dialogue_builder::persistence::autosave::AutosaveController;
use dialogue_builder::persistence::settings::AppSettings;
use dialogue_builder::session::EditorSession;

const SHELL_HELP: &str = "\
Shell commands:
  save        Save now instead of waiting for autosave
  status      Show autosave state
  reload      Discard unsaved edits and reload from disk
  quit, exit  Save pending edits and leave";

pub fn run(mut session: EditorSession, settings: &AppSettings) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()?;
    let autosave = AutosaveController::new(session.service().clone(), settings.autosave_debounce(), runtime.handle().clone());
    let rescan = settings
        .rescan_interval()
        .map(|every| spawn_periodic_rescan(session.allocator().clone(), every, runtime.handle()));

    let mut rl: Editor<(), DefaultHistory> = Editor::new()?;
    let hist_path = AppSettings::settings_dir().join("shell_history.txt");
    let _ = std::fs::create_dir_all(hist_path.parent().unwrap_or_else(|| Path::new(".")));
    let _ = rl.load_history(&hist_path);

    eprintln!(
        "Dialogue Builder: {} NPCs loaded from {}.\nType `help` for commands. Edits autosave after {} ms.\n",
        session.npcs().len(),
        settings.data_dir().display(),
        autosave.window().as_millis()
    );

    let mut dirty = false;
    loop {
        let line = match rl.readline("dlg> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {}", e);
                break;
            }
        };
        let input = line.trim();
        if input.is_empty() { continue; }
        rl.add_history_entry(input).ok();

        match input {
            "quit" | "exit" => break,
            "help" | "?" => {
                println!("{}\n{}", HELP, SHELL_HELP);
                continue;
            }
            "save" => {
                match autosave.flush_now(session.npcs().to_vec()) {
                    Ok(()) => {
                        dirty = false;
                        println!("Saved");
                    }
                    Err(e) => eprintln!("Save failed: {}", e),
                }
                continue;
            }
            "status" => {
                let status = autosave.status();
                let when = status.last_saved_at.map(|t| t.to_string()).unwrap_or_else(|| "never".into());
                println!("saving: {}  pending: {}  last saved: {}", status.is_saving, autosave.has_pending(), when);
                if let Some(err) = status.last_error {
                    println!("last error: {}", err);
                }
                continue;
            }
            "reload" => {
                autosave.cancel();
                session.reload();
                dirty = false;
                println!("Reloaded {} NPCs", session.npcs().len());
                continue;
            }
            _ => {}
        }

        match execute_command(&mut session, input) {
            Ok(outcome) => {
                for l in &outcome.lines {
                    println!("{}", l);
                }
                if outcome.mutated {
                    dirty = true;
                    autosave.schedule(session.npcs().to_vec());
                }
            }
            Err(e) => eprintln!("error: {}", e),
        }
    }

    if dirty || autosave.has_pending() {
        autosave.flush_now(session.npcs().to_vec())?;
        eprintln!("Saved pending edits");
    }
    if let Some(task) = rescan {
        task.abort();
    }
    let _ = rl.save_history(&hist_path);
    Ok(())
}
