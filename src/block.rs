use std::{fs, io::Write, path::Path};

use anyhow::{Context, Result, ensure};
use blocklist::{AddOutcome, Blocklist, RemoveOutcome, platform_blocker};
use procguard_core::platform::Platform;

use crate::{
    agentd::AgentConfig,
    cli::block::{BlockCommand, BlockOpts},
};

/// Runs a `procguard block` command, printing the results to `out`.
pub fn block_run(options: &BlockOpts, out: &mut impl Write) -> Result<()> {
    log::trace!("Block options: {:?}", options);

    let config = AgentConfig::load(options.config_file.as_deref())?;
    let data_dir = config.data_dir()?;
    let (list, kind) = if options.web {
        (Blocklist::web(&data_dir), "web blocklist")
    } else {
        (Blocklist::apps(&data_dir), "blocklist")
    };

    match &options.command {
        BlockCommand::Add { names, lock_exe } => {
            ensure!(
                !(options.web && lock_exe.is_some()),
                "--lock-exe only applies to the application blocklist"
            );
            for name in names {
                match list.add(name)? {
                    AddOutcome::Added => writeln!(out, "Added {name} to the {kind}")?,
                    AddOutcome::Exists => writeln!(out, "{name} is already in the {kind}")?,
                }
            }
            if let Some(path) = lock_exe {
                lock(path, out)?;
            }
        }
        BlockCommand::Rm { names, unlock_exe } => {
            ensure!(
                !(options.web && unlock_exe.is_some()),
                "--unlock-exe only applies to the application blocklist"
            );
            for name in names {
                match list.remove(name)? {
                    RemoveOutcome::Removed => writeln!(out, "Removed {name} from the {kind}")?,
                    RemoveOutcome::NotFound => writeln!(out, "{name} is not in the {kind}")?,
                }
            }
            if let Some(path) = unlock_exe {
                unlock(path, out)?;
            }
        }
        BlockCommand::List => {
            let entries = list.load()?;
            if entries.is_empty() {
                writeln!(out, "The {kind} is empty")?;
            }
            for entry in entries {
                writeln!(out, "{entry}")?;
            }
        }
        BlockCommand::Clear => {
            list.clear()?;
            writeln!(out, "Cleared the {kind}")?;
        }
        BlockCommand::Import { file } => {
            let data = fs::read_to_string(file)
                .with_context(|| format!("Error reading {}", file.display()))?;
            let added = list.import(&data)?;
            writeln!(out, "Imported {added} new entries into the {kind}")?;
        }
        BlockCommand::Export { output } => {
            let export = list.export(chrono::Utc::now())?;
            let data = serde_json::to_string_pretty(&export)?;
            match output {
                Some(path) => {
                    fs::write(path, data)
                        .with_context(|| format!("Error writing {}", path.display()))?;
                    writeln!(out, "Exported {} entries to {}", export.blocked.len(), path.display())?;
                }
                None => writeln!(out, "{data}")?,
            }
        }
    }

    Ok(())
}

fn lock(path: &Path, out: &mut impl Write) -> Result<()> {
    let locked = platform_blocker(Platform::current())?.block(path)?;
    writeln!(out, "Locked {}", locked.display())?;
    Ok(())
}

fn unlock(path: &Path, out: &mut impl Write) -> Result<()> {
    let unlocked = platform_blocker(Platform::current())?.unblock(path)?;
    writeln!(out, "Unlocked {}", unlocked.display())?;
    Ok(())
}
