//! `agentlink status` — list sessions advertised in the data dir.

use std::path::Path;

use crate::lockfile;
use crate::VERSION;

pub fn run(data_dir: &Path) -> anyhow::Result<()> {
    println!();
    println!("  agentlink v{}", VERSION);
    println!("  Data dir: {}", data_dir.display());
    println!();

    let sessions = lockfile::list(data_dir);
    if sessions.is_empty() {
        println!("  No sessions advertised.");
        println!("  Start one with: agentlink serve --project <path>");
        println!();
        return Ok(());
    }

    for (path, doc) in sessions {
        let state = if process_alive(doc.pid) {
            "running"
        } else {
            "stale — process not found"
        };
        println!("  Port {} ({})", doc.port, doc.ide_name);
        for folder in &doc.workspace_folders {
            println!("    Workspace: {}", folder);
        }
        println!("    PID: {} ({})", doc.pid, state);
        println!("    Lockfile: {}", path.display());
        println!();
    }

    Ok(())
}

fn process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // kill -0 checks if process exists without sending a signal
    unsafe { libc::kill(pid, 0) == 0 }
}

#[cfg(test)]
mod tests {
    use super::process_alive;

    #[test]
    fn own_process_is_alive() {
        assert!(process_alive(std::process::id()));
    }

    #[test]
    fn nonsense_pids_are_not_alive() {
        assert!(!process_alive(0));
        assert!(!process_alive(u32::MAX));
    }
}
