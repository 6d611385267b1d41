mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use soba_core::config::Config;
use soba_core::daemon::{pidfile, status::StatusFile, stop_daemon, StopOutcome};
use soba_core::github::GhCliGateway;
use soba_core::ports::{RealSleeper, SystemClock};
use soba_core::scheduler::{Scheduler, SchedulerConfig};
use soba_core::tmux::TmuxSessionManager;
use soba_core::workflow_executor::{NoopNotifier, SlackNotifier, WebhookNotifier};
use std::path::PathBuf;
use std::time::Duration;

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// `~/.soba`, the per-user state directory (spec §6 persisted layout).
/// `SOBA_DIR` overrides it outright, same as the teacher's `SIPAG_DIR`.
fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SOBA_DIR") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".soba")
}

struct Paths {
    pid: PathBuf,
    status: PathBuf,
    log: PathBuf,
    sentinel: PathBuf,
}

fn paths() -> Paths {
    let dir = state_dir();
    Paths {
        pid: dir.join("soba.pid"),
        status: dir.join("status.json"),
        log: dir.join("logs").join("daemon.log"),
        sentinel: dir.join("stopping"),
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(".soba/config.yml"));
    Config::load(&path).with_context(|| {
        format!(
            "no usable config at {path:?} — write one (see `soba_core::config::default_yaml`)"
        )
    })
}

fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Start {
            issue_no,
            daemon,
            no_tmux,
        } => cmd_start(&cli, *issue_no, *daemon, *no_tmux),
        Commands::Stop { force, timeout } => cmd_stop(*force, *timeout),
        Commands::Status { log, json } => cmd_status(*log, *json),
        Commands::Open { issue_no, list } => cmd_open(&cli, *issue_no, *list),
        Commands::Monitor { cleanup } => cmd_monitor(&cli, *cleanup),
    }
}

fn build_notifier(config: &Config) -> Box<dyn SlackNotifier> {
    if config.slack.notifications_enabled {
        if let Some(url) = &config.slack.webhook_url {
            return Box::new(WebhookNotifier {
                webhook_url: url.clone(),
            });
        }
    }
    Box::new(NoopNotifier)
}

fn cmd_start(cli: &Cli, issue_no: Option<u64>, daemon: bool, no_tmux: bool) -> Result<()> {
    let config = load_config(cli)?;
    let p = paths();

    if daemon {
        // Daemonization preserves the working directory and redirects
        // stdout/stderr to the rotating log file with line buffering;
        // actually detaching from the controlling terminal is an
        // OS-process-group operation outside this function's scope, left
        // to the init system/process supervisor that launches `--daemon`.
        std::fs::create_dir_all(p.log.parent().unwrap())?;
    }

    let github = GhCliGateway::new();
    let notifier = build_notifier(&config);
    let use_tmux = config.workflow.use_tmux && !no_tmux;

    let lock_dir = state_dir().join("locks");
    let tmux = if use_tmux {
        Some(TmuxSessionManager::new(
            std::process::id(),
            false,
            String::new(),
            lock_dir,
            Duration::from_secs(config.workflow.tmux_command_delay),
            Box::new(RealSleeper),
        ))
    } else {
        None
    };

    let worktree_base_path = PathBuf::from(&config.git.worktree_base_path);
    let repo_root = std::env::current_dir()?;

    let scheduler_config = SchedulerConfig {
        repo: config.github.repository.clone(),
        repo_root,
        worktree_base_path,
        setup_workspace: config.git.setup_workspace,
        use_tmux,
        auto_merge_enabled: config.workflow.auto_merge_enabled,
        poll_interval: Duration::from_secs(config.workflow.interval),
        status_path: p.status.clone(),
        sentinel_path: p.sentinel.clone(),
        phase_configs: config.phase.to_executor_map(),
    };

    let mut cleaner = config
        .workflow
        .closed_issue_cleanup_enabled
        .then(|| {
            soba_core::cleanup::ClosedIssueCleaner::new(Duration::from_secs(
                config.workflow.closed_issue_cleanup_interval,
            ))
        });
    let sleeper = RealSleeper;

    let mut scheduler = Scheduler {
        github: &github,
        tmux: tmux.as_ref(),
        notifier: notifier.as_ref(),
        sleeper: &sleeper,
        cleaner: cleaner.as_mut(),
        config: scheduler_config,
    };

    soba_core::daemon::signals::install();

    if let Some(issue_number) = issue_no {
        // Single-issue mode: process exactly this issue once, ignoring
        // the loop and the PID file entirely (spec §9 open question).
        let issue = github
            .issue(&scheduler.config.repo, issue_number)?
            .with_context(|| format!("issue #{issue_number} not found"))?;
        let executor = soba_core::workflow_executor::WorkflowExecutor::new(
            tmux.as_ref(),
            notifier.as_ref(),
            scheduler.config.repo_root.clone(),
            scheduler.config.worktree_base_path.clone(),
        );
        let outcome = soba_core::issue_processor::process_issue(
            &github,
            &executor,
            &scheduler.config.phase_configs,
            &issue,
            &scheduler.config.repo,
            use_tmux,
            config.git.setup_workspace,
        )?;
        println!("{outcome:?}");
        return Ok(());
    }

    let ticks = scheduler.run(&p.pid)?;
    println!("soba stopped after {ticks} tick(s)");
    Ok(())
}

fn cmd_stop(force: bool, timeout_secs: u64) -> Result<()> {
    let p = paths();
    let clock = SystemClock;
    let sleeper = RealSleeper;
    let outcome = stop_daemon(
        &p.pid,
        &p.sentinel,
        force,
        Duration::from_secs(timeout_secs.max(1)),
        &clock,
        &sleeper,
    )?;
    match outcome {
        StopOutcome::NotRunning => {
            println!("soba is not running");
            std::process::exit(1);
        }
        StopOutcome::StoppedGracefully => println!("soba stopped"),
        StopOutcome::Escalated => println!("soba did not stop gracefully; killed"),
    }
    Ok(())
}

fn cmd_status(log_lines: Option<usize>, json: bool) -> Result<()> {
    let p = paths();
    let status = StatusFile::load(&p.status)?;
    let running_pid = pidfile::read(&p.pid).filter(|pid| pidfile::running(*pid));

    if json {
        let body = serde_json::json!({
            "running": running_pid.is_some(),
            "pid": running_pid,
            "current_issue": status.current_issue,
            "last_processed": status.last_processed,
            "memory_mb": status.memory_mb,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    match running_pid {
        Some(pid) => println!("soba is running (pid {pid})"),
        None => println!("soba is not running"),
    }
    if let Some(current) = &status.current_issue {
        println!(
            "current issue: #{} ({}), started {}",
            current.number, current.phase, current.started_at
        );
    }
    if let Some(last) = &status.last_processed {
        println!("last processed: #{} at {}", last.number, last.completed_at);
    }
    if let Some(n) = log_lines {
        print_log_tail(&p.log, n);
    }
    Ok(())
}

fn print_log_tail(log_path: &std::path::Path, n: usize) {
    let Ok(contents) = std::fs::read_to_string(log_path) else {
        return;
    };
    let lines: Vec<&str> = contents.lines().collect();
    let start = lines.len().saturating_sub(n);
    for line in &lines[start..] {
        println!("{line}");
    }
}

fn cmd_open(cli: &Cli, issue_no: Option<u64>, list: bool) -> Result<()> {
    let config = load_config(cli)?;
    let lock_dir = state_dir().join("locks");
    let tmux = TmuxSessionManager::new(
        std::process::id(),
        false,
        String::new(),
        lock_dir,
        Duration::from_secs(0),
        Box::new(RealSleeper),
    );

    if list {
        for session in tmux.list_soba_sessions()? {
            println!("{session}");
        }
        return Ok(());
    }

    let session = tmux.session_name_for(&config.github.repository);
    let target = match issue_no {
        Some(n) => {
            let window = tmux
                .find_issue_window(&config.github.repository, n)?
                .with_context(|| format!("no tmux window found for issue #{n}"))?;
            format!("{session}:{window}")
        }
        None => session,
    };

    let status = std::process::Command::new("tmux")
        .args(["attach-session", "-t", &target])
        .status()
        .context("failed to run tmux attach-session")?;
    if !status.success() {
        anyhow::bail!("tmux attach-session failed");
    }
    Ok(())
}

fn cmd_monitor(cli: &Cli, cleanup_days: Option<u64>) -> Result<()> {
    let config = load_config(cli)?;
    let lock_dir = state_dir().join("locks");
    let tmux = TmuxSessionManager::new(
        std::process::id(),
        false,
        String::new(),
        lock_dir,
        Duration::from_secs(0),
        Box::new(RealSleeper),
    );

    match cleanup_days {
        None => {
            for session in tmux.list_soba_sessions()? {
                println!("{session}");
            }
        }
        Some(days) => {
            let removed = tmux.cleanup_old_sessions(pidfile::running)?;
            for session in &removed {
                println!("killed stale session {session}");
            }
            let p = paths();
            let log_removed = soba_core::daemon::clean_old_logs(
                p.log.parent().unwrap(),
                "daemon.log",
                Duration::from_secs(days * 86_400),
                std::time::SystemTime::now(),
            );
            for path in &log_removed {
                println!("pruned {}", path.display());
            }
        }
    }
    Ok(())
}
