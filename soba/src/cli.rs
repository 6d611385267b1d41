use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "soba",
    version,
    about = "GitHub issue workflow daemon",
    long_about = "soba polls a GitHub repository's issues and drives each one through \
plan -> implement -> review (with a revise branch) by mutating soba:* labels \
and running a configured command inside a tmux pane."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the config file (default: ./.soba/config.yml)
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the scheduler loop, or process a single issue
    Start {
        /// Process only this issue, then exit (legacy todo->plan direct path)
        issue_no: Option<u64>,

        /// Detach from the controlling terminal
        #[arg(long)]
        daemon: bool,

        /// Dispatch phase commands directly instead of inside tmux
        #[arg(long)]
        no_tmux: bool,
    },

    /// Stop a running daemon
    Stop {
        /// Skip the graceful wait and escalate immediately
        #[arg(long)]
        force: bool,

        /// Seconds to wait for graceful exit before escalating
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },

    /// Report daemon status
    Status {
        /// Print the last N lines of the daemon log
        #[arg(long)]
        log: Option<usize>,

        /// Print machine-readable JSON instead of a human summary
        #[arg(long)]
        json: bool,
    },

    /// Attach to (or list) the repository/issue tmux session
    Open {
        /// Attach to this issue's window
        issue_no: Option<u64>,

        /// List sessions/windows instead of attaching
        #[arg(long)]
        list: bool,
    },

    /// Enumerate sessions, or prune old state
    Monitor {
        /// Prune logs and dead sessions older than this many days
        #[arg(long)]
        cleanup: Option<u64>,
    },
}
