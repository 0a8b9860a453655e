//! Argument parsing for both binaries.
//!
//! Both `svinit` and `svinitctl` run under `std` with real dependencies
//! available, so argument parsing is `clap` derive structs rather than a
//! hand-rolled `argv` scan: the derive macros keep subcommands, flags, and
//! their help text declared in one place instead of drifting apart.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

fn default_socket_path(system: bool) -> PathBuf {
    if system {
        PathBuf::from("/dev/dinitctl")
    } else {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/root".to_string());
        PathBuf::from(home).join(".dinitctl")
    }
}

/// `svinit`: the supervisor. Runs as PID 1 in system mode, or as a
/// per-session supervisor otherwise.
#[derive(Parser, Debug)]
#[command(name = "svinit", version, about = "Service dependency and state engine supervisor")]
pub struct SvinitArgs {
    /// Directory consulted by the default loader for service descriptions.
    #[arg(short = 'd', long = "services-dir", default_value = "/etc/svinit")]
    pub services_dir: PathBuf,

    /// Run in system mode (PID 1, socket at `/dev/dinitctl`, 0600) rather
    /// than user mode (`$HOME/.dinitctl`).
    #[arg(short = 's', long = "system")]
    pub system: bool,

    /// Control socket path; overrides the mode-dependent default.
    #[arg(short = 'p', long = "socket-path")]
    pub socket_path: Option<PathBuf>,

    /// Service names to start. The literal token `auto` is filtered out
    /// (accepted for compatibility with scripts that always pass it). If
    /// empty after filtering, `boot` is started.
    pub services: Vec<String>,
}

impl SvinitArgs {
    pub fn socket_path(&self) -> PathBuf {
        self.socket_path
            .clone()
            .unwrap_or_else(|| default_socket_path(self.system))
    }

    /// Services to start once `auto` is filtered out, defaulting to `boot`
    /// when nothing remains.
    pub fn services_to_start(&self) -> Vec<String> {
        let filtered: Vec<String> = self
            .services
            .iter()
            .filter(|s| s.as_str() != "auto")
            .cloned()
            .collect();
        if filtered.is_empty() {
            vec!["boot".to_string()]
        } else {
            filtered
        }
    }
}

/// `svinitctl`: talks the control protocol over the control socket.
#[derive(Parser, Debug)]
#[command(name = "svinitctl", version, about = "Control a running svinit supervisor")]
pub struct SvinitctlArgs {
    #[command(subcommand)]
    pub command: SvinitctlCommand,

    /// Run in system mode (talk to `/dev/dinitctl` rather than
    /// `$HOME/.dinitctl`).
    #[arg(short = 's', long = "system", global = true)]
    pub system: bool,

    /// Control socket path; overrides the mode-dependent default.
    #[arg(short = 'p', long = "socket-path", global = true)]
    pub socket_path: Option<PathBuf>,
}

impl SvinitctlArgs {
    pub fn socket_path(&self) -> PathBuf {
        self.socket_path
            .clone()
            .unwrap_or_else(|| default_socket_path(self.system))
    }
}

#[derive(Subcommand, Debug)]
pub enum SvinitctlCommand {
    /// Report a service's current and target state (FINDSERVICE).
    Status { service: String },
    /// Start a service (START).
    Start {
        service: String,
        #[arg(long)]
        pin: bool,
    },
    /// Stop a service (STOP).
    Stop {
        service: String,
        #[arg(long)]
        pin: bool,
    },
    /// List every registered service (LISTSERVICES).
    List,
    /// Request a full shutdown (SHUTDOWN).
    Shutdown {
        #[arg(value_enum, default_value = "halt")]
        kind: ShutdownKind,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ShutdownKind {
    Continue,
    Halt,
    Reboot,
    Poweroff,
}

impl From<ShutdownKind> for crate::types::ShutdownType {
    fn from(kind: ShutdownKind) -> Self {
        match kind {
            ShutdownKind::Continue => crate::types::ShutdownType::Continue,
            ShutdownKind::Halt => crate::types::ShutdownType::Halt,
            ShutdownKind::Reboot => crate::types::ShutdownType::Reboot,
            ShutdownKind::Poweroff => crate::types::ShutdownType::Poweroff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_token_is_filtered_and_empty_defaults_to_boot() {
        let args = SvinitArgs {
            services_dir: PathBuf::from("/etc/svinit"),
            system: false,
            socket_path: None,
            services: vec!["auto".to_string()],
        };
        assert_eq!(args.services_to_start(), vec!["boot".to_string()]);
    }

    #[test]
    fn named_services_survive_auto_filtering() {
        let args = SvinitArgs {
            services_dir: PathBuf::from("/etc/svinit"),
            system: false,
            socket_path: None,
            services: vec!["auto".to_string(), "network".to_string()],
        };
        assert_eq!(args.services_to_start(), vec!["network".to_string()]);
    }
}
