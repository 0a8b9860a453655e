//! Supervisor entry point.
//!
//! Parses argv, loads the service directory into a [`svinit::set::ServiceSet`],
//! drives it to a fixed point, then would loop on the reactor — but nothing
//! here forks or execs a real reactor yet: `EventReactor` is a trait this
//! binary does not yet implement against a concrete event source.

use clap::Parser;

use svinit::cli::SvinitArgs;
use svinit::{DirectoryLoader, LoadError, ServiceSet};

fn main() {
    svinit::logging::init_logging();
    let args = SvinitArgs::parse();

    let mut set = ServiceSet::with_loader(Box::new(DirectoryLoader::new(&args.services_dir)));

    let mut failed = false;
    for name in args.services_to_start() {
        match set.start_service(&name) {
            Ok(()) => log::info!("requested start of {name:?}"),
            Err(LoadError::NotFound(_)) => {
                log::error!("no such service: {name:?}");
                failed = true;
            }
            Err(LoadError::LoadFailed { name, description }) => {
                log::error!("failed to load {name:?}: {description}");
                failed = true;
            }
        }
    }

    if failed {
        std::process::exit(1);
    }

    log::info!(
        "{} service(s) active; control socket would be {}",
        set.count_active_services(),
        args.socket_path().display()
    );

    // A real daemon now hands `set` to an `EventReactor` implementation and
    // runs forever, driving `ServiceSet::process_queues` after every
    // callback. That reactor is this crate's one unimplemented seam.
}
