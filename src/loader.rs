//! Pluggable service-record source.

use std::path::{Path, PathBuf};

use crate::behavior::{InternalBehavior, ServiceBehavior};
use crate::error::LoadError;
use crate::service::ServiceRecord;

/// Source of service records by name, consulted lazily the first time a
/// service is referenced that isn't already registered in the set.
///
/// Service-description file *parsing* is out of scope for this crate; a real
/// deployment supplies a `Loader` that understands its description format.
/// [`DirectoryLoader`] below is the trivial stand-in used by the `svinit`
/// binary so it runs out of the box.
pub trait Loader {
    fn load(&self, name: &str) -> Result<ServiceRecord, LoadError>;
}

/// Default [`Loader`]: a service named `foo` exists iff `<services_dir>/foo`
/// exists on disk. No attempt is made to read or parse the file's contents;
/// every service it produces is `Internal`-typed. This only exists so the
/// engine has *something* behind the trait.
pub struct DirectoryLoader {
    services_dir: PathBuf,
}

impl DirectoryLoader {
    pub fn new(services_dir: impl Into<PathBuf>) -> Self {
        DirectoryLoader {
            services_dir: services_dir.into(),
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.services_dir.join(name)
    }
}

impl Loader for DirectoryLoader {
    fn load(&self, name: &str) -> Result<ServiceRecord, LoadError> {
        let path = self.path_for(name);
        if !Path::new(&path).exists() {
            return Err(LoadError::NotFound(name.to_string()));
        }
        log::debug!("loaded service {name:?} from {}", path.display());
        Ok(ServiceRecord::new(name, Box::new(InternalBehavior) as Box<dyn ServiceBehavior>))
    }
}
