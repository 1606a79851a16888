//! Native plugin loading via `libloading`. Each configured plugin resolves
//! a `create_<name>`/`destroy_<name>` pair of C-linkage symbols; the handle
//! calls the destroyer on drop, the same cleanup-on-drop discipline the
//! CGI executor uses for its child process.

use crate::prelude::*;
use libloading::{Library, Symbol};
use std::os::raw::c_void;

type CreateFn = unsafe extern "C" fn() -> *mut c_void;
type DestroyFn = unsafe extern "C" fn(*mut c_void);

/// Owns a loaded plugin's instance pointer and the library it came from.
/// `destroy` runs before `library` is dropped so the destructor symbol is
/// still resolvable when it's called.
pub struct PluginHandle {
    name: String,
    instance: *mut c_void,
    destroy: DestroyFn,
    _library: Library,
}

impl PluginHandle {
    pub fn instance_ptr(&self) -> *mut c_void {
        self.instance
    }
}

impl Drop for PluginHandle {
    fn drop(&mut self) {
        unsafe {
            (self.destroy)(self.instance);
        }
        cserve_log::debug!("unloaded plugin {}", self.name);
    }
}

pub struct PluginLoader {
    handles: Vec<PluginHandle>,
}

impl PluginLoader {
    pub fn new() -> Self {
        PluginLoader { handles: Vec::new() }
    }

    /// Loads `path` and resolves `create_<name>`/`destroy_<name>`. The
    /// library is kept alive for the handle's lifetime — dropping it
    /// before the instance would leave `destroy` pointing at unmapped
    /// memory.
    pub fn load(&mut self, name: &str, path: &Path) -> Result<()> {
        unsafe {
            let library = Library::new(path)
                .map_err(|e| CserveError::PluginError(format!("loading {}: {e}", path.display())))?;

            let create: Symbol<CreateFn> = library
                .get(format!("create_{name}\0").as_bytes())
                .map_err(|e| CserveError::PluginError(format!("missing create_{name}: {e}")))?;
            let destroy: Symbol<DestroyFn> = library
                .get(format!("destroy_{name}\0").as_bytes())
                .map_err(|e| CserveError::PluginError(format!("missing destroy_{name}: {e}")))?;

            let instance = create();
            if instance.is_null() {
                return Err(CserveError::PluginError(format!("{name} failed to initialize")));
            }

            let destroy = *destroy;
            self.handles.push(PluginHandle {
                name: name.to_string(),
                instance,
                destroy,
                _library: library,
            });
        }
        cserve_log::info!("loaded plugin {name} from {}", path.display());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&PluginHandle> {
        self.handles.iter().find(|h| h.name == name)
    }
}

impl Default for PluginLoader {
    fn default() -> Self {
        Self::new()
    }
}
