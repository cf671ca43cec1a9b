//! Export resolution for hook targets

use std::ffi::{c_void, CString};
use std::ptr::NonNull;

use crate::error::ResolveError;

/// Resolves `module!symbol` identities to code addresses
///
/// With `load_missing` set, a module that is not yet mapped into the process
/// is loaded on demand. Otherwise only already-loaded modules are searched.
#[derive(Debug, Clone, Copy)]
pub struct ExportResolver {
    load_missing: bool,
}

impl Default for ExportResolver {
    fn default() -> Self {
        Self { load_missing: true }
    }
}

impl ExportResolver {
    /// Resolver that loads missing modules on demand
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver that only searches modules already loaded in the process
    pub fn loaded_only() -> Self {
        Self {
            load_missing: false,
        }
    }

    /// Look up the address of `symbol` exported by `module`
    ///
    /// # Arguments
    /// * `module` - Module name without path (e.g., "user32", "xinput1_3")
    /// * `symbol` - Exported symbol name (e.g., "PeekMessageW")
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn resolve(&self, module: &str, symbol: &str) -> Result<NonNull<c_void>, ResolveError> {
        let module_name =
            CString::new(module).map_err(|_| ResolveError::InvalidName(module.to_string()))?;
        let symbol_name =
            CString::new(symbol).map_err(|_| ResolveError::InvalidName(symbol.to_string()))?;

        let handle = self.module_handle(module, &module_name)?;
        let address = unsafe { lookup_export(handle, &symbol_name) };

        match NonNull::new(address) {
            Some(addr) => {
                tracing::debug!("Resolved {}!{} at {:p}", module, symbol, addr.as_ptr());
                Ok(addr)
            }
            None => Err(ResolveError::ExportNotFound {
                module: module.to_string(),
                symbol: symbol.to_string(),
            }),
        }
    }

    #[cfg(windows)]
    fn module_handle(&self, module: &str, _name: &CString) -> Result<*mut c_void, ResolveError> {
        use windows::core::PCWSTR;
        use windows::Win32::System::LibraryLoader::{GetModuleHandleW, LoadLibraryW};

        let wide: Vec<u16> = module.encode_utf16().chain(std::iter::once(0)).collect();

        match unsafe { GetModuleHandleW(PCWSTR(wide.as_ptr())) } {
            Ok(handle) => Ok(handle.0),
            Err(_) if self.load_missing => unsafe { LoadLibraryW(PCWSTR(wide.as_ptr())) }
                .map(|handle| handle.0)
                .map_err(|e| ResolveError::ModuleNotFound(format!("{}: {}", module, e))),
            Err(e) => Err(ResolveError::ModuleNotFound(format!("{}: {}", module, e))),
        }
    }

    #[cfg(unix)]
    fn module_handle(&self, module: &str, name: &CString) -> Result<*mut c_void, ResolveError> {
        let flags = if self.load_missing {
            libc::RTLD_LAZY
        } else {
            libc::RTLD_LAZY | libc::RTLD_NOLOAD
        };

        // The handle is never closed: hooked modules stay mapped for the process lifetime
        let handle = unsafe { libc::dlopen(name.as_ptr(), flags) };
        if handle.is_null() {
            Err(ResolveError::ModuleNotFound(module.to_string()))
        } else {
            Ok(handle)
        }
    }
}

#[cfg(windows)]
unsafe fn lookup_export(module: *mut c_void, symbol: &CString) -> *mut c_void {
    use windows::core::PCSTR;
    use windows::Win32::Foundation::HMODULE;
    use windows::Win32::System::LibraryLoader::GetProcAddress;

    GetProcAddress(HMODULE(module), PCSTR(symbol.as_ptr() as *const u8))
        .map(|f| f as usize as *mut c_void)
        .unwrap_or(std::ptr::null_mut())
}

#[cfg(unix)]
unsafe fn lookup_export(module: *mut c_void, symbol: &CString) -> *mut c_void {
    libc::dlsym(module, symbol.as_ptr())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_module() {
        let err = ExportResolver::new()
            .resolve("camhook_no_such_module_xyz", "Anything")
            .unwrap_err();
        assert!(matches!(err, ResolveError::ModuleNotFound(_)));
    }

    #[test]
    fn test_missing_module_loaded_only() {
        let err = ExportResolver::loaded_only()
            .resolve("camhook_no_such_module_xyz", "Anything")
            .unwrap_err();
        assert!(matches!(err, ResolveError::ModuleNotFound(_)));
    }

    #[test]
    fn test_interior_nul_rejected() {
        let err = ExportResolver::new()
            .resolve("user32", "Peek\0MessageW")
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidName(_)));
    }

    #[test]
    fn test_error_display() {
        let err = ResolveError::ExportNotFound {
            module: "user32".into(),
            symbol: "GetMessageQ".into(),
        };
        assert_eq!(err.to_string(), "Export not found: user32!GetMessageQ");
    }
}
