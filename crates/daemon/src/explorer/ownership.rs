//! Platform-specific ownership lookup.
//!
//! Everything that differs between Unix and Windows when turning OS metadata
//! into a [`FileStats`](super::metadata::FileStats) record lives here. The
//! rest of the explorer only sees [`RawStat`] and [`OwnershipResolver`].

use std::fmt;
use std::fs::Metadata;
use std::io;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(not(any(unix, windows)))]
compile_error!("burrow supports Unix and Windows hosts only");

/// Raw numeric metadata of an entry, as read from the OS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawStat {
    /// Owner id (0 on Windows).
    pub uid: u32,
    /// Group id (0 on Windows).
    pub gid: u32,
    /// Size in bytes.
    pub size: u64,
    /// Inode change time on Unix, creation time on Windows. Epoch seconds.
    pub created: f64,
    /// Last modification time. Epoch seconds.
    pub modified: f64,
}

/// Maps raw ownership data to display names.
pub trait OwnershipResolver: Send + Sync + fmt::Debug {
    /// Display name of the owner of `path`.
    fn owner_name(&self, path: &Path, stat: &RawStat) -> io::Result<String>;

    /// Display name of the group of `path`, `None` where groups do not exist.
    fn group_name(&self, path: &Path, stat: &RawStat) -> io::Result<Option<String>>;
}

/// Read a [`RawStat`] out of (symlink-following) metadata.
pub fn raw_stat(metadata: &Metadata) -> RawStat {
    let modified = metadata.modified().map(epoch_seconds).unwrap_or(0.0);

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        RawStat {
            uid: metadata.uid(),
            gid: metadata.gid(),
            size: metadata.size(),
            created: metadata.ctime() as f64 + metadata.ctime_nsec() as f64 / 1e9,
            modified,
        }
    }

    #[cfg(windows)]
    {
        RawStat {
            uid: 0,
            gid: 0,
            size: metadata.len(),
            created: metadata.created().map(epoch_seconds).unwrap_or(modified),
            modified,
        }
    }
}

/// Seconds since the Unix epoch, negative for earlier instants.
pub(crate) fn epoch_seconds(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs_f64(),
        Err(before) => -before.duration().as_secs_f64(),
    }
}

/// Resolver backed by the system user and group databases.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixOwnership;

#[cfg(unix)]
impl OwnershipResolver for PosixOwnership {
    fn owner_name(&self, _path: &Path, stat: &RawStat) -> io::Result<String> {
        use nix::unistd::{Uid, User};

        match User::from_uid(Uid::from_raw(stat.uid)) {
            Ok(Some(user)) => Ok(user.name),
            // Ids without a database entry are shown numerically, like `ls -l`.
            Ok(None) => Ok(stat.uid.to_string()),
            Err(errno) => Err(io::Error::from(errno)),
        }
    }

    fn group_name(&self, _path: &Path, stat: &RawStat) -> io::Result<Option<String>> {
        use nix::unistd::{Gid, Group};

        match Group::from_gid(Gid::from_raw(stat.gid)) {
            Ok(Some(group)) => Ok(Some(group.name)),
            Ok(None) => Ok(Some(stat.gid.to_string())),
            Err(errno) => Err(io::Error::from(errno)),
        }
    }
}

/// Resolver that reads the owning account from the file's security
/// descriptor. Windows has no group concept here.
#[cfg(windows)]
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsOwnership;

#[cfg(windows)]
impl OwnershipResolver for WindowsOwnership {
    fn owner_name(&self, path: &Path, _stat: &RawStat) -> io::Result<String> {
        security::owner_account(path)
    }

    fn group_name(&self, _path: &Path, _stat: &RawStat) -> io::Result<Option<String>> {
        Ok(None)
    }
}

#[cfg(windows)]
mod security {
    use std::io;
    use std::os::windows::ffi::OsStrExt;
    use std::path::Path;
    use std::ptr;

    use windows_sys::Win32::Foundation::{LocalFree, ERROR_SUCCESS};
    use windows_sys::Win32::Security::Authorization::{GetNamedSecurityInfoW, SE_FILE_OBJECT};
    use windows_sys::Win32::Security::{
        LookupAccountSidW, OWNER_SECURITY_INFORMATION, PSECURITY_DESCRIPTOR, PSID, SID_NAME_USE,
    };

    pub(super) fn owner_account(path: &Path) -> io::Result<String> {
        let wide: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();
        let mut owner: PSID = ptr::null_mut();
        let mut descriptor: PSECURITY_DESCRIPTOR = ptr::null_mut();

        // SAFETY: `wide` is NUL-terminated and outlives the call; the out
        // pointers are valid locals.
        let status = unsafe {
            GetNamedSecurityInfoW(
                wide.as_ptr(),
                SE_FILE_OBJECT,
                OWNER_SECURITY_INFORMATION,
                &mut owner,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                &mut descriptor,
            )
        };
        if status != ERROR_SUCCESS {
            return Err(io::Error::from_raw_os_error(status as i32));
        }

        let account = lookup_account(owner);

        // SAFETY: `descriptor` was allocated by GetNamedSecurityInfoW and
        // `owner` points into it; neither is used after this.
        unsafe {
            LocalFree(descriptor as _);
        }
        account
    }

    fn lookup_account(sid: PSID) -> io::Result<String> {
        let mut name_len: u32 = 0;
        let mut domain_len: u32 = 0;
        let mut sid_use: SID_NAME_USE = 0;

        // First call only reports the buffer sizes.
        // SAFETY: null buffers with zero lengths are the documented size query.
        unsafe {
            LookupAccountSidW(
                ptr::null(),
                sid,
                ptr::null_mut(),
                &mut name_len,
                ptr::null_mut(),
                &mut domain_len,
                &mut sid_use,
            );
        }
        if name_len == 0 {
            return Err(io::Error::last_os_error());
        }

        let mut name = vec![0u16; name_len as usize];
        let mut domain = vec![0u16; domain_len.max(1) as usize];
        // SAFETY: buffers are sized from the query above.
        let ok = unsafe {
            LookupAccountSidW(
                ptr::null(),
                sid,
                name.as_mut_ptr(),
                &mut name_len,
                domain.as_mut_ptr(),
                &mut domain_len,
                &mut sid_use,
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(String::from_utf16_lossy(&name[..name_len as usize]))
    }
}

/// The resolver for the platform this binary was built for.
///
/// Chosen once per process and shared.
pub fn native_resolver() -> Arc<dyn OwnershipResolver> {
    static NATIVE: OnceLock<Arc<dyn OwnershipResolver>> = OnceLock::new();

    NATIVE
        .get_or_init(|| {
            #[cfg(unix)]
            let resolver: Arc<dyn OwnershipResolver> = Arc::new(PosixOwnership);
            #[cfg(windows)]
            let resolver: Arc<dyn OwnershipResolver> = Arc::new(WindowsOwnership);
            resolver
        })
        .clone()
}
