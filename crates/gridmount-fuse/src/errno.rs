//! VFS error → errno mapping.

use gridmount_kernel::VfsError;
use libc::c_int;

/// Platform error code reported to the kernel for `err`.
pub fn to_errno(err: &VfsError) -> c_int {
    match err {
        VfsError::NotFound(_) => libc::ENOENT,
        VfsError::InvalidArgument(_) => libc::EINVAL,
        VfsError::Unsupported(_) => libc::ENOSYS,
        VfsError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
        VfsError::StoreUnavailable(_) | VfsError::PartialRename { .. } | VfsError::Store(_) => {
            libc::EIO
        }
    }
}
