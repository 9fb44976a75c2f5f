//! # gridmount-fuse
//!
//! FUSE adapter for gridmount.
//!
//! Maps kernel inode numbers to virtual paths, routes each supported call to
//! a [`gridmount_kernel::VfsOps`] implementation, and answers everything
//! else from the filesystem's dispositions.

pub mod dispatch;
pub mod errno;
pub mod fs;
pub mod inode;

pub use dispatch::{Dispatcher, ListingEntry};
pub use errno::to_errno;
pub use fs::GridFuse;
pub use inode::{InodeTable, ROOT_INO};

use std::path::Path;

use fuser::MountOption;
use gridmount_kernel::VfsOps;

/// Name the mount shows in the mount table.
pub const FS_NAME: &str = "gridfs";

/// Mount options used for every gridmount mount.
pub fn mount_options(allow_other: bool) -> Vec<MountOption> {
    let mut options = vec![
        MountOption::FSName(FS_NAME.to_string()),
        MountOption::Subtype("gridmount".to_string()),
    ];
    if cfg!(target_os = "macos") {
        options.push(MountOption::CUSTOM(format!("volname={FS_NAME}")));
    }
    if allow_other {
        options.push(MountOption::AllowOther);
    }
    options
}

/// Mount `vfs` at `mount_point` and serve requests until unmounted.
pub fn mount<V: VfsOps>(vfs: V, mount_point: &Path, allow_other: bool) -> std::io::Result<()> {
    let fs = GridFuse::new(vfs)?;
    fuser::mount2(fs, mount_point, &mount_options(allow_other))
}
