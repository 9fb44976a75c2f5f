//! FUSE filesystem implementation.
//!
//! Implements the fuser `Filesystem` trait on top of a [`Dispatcher`].
//! Each callback blocks on the dispatcher using a private Tokio runtime.

use std::ffi::OsStr;
use std::time::Duration;

use fuser::{
    FileAttr as FuseAttr, FileType as FuseFileType, Filesystem, KernelConfig, ReplyAttr,
    ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs,
    ReplyWrite, ReplyXattr, Request,
};
use gridmount_kernel::{CallerContext, Disposition, FileAttr, FileType, FsOperation, VfsOps};
use libc::c_int;
use tokio::runtime::Runtime;
use tracing::{debug, error, info, trace, warn};

use crate::dispatch::Dispatcher;
use crate::errno::to_errno;

/// Attribute and entry cache lifetime handed to the kernel.
///
/// The store can change underneath us, so keep it short.
pub const TTL: Duration = Duration::from_secs(1);

const GENERATION: u64 = 0;

/// Block size reported in attributes.
const BLOCK_SIZE: u32 = 4096;

/// Convert synthesized attributes to the kernel's shape.
pub fn to_fuse_attr(ino: u64, attr: &FileAttr) -> FuseAttr {
    FuseAttr {
        ino,
        size: attr.size,
        blocks: attr.size.div_ceil(512),
        atime: attr.atime,
        mtime: attr.mtime,
        ctime: attr.ctime,
        crtime: attr.ctime,
        kind: to_fuse_kind(attr.kind),
        perm: attr.perm as u16,
        nlink: attr.nlink,
        uid: attr.uid,
        gid: attr.gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}

fn to_fuse_kind(kind: FileType) -> FuseFileType {
    match kind {
        FileType::File => FuseFileType::RegularFile,
        FileType::Directory => FuseFileType::Directory,
    }
}

fn caller(req: &Request<'_>) -> CallerContext {
    CallerContext::new(req.uid(), req.gid(), req.pid())
}

/// Mountable filesystem over any [`VfsOps`].
pub struct GridFuse<V> {
    dispatch: Dispatcher<V>,
    runtime: Runtime,
}

impl<V: VfsOps> GridFuse<V> {
    /// Wrap `vfs`, creating the runtime used to drive it.
    pub fn new(vfs: V) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("gridmount-io")
            .enable_all()
            .build()?;
        Ok(Self {
            dispatch: Dispatcher::new(vfs),
            runtime,
        })
    }

    /// Errno to answer with if `op` is not handled, or `None` to proceed.
    fn refused(&self, op: FsOperation) -> Option<c_int> {
        match self.dispatch.disposition(op) {
            Disposition::Unsupported => {
                debug!(op = ?op, "unsupported operation");
                Some(libc::ENOSYS)
            }
            Disposition::Supported | Disposition::NoOp => None,
        }
    }

    fn reply_empty(&self, op: FsOperation, reply: ReplyEmpty) {
        match self.refused(op) {
            Some(code) => reply.error(code),
            None => reply.ok(),
        }
    }
}

fn utf8(name: &OsStr) -> Result<&str, c_int> {
    name.to_str().ok_or(libc::EINVAL)
}

impl<V: VfsOps> Filesystem for GridFuse<V> {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        info!("filesystem mounted");
        Ok(())
    }

    fn destroy(&mut self) {
        info!("filesystem unmounted");
    }

    fn lookup(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let name = match utf8(name) {
            Ok(name) => name,
            Err(code) => {
                reply.error(code);
                return;
            }
        };
        trace!(parent = parent, name = %name, "lookup");

        let ctx = caller(req);
        match self.runtime.block_on(self.dispatch.lookup(parent, name, &ctx)) {
            Ok((ino, attr)) => reply.entry(&TTL, &to_fuse_attr(ino, &attr), GENERATION),
            Err(e) => {
                trace!(parent = parent, name = %name, error = %e, "lookup failed");
                reply.error(to_errno(&e));
            }
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        trace!(inode = ino, nlookup = nlookup, "forget");
        self.dispatch.forget(ino, nlookup);
    }

    fn getattr(&mut self, req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        trace!(inode = ino, "getattr");

        let ctx = caller(req);
        match self.runtime.block_on(self.dispatch.getattr(ino, &ctx)) {
            Ok(attr) => reply.attr(&TTL, &to_fuse_attr(ino, &attr)),
            Err(e) => reply.error(to_errno(&e)),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        trace!(inode = ino, "open");
        match self.refused(FsOperation::Open) {
            Some(code) => reply.error(code),
            None => reply.opened(0, 0),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        trace!(inode = ino, offset = offset, size = size, "read");

        match self.runtime.block_on(self.dispatch.read(ino, offset, size)) {
            Ok(data) => reply.data(&data),
            Err(e) => {
                if !e.is_not_found() {
                    error!(inode = ino, error = %e, "read failed");
                }
                reply.error(to_errno(&e));
            }
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        self.reply_empty(FsOperation::Release, reply);
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        trace!(inode = ino, "opendir");
        match self.refused(FsOperation::OpenDir) {
            Some(code) => reply.error(code),
            None => reply.opened(0, 0),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        trace!(inode = ino, offset = offset, "readdir");

        let entries = match self.runtime.block_on(self.dispatch.readdir(ino)) {
            Ok(entries) => entries,
            Err(e) => {
                reply.error(to_errno(&e));
                return;
            }
        };

        let skip = usize::try_from(offset).unwrap_or(0);
        for (i, entry) in entries.iter().enumerate().skip(skip) {
            // add returns true once the reply buffer is full
            if reply.add(entry.ino, (i + 1) as i64, to_fuse_kind(entry.kind), &entry.name) {
                break;
            }
        }
        reply.ok();
    }

    fn releasedir(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        reply: ReplyEmpty,
    ) {
        self.reply_empty(FsOperation::ReleaseDir, reply);
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let (name, newname) = match (utf8(name), utf8(newname)) {
            (Ok(name), Ok(newname)) => (name, newname),
            _ => {
                reply.error(libc::EINVAL);
                return;
            }
        };
        trace!(parent = parent, name = %name, newparent = newparent, newname = %newname, "rename");

        match self
            .runtime
            .block_on(self.dispatch.rename(parent, name, newparent, newname))
        {
            Ok(()) => reply.ok(),
            Err(e) => {
                if !e.is_not_found() {
                    warn!(name = %name, newname = %newname, error = %e, "rename failed");
                }
                reply.error(to_errno(&e));
            }
        }
    }

    fn flush(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        self.reply_empty(FsOperation::Flush, reply);
    }

    fn fsync(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _datasync: bool, reply: ReplyEmpty) {
        self.reply_empty(FsOperation::Fsync, reply);
    }

    fn access(&mut self, _req: &Request<'_>, _ino: u64, _mask: i32, reply: ReplyEmpty) {
        self.reply_empty(FsOperation::Access, reply);
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        match self.refused(FsOperation::StatFs) {
            Some(code) => reply.error(code),
            None => reply.statfs(0, 0, 0, 0, 0, BLOCK_SIZE, 255, BLOCK_SIZE),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        _offset: i64,
        _data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        trace!(inode = ino, "write");
        reply.error(self.refused(FsOperation::Write).unwrap_or(libc::EROFS));
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        _parent: u64,
        _name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        reply.error(self.refused(FsOperation::Create).unwrap_or(libc::EROFS));
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        _parent: u64,
        _name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        reply.error(self.refused(FsOperation::Mkdir).unwrap_or(libc::EROFS));
    }

    fn unlink(&mut self, _req: &Request<'_>, _parent: u64, _name: &OsStr, reply: ReplyEmpty) {
        reply.error(self.refused(FsOperation::Unlink).unwrap_or(libc::EROFS));
    }

    fn rmdir(&mut self, _req: &Request<'_>, _parent: u64, _name: &OsStr, reply: ReplyEmpty) {
        reply.error(self.refused(FsOperation::Rmdir).unwrap_or(libc::EROFS));
    }

    fn getxattr(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _name: &OsStr,
        _size: u32,
        reply: ReplyXattr,
    ) {
        reply.error(self.refused(FsOperation::GetXattr).unwrap_or(libc::ENODATA));
    }

    fn listxattr(&mut self, _req: &Request<'_>, _ino: u64, _size: u32, reply: ReplyXattr) {
        match self.refused(FsOperation::ListXattr) {
            Some(code) => reply.error(code),
            None => reply.size(0),
        }
    }

    fn removexattr(&mut self, _req: &Request<'_>, _ino: u64, _name: &OsStr, reply: ReplyEmpty) {
        self.reply_empty(FsOperation::RemoveXattr, reply);
    }

    // setattr, setxattr, symlink and link fall through to the fuser
    // defaults, which answer ENOSYS.
}
