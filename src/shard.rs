//! Random three-level shard directories.
//!
//! Uploads are spread over `0/0/0` … `9/9/9` (1000 leaf directories) so no
//! single directory grows unbounded. A shard is created lazily the first time
//! it is picked and reused afterwards.

use rand::Rng;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Number of nested levels.
pub const SHARD_LEVELS: usize = 3;

/// A shard: one decimal digit per level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shard([u8; SHARD_LEVELS]);

impl Shard {
    /// Pick every level uniformly from `0..=9`.
    pub fn random(rng: &mut impl Rng) -> Self {
        let mut digits = [0u8; SHARD_LEVELS];
        for digit in &mut digits {
            *digit = rng.gen_range(0..=9);
        }
        Self(digits)
    }

    pub fn digits(&self) -> [u8; SHARD_LEVELS] {
        self.0
    }

    /// `/`-separated form used inside stored paths, e.g. `3/7/1`.
    pub fn relative(&self) -> String {
        self.to_string()
    }

    /// Directory of this shard under `root`, joined with the OS separator.
    pub fn dir(&self, root: &Path) -> PathBuf {
        self.0
            .iter()
            .fold(root.to_path_buf(), |acc, d| acc.join(d.to_string()))
    }
}

impl fmt::Display for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{a}/{b}/{c}")
    }
}

/// Pick a random shard under `root` and make sure its directory exists.
///
/// Creation is recursive and tolerates the directory appearing concurrently,
/// so two callers racing for the same shard both succeed.
pub fn allocate(root: &Path, mode: u32, rng: &mut impl Rng) -> io::Result<Shard> {
    let shard = Shard::random(rng);
    ensure_dir(root, &shard, mode)?;
    Ok(shard)
}

/// Create the shard directory (and any missing parents) if it is absent.
pub fn ensure_dir(root: &Path, shard: &Shard, mode: u32) -> io::Result<PathBuf> {
    let dir = shard.dir(root);
    if dir.is_dir() {
        return Ok(dir);
    }

    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    builder.create(&dir)?;
    debug!(shard = %shard, dir = %dir.display(), "created shard directory");

    open_permissions(root, shard, mode);
    Ok(dir)
}

/// Widen permissions on every shard level to `mode`, undoing the umask.
///
/// A level owned by another process may refuse the change; that is logged
/// and ignored since the directory is usable either way.
#[cfg(unix)]
fn open_permissions(root: &Path, shard: &Shard, mode: u32) {
    use std::os::unix::fs::PermissionsExt;

    let mut level = root.to_path_buf();
    for digit in shard.digits() {
        level.push(digit.to_string());
        if let Err(e) = std::fs::set_permissions(&level, std::fs::Permissions::from_mode(mode)) {
            warn!(dir = %level.display(), error = %e, "could not set shard permissions");
        }
    }
}

#[cfg(not(unix))]
fn open_permissions(_root: &Path, _shard: &Shard, _mode: u32) {}
