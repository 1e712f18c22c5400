//! Plain-text persistence for prefix overrides and the link directory.
//!
//! Both stores rewrite their file through a temp file + rename so a crash mid-write
//! leaves either the old or the new contents on disk.

use std::{fs, io::Write, path::Path};

use crate::Result;

pub mod links;
pub mod prefix;

pub use links::{FileLinkStore, Link, LinkCategory, LinkStore};
pub use prefix::{JsonPrefixStore, PrefixChange, PrefixResolver, PrefixStore};

/// Atomically replace `path` with `contents`.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(format!(".tmp-{}", std::process::id()));
    let tmp = std::path::PathBuf::from(tmp_name);

    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(contents)?;
        f.sync_all()?;
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
