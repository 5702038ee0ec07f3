/*
 * SPDX-FileCopyrightText: 2023 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Collection of common functions we use throughout the codebase

mod mmap_helper;
pub use mmap_helper::*;

use anyhow::{bail, Context, Result};
use std::path::Path;

/// Calls `cb` on every regular file under `path`, regular files of a
/// directory first (byte-alphabetical), then its subdirectories
/// (byte-alphabetical, recursively). Symbolic links are ignored.
///
/// The callback returns whether the walk should continue; `walk_dir` reports
/// the same.
pub fn walk_dir<F>(path: &Path, cb: &mut F) -> Result<bool>
where
    F: FnMut(&Path) -> Result<bool>,
{
    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for entry in
        std::fs::read_dir(path).with_context(|| format!("Cannot scan {}", path.display()))?
    {
        let entry = entry.with_context(|| format!("Cannot scan {}", path.display()))?;
        let file_type = entry
            .file_type()
            .with_context(|| format!("Cannot stat {}", entry.path().display()))?;
        if file_type.is_file() {
            files.push(entry.path());
        } else if file_type.is_dir() {
            dirs.push(entry.path());
        }
    }
    files.sort();
    dirs.sort();
    for file in files {
        if !cb(&file)? {
            return Ok(false);
        }
    }
    for dir in dirs {
        if !walk_dir(&dir, cb)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Lexically normalizes a path: collapses `//`, drops `.` components and
/// resolves `..` against the preceding component.
pub fn path_normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for comp in path.split('/') {
        match comp {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            comp => parts.push(comp),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Splits a record file name `<prefix>--<name>[-<version>].txt` into its
/// parts. Returns `None` if the name does not have the record shape.
pub fn split_key(name: &str) -> Option<(&str, &str, Option<u32>)> {
    let rest = name.strip_suffix(".txt")?;
    let (prefix, name_ver) = rest.split_once("--")?;
    if prefix.is_empty() || name_ver.is_empty() {
        return None;
    }
    // Names are C identifiers, so any dash separates the version suffix.
    match name_ver.rsplit_once('-') {
        Some((base, ver))
            if !base.is_empty() && !ver.is_empty() && ver.bytes().all(|b| b.is_ascii_digit()) =>
        {
            Some((prefix, base, ver.parse().ok()))
        }
        _ => Some((prefix, name_ver, None)),
    }
}

/// Gets the human-readable type of a symbol from the name of its record
/// file, e.g. `struct--foo-1.txt` becomes `struct foo`.
pub fn filenametotype(path: &str) -> Result<String> {
    let base = path.rsplit('/').next().unwrap_or(path);
    let Some((prefix, name, _)) = split_key(base) else {
        bail!("Unexpected file name: {}", path);
    };
    match prefix {
        "typedef" | "func" | "var" => Ok(name.to_string()),
        "struct" | "union" | "enum" => Ok(format!("{} {}", prefix, name)),
        _ => bail!("Unexpected file prefix: {}", prefix),
    }
}

/// Whether this file holds a non-canonical version of a symbol, i.e. its
/// name carries a `-<version>` suffix.
pub fn is_duplicate(path: &Path) -> bool {
    let Some(base) = path.file_name().and_then(|s| s.to_str()) else {
        return false;
    };
    let Some(rest) = base.strip_suffix(".txt") else {
        return false;
    };
    let Some((prefix, name_ver)) = rest.split_once("--") else {
        return false;
    };
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_lowercase()) {
        return false;
    }
    let Some((name, ver)) = name_ver.split_once('-') else {
        return false;
    };
    !name.is_empty()
        && !name.contains('.')
        && !ver.is_empty()
        && ver.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn split_key_versions() {
        assert_eq!(
            split_key("struct--foo.txt"),
            Some(("struct", "foo", None))
        );
        assert_eq!(
            split_key("struct--foo-2.txt"),
            Some(("struct", "foo", Some(2)))
        );
        assert_eq!(split_key("README.md"), None);
    }

    #[test]
    fn filenametotype_decodes() {
        assert_eq!(
            filenametotype("<declarations>/struct--foo.txt").unwrap(),
            "struct foo"
        );
        assert_eq!(filenametotype("typedef--u32.txt").unwrap(), "u32");
        assert_eq!(filenametotype("union--bar-1.txt").unwrap(), "union bar");
        assert_eq!(filenametotype("func--baz.txt").unwrap(), "baz");
        assert!(filenametotype("module--baz.txt").is_err());
    }

    #[test]
    fn duplicate_detection() {
        assert!(is_duplicate(Path::new("out/struct--foo-1.txt")));
        assert!(!is_duplicate(Path::new("out/struct--foo.txt")));
        assert!(!is_duplicate(Path::new("out/struct--foo-bar-x.txt")));
    }

    #[test]
    fn normalization() {
        assert_eq!(path_normalize("/a/b/../c//d/./e"), "/a/c/d/e");
        assert_eq!(path_normalize("a/./b"), "a/b");
    }
}
