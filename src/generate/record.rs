/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Records and the keyed record database.
//!
//! A record binds one top-level type to its on-disk identity. The database
//! resolves key collisions by first trying to unify the two graphs (the
//! declaration/definition case) and otherwise bumping the version suffix of
//! the incoming record until a free or mergeable key is found.

use crate::objects::{obj_merge, print_tree, DisplayOpts, Obj, CU_NOT_TRACKED};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;

/// Source location a type was extracted from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub file: String,
    pub line: u64,
}

/// One on-disk type description: key, provenance and type graph.
#[derive(Debug, Clone)]
pub struct Record {
    /// Relative path of the record file, including the `.txt` suffix and
    /// the version suffix, if any.
    pub key: String,
    /// 0 for the first record of a name, then 1, 2, ...
    pub version: u32,
    /// Key without suffixes, filled on the first version bump.
    base: Option<String>,
    /// Compilation unit name, tracked only under `-g`.
    pub cu: Option<String>,
    pub origin: Origin,
    /// Containment path from the exported symbol down to this record,
    /// outermost first; filled only under `-g`.
    pub stack: Vec<String>,
    pub obj: Obj,
}

impl Record {
    pub fn new(key: String, cu: Option<String>, origin: Origin, stack: Vec<String>, obj: Obj) -> Self {
        Record {
            key,
            version: 0,
            base: None,
            cu,
            origin,
            stack,
            obj,
        }
    }

    /// Moves this record to the next version of its key.
    fn inc_version(&mut self) {
        if self.version == 0 {
            self.base = Some(
                self.key
                    .strip_suffix(".txt")
                    .unwrap_or(&self.key)
                    .to_string(),
            );
        }
        self.version += 1;
        let base = self.base.as_deref().unwrap_or(&self.key);
        self.key = format!("{}-{}.txt", base, self.version);
    }

    /// Absorbs `other` if the two records describe the same type and differ
    /// at most in declaration placeholders.
    fn merge_from(&mut self, other: &Record) -> bool {
        if self.origin != other.origin {
            return false;
        }
        match obj_merge(&self.obj, &other.obj) {
            Some(merged) => {
                self.obj = merged;
                true
            }
            None => false,
        }
    }

    /// The full textual form of this record.
    pub fn render(&self) -> String {
        let mut out = String::new();
        writeln!(
            out,
            "CU \"{}\"",
            self.cu.as_deref().unwrap_or(CU_NOT_TRACKED)
        )
        .unwrap();
        writeln!(out, "File {}:{}", self.origin.file, self.origin.line).unwrap();
        for entry in &self.stack {
            writeln!(out, "-> \"{}\"", entry).unwrap();
        }
        out.push_str(&print_tree(&self.obj, "", &DisplayOpts::default()));
        out
    }

    /// Writes this record to `dir/<key>`, creating intermediate directories.
    pub fn dump(&self, dir: &Path) -> Result<()> {
        let path = dir.join(&self.key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create {}", parent.display()))?;
        }
        std::fs::write(&path, self.render())
            .with_context(|| format!("Cannot create record file {}", path.display()))
    }
}

/// Store of finalized records, keyed by record key.
#[derive(Debug, Default)]
pub struct RecordDb {
    records: BTreeMap<String, Record>,
}

impl RecordDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `rec`, merging or versioning on key collision, and returns
    /// the key the record ended up stored (or absorbed) under.
    pub fn insert(&mut self, mut rec: Record) -> String {
        loop {
            match self.records.get_mut(&rec.key) {
                None => {
                    let key = rec.key.clone();
                    self.records.insert(key.clone(), rec);
                    return key;
                }
                Some(existing) => {
                    if existing.merge_from(&rec) {
                        return existing.key.clone();
                    }
                    // Two different types of the same name; bump the version.
                    rec.inc_version();
                }
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Writes every record under `dir`, in key order.
    pub fn dump_all(&self, dir: &Path) -> Result<()> {
        for rec in self.records.values() {
            rec.dump(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn record_with(obj: Obj) -> Record {
        Record::new(
            "struct--foo.txt".to_string(),
            None,
            Origin {
                file: "include/foo.h".to_string(),
                line: 10,
            },
            Vec::new(),
            obj,
        )
    }

    fn full_struct(field_type: &str) -> Obj {
        let mut obj = Obj::struct_(Some("foo".into()));
        obj.add_member(Obj::struct_member(
            Some("a".into()),
            0,
            Obj::base(field_type.into()),
        ));
        obj
    }

    #[test]
    fn version_monotonicity() {
        let mut db = RecordDb::new();
        assert_eq!(db.insert(record_with(full_struct("int"))), "struct--foo.txt");
        assert_eq!(
            db.insert(record_with(full_struct("long"))),
            "struct--foo-1.txt"
        );
        assert_eq!(
            db.insert(record_with(full_struct("short"))),
            "struct--foo-2.txt"
        );
        assert_eq!(db.len(), 3);
    }

    #[test]
    fn declaration_and_definition_collapse() {
        let mut db = RecordDb::new();
        let mut ptr_to_decl = Obj::struct_(Some("foo".into()));
        ptr_to_decl.add_member(Obj::struct_member(
            Some("next".into()),
            0,
            Obj::ptr(Obj::reffile("<declarations>/struct--bar.txt".into())),
        ));
        let mut ptr_to_full = Obj::struct_(Some("foo".into()));
        ptr_to_full.add_member(Obj::struct_member(
            Some("next".into()),
            0,
            Obj::ptr(Obj::reffile("struct--bar.txt".into())),
        ));
        db.insert(record_with(ptr_to_decl));
        assert_eq!(db.insert(record_with(ptr_to_full)), "struct--foo.txt");
        assert_eq!(db.len(), 1);
        // The surviving graph holds the concrete reference.
        let rec = db.get("struct--foo.txt").unwrap();
        let leaf = rec.obj.members[0].ptr.as_deref().unwrap();
        let leaf = leaf.ptr.as_deref().unwrap();
        assert_eq!(leaf.base_type.as_deref(), Some("struct--bar.txt"));
    }
}
