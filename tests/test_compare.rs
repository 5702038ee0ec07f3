/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::Result;
use kabi_dw::compare::{compare, compare_trees, CompRet, CompareCtx, CompareOpts};
use kabi_dw::generate::{Origin, Record};
use kabi_dw::objects::Obj;
use std::path::Path;
use tempfile::Builder;

fn record(key: &str, obj: Obj) -> Record {
    Record::new(
        key.to_string(),
        None,
        Origin {
            file: "include/linux/test.h".to_string(),
            line: 1,
        },
        Vec::new(),
        obj,
    )
}

fn int_member(name: &str, offset: u64) -> Obj {
    Obj::struct_member(Some(name.into()), offset, Obj::base("int".into()))
}

/// Old `struct s { int a; int b; }`.
fn old_struct() -> Obj {
    let mut obj = Obj::struct_(Some("s".into()));
    obj.add_member(int_member("a", 0));
    obj.add_member(int_member("b", 4));
    obj
}

/// New `struct s { int pad; int a; int b; }`.
fn new_struct_with_pad() -> Obj {
    let mut obj = Obj::struct_(Some("s".into()));
    obj.add_member(int_member("pad", 0));
    obj.add_member(int_member("a", 4));
    obj.add_member(int_member("b", 8));
    obj
}

/// Writes `records` under `dir`.
fn write_records(dir: &Path, records: &[Record]) -> Result<()> {
    for rec in records {
        rec.dump(dir)?;
    }
    Ok(())
}

#[test]
fn pure_offset_shift_reports_an_insertion() -> Result<()> {
    let opts = CompareOpts::default();
    let ctx = CompareCtx::new(&opts, Path::new("."), Path::new("."));
    let (ret, output) = compare_trees(&ctx, &old_struct(), &new_struct_with_pad())?;
    assert_eq!(ret, CompRet::Diff);
    assert!(output.contains("Inserted:\n+0x0 pad \"int\"\n"));
    assert!(output.contains("Shifted:\n-0x0 a \"int\"\n+0x4 a \"int\"\n"));
    Ok(())
}

#[test]
fn suppressed_categories_leave_no_output_and_no_verdict() -> Result<()> {
    let opts = CompareOpts {
        no_inserted: true,
        no_shifted: true,
        ..CompareOpts::default()
    };
    let ctx = CompareCtx::new(&opts, Path::new("."), Path::new("."));
    let (ret, output) = compare_trees(&ctx, &old_struct(), &new_struct_with_pad())?;
    assert_eq!(ret, CompRet::Same);
    assert!(output.is_empty());
    Ok(())
}

#[test]
fn byte_size_change_is_reported() -> Result<()> {
    let mut old = Obj::struct_(Some("s".into()));
    old.byte_size = 4;
    old.add_member(Obj::struct_member(
        Some("x".into()),
        0,
        Obj::array(4, Obj::base("char".into())),
    ));
    let mut new = Obj::struct_(Some("s".into()));
    new.byte_size = 8;
    new.add_member(Obj::struct_member(
        Some("x".into()),
        0,
        Obj::array(8, Obj::base("char".into())),
    ));

    let opts = CompareOpts::default();
    let ctx = CompareCtx::new(&opts, Path::new("."), Path::new("."));
    let (ret, output) = compare_trees(&ctx, &old, &new)?;
    assert_ne!(ret, CompRet::Same);
    assert!(output.contains("The byte size of symbol 's' has changed from 4 to 8"));
    Ok(())
}

#[test]
fn identical_trees_compare_clean() -> Result<()> {
    let opts = CompareOpts::default();
    let ctx = CompareCtx::new(&opts, Path::new("."), Path::new("."));
    let (ret, output) = compare_trees(&ctx, &new_struct_with_pad(), &new_struct_with_pad())?;
    assert_eq!(ret, CompRet::Same);
    assert!(output.is_empty());
    Ok(())
}

#[test]
fn directory_compare_of_a_tree_with_itself_is_clean() -> Result<()> {
    let dir = Builder::new().prefix("kabi_self").tempdir()?;
    write_records(
        dir.path(),
        &[
            record("struct--s.txt", old_struct()),
            record("var--v.txt", Obj::var(Some("v".into()), Obj::base("int".into()))),
        ],
    )?;
    let opts = CompareOpts::default();
    assert!(!compare(&opts, dir.path(), dir.path(), &[])?);
    Ok(())
}

#[test]
fn directory_compare_detects_changes() -> Result<()> {
    let old_dir = Builder::new().prefix("kabi_old").tempdir()?;
    let new_dir = Builder::new().prefix("kabi_new").tempdir()?;
    write_records(old_dir.path(), &[record("struct--s.txt", old_struct())])?;
    write_records(
        new_dir.path(),
        &[record("struct--s.txt", new_struct_with_pad())],
    )?;
    let opts = CompareOpts::default();
    assert!(compare(&opts, old_dir.path(), new_dir.path(), &[])?);
    Ok(())
}

#[test]
fn missing_record_counts_as_moved_unless_suppressed() -> Result<()> {
    let old_dir = Builder::new().prefix("kabi_old").tempdir()?;
    let new_dir = Builder::new().prefix("kabi_new").tempdir()?;
    write_records(old_dir.path(), &[record("struct--s.txt", old_struct())])?;
    let opts = CompareOpts::default();
    assert!(compare(&opts, old_dir.path(), new_dir.path(), &[])?);
    let opts = CompareOpts {
        no_moved_files: true,
        ..CompareOpts::default()
    };
    assert!(!compare(&opts, old_dir.path(), new_dir.path(), &[])?);
    Ok(())
}

/// `struct a` holds a pointer to `struct b`; only `b` changes.
fn referencing_records(b_field_type: &str) -> Vec<Record> {
    let mut a = Obj::struct_(Some("a".into()));
    a.add_member(Obj::struct_member(
        Some("link".into()),
        0,
        Obj::ptr(Obj::reffile("struct--b.txt".into())),
    ));
    let mut b = Obj::struct_(Some("b".into()));
    b.add_member(Obj::struct_member(
        Some("x".into()),
        0,
        Obj::base(b_field_type.into()),
    ));
    vec![record("struct--a.txt", a), record("struct--b.txt", b)]
}

#[test]
fn follow_reports_referenced_changes() -> Result<()> {
    let old_dir = Builder::new().prefix("kabi_old").tempdir()?;
    let new_dir = Builder::new().prefix("kabi_new").tempdir()?;
    write_records(old_dir.path(), &referencing_records("int"))?;
    write_records(new_dir.path(), &referencing_records("long"))?;

    // Without --follow, comparing `a` alone reports no change.
    let opts = CompareOpts::default();
    let ctx = CompareCtx::new(&opts, old_dir.path(), new_dir.path());
    assert!(!ctx.compare_two_files("struct--a.txt", None, false)?);

    let opts = CompareOpts {
        follow: true,
        ..CompareOpts::default()
    };
    let ctx = CompareCtx::new(&opts, old_dir.path(), new_dir.path());
    assert!(ctx.compare_two_files("struct--a.txt", None, false)?);
    Ok(())
}

#[test]
fn cyclic_references_terminate() -> Result<()> {
    let old_dir = Builder::new().prefix("kabi_old").tempdir()?;
    let new_dir = Builder::new().prefix("kabi_new").tempdir()?;
    for (field_type, dir) in [("int", &old_dir), ("long", &new_dir)] {
        let mut a = Obj::struct_(Some("a".into()));
        a.add_member(Obj::struct_member(
            Some("b".into()),
            0,
            Obj::ptr(Obj::reffile("struct--b.txt".into())),
        ));
        let mut b = Obj::struct_(Some("b".into()));
        b.add_member(Obj::struct_member(
            Some("a".into()),
            0,
            Obj::ptr(Obj::reffile("struct--a.txt".into())),
        ));
        b.add_member(Obj::struct_member(
            Some("x".into()),
            8,
            Obj::base(field_type.into()),
        ));
        write_records(
            dir.path(),
            &[record("struct--a.txt", a), record("struct--b.txt", b)],
        )?;
    }
    let opts = CompareOpts {
        follow: true,
        ..CompareOpts::default()
    };
    let ctx = CompareCtx::new(&opts, old_dir.path(), new_dir.path());
    assert!(ctx.compare_two_files("struct--a.txt", None, false)?);
    Ok(())
}

#[test]
fn hide_kabi_masks_the_replace_wrapper() -> Result<()> {
    // Old: RH_KABI_REPLACE(int old_field, long new_field) at offset 8.
    let mut hidden = Obj::struct_(None);
    hidden.add_member(Obj::struct_member(
        Some("old_field".into()),
        0,
        Obj::base("int".into()),
    ));
    let mut wrapper = Obj::union_(None);
    wrapper.add_member(Obj::var(Some("new_field".into()), Obj::base("long".into())));
    wrapper.add_member(Obj::var(
        Some("__UNIQUE_ID_rh_kabi_hide21".into()),
        hidden,
    ));
    let mut old = Obj::struct_(Some("s".into()));
    old.add_member(int_member("a", 0));
    old.add_member(Obj::struct_member(None, 8, wrapper));

    // New tree as an unpatched kernel would have it.
    let mut new = Obj::struct_(Some("s".into()));
    new.add_member(int_member("a", 0));
    new.add_member(int_member("old_field", 8));

    let old_dir = Builder::new().prefix("kabi_old").tempdir()?;
    let new_dir = Builder::new().prefix("kabi_new").tempdir()?;
    write_records(old_dir.path(), &[record("struct--s.txt", old)])?;
    write_records(new_dir.path(), &[record("struct--s.txt", new)])?;

    let opts = CompareOpts::default();
    let ctx = CompareCtx::new(&opts, old_dir.path(), new_dir.path());
    assert!(ctx.compare_two_files("struct--s.txt", None, false)?);

    let opts = CompareOpts {
        hide_kabi: true,
        ..CompareOpts::default()
    };
    let ctx = CompareCtx::new(&opts, old_dir.path(), new_dir.path());
    assert!(!ctx.compare_two_files("struct--s.txt", None, false)?);
    Ok(())
}

#[test]
fn skip_duplicate_ignores_versioned_records() -> Result<()> {
    let old_dir = Builder::new().prefix("kabi_old").tempdir()?;
    let new_dir = Builder::new().prefix("kabi_new").tempdir()?;
    write_records(old_dir.path(), &[record("struct--s.txt", old_struct())])?;
    // The versioned variant exists only on the old side.
    write_records(old_dir.path(), &[record("struct--s-1.txt", old_struct())])?;
    write_records(new_dir.path(), &[record("struct--s.txt", old_struct())])?;

    let opts = CompareOpts {
        skip_duplicate: true,
        ..CompareOpts::default()
    };
    assert!(!compare(&opts, old_dir.path(), new_dir.path(), &[])?);
    // Without the flag the missing versioned record is a change.
    let opts = CompareOpts::default();
    assert!(compare(&opts, old_dir.path(), new_dir.path(), &[])?);
    Ok(())
}

#[test]
fn deleted_members_are_classified_as_deletions() -> Result<()> {
    let opts = CompareOpts::default();
    let ctx = CompareCtx::new(&opts, Path::new("."), Path::new("."));
    let (ret, output) = compare_trees(&ctx, &new_struct_with_pad(), &old_struct())?;
    assert_eq!(ret, CompRet::Diff);
    assert!(output.contains("Deleted:\n-0x0 pad \"int\"\n"));
    Ok(())
}

#[test]
fn trailing_members_are_added_and_removed() -> Result<()> {
    let mut grown = old_struct();
    grown.add_member(int_member("tail", 8));

    let opts = CompareOpts::default();
    let ctx = CompareCtx::new(&opts, Path::new("."), Path::new("."));
    let (ret, output) = compare_trees(&ctx, &old_struct(), &grown)?;
    assert_eq!(ret, CompRet::Diff);
    assert!(output.contains("Added:\n+0x8 tail \"int\"\n"));

    let (ret, output) = compare_trees(&ctx, &grown, &old_struct())?;
    assert_eq!(ret, CompRet::Diff);
    assert!(output.contains("Removed:\n-0x8 tail \"int\"\n"));
    Ok(())
}
