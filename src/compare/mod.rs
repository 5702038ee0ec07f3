/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Structural comparison of two record trees.
//!
//! The comparator classifies every divergence under a severity lattice,
//! aligns diverging member lists with a minimal-edit heuristic, follows
//! references into other record files under a cycle guard, and emits a
//! human-readable report in which each change category can be individually
//! suppressed.

use crate::objects::{
    debug_tree, hide_kabi, parse_record_file, print_tree, DisplayOpts, Obj, ObjKind,
};
use crate::utils::{filenametotype, is_duplicate, walk_dir};
use crate::DECLARATION_PATH;
use anyhow::{bail, Context, Result};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt::Write;
use std::path::Path;

/// diff -u style prefixes for tree comparison
const ADD_PREFIX: &str = "+";
const DEL_PREFIX: &str = "-";

/// Options of one compare run.
#[derive(Debug, Clone, Default)]
pub struct CompareOpts {
    /// Print the raw parsed trees before comparing.
    pub debug: bool,
    /// Strip `RH_KABI_REPLACE()` wrappers, keeping the original field.
    pub hide_kabi: bool,
    /// With [`hide_kabi`](CompareOpts::hide_kabi), keep the replacement
    /// field instead.
    pub hide_kabi_new: bool,
    /// In directory mode, visit only the canonical version of each symbol.
    pub skip_duplicate: bool,
    /// Follow references into other record files.
    pub follow: bool,
    /// Category suppressions; a suppressed category is neither printed nor
    /// escalated.
    pub no_replaced: bool,
    pub no_shifted: bool,
    pub no_inserted: bool,
    pub no_deleted: bool,
    pub no_added: bool,
    pub no_removed: bool,
    pub no_moved_files: bool,
    pub display: DisplayOpts,
}

/// Single-node comparison verdicts, least severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CmpVerdict {
    Same,
    /// Only the offset within the composite has changed.
    Offset,
    Alignment,
    ByteSize,
    /// A referred record has changed.
    RefFile,
    /// The nodes differ.
    Diff,
}

/// Subtree comparison outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompRet {
    Same,
    /// Benign change found; keep scanning.
    Cont,
    Diff,
}

fn comp_return_value(old: CompRet, new: CompRet) -> CompRet {
    match new {
        CompRet::Diff => CompRet::Diff,
        CompRet::Cont => {
            if old == CompRet::Diff {
                CompRet::Diff
            } else {
                CompRet::Cont
            }
        }
        CompRet::Same => old,
    }
}

/// Rejoining found by the list-diff scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiffRet {
    Insert,
    Delete,
    Replace,
    Cont,
}

/// Context of one top-level comparison: options, the two directories, and
/// the set of files already entered (the cycle guard for `--follow`).
pub struct CompareCtx<'a> {
    pub opts: &'a CompareOpts,
    pub old_dir: &'a Path,
    pub new_dir: &'a Path,
    visited: RefCell<HashSet<String>>,
}

impl<'a> CompareCtx<'a> {
    pub fn new(opts: &'a CompareOpts, old_dir: &'a Path, new_dir: &'a Path) -> Self {
        CompareCtx {
            opts,
            old_dir,
            new_dir,
            visited: RefCell::new(HashSet::new()),
        }
    }

    fn clear_visited(&self) {
        self.visited.borrow_mut().clear();
    }

    /// The most severe single-node verdict for the pair.
    pub fn cmp_nodes(&self, o1: &Obj, o2: &Obj) -> Result<CmpVerdict> {
        self.cmp_nodes_search(o1, o2, false)
    }

    /// `search` is set during the list-diff scan; there an unnamed composite
    /// member whose offset moved counts as different, so that successive
    /// anonymous members are not spuriously aligned.
    fn cmp_nodes_search(&self, o1: &Obj, o2: &Obj, search: bool) -> Result<CmpVerdict> {
        if o1.kind != o2.kind
            || o1.name != o2.name
            || o1.is_weak() != o2.is_weak()
            || (o1.is_weak() && o2.is_weak() && o1.link != o2.link)
            || o1.ptr.is_some() != o2.ptr.is_some()
            || (o1.kind == ObjKind::Constant && o1.constant != o2.constant)
            || (o1.kind == ObjKind::Array && o1.index != o2.index)
            || o1.is_bitfield() != o2.is_bitfield()
            || (o1.is_bitfield() && o1.bit_size() != o2.bit_size())
        {
            return Ok(CmpVerdict::Diff);
        }

        if o1.kind == ObjKind::RefFile {
            let verdict = self.cmp_node_reffile(o1, o2)?;
            if verdict != CmpVerdict::Same {
                return Ok(verdict);
            }
        } else if o1.base_type != o2.base_type {
            return Ok(CmpVerdict::Diff);
        }

        if o1.has_offset()
            && (o1.offset != o2.offset
                || (o1.is_bitfield() && o1.bitfield.map(|b| b.0) != o2.bitfield.map(|b| b.0)))
        {
            if search && o1.name.is_none() {
                return Ok(CmpVerdict::Diff);
            }
            return Ok(CmpVerdict::Offset);
        }

        if o1.alignment != o2.alignment {
            return Ok(CmpVerdict::Alignment);
        }
        if o1.byte_size != o2.byte_size {
            return Ok(CmpVerdict::ByteSize);
        }
        Ok(CmpVerdict::Same)
    }

    fn cmp_node_reffile(&self, o1: &Obj, o2: &Obj) -> Result<CmpVerdict> {
        let path1 = o1.base_type.as_deref().unwrap_or_default();
        let path2 = o2.base_type.as_deref().unwrap_or_default();
        if filenametotype(path1)? != filenametotype(path2)? {
            return Ok(CmpVerdict::Diff);
        }

        // Compare the records referenced by the pair, but never follow the
        // imaginary declaration path.
        if !path1.starts_with(DECLARATION_PATH)
            && !path2.starts_with(DECLARATION_PATH)
            && self.compare_two_files(path1, Some(path2), true)?
        {
            return Ok(CmpVerdict::RefFile);
        }
        Ok(CmpVerdict::Same)
    }

    /// Compares two lists whose heads diverge, looking for the earliest of
    /// three rejoinings: the head of `list2` found `d1` elements into
    /// `list1` (deletion), the head of `list1` found `d2` elements into
    /// `list2` (insertion), or the lists becoming pairwise comparable at
    /// matching offsets (replacement). The two scan offsets advance
    /// alternately, smaller counter first, `list2`'s on ties.
    fn list_diff(&self, list1: &[Obj], list2: &[Obj]) -> Result<(DiffRet, usize, usize)> {
        let head1 = &list1[0];
        let head2 = &list2[0];
        let (mut d1, mut d2) = (0usize, 0usize);
        let mut scanning1 = true;
        loop {
            let (fixed, moving) = if scanning1 {
                (head2, list1.get(d1))
            } else {
                (head1, list2.get(d2))
            };
            let Some(moving) = moving else {
                return Ok((DiffRet::Cont, d1, d2));
            };
            if rejoins(self.cmp_nodes_search(fixed, moving, true)?) {
                return Ok(if scanning1 {
                    (DiffRet::Delete, d1, d2)
                } else {
                    (DiffRet::Insert, d1, d2)
                });
            }
            if d1 == d2 {
                if let (Some(at1), Some(at2)) = (list1.get(d1), list2.get(d2)) {
                    if rejoins(self.cmp_nodes_search(at1, at2, true)?) {
                        return Ok((DiffRet::Replace, d1, d2));
                    }
                }
            }
            if d1 + 1 >= list1.len() || d2 <= d1 {
                d2 += 1;
                scanning1 = false;
            } else {
                d1 += 1;
                scanning1 = true;
            }
        }
    }

    /// Parses the pair of record files and compares the resulting trees.
    ///
    /// `filename` is relative to the old directory; `newfile`, when given,
    /// replaces it on the new side. `follow` marks re-entry through a
    /// reference node: nothing is printed and, unless following was
    /// requested, nothing is compared. Returns whether a change was found.
    pub fn compare_two_files(
        &self,
        filename: &str,
        newfile: Option<&str>,
        follow: bool,
    ) -> Result<bool> {
        if follow && !self.opts.follow {
            return Ok(false);
        }
        // Avoid infinite loops on cyclic reference graphs.
        if !self.visited.borrow_mut().insert(filename.to_string()) {
            return Ok(false);
        }

        let path1 = self.old_dir.join(filename);
        let filename2 = newfile.unwrap_or(filename);
        let path2 = self.new_dir.join(filename2);

        if !path2.exists() {
            // An absent incomplete definition is not a change.
            if !filename2.starts_with(DECLARATION_PATH) && !self.opts.no_moved_files {
                println!("Symbol removed or moved: {}", filename);
                return Ok(true);
            }
            return Ok(false);
        }

        let mut root1 = parse_record_file(&path1)?.obj;
        let mut root2 = parse_record_file(&path2)?.obj;

        if self.opts.hide_kabi {
            hide_kabi(&mut root1, self.opts.hide_kabi_new);
            hide_kabi(&mut root2, self.opts.hide_kabi_new);
        }

        if self.opts.debug && !follow {
            print!("{}", debug_tree(&root1));
            print!("{}", debug_tree(&root2));
        }

        let (ret, output) = compare_trees(self, &root1, &root2)?;

        if ret != CompRet::Same {
            if !follow {
                println!("Changes detected in: {}", filename);
                print!("{}", output);
                println!();
            }
            return Ok(true);
        }
        Ok(false)
    }
}

/// Compares two parsed trees under `ctx`, returning the aggregate verdict
/// and the buffered report.
pub fn compare_trees(ctx: &CompareCtx, o1: &Obj, o2: &Obj) -> Result<(CompRet, String)> {
    let mut output = String::new();
    let mut walker = TreeCmp {
        ctx,
        trail: Vec::new(),
    };
    let ret = walker.compare_tree(o1, o2, &mut output)?;
    Ok((ret, output))
}

fn rejoins(verdict: CmpVerdict) -> bool {
    matches!(
        verdict,
        CmpVerdict::Same | CmpVerdict::Offset | CmpVerdict::Alignment
    )
}

/// A useful report starts at a named object, a struct field or a var; a
/// changed deep base type is reported at the level of the containing field,
/// not at the anonymous leaf.
fn worthy_of_print(obj: &Obj) -> bool {
    obj.name.is_some() || obj.kind == ObjKind::StructMember || obj.kind == ObjKind::Var
}

fn undefined_or(value: u64) -> String {
    if value == 0 {
        "<undefined>".to_string()
    } else {
        value.to_string()
    }
}

fn message_alignment(o1: &Obj, o2: &Obj, out: &mut String) {
    let part = if o1.kind == ObjKind::StructMember {
        "field"
    } else {
        "symbol"
    };
    writeln!(
        out,
        "The alignment of {} '{}' has changed from {} to {}",
        part,
        o1.name.as_deref().unwrap_or("<anonymous>"),
        undefined_or(u64::from(o1.alignment)),
        undefined_or(u64::from(o2.alignment)),
    )
    .unwrap();
}

fn message_byte_size(o1: &Obj, o2: &Obj, out: &mut String) {
    writeln!(
        out,
        "The byte size of symbol '{}' has changed from {} to {}",
        o1.name.as_deref().unwrap_or("<anonymous>"),
        undefined_or(o1.byte_size),
        undefined_or(o2.byte_size),
    )
    .unwrap();
}

fn print_node_list(label: &str, prefix: &str, list: &[Obj], out: &mut String, display: &DisplayOpts) {
    writeln!(out, "{}:", label).unwrap();
    for obj in list {
        out.push_str(&print_tree(obj, prefix, display));
    }
}

/// Recursive tree walk carrying the chain of ancestor pairs, used to find
/// the node worth reporting a deep change at.
struct TreeCmp<'c, 'o> {
    ctx: &'c CompareCtx<'c>,
    trail: Vec<(&'o Obj, &'o Obj)>,
}

impl<'o> TreeCmp<'_, 'o> {
    fn compare_tree(&mut self, o1: &'o Obj, o2: &'o Obj, out: &mut String) -> Result<CompRet> {
        self.trail.push((o1, o2));
        let ret = self.compare_tree_body(o1, o2, out);
        self.trail.pop();
        ret
    }

    fn compare_tree_body(&mut self, o1: &'o Obj, o2: &'o Obj, out: &mut String) -> Result<CompRet> {
        let mut ret = CompRet::Same;
        let opts = self.ctx.opts;

        match self.ctx.cmp_nodes(o1, o2)? {
            CmpVerdict::RefFile => {
                writeln!(
                    out,
                    "symbol {} has changed",
                    o1.base_type.as_deref().unwrap_or("?")
                )
                .unwrap();
                return Ok(CompRet::Diff);
            }
            CmpVerdict::Offset if !opts.no_shifted => {
                self.print_two_nodes("Shifted", out)?;
                ret = CompRet::Cont;
            }
            CmpVerdict::Diff if !opts.no_replaced => {
                self.print_two_nodes("Replaced", out)?;
                ret = CompRet::Cont;
            }
            CmpVerdict::Alignment => {
                message_alignment(o1, o2, out);
                ret = CompRet::Cont;
            }
            CmpVerdict::ByteSize => {
                message_byte_size(o1, o2, out);
                ret = CompRet::Cont;
            }
            _ => {}
        }

        let list1 = &o1.members;
        let list2 = &o2.members;
        let (mut i, mut j) = (0, 0);
        while i < list1.len() && j < list2.len() {
            if self.ctx.cmp_nodes(&list1[i], &list2[j])? == CmpVerdict::Diff {
                let (kind, n1, n2) = self.ctx.list_diff(&list1[i..], &list2[j..])?;
                match kind {
                    DiffRet::Insert => {
                        if !opts.no_inserted {
                            print_node_list(
                                "Inserted",
                                ADD_PREFIX,
                                &list2[j..j + n2],
                                out,
                                &opts.display,
                            );
                            ret = CompRet::Diff;
                        }
                        j += n2;
                    }
                    DiffRet::Delete => {
                        if !opts.no_deleted {
                            print_node_list(
                                "Deleted",
                                DEL_PREFIX,
                                &list1[i..i + n1],
                                out,
                                &opts.display,
                            );
                            ret = CompRet::Diff;
                        }
                        i += n1;
                    }
                    // The upcoming pairwise walks report replaced fields
                    // individually.
                    DiffRet::Replace | DiffRet::Cont => {}
                }
            }

            let tmp = self.compare_tree(&list1[i], &list2[j], out)?;
            ret = comp_return_value(ret, tmp);

            i += 1;
            j += 1;
            if i >= list1.len() && j < list2.len() {
                if !opts.no_added {
                    print_node_list("Added", ADD_PREFIX, &list2[j..], out, &opts.display);
                    ret = CompRet::Diff;
                }
                return Ok(ret);
            }
            if i < list1.len() && j >= list2.len() {
                if !opts.no_removed {
                    print_node_list("Removed", DEL_PREFIX, &list1[i..], out, &opts.display);
                    ret = CompRet::Diff;
                }
                return Ok(ret);
            }
        }

        if let (Some(ptr1), Some(ptr2)) = (o1.ptr.as_deref(), o2.ptr.as_deref()) {
            let tmp = self.compare_tree(ptr1, ptr2, out)?;
            ret = comp_return_value(ret, tmp);
        }
        Ok(ret)
    }

    /// Emits the current pair, lifted to the nearest ancestor worth
    /// printing.
    fn print_two_nodes(&self, label: &str, out: &mut String) -> Result<()> {
        let mut pos = self.trail.len() - 1;
        while !worthy_of_print(self.trail[pos].0) {
            if pos == 0 {
                bail!("No ancestor worthy of print");
            }
            pos -= 1;
        }
        let (w1, w2) = self.trail[pos];
        writeln!(out, "{}:", label).unwrap();
        out.push_str(&print_tree(w1, DEL_PREFIX, &self.ctx.opts.display));
        out.push_str(&print_tree(w2, ADD_PREFIX, &self.ctx.opts.display));
        Ok(())
    }
}

/// Performs the compare command over two files or two directories,
/// restricted to `files` when non-empty. Returns whether any reportable
/// change was found.
pub fn compare(opts: &CompareOpts, old: &Path, new: &Path, files: &[String]) -> Result<bool> {
    let meta1 =
        std::fs::metadata(old).with_context(|| format!("Cannot stat {}", old.display()))?;
    let meta2 =
        std::fs::metadata(new).with_context(|| format!("Cannot stat {}", new.display()))?;

    if meta1.is_file() && meta2.is_file() {
        if !files.is_empty() {
            bail!("Too many arguments");
        }
        let old_name = old
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Bad file name: {}", old.display()))?;
        let new_name = new
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Bad file name: {}", new.display()))?;
        let old_dir = old.parent().unwrap_or(Path::new("."));
        let new_dir = new.parent().unwrap_or(Path::new("."));
        let ctx = CompareCtx::new(opts, old_dir, new_dir);
        return ctx.compare_two_files(old_name, Some(new_name), false);
    }

    if !meta1.is_dir() || !meta2.is_dir() {
        bail!("Compare takes two directories or two regular files as arguments");
    }

    let ctx = CompareCtx::new(opts, old, new);
    let mut changed = false;
    if files.is_empty() {
        walk_dir(old, &mut |path| {
            if opts.skip_duplicate && is_duplicate(path) {
                return Ok(true);
            }
            let rel = path
                .strip_prefix(old)
                .expect("walked path lies under the old directory")
                .to_str()
                .with_context(|| format!("Bad file name: {}", path.display()))?;
            ctx.clear_visited();
            if ctx.compare_two_files(rel, None, false)? {
                changed = true;
            }
            Ok(true)
        })?;
    } else {
        for filename in files {
            let path = old.join(filename);
            let meta = std::fs::metadata(&path)
                .with_context(|| format!("file does not exist: {}", path.display()))?;
            if !meta.is_file() {
                bail!("Compare positional arguments must be regular files");
            }
            if ctx.compare_two_files(filename, None, false)? {
                changed = true;
            }
        }
    }
    Ok(changed)
}

#[cfg(test)]
mod test {
    use super::*;

    fn ctx_opts() -> CompareOpts {
        CompareOpts::default()
    }

    #[test]
    fn severity_is_symmetric() -> Result<()> {
        let opts = ctx_opts();
        let ctx = CompareCtx::new(&opts, Path::new("."), Path::new("."));
        let mut a = Obj::struct_member(Some("a".into()), 0, Obj::base("int".into()));
        let mut b = Obj::struct_member(Some("a".into()), 8, Obj::base("int".into()));
        assert_eq!(ctx.cmp_nodes(&a, &b)?, CmpVerdict::Offset);
        assert_eq!(ctx.cmp_nodes(&b, &a)?, CmpVerdict::Offset);
        a.bitfield = Some((0, 3));
        assert_eq!(ctx.cmp_nodes(&a, &b)?, CmpVerdict::Diff);
        assert_eq!(ctx.cmp_nodes(&b, &a)?, CmpVerdict::Diff);
        b.bitfield = Some((4, 7));
        b.offset = Some(0);
        assert_eq!(ctx.cmp_nodes(&a, &b)?, CmpVerdict::Offset);
        assert_eq!(ctx.cmp_nodes(&b, &a)?, CmpVerdict::Offset);
        Ok(())
    }

    #[test]
    fn lattice_order() {
        assert!(CmpVerdict::Same < CmpVerdict::Offset);
        assert!(CmpVerdict::Offset < CmpVerdict::Alignment);
        assert!(CmpVerdict::Alignment < CmpVerdict::ByteSize);
        assert!(CmpVerdict::ByteSize < CmpVerdict::RefFile);
        assert!(CmpVerdict::RefFile < CmpVerdict::Diff);
    }
}
