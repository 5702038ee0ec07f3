/*
 * SPDX-FileCopyrightText: 2023 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Canonical textual serialization of type graphs.
//!
//! The output is deterministic byte-for-byte: record files are written with
//! the default options, while `show` and the comparator reuse the same
//! printer with a line prefix (`+`/`-`) and user display options.

use super::{Obj, ObjKind};
use std::fmt::Write;

/// Options altering how trees are rendered for the user.
///
/// Record files on disk are always written with the default options.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayOpts {
    /// Do not print the offset prefix of struct members.
    pub no_offset: bool,
}

/// Renders a whole type tree, prefixing every line with `line_prefix`.
pub fn print_tree(root: &Obj, line_prefix: &str, opts: &DisplayOpts) -> String {
    let mut out = String::new();
    print_slot(&mut out, root, 0, line_prefix, opts);
    out
}

fn begin_line(out: &mut String, depth: usize, line_prefix: &str) {
    out.push_str(line_prefix);
    for _ in 0..depth * 4 {
        out.push(' ');
    }
}

/// Prints one member/formal/root slot, starting (and ending) a line.
fn print_slot(out: &mut String, obj: &Obj, depth: usize, prefix: &str, opts: &DisplayOpts) {
    begin_line(out, depth, prefix);
    match obj.kind {
        ObjKind::StructMember => {
            if !opts.no_offset {
                let offset = obj.offset.unwrap_or(0);
                match obj.bitfield {
                    Some((first, last)) => {
                        write!(out, "0x{:x}:{}-{} ", offset, first, last).unwrap()
                    }
                    None => write!(out, "0x{:x} ", offset).unwrap(),
                }
            }
            if let Some(name) = &obj.name {
                write!(out, "{} ", name).unwrap();
            }
            print_inner(out, obj, depth, prefix, opts);
        }
        ObjKind::Var => {
            if let Some(name) = &obj.name {
                write!(out, "{} ", name).unwrap();
            }
            print_inner(out, obj, depth, prefix, opts);
        }
        ObjKind::Constant => {
            writeln!(
                out,
                "{} = {}",
                obj.name.as_deref().unwrap_or_default(),
                obj.constant.unwrap_or(0)
            )
            .unwrap();
        }
        _ => print_chain(out, obj, depth, prefix, opts),
    }
}

fn print_inner(out: &mut String, obj: &Obj, depth: usize, prefix: &str, opts: &DisplayOpts) {
    match &obj.ptr {
        Some(inner) => print_chain(out, inner, depth, prefix, opts),
        None => out.push('\n'),
    }
}

/// Continues the current line with the type chain of `obj`.
fn print_chain(out: &mut String, obj: &Obj, depth: usize, prefix: &str, opts: &DisplayOpts) {
    match obj.kind {
        ObjKind::Ptr => {
            out.push('*');
            print_inner(out, obj, depth, prefix, opts);
        }
        ObjKind::Qualifier => {
            write!(out, "{} ", obj.base_type.as_deref().unwrap_or_default()).unwrap();
            print_inner(out, obj, depth, prefix, opts);
        }
        ObjKind::Array => {
            write!(out, "[{}]", obj.index.unwrap_or(0)).unwrap();
            print_inner(out, obj, depth, prefix, opts);
        }
        ObjKind::Typedef => {
            writeln!(out, "typedef {}", obj.name.as_deref().unwrap_or_default()).unwrap();
            begin_line(out, depth, prefix);
            print_inner(out, obj, depth, prefix, opts);
        }
        ObjKind::Base => {
            writeln!(out, "\"{}\"", obj.base_type.as_deref().unwrap_or_default()).unwrap();
        }
        ObjKind::RefFile => {
            if let Some(link) = &obj.link {
                write!(out, "weak \"{}\" ", link).unwrap();
            }
            writeln!(out, "@\"{}\"", obj.base_type.as_deref().unwrap_or_default()).unwrap();
        }
        ObjKind::Struct | ObjKind::Union | ObjKind::Enum => {
            out.push_str(obj.kind.as_str());
            if let Some(name) = &obj.name {
                write!(out, " {}", name).unwrap();
            }
            if obj.byte_size != 0 {
                write!(out, " size({})", obj.byte_size).unwrap();
            }
            if obj.alignment != 0 {
                write!(out, " align({})", obj.alignment).unwrap();
            }
            out.push_str(" {\n");
            for member in &obj.members {
                print_slot(out, member, depth + 1, prefix, opts);
            }
            begin_line(out, depth, prefix);
            out.push_str("}\n");
        }
        ObjKind::Func => {
            if let Some(name) = &obj.name {
                write!(out, "{} ", name).unwrap();
            }
            out.push_str("(\n");
            for formal in &obj.members {
                print_slot(out, formal, depth + 1, prefix, opts);
            }
            begin_line(out, depth, prefix);
            out.push_str(") ");
            print_inner(out, obj, depth, prefix, opts);
        }
        // Slot kinds never start a chain; fall back to their slot form so a
        // malformed tree still renders.
        ObjKind::Var | ObjKind::StructMember | ObjKind::Constant => {
            if let Some(name) = &obj.name {
                write!(out, "{} ", name).unwrap();
            }
            print_inner(out, obj, depth, prefix, opts);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn struct_with_bitfield_and_pointer() {
        let mut root = Obj::struct_(Some("s".into()));
        root.byte_size = 16;
        let mut flags = Obj::struct_member(Some("flags".into()), 0, Obj::base("int".into()));
        flags.bitfield = Some((0, 3));
        root.add_member(flags);
        root.add_member(Obj::struct_member(
            Some("next".into()),
            8,
            Obj::ptr(Obj::reffile("struct--s.txt".into())),
        ));
        assert_eq!(
            print_tree(&root, "", &DisplayOpts::default()),
            "struct s size(16) {\n    0x0:0-3 flags \"int\"\n    0x8 next *@\"struct--s.txt\"\n}\n"
        );
    }

    #[test]
    fn function_formals_and_return() {
        let mut func = Obj::func(Some("probe".into()), Obj::base("int".into()));
        func.add_member(Obj::var(
            Some("dev".into()),
            Obj::ptr(Obj::reffile("struct--device.txt".into())),
        ));
        func.add_member(Obj::var(None, Obj::base("...".into())));
        assert_eq!(
            print_tree(&func, "", &DisplayOpts::default()),
            "probe (\n    dev *@\"struct--device.txt\"\n    \"...\"\n) \"int\"\n"
        );
    }

    #[test]
    fn no_offset_display_option() {
        let mut root = Obj::struct_(Some("s".into()));
        root.add_member(Obj::struct_member(
            Some("a".into()),
            4,
            Obj::base("int".into()),
        ));
        let opts = DisplayOpts { no_offset: true };
        assert_eq!(
            print_tree(&root, "", &opts),
            "struct s {\n    a \"int\"\n}\n"
        );
    }
}
