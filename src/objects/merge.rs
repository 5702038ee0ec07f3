/*
 * SPDX-FileCopyrightText: 2023 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Unification of two independently extracted graphs for the same type.
//!
//! Within one build the same type often shows up both as a forward
//! declaration (the defining header was not included in that compilation
//! unit) and as a full definition. Those two graphs must resolve to a single
//! record; graphs differing in anything else must not.

use super::{Obj, ObjKind};
use crate::utils::split_key;
use crate::DECLARATION_PATH;

/// Tries to unify `a` and `b` in structural lock-step.
///
/// At every pair of corresponding nodes, a reference into `<declarations>`
/// unifies with a concrete node describing the same type, and equal nodes
/// unify with themselves; any other disagreement makes the whole merge fail.
pub fn obj_merge(a: &Obj, b: &Obj) -> Option<Obj> {
    if a.is_declaration_ref() && declaration_matches(a, b) {
        return Some(b.clone());
    }
    if b.is_declaration_ref() && declaration_matches(b, a) {
        return Some(a.clone());
    }

    if a.kind != b.kind
        || a.name != b.name
        || a.base_type != b.base_type
        || a.offset != b.offset
        || a.bitfield != b.bitfield
        || a.constant != b.constant
        || a.index != b.index
        || a.alignment != b.alignment
        || a.byte_size != b.byte_size
        || a.link != b.link
        || a.members.len() != b.members.len()
        || a.ptr.is_some() != b.ptr.is_some()
    {
        return None;
    }

    let mut merged = a.clone();
    merged.members.clear();
    merged.ptr = None;
    for (ma, mb) in a.members.iter().zip(&b.members) {
        merged.members.push(obj_merge(ma, mb)?);
    }
    if let (Some(pa), Some(pb)) = (&a.ptr, &b.ptr) {
        merged.ptr = Some(Box::new(obj_merge(pa, pb)?));
    }
    Some(merged)
}

/// Whether the concrete node `other` describes the type that the
/// `<declarations>` reference `decl` stands for.
fn declaration_matches(decl: &Obj, other: &Obj) -> bool {
    let Some(path) = decl.base_type.as_deref() else {
        return false;
    };
    let Some(base) = path
        .strip_prefix(DECLARATION_PATH)
        .and_then(|p| p.strip_prefix('/'))
    else {
        return false;
    };
    let Some((prefix, name, _)) = split_key(base) else {
        return false;
    };

    match other.kind {
        // A concrete reference to the same type name, possibly versioned.
        ObjKind::RefFile => {
            if other.is_declaration_ref() {
                return false;
            }
            let Some(other_path) = other.base_type.as_deref() else {
                return false;
            };
            let other_base = other_path.rsplit('/').next().unwrap_or(other_path);
            matches!(split_key(other_base), Some((p, n, _)) if p == prefix && n == name)
        }
        // A materialized node of the kind and name the path encodes.
        ObjKind::Struct => prefix == "struct" && other.name.as_deref() == Some(name),
        ObjKind::Union => prefix == "union" && other.name.as_deref() == Some(name),
        ObjKind::Enum => prefix == "enum" && other.name.as_deref() == Some(name),
        ObjKind::Typedef => prefix == "typedef" && other.name.as_deref() == Some(name),
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn full_struct() -> Obj {
        let mut obj = Obj::struct_(Some("foo".into()));
        obj.add_member(Obj::struct_member(
            Some("a".into()),
            0,
            Obj::base("int".into()),
        ));
        obj
    }

    #[test]
    fn declaration_adopts_definition() {
        let decl = Obj::ptr(Obj::reffile("<declarations>/struct--foo.txt".into()));
        let full = Obj::ptr(Obj::reffile("struct--foo.txt".into()));
        let merged = obj_merge(&decl, &full).unwrap();
        assert_eq!(merged, full);
        // Merge closure: merging the result with either input is a no-op.
        assert_eq!(obj_merge(&merged, &decl).unwrap(), merged);
        assert_eq!(obj_merge(&merged, &full).unwrap(), merged);
    }

    #[test]
    fn declaration_adopts_materialized_node() {
        let decl = Obj::reffile("<declarations>/struct--foo.txt".into());
        let full = full_struct();
        assert_eq!(obj_merge(&decl, &full).unwrap(), full);
        assert_eq!(obj_merge(&full, &decl).unwrap(), full);
    }

    #[test]
    fn distinct_types_do_not_merge() {
        let mut other = full_struct();
        other.members[0].ptr = Some(Box::new(Obj::base("long".into())));
        assert!(obj_merge(&full_struct(), &other).is_none());
        let decl = Obj::reffile("<declarations>/struct--bar.txt".into());
        assert!(obj_merge(&decl, &full_struct()).is_none());
    }

    #[test]
    fn two_declarations_do_not_adopt_each_other() {
        let a = Obj::reffile("<declarations>/struct--foo.txt".into());
        let b = Obj::reffile("<declarations>/struct--bar.txt".into());
        assert!(obj_merge(&a, &b).is_none());
        // Identical declarations still unify with themselves.
        assert!(obj_merge(&a, &a.clone()).is_some());
    }
}
