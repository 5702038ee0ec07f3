/*
 * SPDX-FileCopyrightText: 2023 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Stripping of the union wrapper produced by `RH_KABI_REPLACE()`.
//!
//! The kernel macro replaces a field with an anonymous union holding the new
//! field alongside a one-field anonymous struct named with a reserved prefix
//! that hides the original:
//!
//! ```c
//! union {
//!     new_type new_field;
//!     struct {
//!         old_type old_field;
//!     } __UNIQUE_ID_rh_kabi_hide55;
//! };
//! ```
//!
//! The transform rewrites such wrappers in place so that comparisons see a
//! plain field again: the hidden original by default, or the replacement
//! field when requested.

use super::{Obj, ObjKind};

/// Member-name prefix marking the hidden-field struct.
pub const RH_KABI_HIDE: &str = "__UNIQUE_ID_rh_kabi_hide";

/// Strips every `RH_KABI_REPLACE()` wrapper in the tree.
///
/// With `hide_new` set, the replacement field survives instead of the
/// hidden original.
pub fn hide_kabi(root: &mut Obj, hide_new: bool) {
    hide_kabi_with_prefix(root, hide_new, RH_KABI_HIDE)
}

/// [`hide_kabi`] with a custom hidden-struct name prefix.
pub fn hide_kabi_with_prefix(obj: &mut Obj, hide_new: bool, prefix: &str) {
    for member in &mut obj.members {
        strip_wrapper(member, hide_new, prefix);
        hide_kabi_with_prefix(member, hide_new, prefix);
    }
    if let Some(ptr) = &mut obj.ptr {
        hide_kabi_with_prefix(ptr, hide_new, prefix);
    }
}

/// Index of the hide member within an anonymous wrapper union, if any.
fn hide_member(wrapper: &Obj, prefix: &str) -> Option<usize> {
    if wrapper.kind != ObjKind::Union || wrapper.name.is_some() || wrapper.members.len() < 2 {
        return None;
    }
    wrapper.members.iter().position(|m| {
        m.kind == ObjKind::Var
            && m.name.as_deref().is_some_and(|n| n.starts_with(prefix))
            && m.ptr.as_deref().is_some_and(|s| {
                s.kind == ObjKind::Struct && s.name.is_none() && s.members.len() == 1
            })
    })
}

/// Rewrites `slot` in place if its type is a wrapper union.
fn strip_wrapper(slot: &mut Obj, hide_new: bool, prefix: &str) {
    if slot.kind != ObjKind::StructMember && slot.kind != ObjKind::Var {
        return;
    }
    let Some(wrapper) = slot.ptr.as_deref() else {
        return;
    };
    let Some(hide_idx) = hide_member(wrapper, prefix) else {
        return;
    };

    let survivor = if hide_new {
        let Some((_, new_field)) = wrapper
            .members
            .iter()
            .enumerate()
            .find(|(i, _)| *i != hide_idx)
        else {
            return;
        };
        new_field.clone()
    } else {
        // The single field of the hidden anonymous struct.
        match wrapper.members[hide_idx].ptr.as_deref() {
            Some(hidden) => hidden.members[0].clone(),
            None => return,
        }
    };

    // The surviving field replaces the wrapper, keeping the slot's offset.
    slot.name = survivor.name;
    slot.bitfield = survivor.bitfield;
    slot.ptr = survivor.ptr;
}

#[cfg(test)]
mod test {
    use super::*;

    /// `RH_KABI_REPLACE(int old_field, long new_field)` at offset 8.
    fn wrapped_member() -> Obj {
        let mut hidden = Obj::struct_(None);
        hidden.add_member(Obj::struct_member(
            Some("old_field".into()),
            0,
            Obj::base("int".into()),
        ));
        let mut wrapper = Obj::union_(None);
        wrapper.add_member(Obj::var(Some("new_field".into()), Obj::base("long".into())));
        wrapper.add_member(Obj::var(
            Some("__UNIQUE_ID_rh_kabi_hide55".into()),
            hidden,
        ));
        Obj::struct_member(None, 8, wrapper)
    }

    #[test]
    fn hide_kabi_keeps_original_field() {
        let mut root = Obj::struct_(Some("s".into()));
        root.add_member(wrapped_member());
        hide_kabi(&mut root, false);
        let member = &root.members[0];
        assert_eq!(member.name.as_deref(), Some("old_field"));
        assert_eq!(member.offset, Some(8));
        assert_eq!(
            member.ptr.as_deref().and_then(|o| o.base_type.as_deref()),
            Some("int")
        );
    }

    #[test]
    fn hide_kabi_new_keeps_replacement_field() {
        let mut root = Obj::struct_(Some("s".into()));
        root.add_member(wrapped_member());
        hide_kabi(&mut root, true);
        let member = &root.members[0];
        assert_eq!(member.name.as_deref(), Some("new_field"));
        assert_eq!(member.offset, Some(8));
        assert_eq!(
            member.ptr.as_deref().and_then(|o| o.base_type.as_deref()),
            Some("long")
        );
    }

    #[test]
    fn unrelated_unions_are_untouched() {
        let mut union = Obj::union_(None);
        union.add_member(Obj::var(Some("a".into()), Obj::base("int".into())));
        union.add_member(Obj::var(Some("b".into()), Obj::base("long".into())));
        let mut root = Obj::struct_(Some("s".into()));
        root.add_member(Obj::struct_member(None, 0, union.clone()));
        let before = root.clone();
        hide_kabi(&mut root, false);
        assert_eq!(root, before);
    }
}
