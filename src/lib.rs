/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Tommaso Fontana
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

#![doc = include_str!("../README.md")]
// No warnings
//#![deny(warnings)]
#![deny(unstable_features)]
#![deny(trivial_casts)]
#![deny(unconditional_recursion)]
#![deny(clippy::empty_loop)]
#![deny(unreachable_code)]
#![deny(unreachable_pub)]
#![deny(unreachable_patterns)]
#![deny(unused_macro_rules)]
//#![deny(missing_docs)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod compare;
pub mod elf;
pub mod generate;
pub mod ksymtab;
pub mod objects;
pub mod utils;

/// File-name prefix of typedef records.
pub const TYPEDEF_FILE: &str = "typedef--";
/// File-name prefix of function records.
pub const FUNC_FILE: &str = "func--";
/// File-name prefix of struct records.
pub const STRUCT_FILE: &str = "struct--";
/// File-name prefix of union records.
pub const UNION_FILE: &str = "union--";
/// File-name prefix of enum records.
pub const ENUM_FILE: &str = "enum--";
/// File-name prefix of variable records.
pub const VAR_FILE: &str = "var--";

/// Synthetic origin path used for types built into the C compiler.
pub const BUILTIN_PATH: &str = "<built-in>";
/// Synthetic directory holding records for types we only saw declared.
pub const DECLARATION_PATH: &str = "<declarations>";
/// Directory under the output directory where files are temporarily staged.
pub const TEMP_PATH: &str = "<temp>";

/// Exit code reported when `compare` detects a kABI change.
pub const EXIT_KABI_CHANGE: u8 = 2;

/// Prelude module to import everything from this crate
pub mod prelude {
    pub use crate::compare::*;
    pub use crate::generate::*;
    pub use crate::ksymtab::*;
    pub use crate::objects::*;
    pub use crate::utils::*;
    pub use crate::{
        BUILTIN_PATH, DECLARATION_PATH, ENUM_FILE, EXIT_KABI_CHANGE, FUNC_FILE, STRUCT_FILE,
        TEMP_PATH, TYPEDEF_FILE, UNION_FILE, VAR_FILE,
    };
}
