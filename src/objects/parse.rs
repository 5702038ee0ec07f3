/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Parser reconstructing type graphs from their on-disk form.
//!
//! Comparison and `show` consume parsed graphs, never raw DWARF; this module
//! accepts exactly the language emitted by [`print_tree`](super::print_tree)
//! with the default display options.

use super::{Obj, ObjKind};
use anyhow::{bail, Context, Result};
use std::path::Path;

/// Placeholder written in the CU line of records generated without `-g`.
pub const CU_NOT_TRACKED: &str = "<nottracked>";

/// A record file parsed back into structured form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    /// Compilation unit name; `None` when the record carries the
    /// [`CU_NOT_TRACKED`] placeholder.
    pub cu: Option<String>,
    /// Source file of the type definition.
    pub file: String,
    /// Source line of the type definition.
    pub line: u64,
    /// Containment stack entries, outermost first.
    pub stack: Vec<String>,
    /// The root type node.
    pub obj: Obj,
}

/// Reads and parses the record file at `path`.
pub fn parse_record_file(path: impl AsRef<Path>) -> Result<ParsedRecord> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read record file {}", path.display()))?;
    parse_record(&text).with_context(|| format!("Cannot parse record file {}", path.display()))
}

/// Parses the textual form of a record.
pub fn parse_record(text: &str) -> Result<ParsedRecord> {
    let mut parser = Parser {
        lines: text.lines().collect(),
        pos: 0,
    };
    let record = parser.parse_record()?;
    if parser.pos != parser.lines.len() {
        bail!("Trailing garbage at line {}", parser.pos + 1);
    }
    Ok(record)
}

/// Parses a bare type tree (no record header), as printed by `show`.
pub fn parse_tree(text: &str) -> Result<Obj> {
    let mut parser = Parser {
        lines: text.lines().collect(),
        pos: 0,
    };
    let obj = parser.parse_root_slot()?;
    if parser.pos != parser.lines.len() {
        bail!("Trailing garbage at line {}", parser.pos + 1);
    }
    Ok(obj)
}

/// Chain keywords; C reserved words, so they can never collide with the
/// name of a member or tag.
const KEYWORDS: &[&str] = &["struct", "union", "enum", "const", "volatile", "typedef"];

#[derive(Clone)]
struct Cursor<'a> {
    line: &'a str,
    pos: usize,
    lineno: usize,
}

impl<'a> Cursor<'a> {
    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c == ' ' || c == '\t') {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.line[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.line[self.pos..].starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn at_eol(&mut self) -> bool {
        self.skip_ws();
        self.pos >= self.line.len()
    }

    fn expect_eol(&mut self) -> Result<()> {
        if !self.at_eol() {
            bail!(
                "Unexpected trailing text {:?} at line {}",
                &self.line[self.pos..],
                self.lineno
            );
        }
        Ok(())
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        if !self.eat(token) {
            bail!(
                "Expected {:?} at line {}, found {:?}",
                token,
                self.lineno,
                &self.line[self.pos..]
            );
        }
        Ok(())
    }

    /// Consumes a C-like identifier, if one starts here.
    fn ident(&mut self) -> Option<&'a str> {
        let rest = &self.line[self.pos..];
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '$'))
            .unwrap_or(rest.len());
        if end == 0 || rest.as_bytes()[0].is_ascii_digit() {
            return None;
        }
        self.pos += end;
        Some(&rest[..end])
    }

    fn number(&mut self) -> Result<u64> {
        let rest = &self.line[self.pos..];
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if end == 0 {
            bail!("Expected a number at line {}", self.lineno);
        }
        self.pos += end;
        rest[..end]
            .parse()
            .with_context(|| format!("Number out of range at line {}", self.lineno))
    }

    fn hex_number(&mut self) -> Result<u64> {
        let rest = &self.line[self.pos..];
        let end = rest
            .find(|c: char| !c.is_ascii_hexdigit())
            .unwrap_or(rest.len());
        if end == 0 {
            bail!("Expected a hexadecimal number at line {}", self.lineno);
        }
        self.pos += end;
        u64::from_str_radix(&rest[..end], 16)
            .with_context(|| format!("Number out of range at line {}", self.lineno))
    }

    /// Consumes a `"..."` token and returns its content.
    fn quoted(&mut self) -> Result<String> {
        self.expect("\"")?;
        let rest = &self.line[self.pos..];
        let Some(end) = rest.find('"') else {
            bail!("Unterminated string at line {}", self.lineno);
        };
        self.pos += end + 1;
        Ok(rest[..end].to_string())
    }
}

struct Parser<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn next_line(&mut self) -> Result<Cursor<'a>> {
        let Some(line) = self.lines.get(self.pos) else {
            bail!("Unexpected end of input at line {}", self.pos + 1);
        };
        self.pos += 1;
        Ok(Cursor {
            line,
            pos: 0,
            lineno: self.pos,
        })
    }

    fn parse_record(&mut self) -> Result<ParsedRecord> {
        let mut cur = self.next_line()?;
        cur.expect("CU ")?;
        let cu = cur.quoted()?;
        cur.expect_eol()?;
        let cu = (cu != CU_NOT_TRACKED).then_some(cu);

        let mut cur = self.next_line()?;
        cur.expect("File ")?;
        let rest = &cur.line[cur.pos..];
        let Some((file, line)) = rest.rsplit_once(':') else {
            bail!("Malformed origin line {}", cur.lineno);
        };
        let line: u64 = line
            .trim()
            .parse()
            .with_context(|| format!("Malformed origin line {}", cur.lineno))?;
        let file = file.to_string();

        let mut stack = Vec::new();
        while self
            .lines
            .get(self.pos)
            .is_some_and(|l| l.starts_with("-> "))
        {
            let mut cur = self.next_line()?;
            cur.expect("-> ")?;
            stack.push(cur.quoted()?);
            cur.expect_eol()?;
        }

        let obj = self.parse_root_slot()?;
        Ok(ParsedRecord {
            cu,
            file,
            line,
            stack,
            obj,
        })
    }

    /// Parses the root slot of a record: a weak alias reference, a function,
    /// a variable, or a bare type chain (composite, typedef, ...).
    fn parse_root_slot(&mut self) -> Result<Obj> {
        let mut cur = self.next_line()?;
        cur.skip_ws();

        // `weak "<global>" @"<path>"`; if the probe fails, `weak` is an
        // ordinary symbol name.
        let mut probe = cur.clone();
        if probe.eat("weak ") {
            probe.skip_ws();
            if probe.peek() == Some('"') {
                let link = probe.quoted()?;
                probe.skip_ws();
                if probe.eat("@") {
                    let path = probe.quoted()?;
                    probe.expect_eol()?;
                    return Ok(Obj::weak_reffile(path, link));
                }
            }
        }

        self.parse_named_slot(cur)
    }

    /// Parses `[name ]<chain>` in root position: a named chain becomes a
    /// function or a variable, a bare chain (composite, typedef) stays bare.
    fn parse_named_slot(&mut self, mut cur: Cursor<'a>) -> Result<Obj> {
        cur.skip_ws();
        let save = cur.clone();
        if let Some(word) = cur.ident() {
            if !KEYWORDS.contains(&word) {
                cur.skip_ws();
                if cur.peek() == Some('(') {
                    return self.parse_func(Some(word.to_string()), cur);
                }
                let inner = self.parse_chain(&mut cur)?;
                return Ok(Obj::var(Some(word.to_string()), inner));
            }
        }
        let mut cur = save;
        self.parse_chain(&mut cur)
    }

    /// Parses `[name ]<chain>` in member position (union members, function
    /// formals), which always makes a `Var` slot.
    fn parse_var_slot(&mut self, mut cur: Cursor<'a>) -> Result<Obj> {
        cur.skip_ws();
        let save = cur.clone();
        if let Some(word) = cur.ident() {
            if !KEYWORDS.contains(&word) {
                cur.skip_ws();
                let inner = if cur.peek() == Some('(') {
                    self.parse_func(None, cur)?
                } else {
                    self.parse_chain(&mut cur)?
                };
                return Ok(Obj::var(Some(word.to_string()), inner));
            }
        }
        let mut cur = save;
        let inner = self.parse_chain(&mut cur)?;
        Ok(Obj::var(None, inner))
    }

    /// Parses a type chain on the current line, consuming further lines for
    /// composites, functions and typedefs.
    fn parse_chain(&mut self, cur: &mut Cursor<'a>) -> Result<Obj> {
        cur.skip_ws();
        match cur.peek() {
            Some('*') => {
                cur.bump();
                Ok(Obj::ptr(self.parse_chain(cur)?))
            }
            Some('[') => {
                cur.bump();
                let index = cur.number()?;
                cur.expect("]")?;
                Ok(Obj::array(index, self.parse_chain(cur)?))
            }
            Some('"') => {
                let text = cur.quoted()?;
                cur.expect_eol()?;
                Ok(Obj::base(text))
            }
            Some('@') => {
                cur.bump();
                let path = cur.quoted()?;
                cur.expect_eol()?;
                Ok(Obj::reffile(path))
            }
            Some('(') => self.parse_func(None, cur.clone()),
            _ => {
                let Some(word) = cur.ident() else {
                    bail!("Cannot parse type at line {}", cur.lineno);
                };
                match word {
                    "const" | "volatile" => Ok(Obj::qualifier(word, self.parse_chain(cur)?)),
                    "typedef" => {
                        cur.skip_ws();
                        let Some(name) = cur.ident() else {
                            bail!("typedef without a name at line {}", cur.lineno);
                        };
                        let name = name.to_string();
                        cur.expect_eol()?;
                        let mut next = self.next_line()?;
                        let inner = self.parse_chain(&mut next)?;
                        Ok(Obj::typedef(name, inner))
                    }
                    "struct" => self.parse_composite(ObjKind::Struct, cur),
                    "union" => self.parse_composite(ObjKind::Union, cur),
                    "enum" => self.parse_composite(ObjKind::Enum, cur),
                    _ => {
                        cur.skip_ws();
                        if cur.peek() == Some('(') {
                            return self.parse_func(Some(word.to_string()), cur.clone());
                        }
                        bail!("Unexpected token {:?} at line {}", word, cur.lineno);
                    }
                }
            }
        }
    }

    /// Parses `[<name>] [size(N)] [align(N)] {` plus the member lines up to
    /// the closing brace.
    fn parse_composite(&mut self, kind: ObjKind, cur: &mut Cursor<'a>) -> Result<Obj> {
        let mut obj = match kind {
            ObjKind::Struct => Obj::struct_(None),
            ObjKind::Union => Obj::union_(None),
            _ => Obj::enum_(None),
        };
        loop {
            cur.skip_ws();
            if cur.eat("{") {
                cur.expect_eol()?;
                break;
            }
            let Some(word) = cur.ident() else {
                bail!("Malformed composite head at line {}", cur.lineno);
            };
            // Attributes glue the parenthesis to the word, tag names cannot.
            if cur.peek() == Some('(') && (word == "size" || word == "align") {
                cur.bump();
                let value = cur.number()?;
                cur.expect(")")?;
                match word {
                    "size" => obj.byte_size = value,
                    _ => obj.alignment = value as u32,
                }
            } else if obj.name.is_none() {
                obj.name = Some(word.to_string());
            } else {
                bail!("Two names in composite head at line {}", cur.lineno);
            }
        }
        loop {
            let mut cur = self.next_line()?;
            cur.skip_ws();
            if cur.eat("}") {
                cur.expect_eol()?;
                return Ok(obj);
            }
            let member = match kind {
                ObjKind::Struct => self.parse_member_slot(cur)?,
                ObjKind::Union => self.parse_var_slot(cur)?,
                _ => Self::parse_constant_slot(cur)?,
            };
            obj.add_member(member);
        }
    }

    /// Parses `0x<offset>[:first-last] [name ]<chain>`.
    fn parse_member_slot(&mut self, mut cur: Cursor<'a>) -> Result<Obj> {
        cur.expect("0x")?;
        let offset = cur.hex_number()?;
        let bitfield = if cur.eat(":") {
            let first = cur.number()? as u32;
            cur.expect("-")?;
            let last = cur.number()? as u32;
            Some((first, last))
        } else {
            None
        };
        cur.skip_ws();
        let mut name = None;
        let save = cur.clone();
        if let Some(word) = cur.ident() {
            if !KEYWORDS.contains(&word) && {
                cur.skip_ws();
                cur.peek() != Some('(')
            } {
                name = Some(word.to_string());
            } else {
                cur = save;
            }
        } else {
            cur = save;
        }
        let inner = self.parse_chain(&mut cur)?;
        let mut member = Obj::struct_member(name, offset, inner);
        member.bitfield = bitfield;
        Ok(member)
    }

    /// Parses `<name> = <value>`.
    fn parse_constant_slot(mut cur: Cursor<'a>) -> Result<Obj> {
        let Some(name) = cur.ident() else {
            bail!("Malformed enumerator at line {}", cur.lineno);
        };
        let name = name.to_string();
        cur.skip_ws();
        cur.expect("=")?;
        cur.skip_ws();
        let value = cur.number()?;
        cur.expect_eol()?;
        Ok(Obj::constant(name, value))
    }

    /// Parses `(` formals `) <return-chain>`; `cur` is positioned at the
    /// opening parenthesis.
    fn parse_func(&mut self, name: Option<String>, mut cur: Cursor<'a>) -> Result<Obj> {
        cur.expect("(")?;
        cur.expect_eol()?;
        let mut formals = Vec::new();
        loop {
            let mut cur = self.next_line()?;
            cur.skip_ws();
            if cur.eat(")") {
                let ret = self.parse_chain(&mut cur)?;
                let mut func = Obj::func(name, ret);
                func.members = formals;
                return Ok(func);
            }
            formals.push(self.parse_var_slot(cur)?);
        }
    }
}

#[cfg(test)]
mod test {
    use super::super::{print_tree, DisplayOpts};
    use super::*;

    #[test]
    fn parse_member_named_like_keywords() -> Result<()> {
        // `size`, `weak` and `func` are valid C identifiers.
        let text = "struct s {\n    0x0 size \"int\"\n    0x4 weak \"int\"\n    0x8 func *(\n    ) \"void\"\n}\n";
        let obj = parse_tree(text)?;
        let names: Vec<_> = obj.members.iter().map(|m| m.name.clone()).collect();
        assert_eq!(
            names,
            vec![
                Some("size".to_string()),
                Some("weak".to_string()),
                Some("func".to_string())
            ]
        );
        assert_eq!(print_tree(&obj, "", &DisplayOpts::default()), text);
        Ok(())
    }

    #[test]
    fn parse_weak_root() -> Result<()> {
        let obj = parse_tree("weak \"global_sym\" @\"func--global_sym.txt\"\n")?;
        assert!(obj.is_weak());
        assert_eq!(obj.link.as_deref(), Some("global_sym"));
        assert_eq!(obj.base_type.as_deref(), Some("func--global_sym.txt"));
        Ok(())
    }

    #[test]
    fn parse_variable_named_weak() -> Result<()> {
        let obj = parse_tree("weak \"unsigned long\"\n")?;
        assert_eq!(obj.kind, ObjKind::Var);
        assert_eq!(obj.name.as_deref(), Some("weak"));
        Ok(())
    }
}
