//! Boolean selection expressions.
//!
//! A [`Cut`] is an immutable tree of literal selection strings combined with
//! negation, conjunction and disjunction. Sub-expressions are shared through
//! `Arc`, so the same base cut can appear in many category definitions and
//! combining never touches an operand.
//!
//! The empty literal selects every event: it is the identity of [`Cut::and`]
//! and absorbs [`Cut::or`].

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::expr::CompiledExpr;

/// Node of a selection tree.
#[derive(Debug, PartialEq, Eq, Hash)]
pub enum CutNode {
    /// Raw selection text, stored verbatim. Blank selects everything.
    Literal(String),
    /// Complement of the inner selection.
    Not(Cut),
    /// Both selections hold.
    And(Cut, Cut),
    /// Either selection holds.
    Or(Cut, Cut),
}

/// Immutable selection expression. Cloning is cheap and shares the tree.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Cut(Arc<CutNode>);

impl Cut {
    /// Wrap raw selection text verbatim.
    pub fn new(text: impl AsRef<str>) -> Self {
        Cut(Arc::new(CutNode::Literal(text.as_ref().to_string())))
    }

    /// The expression selecting every event.
    pub fn all() -> Self {
        Cut::new("")
    }

    /// Whether this is a blank (select-everything) literal.
    pub fn is_all(&self) -> bool {
        matches!(self.node(), CutNode::Literal(s) if s.trim().is_empty())
    }

    /// Tree node of this expression.
    pub fn node(&self) -> &CutNode {
        &self.0
    }

    /// Complement. Negating a negation returns the original operand.
    pub fn negate(&self) -> Cut {
        match self.node() {
            CutNode::Not(inner) => inner.clone(),
            _ => Cut(Arc::new(CutNode::Not(self.clone()))),
        }
    }

    /// Conjunction. The select-everything literal is dropped.
    pub fn and(&self, other: &Cut) -> Cut {
        if self.is_all() {
            return other.clone();
        }
        if other.is_all() {
            return self.clone();
        }
        Cut(Arc::new(CutNode::And(self.clone(), other.clone())))
    }

    /// Disjunction. Either side selecting everything makes the result select everything.
    pub fn or(&self, other: &Cut) -> Cut {
        if self.is_all() || other.is_all() {
            return Cut::all();
        }
        Cut(Arc::new(CutNode::Or(self.clone(), other.clone())))
    }

    /// Conjunction of all `cuts` (select everything when empty).
    pub fn all_of<'a>(cuts: impl IntoIterator<Item = &'a Cut>) -> Cut {
        cuts.into_iter().fold(Cut::all(), |acc, c| acc.and(c))
    }

    /// Disjunction of all `cuts`. `None` when `cuts` is empty.
    pub fn any_of<'a>(cuts: impl IntoIterator<Item = &'a Cut>) -> Option<Cut> {
        cuts.into_iter().fold(None, |acc, c| match acc {
            None => Some(c.clone()),
            Some(a) => Some(a.or(c)),
        })
    }

    /// Canonical selection string understood by the event-selection evaluator.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out);
        out
    }

    /// Compile with the built-in evaluator.
    pub fn compile(&self) -> Result<CompiledExpr> {
        CompiledExpr::compile(&self.serialize())
    }

    fn write_into(&self, out: &mut String) {
        match self.node() {
            CutNode::Literal(s) => out.push_str(s),
            CutNode::Not(inner) => {
                out.push_str("!(");
                if inner.is_all() {
                    out.push('1');
                } else {
                    inner.write_into(out);
                }
                out.push(')');
            }
            CutNode::And(a, b) => write_binary(out, a, " && ", b),
            CutNode::Or(a, b) => write_binary(out, a, " || ", b),
        }
    }
}

fn write_binary(out: &mut String, a: &Cut, op: &str, b: &Cut) {
    out.push('(');
    a.write_into(out);
    out.push(')');
    out.push_str(op);
    out.push('(');
    b.write_into(out);
    out.push(')');
}

impl Default for Cut {
    fn default() -> Self {
        Cut::all()
    }
}

impl fmt::Display for Cut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

impl fmt::Debug for Cut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cut({:?})", self.serialize())
    }
}

impl From<&str> for Cut {
    fn from(s: &str) -> Self {
        Cut::new(s)
    }
}

impl From<String> for Cut {
    fn from(s: String) -> Self {
        Cut::new(s)
    }
}

impl From<Cut> for String {
    fn from(c: Cut) -> Self {
        c.serialize()
    }
}

impl Not for Cut {
    type Output = Cut;
    fn not(self) -> Cut {
        self.negate()
    }
}

impl Not for &Cut {
    type Output = Cut;
    fn not(self) -> Cut {
        self.negate()
    }
}

impl BitAnd for Cut {
    type Output = Cut;
    fn bitand(self, rhs: Cut) -> Cut {
        Cut::and(&self, &rhs)
    }
}

impl BitAnd for &Cut {
    type Output = Cut;
    fn bitand(self, rhs: &Cut) -> Cut {
        self.and(rhs)
    }
}

impl BitOr for Cut {
    type Output = Cut;
    fn bitor(self, rhs: Cut) -> Cut {
        Cut::or(&self, &rhs)
    }
}

impl BitOr for &Cut {
    type Output = Cut;
    fn bitor(self, rhs: &Cut) -> Cut {
        self.or(rhs)
    }
}

// Rebinds `self` to a new tree; other holders of the old tree are unaffected.
impl BitAndAssign<&Cut> for Cut {
    fn bitand_assign(&mut self, rhs: &Cut) {
        *self = self.and(rhs);
    }
}

impl BitOrAssign<&Cut> for Cut {
    fn bitor_assign(&mut self, rhs: &Cut) {
        *self = self.or(rhs);
    }
}
