//! Length-Bucketed Dispatch
//!
//! Both generated name parsers match a runtime string against a fixed set of
//! candidates. Candidates are grouped by byte length; the generated code
//! switches on the length and then walks an `if / else if` chain of `memcmp`
//! tests in declaration order.

use crate::ir::{BinOp, Expr, Stmt, SwitchCase};
use std::collections::BTreeMap;

/// Bucketing of candidate names by length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPlan {
    names: Vec<String>,
    /// Length → candidate indices, in declaration order
    buckets: BTreeMap<usize, Vec<usize>>,
}

impl DispatchPlan {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut buckets: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (index, name) in names.iter().enumerate() {
            buckets.entry(name.len()).or_default().push(index);
        }
        Self { names, buckets }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Bucket lengths in ascending order, each with its candidate indices
    pub fn buckets(&self) -> impl Iterator<Item = (usize, &[usize])> {
        self.buckets.iter().map(|(len, indices)| (*len, indices.as_slice()))
    }

    /// Index of the candidate the generated code selects for `name`
    ///
    /// The first candidate in declaration order wins when names repeat.
    pub fn resolve(&self, name: &[u8]) -> Option<usize> {
        self.buckets
            .get(&name.len())?
            .iter()
            .copied()
            .find(|&index| self.names[index].as_bytes() == name)
    }

    /// Lower the plan to a `switch` over `name_size`
    ///
    /// `arm` produces the body run when candidate `index` matches. Unmatched
    /// names leave the switch normally so the caller's fall-through code runs
    /// next.
    pub fn lower(&self, name_size: &str, name: &str, mut arm: impl FnMut(usize) -> Vec<Stmt>) -> Stmt {
        let cases = self
            .buckets
            .iter()
            .map(|(len, indices)| {
                let chain = indices.iter().rev().fold(None, |else_body, &index| {
                    let test = Expr::binary(
                        BinOp::Eq,
                        Expr::call(
                            "memcmp",
                            vec![
                                Expr::ident(name),
                                Expr::str(self.names[index].as_str()),
                                Expr::Int(*len as i64),
                            ],
                        ),
                        Expr::Int(0),
                    );
                    Some(Stmt::If {
                        cond: test,
                        then_body: Vec::new(),
                        else_body: else_body.map(|stmt| vec![stmt]),
                    })
                });
                let mut body: Vec<Stmt> = chain.into_iter().collect();
                fill_arms(&mut body, indices, &mut arm);
                body.push(Stmt::Break);
                SwitchCase {
                    value: Expr::Int(*len as i64),
                    body,
                }
            })
            .collect();

        Stmt::Switch {
            scrutinee: Expr::ident(name_size),
            cases,
        }
    }
}

/// Fill the `then` bodies of an `else if` chain front to back, so `arm` is
/// called in declaration order
fn fill_arms(body: &mut [Stmt], indices: &[usize], arm: &mut impl FnMut(usize) -> Vec<Stmt>) {
    let mut slot = body.first_mut();
    for &index in indices {
        let Some(Stmt::If {
            then_body,
            else_body,
            ..
        }) = slot
        else {
            return;
        };
        *then_body = arm(index);
        slot = else_body.as_mut().and_then(|stmts| stmts.first_mut());
    }
}
