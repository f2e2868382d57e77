// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Scalar expressions used by column defaults and check constraints
//!
//! Expressions arrive already resolved: column references are plain names
//! within the owning table, function names are lower-case builtins.

use super::capabilities::CapabilityProvider;
use super::datum::{ColumnType, Datum};
use super::error::{EvalError, EvalResult};
use super::evaluate::Builtin;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Plus,
    Minus,
    Mul,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Mul => "*",
        }
    }
}

/// A resolved scalar expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Literal(Datum),
    Column(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    IsNull {
        expr: Box<Expr>,
        #[serde(default)]
        negated: bool,
    },
    Function {
        name: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn literal(datum: Datum) -> Self {
        Expr::Literal(datum)
    }

    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    /// Names of every column the expression reads
    pub fn referenced_columns(&self) -> BTreeSet<String> {
        let mut columns = BTreeSet::new();
        self.collect_columns(&mut columns);
        columns
    }

    fn collect_columns(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Column(name) => {
                out.insert(name.clone());
            }
            Expr::Binary { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expr::Not(inner) | Expr::IsNull { expr: inner, .. } => inner.collect_columns(out),
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.collect_columns(out);
                }
            }
        }
    }

    /// Infer the result type of the expression
    ///
    /// Returns `Ok(None)` when the expression is an untyped NULL. Every
    /// function call is checked against `provider`, so a restricted provider
    /// rejects expressions that need capabilities it lacks.
    pub fn type_check<F>(&self, columns: &F, provider: &CapabilityProvider) -> EvalResult<Option<ColumnType>>
    where
        F: Fn(&str) -> Option<ColumnType>,
    {
        match self {
            Expr::Literal(datum) => Ok(datum.column_type()),
            Expr::Column(name) => columns(name)
                .map(Some)
                .ok_or_else(|| EvalError::UnknownColumn(name.clone())),
            Expr::Binary { op, left, right } => {
                let lt = left.type_check(columns, provider)?;
                let rt = right.type_check(columns, provider)?;
                if op.is_logical() {
                    expect_type(lt, ColumnType::Bool, op.symbol())?;
                    expect_type(rt, ColumnType::Bool, op.symbol())?;
                    Ok(Some(ColumnType::Bool))
                } else if op.is_comparison() {
                    if let (Some(l), Some(r)) = (lt, rt) {
                        if l != r {
                            return Err(EvalError::TypeMismatch(format!(
                                "cannot compare {} {} {}",
                                l,
                                op.symbol(),
                                r
                            )));
                        }
                    }
                    Ok(Some(ColumnType::Bool))
                } else {
                    expect_type(lt, ColumnType::Int8, op.symbol())?;
                    expect_type(rt, ColumnType::Int8, op.symbol())?;
                    Ok(Some(ColumnType::Int8))
                }
            }
            Expr::Not(inner) => {
                expect_type(inner.type_check(columns, provider)?, ColumnType::Bool, "NOT")?;
                Ok(Some(ColumnType::Bool))
            }
            Expr::IsNull { expr, .. } => {
                expr.type_check(columns, provider)?;
                Ok(Some(ColumnType::Bool))
            }
            Expr::Function { name, args } => {
                let builtin =
                    Builtin::lookup(name).ok_or_else(|| EvalError::UnknownFunction(name.clone()))?;
                builtin.check_arity(args.len())?;
                if let Some(capability) = builtin.capability() {
                    provider.require(capability)?;
                }
                let mut arg_types = Vec::with_capacity(args.len());
                for arg in args {
                    arg_types.push(arg.type_check(columns, provider)?);
                }
                builtin.return_type(&arg_types)
            }
        }
    }
}

fn expect_type(actual: Option<ColumnType>, expected: ColumnType, context: &str) -> EvalResult<()> {
    match actual {
        None => Ok(()),
        Some(ty) if ty == expected => Ok(()),
        Some(ty) => Err(EvalError::TypeMismatch(format!(
            "{} expects {}, found {}",
            context, expected, ty
        ))),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(datum) => write!(f, "{}", datum),
            Expr::Column(name) => write!(f, "{}", name),
            Expr::Binary { op, left, right } => write!(f, "({} {} {})", left, op.symbol(), right),
            Expr::Not(inner) => write!(f, "NOT {}", inner),
            Expr::IsNull { expr, negated } => {
                if *negated {
                    write!(f, "{} IS NOT NULL", expr)
                } else {
                    write!(f, "{} IS NULL", expr)
                }
            }
            Expr::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusterSettings;
    use crate::eval::Capability;

    fn columns(name: &str) -> Option<ColumnType> {
        match name {
            "id" | "qty" => Some(ColumnType::Int8),
            "label" => Some(ColumnType::String),
            _ => None,
        }
    }

    #[test]
    fn test_check_expression_types() {
        let provider = CapabilityProvider::restricted(ClusterSettings::default());
        let check = Expr::binary(
            BinaryOp::And,
            Expr::binary(BinaryOp::Gt, Expr::column("qty"), Expr::literal(Datum::Int(0))),
            Expr::IsNull {
                expr: Box::new(Expr::column("label")),
                negated: true,
            },
        );
        assert_eq!(
            check.type_check(&columns, &provider),
            Ok(Some(ColumnType::Bool))
        );
        assert_eq!(check.to_string(), "((qty > 0) AND label IS NOT NULL)");
        assert_eq!(
            check.referenced_columns().into_iter().collect::<Vec<_>>(),
            vec!["label".to_string(), "qty".to_string()]
        );
    }

    #[test]
    fn test_mismatched_comparison_rejected() {
        let provider = CapabilityProvider::restricted(ClusterSettings::default());
        let expr = Expr::binary(BinaryOp::Eq, Expr::column("label"), Expr::literal(Datum::Int(1)));
        assert!(matches!(
            expr.type_check(&columns, &provider),
            Err(EvalError::TypeMismatch(_))
        ));
        let unknown = Expr::column("missing");
        assert_eq!(
            unknown.type_check(&columns, &provider),
            Err(EvalError::UnknownColumn("missing".into()))
        );
    }

    #[test]
    fn test_restricted_provider_rejects_sequences() {
        let restricted = CapabilityProvider::restricted(ClusterSettings::default());
        let full = CapabilityProvider::full(ClusterSettings::default());
        let expr = Expr::function("nextval", vec![Expr::literal(Datum::String("s".into()))]);
        assert_eq!(
            expr.type_check(&columns, &restricted),
            Err(EvalError::Unsupported {
                capability: Capability::Sequence,
                context: "schema change planning",
            })
        );
        assert_eq!(expr.type_check(&columns, &full), Ok(Some(ColumnType::Int8)));
    }
}
