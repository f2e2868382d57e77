// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Expression evaluation against a single row

use super::capabilities::{Capability, CapabilityProvider};
use super::datum::{ColumnType, Datum};
use super::error::{EvalError, EvalResult};
use super::expr::{BinaryOp, Expr};
use std::cmp::Ordering;

/// Builtin scalar functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    Now,
    GenRandomUuid,
    CurrentUser,
    CurrentDatabase,
    ClusterId,
    Nextval,
    GatewayRegion,
    TenantName,
    HasTablePrivilege,
    ObjDescription,
    Lower,
    Upper,
    Length,
    Abs,
    Coalesce,
}

impl Builtin {
    pub(crate) fn lookup(name: &str) -> Option<Self> {
        let builtin = match name.to_ascii_lowercase().as_str() {
            "now" | "current_timestamp" => Builtin::Now,
            "gen_random_uuid" => Builtin::GenRandomUuid,
            "current_user" => Builtin::CurrentUser,
            "current_database" => Builtin::CurrentDatabase,
            "cluster_id" => Builtin::ClusterId,
            "nextval" => Builtin::Nextval,
            "gateway_region" => Builtin::GatewayRegion,
            "tenant_name" => Builtin::TenantName,
            "has_table_privilege" => Builtin::HasTablePrivilege,
            "obj_description" => Builtin::ObjDescription,
            "lower" => Builtin::Lower,
            "upper" => Builtin::Upper,
            "length" => Builtin::Length,
            "abs" => Builtin::Abs,
            "coalesce" => Builtin::Coalesce,
            _ => return None,
        };
        Some(builtin)
    }

    fn name(self) -> &'static str {
        match self {
            Builtin::Now => "now",
            Builtin::GenRandomUuid => "gen_random_uuid",
            Builtin::CurrentUser => "current_user",
            Builtin::CurrentDatabase => "current_database",
            Builtin::ClusterId => "cluster_id",
            Builtin::Nextval => "nextval",
            Builtin::GatewayRegion => "gateway_region",
            Builtin::TenantName => "tenant_name",
            Builtin::HasTablePrivilege => "has_table_privilege",
            Builtin::ObjDescription => "obj_description",
            Builtin::Lower => "lower",
            Builtin::Upper => "upper",
            Builtin::Length => "length",
            Builtin::Abs => "abs",
            Builtin::Coalesce => "coalesce",
        }
    }

    /// Capability the function needs, if any
    pub(crate) fn capability(self) -> Option<Capability> {
        match self {
            Builtin::Now => Some(Capability::Clock),
            Builtin::GenRandomUuid => Some(Capability::RandomUuid),
            Builtin::CurrentUser | Builtin::CurrentDatabase => Some(Capability::SessionData),
            Builtin::ClusterId => Some(Capability::ClusterIdentity),
            Builtin::Nextval => Some(Capability::Sequence),
            Builtin::GatewayRegion => Some(Capability::Region),
            Builtin::TenantName => Some(Capability::Tenant),
            Builtin::HasTablePrivilege => Some(Capability::PrivilegedAccess),
            Builtin::ObjDescription => Some(Capability::Planner),
            Builtin::Lower | Builtin::Upper | Builtin::Length | Builtin::Abs | Builtin::Coalesce => {
                None
            }
        }
    }

    pub(crate) fn check_arity(self, got: usize) -> EvalResult<()> {
        let expected = match self {
            Builtin::Now
            | Builtin::GenRandomUuid
            | Builtin::CurrentUser
            | Builtin::CurrentDatabase
            | Builtin::ClusterId
            | Builtin::GatewayRegion
            | Builtin::TenantName => 0,
            Builtin::Nextval
            | Builtin::ObjDescription
            | Builtin::Lower
            | Builtin::Upper
            | Builtin::Length
            | Builtin::Abs => 1,
            Builtin::HasTablePrivilege => 2,
            Builtin::Coalesce => {
                if got == 0 {
                    return Err(EvalError::WrongArgumentCount {
                        function: self.name().to_string(),
                        expected: 1,
                        got,
                    });
                }
                return Ok(());
            }
        };
        if expected == got {
            Ok(())
        } else {
            Err(EvalError::WrongArgumentCount {
                function: self.name().to_string(),
                expected,
                got,
            })
        }
    }

    pub(crate) fn return_type(self, args: &[Option<ColumnType>]) -> EvalResult<Option<ColumnType>> {
        let ty = match self {
            Builtin::Now => ColumnType::Timestamp,
            Builtin::GenRandomUuid | Builtin::ClusterId => ColumnType::Uuid,
            Builtin::CurrentUser
            | Builtin::CurrentDatabase
            | Builtin::GatewayRegion
            | Builtin::TenantName
            | Builtin::ObjDescription => ColumnType::String,
            Builtin::Nextval => {
                self.expect_arg(args, 0, ColumnType::String)?;
                ColumnType::Int8
            }
            Builtin::HasTablePrivilege => {
                self.expect_arg(args, 0, ColumnType::String)?;
                self.expect_arg(args, 1, ColumnType::String)?;
                ColumnType::Bool
            }
            Builtin::Lower | Builtin::Upper => {
                self.expect_arg(args, 0, ColumnType::String)?;
                ColumnType::String
            }
            Builtin::Length => {
                self.expect_arg(args, 0, ColumnType::String)?;
                ColumnType::Int8
            }
            Builtin::Abs => {
                self.expect_arg(args, 0, ColumnType::Int8)?;
                ColumnType::Int8
            }
            Builtin::Coalesce => {
                let mut found: Option<ColumnType> = None;
                for arg in args.iter().flatten() {
                    match found {
                        None => found = Some(*arg),
                        Some(ty) if ty == *arg => {}
                        Some(ty) => {
                            return Err(EvalError::TypeMismatch(format!(
                                "coalesce mixes {} and {}",
                                ty, arg
                            )))
                        }
                    }
                }
                return Ok(found);
            }
        };
        Ok(Some(ty))
    }

    fn expect_arg(self, args: &[Option<ColumnType>], idx: usize, expected: ColumnType) -> EvalResult<()> {
        match args.get(idx).copied().flatten() {
            Some(ty) if ty != expected => Err(EvalError::TypeMismatch(format!(
                "argument {} of {} must be {}, found {}",
                idx + 1,
                self.name(),
                expected,
                ty
            ))),
            _ => Ok(()),
        }
    }
}

/// Evaluate `expr` for one row
///
/// `row` resolves column names to the row's values; columns missing from the
/// row evaluate to NULL only when `row` says so, an unknown name is an error.
pub fn evaluate<F>(expr: &Expr, row: &F, provider: &CapabilityProvider) -> EvalResult<Datum>
where
    F: Fn(&str) -> Option<Datum>,
{
    match expr {
        Expr::Literal(datum) => Ok(datum.clone()),
        Expr::Column(name) => row(name).ok_or_else(|| EvalError::UnknownColumn(name.clone())),
        Expr::Binary { op, left, right } => {
            let l = evaluate(left, row, provider)?;
            // AND/OR short-circuit only on a decisive left operand
            match (op, &l) {
                (BinaryOp::And, Datum::Bool(false)) => return Ok(Datum::Bool(false)),
                (BinaryOp::Or, Datum::Bool(true)) => return Ok(Datum::Bool(true)),
                _ => {}
            }
            let r = evaluate(right, row, provider)?;
            eval_binary(*op, l, r)
        }
        Expr::Not(inner) => match evaluate(inner, row, provider)? {
            Datum::Null => Ok(Datum::Null),
            Datum::Bool(b) => Ok(Datum::Bool(!b)),
            other => Err(EvalError::TypeMismatch(format!("NOT applied to {}", other))),
        },
        Expr::IsNull { expr, negated } => {
            let is_null = evaluate(expr, row, provider)?.is_null();
            Ok(Datum::Bool(is_null != *negated))
        }
        Expr::Function { name, args } => {
            let builtin =
                Builtin::lookup(name).ok_or_else(|| EvalError::UnknownFunction(name.clone()))?;
            builtin.check_arity(args.len())?;
            if let Some(capability) = builtin.capability() {
                provider.require(capability)?;
            }
            let values = args
                .iter()
                .map(|arg| evaluate(arg, row, provider))
                .collect::<EvalResult<Vec<_>>>()?;
            call_builtin(builtin, values, provider)
        }
    }
}

fn call_builtin(builtin: Builtin, args: Vec<Datum>, provider: &CapabilityProvider) -> EvalResult<Datum> {
    let first = args.first().cloned().unwrap_or(Datum::Null);
    let value = match builtin {
        Builtin::Now => Datum::Timestamp(provider.now()),
        Builtin::GenRandomUuid => Datum::Uuid(provider.random_uuid()),
        Builtin::CurrentUser => Datum::String(provider.session().user.clone()),
        Builtin::CurrentDatabase => Datum::String(provider.session().database.clone()),
        Builtin::ClusterId => Datum::Uuid(provider.cluster_id()),
        Builtin::Nextval => match first {
            Datum::String(name) => Datum::Int(provider.next_sequence_value(&name)?),
            Datum::Null => Datum::Null,
            other => return Err(type_error(builtin, &other)),
        },
        Builtin::GatewayRegion => Datum::String(provider.region()?),
        Builtin::TenantName => Datum::String(provider.tenant()?),
        Builtin::HasTablePrivilege => match (&args[0], &args[1]) {
            (Datum::String(object), Datum::String(privilege)) => {
                Datum::Bool(provider.has_privilege(object, privilege)?)
            }
            _ => Datum::Null,
        },
        Builtin::ObjDescription => match first {
            Datum::String(object) => provider.object_description(&object)?,
            _ => Datum::Null,
        },
        Builtin::Lower | Builtin::Upper | Builtin::Length => match first {
            Datum::Null => Datum::Null,
            Datum::String(s) => match builtin {
                Builtin::Lower => Datum::String(s.to_lowercase()),
                Builtin::Upper => Datum::String(s.to_uppercase()),
                _ => Datum::Int(s.chars().count() as i64),
            },
            other => return Err(type_error(builtin, &other)),
        },
        Builtin::Abs => match first {
            Datum::Null => Datum::Null,
            Datum::Int(i) => Datum::Int(i.checked_abs().ok_or(EvalError::Overflow)?),
            other => return Err(type_error(builtin, &other)),
        },
        Builtin::Coalesce => args.into_iter().find(|d| !d.is_null()).unwrap_or(Datum::Null),
    };
    Ok(value)
}

fn type_error(builtin: Builtin, arg: &Datum) -> EvalError {
    EvalError::TypeMismatch(format!("{} cannot take {}", builtin.name(), arg))
}

fn eval_binary(op: BinaryOp, l: Datum, r: Datum) -> EvalResult<Datum> {
    if op.is_logical() {
        let lb = as_bool(&l)?;
        let rb = as_bool(&r)?;
        let value = match (op, lb, rb) {
            (BinaryOp::And, Some(false), _) | (BinaryOp::And, _, Some(false)) => Some(false),
            (BinaryOp::And, Some(true), Some(true)) => Some(true),
            (BinaryOp::Or, Some(true), _) | (BinaryOp::Or, _, Some(true)) => Some(true),
            (BinaryOp::Or, Some(false), Some(false)) => Some(false),
            _ => None,
        };
        return Ok(value.map(Datum::Bool).unwrap_or(Datum::Null));
    }
    if l.is_null() || r.is_null() {
        return Ok(Datum::Null);
    }
    if op.is_comparison() {
        if l.column_type() != r.column_type() {
            return Err(EvalError::TypeMismatch(format!(
                "cannot compare {} {} {}",
                l,
                op.symbol(),
                r
            )));
        }
        let ord = l.cmp(&r);
        let result = match op {
            BinaryOp::Eq => ord == Ordering::Equal,
            BinaryOp::NotEq => ord != Ordering::Equal,
            BinaryOp::Lt => ord == Ordering::Less,
            BinaryOp::LtEq => ord != Ordering::Greater,
            BinaryOp::Gt => ord == Ordering::Greater,
            _ => ord != Ordering::Less,
        };
        return Ok(Datum::Bool(result));
    }
    match (l, r) {
        (Datum::Int(a), Datum::Int(b)) => {
            let value = match op {
                BinaryOp::Plus => a.checked_add(b),
                BinaryOp::Minus => a.checked_sub(b),
                _ => a.checked_mul(b),
            };
            value.map(Datum::Int).ok_or(EvalError::Overflow)
        }
        (a, b) => Err(EvalError::TypeMismatch(format!(
            "{} {} {} is not defined",
            a,
            op.symbol(),
            b
        ))),
    }
}

fn as_bool(datum: &Datum) -> EvalResult<Option<bool>> {
    match datum {
        Datum::Null => Ok(None),
        Datum::Bool(b) => Ok(Some(*b)),
        other => Err(EvalError::TypeMismatch(format!("expected BOOL, found {}", other))),
    }
}

/// Check-constraint semantics: a row passes unless the check is FALSE
pub fn check_passes(result: &Datum) -> bool {
    !matches!(result, Datum::Bool(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusterSettings;
    use std::collections::HashMap;

    fn row(values: &[(&str, Datum)]) -> impl Fn(&str) -> Option<Datum> {
        let map: HashMap<String, Datum> = values
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_three_valued_logic() {
        let provider = CapabilityProvider::full(ClusterSettings::default());
        let r = row(&[("qty", Datum::Null)]);
        let gt = Expr::binary(BinaryOp::Gt, Expr::column("qty"), Expr::literal(Datum::Int(0)));
        let result = evaluate(&gt, &r, &provider).unwrap();
        assert_eq!(result, Datum::Null);
        assert!(check_passes(&result));

        let and_false = Expr::binary(BinaryOp::And, gt.clone(), Expr::literal(Datum::Bool(false)));
        assert_eq!(evaluate(&and_false, &r, &provider).unwrap(), Datum::Bool(false));
        let or_true = Expr::binary(BinaryOp::Or, gt, Expr::literal(Datum::Bool(true)));
        assert_eq!(evaluate(&or_true, &r, &provider).unwrap(), Datum::Bool(true));
    }

    #[test]
    fn test_arithmetic_and_functions() {
        let provider = CapabilityProvider::full(ClusterSettings::default());
        let r = row(&[("qty", Datum::Int(4)), ("label", Datum::String("Ab".into()))]);
        let expr = Expr::binary(BinaryOp::Mul, Expr::column("qty"), Expr::literal(Datum::Int(3)));
        assert_eq!(evaluate(&expr, &r, &provider).unwrap(), Datum::Int(12));
        let lower = Expr::function("lower", vec![Expr::column("label")]);
        assert_eq!(
            evaluate(&lower, &r, &provider).unwrap(),
            Datum::String("ab".into())
        );
        let user = Expr::function("current_user", vec![]);
        assert_eq!(
            evaluate(&user, &r, &provider).unwrap(),
            Datum::String("root".into())
        );
        let overflow = Expr::binary(
            BinaryOp::Plus,
            Expr::literal(Datum::Int(i64::MAX)),
            Expr::literal(Datum::Int(1)),
        );
        assert_eq!(evaluate(&overflow, &r, &provider), Err(EvalError::Overflow));
    }

    #[test]
    fn test_restricted_evaluation_fails_loudly() {
        let provider = CapabilityProvider::restricted(ClusterSettings::default());
        let r = row(&[]);
        let region = Expr::function("gateway_region", vec![]);
        assert!(matches!(
            evaluate(&region, &r, &provider),
            Err(EvalError::Unsupported {
                capability: Capability::Region,
                ..
            })
        ));
        let uuid = Expr::function("gen_random_uuid", vec![]);
        assert!(matches!(
            evaluate(&uuid, &r, &provider),
            Ok(Datum::Uuid(_))
        ));
    }
}
