// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Evaluation context
//!
//! Values, expressions and the capability bundle that expression checking and
//! evaluation run against. The builder type-checks column defaults and check
//! constraints with a [`CapabilityProvider::Restricted`] provider; backfill and
//! validation evaluate them row by row with [`CapabilityProvider::Full`].

pub mod capabilities;
pub mod datum;
pub mod error;
pub mod evaluate;
pub mod expr;

pub use capabilities::{Capability, CapabilityProvider, FullCapabilities, RestrictedCapabilities};
pub use datum::{ColumnType, Datum};
pub use error::{EvalError, EvalResult};
pub use evaluate::{check_passes, evaluate};
pub use expr::{BinaryOp, Expr};
