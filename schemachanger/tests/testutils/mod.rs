//! Test utilities for schema changer integration tests
//!
//! - TestFixture: a sled-backed SchemaChanger in a temporary directory
//! - statements: DDL used across the suites

#![allow(dead_code)]

pub mod statements;
pub mod test_fixture;
