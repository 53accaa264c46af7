//! Shared fixtures for the ponzi behavior suites.

pub mod support;
