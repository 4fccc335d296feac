//! Integration tests for cassgate.
//!
//! End-to-end scenarios across the registry, governor, admission gate,
//! transports and the assembled application.

mod cases_multi_tenant_test;

pub mod support;
