//! Test Module
//!
//! Integration-level test suite for the StudioChat backend.
//!
//! ## Test Categories
//! - `knowledge_tests`: corpus loading, rendering, retrieval, reload
//! - `database_tests`: transcript and analytics CRUD
//! - `http_tests`: the axum surface — payloads, rate limits, error mapping
//! - `integration_tests`: full conversations through the supervisor
//!
//! Unit tests for the leaf modules (classifier, flow, limiter, prompt) live
//! inline next to the code they exercise.

pub mod support;

pub mod http_tests;
