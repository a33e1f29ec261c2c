// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! CLI subsystem for Meshpress

pub mod reporter;

pub use reporter::Reporter;
