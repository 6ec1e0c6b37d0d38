// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! Terminal helpers shared by the CLI commands

pub mod spinner;

pub use spinner::*;
