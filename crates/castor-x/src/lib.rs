// Copyright 2025 Castor Contributors
// SPDX-License-Identifier: MIT

//! Extensions for `castor-flow` pipelines: flag-driven bootstrapping,
//! shell command execution, colorized reporting with call-site
//! attribution, and tracing instrumentation.

pub mod boot;
pub mod cmd;
pub mod color;
pub mod stack;
pub mod trace;
