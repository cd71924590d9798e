// Copyright 2025 Castor Contributors
// SPDX-License-Identifier: MIT

//! Colorized reporting for flows. Set the `NO_COLOR` environment variable
//! to a non-empty string or call [`no_color`] to keep the output plain.

pub mod logger;
pub mod report;

pub use logger::CodeLineLogger;
pub use report::{report_flow, report_status};

use console::Style;

/// Applies the `NO_COLOR` convention to the global color settings.
pub fn init() {
    if std::env::var("NO_COLOR").is_ok_and(|value| !value.is_empty()) {
        console::set_colors_enabled(false);
    }
}

/// Prevents colorizing the output.
pub fn no_color() {
    console::set_colors_enabled(false);
}

pub(crate) fn paint(style: &Style, text: &str) -> String {
    if console::colors_enabled() {
        style.apply_to(text).force_styling(true).to_string()
    } else {
        text.to_string()
    }
}
