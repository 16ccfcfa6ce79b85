// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rendering of error blocks.
//!
//! An error block looks like:
//!
//! ```text
//! ======================================================================
//! ERROR: app.tests.MathTests.test_divide
//! ----------------------------------------------------------------------
//! <body>
//! ```
//!
//! The separator widths are part of the output contract: tooling greps for them.

use crate::{errors::RenderError, outcome::ErrorPayload};
use owo_colors::{OwoColorize, Style};
use std::fmt;
use swrite::{SWrite, swrite, swriteln};

/// The width of the separator lines around an error block's header.
pub const SEPARATOR_WIDTH: usize = 70;

/// Renders an error block to a string.
///
/// The body is rendered before anything is returned, so a payload that can't be rendered never
/// produces partial output.
pub(super) fn render_error_block(
    status_label: &str,
    label_style: Style,
    test: &dyn fmt::Display,
    payload: &ErrorPayload,
) -> Result<String, RenderError> {
    let mut body = String::new();
    write_body(&mut body, test, payload)?;

    let mut out = String::new();
    swriteln!(out, "{}", "=".repeat(SEPARATOR_WIDTH));
    swriteln!(out, "{}: {test}", status_label.style(label_style));
    swriteln!(out, "{}", "-".repeat(SEPARATOR_WIDTH));
    out.push_str(&body);
    out.push('\n');
    Ok(out)
}

fn write_body(
    out: &mut String,
    test: &dyn fmt::Display,
    payload: &ErrorPayload,
) -> Result<(), RenderError> {
    match payload {
        ErrorPayload::Structured {
            kind,
            value,
            traceback,
        } => {
            if !is_valid_kind(kind) {
                return Err(RenderError::new(test.to_string(), kind.as_str()));
            }
            if let Some(traceback) = traceback {
                for line in traceback.format_lines() {
                    out.push_str(&line);
                }
            }
            swrite!(out, "{kind}: {value}");
        }
        ErrorPayload::Preformatted(message) => {
            out.push_str(message);
        }
        ErrorPayload::Empty => {}
    }
    Ok(())
}

/// An error kind is printed as `<kind>: <value>`, so it must be a single non-empty word.
fn is_valid_kind(kind: &str) -> bool {
    !kind.is_empty() && !kind.contains(char::is_whitespace)
}
