//! # ember-directives
//!
//! Extraction of structured directives from generated text.
//!
//! Generated replies carry a closed vocabulary of XML-like tags
//! (`<thought>`, `<command>`, `<message>`, `<status>`, `<call>`,
//! `<plan>`, `<delegate>`, `<browser/>`, `<git_resolve>`). This crate
//! scans for them with a small explicit scanner — no regular
//! expressions — so attribute parsing and malformed-input behavior are
//! first-class, tested steps.
//!
//! Extraction never fails: malformed input degrades to empty lists or,
//! for `<call>` bodies that are not valid JSON, a raw-string fallback.

#![deny(unsafe_code)]

pub mod directives;
pub mod scanner;

pub use directives::{
    BrowserAction, CallDirective, Delegation, DirectiveSet, PlanStep, Resolution,
};
