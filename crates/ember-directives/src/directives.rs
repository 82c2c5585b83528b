//! Directive types and extraction entry points.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::trace;

use crate::scanner::{scan_bodies, scan_elements, strip_code_fences};

/// A `<call>` directive: decoded JSON or a raw-string fallback.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CallDirective {
    /// Body parsed as structured data.
    Structured(Value),
    /// Body was not valid JSON; kept verbatim.
    Raw(String),
}

/// One step of a `<plan>` checklist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Task description.
    pub description: String,
    /// Role the step is assigned to.
    pub role: String,
}

/// A `<delegate>` directive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    /// Identity, role, capability, or `"broadcast"`.
    pub recipient: String,
    /// Task text.
    pub task: String,
}

/// A `<browser/>` directive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserAction {
    /// Named action ("navigate", "click", "get_text", ...).
    pub action: String,
    /// Remaining attributes as free-form parameters.
    pub params: BTreeMap<String, String>,
}

/// A `<git_resolve>` directive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Conflicted file path.
    pub path: String,
    /// Resolved file content.
    pub content: String,
}

/// Everything extracted from one generated reply.
///
/// The primary tag lists are pre-extracted; `source` keeps the
/// fence-stripped text so the secondary patterns (plans, delegations,
/// browser actions, resolutions) can be pulled on demand.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectiveSet {
    /// `<thought>` bodies in document order.
    pub thoughts: Vec<String>,
    /// `<command>` bodies in document order.
    pub commands: Vec<String>,
    /// `<message>` bodies in document order.
    pub messages: Vec<String>,
    /// `<status>` bodies in document order.
    pub status_updates: Vec<String>,
    /// `<call>` bodies, decoded where possible.
    pub calls: Vec<CallDirective>,
    /// Fence-stripped source text.
    pub source: String,
}

impl DirectiveSet {
    /// Extract all directives from `text`. Never fails: malformed input
    /// yields empty lists or raw fallbacks.
    #[must_use]
    pub fn extract(text: &str) -> Self {
        let source = strip_code_fences(text);

        let calls = scan_bodies(&source, "call")
            .into_iter()
            .map(|body| match serde_json::from_str::<Value>(&body) {
                Ok(value) => CallDirective::Structured(value),
                Err(_) => CallDirective::Raw(body),
            })
            .collect();

        let set = Self {
            thoughts: scan_bodies(&source, "thought"),
            commands: scan_bodies(&source, "command"),
            messages: scan_bodies(&source, "message"),
            status_updates: scan_bodies(&source, "status"),
            calls,
            source,
        };
        trace!(
            thoughts = set.thoughts.len(),
            commands = set.commands.len(),
            messages = set.messages.len(),
            "directives extracted"
        );
        set
    }

    /// Plan steps from every `<plan>` block, in document order.
    #[must_use]
    pub fn plans(&self) -> Vec<PlanStep> {
        extract_plans(&self.source)
    }

    /// Delegations from every `<delegate>` element.
    #[must_use]
    pub fn delegations(&self) -> Vec<Delegation> {
        extract_delegations(&self.source)
    }

    /// Browser actions from every `<browser/>` element.
    #[must_use]
    pub fn browser_actions(&self) -> Vec<BrowserAction> {
        extract_browser_actions(&self.source)
    }

    /// Conflict resolutions from every `<git_resolve>` element.
    #[must_use]
    pub fn resolutions(&self) -> Vec<Resolution> {
        extract_resolutions(&self.source)
    }
}

/// Parse `- [ ] <description> (<role>)` checklist lines out of `<plan>`
/// blocks. Lines without a trailing role group are ignored.
#[must_use]
pub fn extract_plans(text: &str) -> Vec<PlanStep> {
    let mut steps = Vec::new();
    for block in scan_bodies(text, "plan") {
        for line in block.lines() {
            let line = line.trim();
            let Some(rest) = line.strip_prefix("- [ ]") else {
                continue;
            };
            let rest = rest.trim();
            let Some(open) = rest.rfind('(') else {
                continue;
            };
            if !rest.ends_with(')') {
                continue;
            }
            let description = rest[..open].trim();
            let role = rest[open + 1..rest.len() - 1].trim();
            if description.is_empty() || role.is_empty() {
                continue;
            }
            steps.push(PlanStep {
                description: description.to_owned(),
                role: role.to_owned(),
            });
        }
    }
    steps
}

/// Extract `<delegate recipient="…">task</delegate>` elements. Elements
/// without a recipient attribute or with an empty task are dropped.
#[must_use]
pub fn extract_delegations(text: &str) -> Vec<Delegation> {
    scan_elements(text, "delegate")
        .into_iter()
        .filter_map(|el| {
            let recipient = attr(&el.attrs, "recipient")?;
            let task = el.body?.trim().to_owned();
            if task.is_empty() {
                return None;
            }
            Some(Delegation { recipient, task })
        })
        .collect()
}

/// Extract `<browser action="…" …/>` elements. Elements without an
/// `action` attribute are dropped.
#[must_use]
pub fn extract_browser_actions(text: &str) -> Vec<BrowserAction> {
    scan_elements(text, "browser")
        .into_iter()
        .filter_map(|el| {
            let action = attr(&el.attrs, "action")?;
            let params = el
                .attrs
                .into_iter()
                .filter(|(key, _)| key != "action")
                .collect();
            Some(BrowserAction { action, params })
        })
        .collect()
}

/// Extract `<git_resolve path="…">content</git_resolve>` elements.
#[must_use]
pub fn extract_resolutions(text: &str) -> Vec<Resolution> {
    scan_elements(text, "git_resolve")
        .into_iter()
        .filter_map(|el| {
            let path = attr(&el.attrs, "path")?;
            let content = el.body?.trim().to_owned();
            Some(Resolution { path, content })
        })
        .collect()
}

fn attr(attrs: &[(String, String)], key: &str) -> Option<String> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    // ── primary tags ─────────────────────────────────────────────────────

    #[test]
    fn extracts_all_primary_tags() {
        let text = "\
            <thought>consider</thought>\n\
            <command>git status</command>\n\
            <message>working on it</message>\n\
            <status>busy</status>";
        let set = DirectiveSet::extract(text);
        assert_eq!(set.thoughts, ["consider"]);
        assert_eq!(set.commands, ["git status"]);
        assert_eq!(set.messages, ["working on it"]);
        assert_eq!(set.status_updates, ["busy"]);
    }

    #[test]
    fn repeated_tags_keep_document_order() {
        let text = "x<thought>a</thought>y<thought>b</thought><thought>c</thought>";
        let set = DirectiveSet::extract(text);
        assert_eq!(set.thoughts, ["a", "b", "c"]);
    }

    #[test]
    fn fenced_tags_are_scanned() {
        let text = "```xml\n<command>ls</command>\n```";
        let set = DirectiveSet::extract(text);
        assert_eq!(set.commands, ["ls"]);
    }

    #[test]
    fn plain_prose_yields_empty_set() {
        let set = DirectiveSet::extract("just words, no tags");
        assert!(set.thoughts.is_empty());
        assert!(set.commands.is_empty());
        assert!(set.calls.is_empty());
    }

    // ── calls ────────────────────────────────────────────────────────────

    #[test]
    fn call_with_valid_json_is_structured() {
        let set = DirectiveSet::extract(r#"<call>{"tool": "search", "q": "rust"}</call>"#);
        assert_matches!(&set.calls[0], CallDirective::Structured(v) if v["tool"] == json!("search"));
    }

    #[test]
    fn call_with_invalid_json_falls_back_to_raw() {
        let set = DirectiveSet::extract("<call>do the thing</call>");
        assert_eq!(set.calls, [CallDirective::Raw("do the thing".into())]);
    }

    #[test]
    fn mixed_calls_preserve_order() {
        let set = DirectiveSet::extract(r#"<call>{"a":1}</call><call>not json</call>"#);
        assert_eq!(set.calls.len(), 2);
        assert_matches!(set.calls[0], CallDirective::Structured(_));
        assert_matches!(set.calls[1], CallDirective::Raw(_));
    }

    // ── plans ────────────────────────────────────────────────────────────

    #[test]
    fn plan_lines_parse_description_and_role() {
        let text = "<plan>\n- [ ] Write tests (Test Engineer)\n- [ ] Update README (Documentarian)\n</plan>";
        let steps = DirectiveSet::extract(text).plans();
        assert_eq!(
            steps,
            [
                PlanStep {
                    description: "Write tests".into(),
                    role: "Test Engineer".into()
                },
                PlanStep {
                    description: "Update README".into(),
                    role: "Documentarian".into()
                }
            ]
        );
    }

    #[test]
    fn plan_lines_without_role_are_ignored() {
        let text = "<plan>\n- [ ] no role here\n- [ ] good (Architect)\n</plan>";
        let steps = DirectiveSet::extract(text).plans();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].role, "Architect");
    }

    #[test]
    fn plan_description_may_contain_parens() {
        let text = "<plan>\n- [ ] Fix foo() and bar() (Test Engineer)\n</plan>";
        let steps = DirectiveSet::extract(text).plans();
        assert_eq!(steps[0].description, "Fix foo() and bar()");
        assert_eq!(steps[0].role, "Test Engineer");
    }

    // ── delegations ──────────────────────────────────────────────────────

    #[test]
    fn delegation_parses_recipient_and_task() {
        let text = r#"<delegate recipient="Auditor">scan repo</delegate>"#;
        let delegations = DirectiveSet::extract(text).delegations();
        assert_eq!(
            delegations,
            [Delegation {
                recipient: "Auditor".into(),
                task: "scan repo".into()
            }]
        );
    }

    #[test]
    fn delegation_without_recipient_is_dropped() {
        let text = "<delegate>orphan task</delegate>";
        assert!(DirectiveSet::extract(text).delegations().is_empty());
    }

    // ── browser actions ──────────────────────────────────────────────────

    #[test]
    fn browser_action_keeps_extra_params() {
        let text = r#"<browser action="navigate" url="https://example.com"/>"#;
        let actions = DirectiveSet::extract(text).browser_actions();
        assert_eq!(actions[0].action, "navigate");
        assert_eq!(actions[0].params["url"], "https://example.com");
    }

    #[test]
    fn browser_without_action_is_dropped() {
        let text = r#"<browser url="https://example.com"/>"#;
        assert!(DirectiveSet::extract(text).browser_actions().is_empty());
    }

    #[test]
    fn multiple_browser_actions_in_order() {
        let text = r#"<browser action="navigate" url="https://e.com"/> then <browser action="get_text"/>"#;
        let actions = DirectiveSet::extract(text).browser_actions();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].action, "navigate");
        assert_eq!(actions[1].action, "get_text");
    }

    // ── resolutions ──────────────────────────────────────────────────────

    #[test]
    fn resolution_parses_path_and_content() {
        let text = "<git_resolve path=\"src/lib.rs\">fn main() {}\n</git_resolve>";
        let resolutions = DirectiveSet::extract(text).resolutions();
        assert_eq!(
            resolutions,
            [Resolution {
                path: "src/lib.rs".into(),
                content: "fn main() {}".into()
            }]
        );
    }

    #[test]
    fn resolution_without_path_is_dropped() {
        let text = "<git_resolve>content</git_resolve>";
        assert!(DirectiveSet::extract(text).resolutions().is_empty());
    }
}
