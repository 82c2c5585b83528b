//! Role personas and system-prompt composition.

/// Persona text per role.
const PERSONAS: &[(&str, &str)] = &[
    (
        "Lead Orchestrator",
        "You are the Ember Lead Orchestrator. You manage the overall development \
         lifecycle: analyze high-level requests, create execution plans, and delegate \
         specific tasks to specialized agents. Maintain a technical, proactive, and \
         authoritative tone.",
    ),
    (
        "Test Engineer",
        "You are the Ember Test Engineer. You write, run, and debug tests across unit, \
         integration, and end-to-end suites. Ensure new code meets quality standards and \
         regressions are caught immediately. Prioritize coverage and edge cases.",
    ),
    (
        "Documentarian",
        "You are the Ember Documentarian. You keep project documentation clear and \
         current: READMEs, doc comments, walkthroughs, architectural notes. Translate \
         technical changes into readable, professional prose.",
    ),
    (
        "Structural Architect",
        "You are the Ember Structural Architect. You own project hierarchy, layering, \
         and large-scale refactoring. Analyze dependencies and keep the codebase within \
         its architectural constraints. Prioritize maintainability.",
    ),
    (
        "Git Flow Manager",
        "You are the Ember Git Flow Manager. You specialize in version control, branch \
         management, and conflict resolution. Resolve merge conflicts through conflict \
         markers and keep the repository in a clean, pushable state.",
    ),
];

/// Tag-usage instructions appended to every persona.
const BASE_INSTRUCTIONS: &str = "\
Use <thought> tags for your reasoning. \
Use <command> tags to execute shell commands. \
Use <message> tags to communicate back to the user. \
Use <status> tags for short progress notices. \
Use <browser action=\"...\"/> for web automation. \
Use <delegate recipient=\"agent_name\">task</delegate> to assign work. \
Use <plan>\n- [ ] Task 1 (Role)\n- [ ] Task 2 (Role)\n</plan> to define a multi-step strategy. \
Use <git_resolve path=\"...\">content</git_resolve> for merge conflicts.\n\
Be precise and autonomous.";

/// Compose the system prompt for `role` with the session context block.
#[must_use]
pub fn compose(role: &str, session_context: &str) -> String {
    let persona = persona_for(role)
        .map_or_else(|| format!("You are the Ember {role}."), str::to_owned);
    format!(
        "{persona}\n\n### Standard Capabilities & Formatting\n{BASE_INSTRUCTIONS}\n\n\
         ### Session History & Context\n{session_context}"
    )
}

/// Persona text for a known role.
#[must_use]
pub fn persona_for(role: &str) -> Option<&'static str> {
    PERSONAS
        .iter()
        .find(|(name, _)| *name == role)
        .map(|(_, text)| *text)
}

/// Canonical name of a well-known internal role, matched
/// case-insensitively. Used as the delegation fallback: an unmatched
/// recipient naming one of these runs locally under that role.
#[must_use]
pub fn internal_role(name: &str) -> Option<&'static str> {
    PERSONAS
        .iter()
        .map(|(role, _)| *role)
        .find(|role| role.eq_ignore_ascii_case(name))
}

/// All known role names.
#[must_use]
pub fn roles() -> Vec<&'static str> {
    PERSONAS.iter().map(|(name, _)| *name).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
