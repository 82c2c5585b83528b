//! Command-approval policy.
//!
//! A policy is a named mode plus three static substring lists. Evaluation
//! is stateless and happens once per command invocation. The deny list is
//! consulted first in every mode, including `Auto`.

use serde::{Deserialize, Serialize};

/// Approval mode for autonomous command execution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalPolicy {
    /// Anything not on the deny list runs.
    Auto,
    /// Privileged contexts may additionally run privileged-approved commands.
    PrivilegedOnly,
    /// Default-deny: only auto-approved commands run.
    #[default]
    Manual,
}

/// Outcome of evaluating one command against the policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandVerdict {
    /// The command may run.
    Approved,
    /// The command must not run; the reason is loggable, not an error.
    Blocked(BlockReason),
}

/// Why a command was blocked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockReason {
    /// Matched an always-deny substring.
    DenyList,
    /// No rule approved it under the active mode.
    NotApproved,
}

/// Command-approval rule set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SafetyPolicy {
    /// Active approval mode.
    pub policy: ApprovalPolicy,
    /// Substrings that approve a command in any mode.
    pub auto_approved: Vec<String>,
    /// Substrings approved only for privileged contexts in `PrivilegedOnly`.
    pub privileged_approved: Vec<String>,
    /// Substrings that reject a command regardless of mode.
    pub always_deny: Vec<String>,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            policy: ApprovalPolicy::default(),
            auto_approved: [
                "ls",
                "pwd",
                "git status",
                "git diff",
                "cat",
            ]
            .map(str::to_owned)
            .to_vec(),
            privileged_approved: [
                "git add",
                "git commit",
                "git push",
                "git merge",
                "git checkout",
                "git branch",
                "cargo test",
                "cargo check",
            ]
            .map(str::to_owned)
            .to_vec(),
            always_deny: ["rm -rf", "mkfs", "dd if=", ":(){", "shutdown", "reboot"]
                .map(str::to_owned)
                .to_vec(),
        }
    }
}

impl SafetyPolicy {
    /// Evaluate one command.
    ///
    /// Order: deny list (case-insensitive, every mode) → auto-approved →
    /// privileged-approved when `privileged` and mode is `PrivilegedOnly` →
    /// blanket accept under `Auto` → reject.
    #[must_use]
    pub fn evaluate(&self, command: &str, privileged: bool) -> CommandVerdict {
        let lowered = command.to_lowercase();
        if self
            .always_deny
            .iter()
            .any(|deny| lowered.contains(&deny.to_lowercase()))
        {
            return CommandVerdict::Blocked(BlockReason::DenyList);
        }

        if self.auto_approved.iter().any(|ok| command.contains(ok)) {
            return CommandVerdict::Approved;
        }

        match self.policy {
            ApprovalPolicy::Auto => CommandVerdict::Approved,
            ApprovalPolicy::PrivilegedOnly if privileged => {
                if self
                    .privileged_approved
                    .iter()
                    .any(|ok| command.contains(ok))
                {
                    CommandVerdict::Approved
                } else {
                    CommandVerdict::Blocked(BlockReason::NotApproved)
                }
            }
            ApprovalPolicy::PrivilegedOnly | ApprovalPolicy::Manual => {
                CommandVerdict::Blocked(BlockReason::NotApproved)
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(mode: ApprovalPolicy) -> SafetyPolicy {
        SafetyPolicy {
            policy: mode,
            ..SafetyPolicy::default()
        }
    }

    // ── Deny list ────────────────────────────────────────────────────────

    #[test]
    fn deny_list_rejects_in_every_mode() {
        for mode in [
            ApprovalPolicy::Auto,
            ApprovalPolicy::PrivilegedOnly,
            ApprovalPolicy::Manual,
        ] {
            let verdict = policy(mode).evaluate("rm -rf /", true);
            assert_eq!(verdict, CommandVerdict::Blocked(BlockReason::DenyList));
        }
    }

    #[test]
    fn deny_list_beats_auto_approval() {
        let mut p = policy(ApprovalPolicy::Manual);
        p.auto_approved.push("rm -rf ./build".into());
        let verdict = p.evaluate("rm -rf ./build", false);
        assert_eq!(verdict, CommandVerdict::Blocked(BlockReason::DenyList));
    }

    #[test]
    fn deny_list_is_case_insensitive() {
        let verdict = policy(ApprovalPolicy::Auto).evaluate("RM -RF /tmp/x", false);
        assert_eq!(verdict, CommandVerdict::Blocked(BlockReason::DenyList));
    }

    // ── Auto-approved ────────────────────────────────────────────────────

    #[test]
    fn auto_approved_substring_accepts_under_manual() {
        let verdict = policy(ApprovalPolicy::Manual).evaluate("git status --short", false);
        assert_eq!(verdict, CommandVerdict::Approved);
    }

    #[test]
    fn manual_rejects_unlisted_command() {
        let verdict = policy(ApprovalPolicy::Manual).evaluate("curl http://x", false);
        assert_eq!(verdict, CommandVerdict::Blocked(BlockReason::NotApproved));
    }

    // ── PrivilegedOnly ───────────────────────────────────────────────────

    #[test]
    fn privileged_context_runs_privileged_commands() {
        let verdict = policy(ApprovalPolicy::PrivilegedOnly).evaluate("git commit -m x", true);
        assert_eq!(verdict, CommandVerdict::Approved);
    }

    #[test]
    fn unprivileged_context_cannot_run_privileged_commands() {
        let verdict = policy(ApprovalPolicy::PrivilegedOnly).evaluate("git commit -m x", false);
        assert_eq!(verdict, CommandVerdict::Blocked(BlockReason::NotApproved));
    }

    #[test]
    fn privileged_context_still_needs_a_matching_pattern() {
        let verdict = policy(ApprovalPolicy::PrivilegedOnly).evaluate("curl http://x", true);
        assert_eq!(verdict, CommandVerdict::Blocked(BlockReason::NotApproved));
    }

    // ── Auto ─────────────────────────────────────────────────────────────

    #[test]
    fn auto_accepts_anything_not_denied() {
        let verdict = policy(ApprovalPolicy::Auto).evaluate("python train.py", false);
        assert_eq!(verdict, CommandVerdict::Approved);
    }
}
