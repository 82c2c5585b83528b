//! Orchestrator — the central coordination state machine.
//!
//! Subscribes to every inbound event kind, turns channel and peer input
//! into generation requests, and executes the directives extracted from
//! each reply: safety-gated commands, plan decomposition, peer
//! delegation, browser actions, outbound replies, and merge-conflict
//! resolutions.

use std::path::PathBuf;
use std::sync::Arc;

use metrics::counter;
use parking_lot::RwLock;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use ember_core::events::{
    ChannelMessage, ChannelOrigin, ChannelReply, ControlIntent, EmberEvent, EventKind,
    FileChanged, GitChangeKind, GitStateChange,
};
use ember_core::messages::Role;
use ember_core::peers::MailboxMessage;
use ember_core::safety::{ApprovalPolicy, CommandVerdict, SafetyPolicy};
use ember_core::text::excerpt;
use ember_directives::DirectiveSet;
use ember_events::{EventFabric, SessionStore};
use ember_llm::FailoverClient;
use ember_peers::PeerCoordinator;
use ember_peers::service::task_content;

use crate::collaborators::{BrowserDriver, RecallStore};
use crate::conflicts::{ConflictTracker, MergePhase};
use crate::executor::{COMMAND_TIMEOUT, run_command};
use crate::git::{GitWorkspace, contains_conflict_markers};
use crate::prompts;

/// Session pinned to the conflict-resolution workflow.
const CONFLICT_SESSION: &str = "git:conflicts";

/// Session collecting workspace file-change notices.
const WORKSPACE_SESSION: &str = "workspace:changes";

/// Role driving conflict resolution requests.
const CONFLICT_ROLE: &str = "Git Flow Manager";

/// Browser actions whose results trigger an analyze-and-continue pass.
const REENTRY_ACTIONS: &[&str] = &["navigate", "scrape", "get_text", "screenshot"];

/// Bound on pipeline re-entry (browser follow-ups, local delegation).
const MAX_CHAIN_DEPTH: u8 = 3;

/// Construction parameters.
pub struct OrchestratorConfig {
    /// Default role persona for inbound requests.
    pub role: String,
    /// Command-approval policy.
    pub safety: SafetyPolicy,
    /// Directory commands run in; also the git workspace root.
    pub workspace_root: PathBuf,
    /// How many recalled thoughts to fold into the context block.
    pub recall_top_k: usize,
}

/// One pass through the generation pipeline.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    /// Derived session key (channel + originating identity).
    pub session_id: String,
    /// Request text handed to the provider chain.
    pub text: String,
    /// Reply routing context; `None` makes replies log-only.
    pub origin: Option<ChannelOrigin>,
    /// Role override; defaults to the orchestrator's active role.
    pub role: Option<String>,
    /// Whether the safety gate treats this invocation as privileged.
    pub privileged: bool,
    /// Re-entry depth (browser follow-ups, local delegation).
    pub depth: u8,
}

enum DelegationTarget {
    Peers(Vec<String>),
    Local(&'static str),
    Unresolved,
}

/// Central coordination state machine.
pub struct Orchestrator {
    fabric: Arc<EventFabric>,
    sessions: Arc<SessionStore>,
    client: Arc<FailoverClient>,
    peers: Arc<PeerCoordinator>,
    browser: Arc<dyn BrowserDriver>,
    recall: Arc<dyn RecallStore>,
    git: GitWorkspace,
    safety: RwLock<SafetyPolicy>,
    role: RwLock<String>,
    conflicts: ConflictTracker,
    workspace_root: PathBuf,
    recall_top_k: usize,
}

impl Orchestrator {
    /// Build the orchestrator. Call [`Orchestrator::attach`] afterwards to
    /// register its event subscriptions.
    #[must_use]
    pub fn new(
        fabric: Arc<EventFabric>,
        sessions: Arc<SessionStore>,
        client: Arc<FailoverClient>,
        peers: Arc<PeerCoordinator>,
        browser: Arc<dyn BrowserDriver>,
        recall: Arc<dyn RecallStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            fabric,
            sessions,
            client,
            peers,
            browser,
            recall,
            git: GitWorkspace::new(&config.workspace_root),
            safety: RwLock::new(config.safety),
            role: RwLock::new(config.role),
            conflicts: ConflictTracker::new(),
            workspace_root: config.workspace_root,
            recall_top_k: config.recall_top_k,
        }
    }

    /// Subscribe to every inbound event kind.
    pub fn attach(self: &Arc<Self>) {
        const INBOUND: &[EventKind] = &[
            EventKind::ChannelMessage,
            EventKind::FileChanged,
            EventKind::GitState,
            EventKind::PeerJoined,
            EventKind::PeerLeft,
            EventKind::PeerMessage,
            EventKind::UsageReport,
            EventKind::Control,
        ];
        for &kind in INBOUND {
            let orchestrator = Arc::clone(self);
            self.fabric.subscribe(kind, "orchestrator", move |event| {
                let orchestrator = Arc::clone(&orchestrator);
                async move {
                    orchestrator.handle(event).await;
                    Ok(())
                }
            });
        }
        info!(role = %self.role.read(), "orchestrator attached");
    }

    /// Dispatch one inbound event.
    pub async fn handle(&self, event: EmberEvent) {
        match event {
            EmberEvent::ChannelMessage(msg) => self.on_channel_message(msg).await,
            EmberEvent::PeerMessage(msg) => self.on_peer_message(msg).await,
            EmberEvent::GitState(change) => self.on_git_state(change).await,
            EmberEvent::FileChanged(change) => self.on_file_changed(&change),
            EmberEvent::PeerJoined(record) => {
                info!(peer = %record.identity, role = ?record.role, "peer joined");
            }
            EmberEvent::PeerLeft(departure) => {
                info!(peer = %departure.identity, "peer departed");
            }
            EmberEvent::UsageReport(report) => {
                debug!(
                    model = %report.call.model,
                    total_cost_usd = report.ledger.total_cost_usd,
                    "usage updated"
                );
            }
            EmberEvent::Control(intent) => self.on_control(intent),
            // outbound; never subscribed
            EmberEvent::ChannelReply(_) => {}
        }
    }

    /// Active approval mode.
    #[must_use]
    pub fn safety_mode(&self) -> ApprovalPolicy {
        self.safety.read().policy
    }

    /// Active role persona.
    #[must_use]
    pub fn active_role(&self) -> String {
        self.role.read().clone()
    }

    /// Phase of the merge-resolution workflow.
    #[must_use]
    pub fn merge_phase(&self) -> MergePhase {
        self.conflicts.phase()
    }

    // ── event handlers ───────────────────────────────────────────────────

    async fn on_channel_message(&self, msg: ChannelMessage) {
        let session_id = format!("{}:{}", msg.origin.label(), msg.sender);
        self.process_request(GenerationRequest {
            session_id,
            text: msg.text,
            origin: Some(msg.origin),
            role: None,
            privileged: false,
            depth: 0,
        })
        .await;
    }

    async fn on_peer_message(&self, msg: MailboxMessage) {
        if msg.kind != "task" {
            debug!(from = %msg.from, kind = %msg.kind, "peer message logged");
            return;
        }
        let text = msg.content["text"]
            .as_str()
            .map_or_else(|| msg.content.to_string(), str::to_owned);
        info!(from = %msg.from, task = %excerpt(&text, 120), "peer task accepted");
        self.process_request(GenerationRequest {
            session_id: format!("peer:{}", msg.from),
            text,
            origin: None,
            role: None,
            privileged: true,
            depth: 0,
        })
        .await;
    }

    fn on_file_changed(&self, change: &FileChanged) {
        debug!(path = %change.path, change = ?change.change, "workspace file changed");
        self.sessions.add_message(
            WORKSPACE_SESSION,
            Role::System,
            format!("{:?}: {}", change.change, change.path),
        );
    }

    fn on_control(&self, intent: ControlIntent) {
        match intent {
            ControlIntent::SetPolicy { policy } => {
                info!(?policy, "approval policy switched");
                self.safety.write().policy = policy;
            }
            ControlIntent::SetRole { role } => {
                info!(role, "active role switched");
                *self.role.write() = role;
            }
            ControlIntent::SetActiveProvider { provider } => {
                if !self.client.prefer(&provider) {
                    warn!(provider, "unknown provider in control intent");
                }
            }
        }
    }

    /// Merge-state workflow: populate the conflict set and request one
    /// resolution per conflicted file. Paths that failed a previous
    /// resolution are simply re-requested here.
    async fn on_git_state(&self, change: GitStateChange) {
        if change.kind != GitChangeKind::MergeStateChange {
            debug!(kind = ?change.kind, "git state change logged");
            return;
        }
        let paths = match self.git.conflicted_paths().await {
            Ok(paths) => paths,
            Err(e) => {
                warn!(error = %e, "conflict scan failed");
                return;
            }
        };
        if paths.is_empty() {
            if self.conflicts.has_conflicts() {
                info!("merge cleared externally, dropping tracked conflicts");
                self.conflicts.reset();
            }
            return;
        }

        let _ = self.conflicts.begin(paths.iter().cloned());
        info!(count = paths.len(), "unresolved merge conflicts detected");
        for path in paths {
            self.request_resolution(&path).await;
        }
    }

    async fn request_resolution(&self, path: &str) {
        let content = match self.git.read_file(path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(path, error = %e, "could not read conflicted file");
                String::new()
            }
        };
        let text = format!(
            "The file `{path}` contains unresolved merge conflict markers:\n\n\
             {content}\n\n\
             Resolve the conflict and reply with \
             <git_resolve path=\"{path}\">the complete resolved file</git_resolve>."
        );
        self.process_request(GenerationRequest {
            session_id: CONFLICT_SESSION.into(),
            text,
            origin: None,
            role: Some(CONFLICT_ROLE.into()),
            privileged: true,
            depth: 0,
        })
        .await;
    }

    // ── generation pipeline ──────────────────────────────────────────────

    /// Run one request through the full pipeline. Total provider failure
    /// drops the request here; nothing is surfaced to the channel.
    #[instrument(skip(self, request), fields(session_id = %request.session_id, depth = request.depth))]
    pub async fn process_request(&self, request: GenerationRequest) {
        let session_id = request.session_id.clone();
        self.sessions
            .add_message(&session_id, Role::User, request.text.clone());

        let context = self.build_context(&session_id, &request.text).await;
        let role = request
            .role
            .clone()
            .unwrap_or_else(|| self.role.read().clone());
        let system = prompts::compose(&role, &context);

        let completion = match self.client.generate(&request.text, Some(&system)).await {
            Ok(completion) => completion,
            Err(e) => {
                counter!("ember_requests_dropped_total").increment(1);
                warn!(error = %e, "generation failed, request dropped");
                return;
            }
        };

        self.sessions
            .add_message(&session_id, Role::Assistant, completion.text.clone());
        let set = DirectiveSet::extract(&completion.text);

        self.record_thoughts(&session_id, &set).await;
        self.run_commands(&session_id, &set, request.privileged).await;

        for step in set.plans() {
            info!(role = %step.role, task = %excerpt(&step.description, 120), "plan step");
            self.deliver_task(&step.role, &step.description, &request)
                .await;
        }
        for delegation in set.delegations() {
            self.deliver_task(&delegation.recipient, &delegation.task, &request)
                .await;
        }

        let browser_followup = self.run_browser_actions(&session_id, &set).await;
        self.route_messages(&request, &set).await;
        self.apply_resolutions(&set).await;

        if browser_followup && request.depth < MAX_CHAIN_DEPTH {
            let follow = GenerationRequest {
                text: "Analyze the browser results above and continue the task.".into(),
                depth: request.depth + 1,
                ..request
            };
            Box::pin(self.process_request(follow)).await;
        }
    }

    /// Transcript + recalled thoughts + project-state summary.
    async fn build_context(&self, session_id: &str, query: &str) -> String {
        let mut context = String::new();

        if self.recall_top_k > 0 {
            match self.recall.recall(query, self.recall_top_k).await {
                Ok(hits) if !hits.is_empty() => {
                    context.push_str("### Relevant prior thoughts\n");
                    for hit in hits {
                        context.push_str("- ");
                        context.push_str(&hit);
                        context.push('\n');
                    }
                    context.push('\n');
                }
                Ok(_) => {}
                Err(e) => debug!(error = %e, "recall unavailable"),
            }
        }

        if let Ok(branch) = self.git.current_branch().await {
            context.push_str(&format!("### Project state\nbranch: {branch}\n\n"));
        }

        context.push_str(&self.sessions.transcript(session_id));
        context
    }

    async fn record_thoughts(&self, session_id: &str, set: &DirectiveSet) {
        for thought in &set.thoughts {
            info!(thought = %excerpt(thought, 200), "thought");
            let meta = json!({ "session_id": session_id, "kind": "thought" });
            if let Err(e) = self.recall.upsert(thought, meta).await {
                debug!(error = %e, "thought not indexed");
            }
        }
        for status in &set.status_updates {
            info!(status = %status, "status update");
        }
        if !set.calls.is_empty() {
            debug!(calls = set.calls.len(), "typed calls extracted");
        }
    }

    /// Safety-gate then execute each command; every outcome — including
    /// a block — lands in session history as a system message.
    async fn run_commands(&self, session_id: &str, set: &DirectiveSet, privileged: bool) {
        for command in &set.commands {
            let verdict = self.safety.read().evaluate(command, privileged);
            match verdict {
                CommandVerdict::Blocked(reason) => {
                    counter!("ember_commands_blocked_total").increment(1);
                    warn!(command = %excerpt(command, 120), ?reason, "command blocked");
                    self.sessions.add_message(
                        session_id,
                        Role::System,
                        format!("Command `{command}` blocked by safety policy ({reason:?})."),
                    );
                }
                CommandVerdict::Approved => {
                    counter!("ember_commands_executed_total").increment(1);
                    let outcome =
                        run_command(command, &self.workspace_root, COMMAND_TIMEOUT).await;
                    info!(
                        command = %excerpt(command, 120),
                        exit_code = outcome.exit_code,
                        timed_out = outcome.timed_out,
                        "command finished"
                    );
                    let summary = if outcome.timed_out {
                        format!("Command `{command}` timed out.")
                    } else {
                        format!(
                            "Command `{command}` exited {}:\n{}{}",
                            outcome.exit_code,
                            excerpt(&outcome.stdout, 2_000),
                            excerpt(&outcome.stderr, 500),
                        )
                    };
                    self.sessions.add_message(session_id, Role::System, summary);
                }
            }
        }
    }

    /// Resolve a delegation recipient and deliver the task.
    ///
    /// Resolution order: exact peer identity → peer role → peer
    /// capability → the literal `broadcast` → well-known internal role
    /// run locally. Anything else is logged and dropped.
    async fn deliver_task(&self, recipient: &str, task: &str, request: &GenerationRequest) {
        match self.resolve_recipients(recipient) {
            DelegationTarget::Peers(identities) => {
                for identity in identities {
                    match self.peers.send_message(&identity, "task", task_content(task)) {
                        Ok(()) => {
                            counter!("ember_delegations_sent_total").increment(1);
                            info!(peer = %identity, task = %excerpt(task, 120), "task delegated");
                        }
                        Err(e) => warn!(peer = %identity, error = %e, "delegation failed"),
                    }
                }
            }
            DelegationTarget::Local(role) => {
                if request.depth >= MAX_CHAIN_DEPTH {
                    warn!(role, "delegation chain too deep, dropping local run");
                    return;
                }
                info!(role, task = %excerpt(task, 120), "running delegated task locally");
                let local = GenerationRequest {
                    session_id: format!("local:{role}"),
                    text: task.to_owned(),
                    origin: None,
                    role: Some(role.to_owned()),
                    privileged: true,
                    depth: request.depth + 1,
                };
                Box::pin(self.process_request(local)).await;
            }
            DelegationTarget::Unresolved => {
                warn!(recipient, "delegation recipient matched nothing, dropped");
            }
        }
    }

    fn resolve_recipients(&self, recipient: &str) -> DelegationTarget {
        let mut peers = self.peers.peers();
        peers.sort_by(|a, b| a.identity.cmp(&b.identity));

        if let Some(peer) = peers.iter().find(|p| p.identity == recipient) {
            return DelegationTarget::Peers(vec![peer.identity.clone()]);
        }
        if let Some(peer) = peers.iter().find(|p| {
            p.role
                .as_deref()
                .is_some_and(|role| role.eq_ignore_ascii_case(recipient))
        }) {
            return DelegationTarget::Peers(vec![peer.identity.clone()]);
        }
        if let Some(peer) = peers.iter().find(|p| p.capabilities.contains(recipient)) {
            return DelegationTarget::Peers(vec![peer.identity.clone()]);
        }
        if recipient.eq_ignore_ascii_case("broadcast") {
            return DelegationTarget::Peers(
                peers.into_iter().map(|p| p.identity).collect(),
            );
        }
        if let Some(role) = prompts::internal_role(recipient) {
            return DelegationTarget::Local(role);
        }
        DelegationTarget::Unresolved
    }

    /// Execute browser actions sequentially, appending each result to
    /// history. Returns whether a follow-up analyze pass is due.
    async fn run_browser_actions(&self, session_id: &str, set: &DirectiveSet) -> bool {
        let mut followup = false;
        for action in set.browser_actions() {
            match self.browser.execute(&action).await {
                Ok(outcome) => {
                    info!(action = %action.action, "browser action completed");
                    self.sessions.add_message(
                        session_id,
                        Role::System,
                        format!("Browser {}: {}", action.action, excerpt(&outcome.content, 2_000)),
                    );
                    if REENTRY_ACTIONS.contains(&action.action.as_str()) {
                        followup = true;
                    }
                }
                Err(e) => {
                    warn!(action = %action.action, error = %e, "browser action failed");
                    self.sessions.add_message(
                        session_id,
                        Role::System,
                        format!("Browser {} failed: {e}", action.action),
                    );
                }
            }
        }
        followup
    }

    /// Route outbound messages to the originating channel, or log them
    /// when the request has no channel context.
    async fn route_messages(&self, request: &GenerationRequest, set: &DirectiveSet) {
        for text in &set.messages {
            match &request.origin {
                Some(origin) => {
                    self.fabric
                        .publish(EmberEvent::ChannelReply(ChannelReply {
                            origin: origin.clone(),
                            text: text.clone(),
                        }))
                        .await;
                }
                None => info!(reply = %excerpt(text, 200), "reply with no channel context"),
            }
        }
    }

    /// Apply `git_resolve` directives: write, un-track, stage; commit
    /// exactly when the conflict set empties. A resolution that still
    /// contains conflict markers leaves its path tracked.
    async fn apply_resolutions(&self, set: &DirectiveSet) {
        for resolution in set.resolutions() {
            if contains_conflict_markers(&resolution.content) {
                warn!(path = %resolution.path, "resolution still contains conflict markers");
                continue;
            }
            let mut content = resolution.content.clone();
            if !content.ends_with('\n') {
                content.push('\n');
            }
            match self.git.resolve_file(&resolution.path, &content).await {
                Ok(()) => {
                    let emptied = self.conflicts.resolve(&resolution.path);
                    info!(path = %resolution.path, emptied, "resolution applied");
                    if emptied {
                        match self.git.commit("Resolve merge conflicts").await {
                            Ok(()) => info!("conflict set empty, commit created"),
                            Err(e) => warn!(error = %e, "commit after resolution failed"),
                        }
                    }
                }
                Err(e) => warn!(path = %resolution.path, error = %e, "resolution write failed"),
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
    use crate::collaborators::{MockBrowserDriver, NoRecall};
    use async_trait::async_trait;
    use ember_llm::provider::{Completion, Provider, ProviderError, ProviderResult};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Arc;

    /// Provider returning queued replies in order; fails when drained.
    struct ScriptedProvider {
        replies: Mutex<VecDeque<String>>,
    }

    impl ScriptedProvider {
        fn new(replies: &[&str]) -> Arc<dyn Provider> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| (*r).to_owned()).collect()),
            })
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }
        fn model(&self) -> &str {
            "scripted-model"
        }
        fn is_configured(&self) -> bool {
            true
        }
        async fn generate(
            &self,
            _prompt: &str,
            _system: Option<&str>,
        ) -> ProviderResult<Completion> {
            match self.replies.lock().pop_front() {
                Some(text) => Ok(Completion {
                    text,
                    prompt_tokens: 1,
                    completion_tokens: 1,
                    model: "scripted-model".into(),
                    cost_usd: 0.0,
                }),
                None => Err(ProviderError::Api {
                    status: 503,
                    message: "script exhausted".into(),
                }),
            }
        }
    }

    struct Fixture {
        _peer_dir: tempfile::TempDir,
        _workspace: tempfile::TempDir,
        fabric: Arc<EventFabric>,
        sessions: Arc<SessionStore>,
        peers: Arc<PeerCoordinator>,
        orchestrator: Arc<Orchestrator>,
        replies: Arc<Mutex<Vec<ChannelReply>>>,
    }

    fn fixture_with(replies: &[&str], browser: MockBrowserDriver, policy: SafetyPolicy) -> Fixture {
        let peer_dir = tempfile::tempdir().unwrap();
        let workspace = tempfile::tempdir().unwrap();
        let fabric = Arc::new(EventFabric::new());
        let sessions = Arc::new(SessionStore::new(20));
        let client = Arc::new(ember_llm::FailoverClient::new(
            vec![ScriptedProvider::new(replies)],
            &[],
            Arc::clone(&fabric),
        ));
        let peers = Arc::new(
            PeerCoordinator::new(
                Arc::clone(&fabric),
                peer_dir.path(),
                "LocalNode",
                "local-host",
                None,
                120,
            )
            .unwrap(),
        );

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&fabric),
            Arc::clone(&sessions),
            client,
            Arc::clone(&peers),
            Arc::new(browser),
            Arc::new(NoRecall),
            OrchestratorConfig {
                role: "Lead Orchestrator".into(),
                safety: policy,
                workspace_root: workspace.path().to_path_buf(),
                recall_top_k: 0,
            },
        ));
        orchestrator.attach();

        let replies_sink: Arc<Mutex<Vec<ChannelReply>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&replies_sink);
        fabric.subscribe(EventKind::ChannelReply, "reply-collector", move |event| {
            let sink = Arc::clone(&sink);
            async move {
                if let EmberEvent::ChannelReply(reply) = event {
                    sink.lock().push(reply);
                }
                Ok(())
            }
        });

        Fixture {
            _peer_dir: peer_dir,
            _workspace: workspace,
            fabric,
            sessions,
            peers,
            orchestrator,
            replies: replies_sink,
        }
    }

    fn fixture(replies: &[&str]) -> Fixture {
        fixture_with(replies, MockBrowserDriver::new(), SafetyPolicy::default())
    }

    async fn send_chat(fixture: &Fixture, text: &str) {
        fixture
            .fabric
            .publish(EmberEvent::ChannelMessage(ChannelMessage {
                origin: ChannelOrigin::Chat { chat_id: 7 },
                sender: "alice".into(),
                text: text.into(),
                timestamp: chrono::Utc::now(),
            }))
            .await;
    }

    async fn add_peer(fixture: &Fixture, hostname: &str, identity: &str, role: Option<&str>) {
        let record = serde_json::json!({
            "identity": identity,
            "hostname": hostname,
            "timestamp": std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH).unwrap().as_secs_f64(),
            "status": "active",
            "role": role,
            "capabilities": ["security_scan"]
        });
        std::fs::write(
            fixture.peers.comms_dir().join(format!("{hostname}.json")),
            record.to_string(),
        )
        .unwrap();
        fixture.peers.tick().await;
    }

    fn mailbox_entries(fixture: &Fixture, recipient: &str) -> Vec<MailboxMessage> {
        let mailbox = fixture.peers.comms_dir().join("messages");
        std::fs::read_dir(mailbox)
            .unwrap()
            .flatten()
            .filter(|e| {
                e.file_name()
                    .to_string_lossy()
                    .starts_with(&format!("{recipient}_"))
            })
            .map(|e| serde_json::from_str(&std::fs::read_to_string(e.path()).unwrap()).unwrap())
            .collect()
    }

    // ── reply routing ────────────────────────────────────────────────────

    #[tokio::test]
    async fn channel_request_routes_reply_to_origin() {
        let fixture = fixture(&["<thought>ok</thought><message>done</message>"]);
        send_chat(&fixture, "hello").await;

        let replies = fixture.replies.lock();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].text, "done");
        assert_eq!(replies[0].origin, ChannelOrigin::Chat { chat_id: 7 });

        let history = fixture.sessions.history("chat:alice");
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn provider_exhaustion_drops_request_silently() {
        let fixture = fixture(&[]);
        send_chat(&fixture, "hello").await;

        assert!(fixture.replies.lock().is_empty());
        // the request itself was recorded, nothing else
        let history = fixture.sessions.history("chat:alice");
        assert_eq!(history.len(), 1);
    }

    // ── safety gate ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn deny_listed_command_is_blocked_and_recorded() {
        let fixture = fixture(&["<command>rm -rf /</command>"]);
        send_chat(&fixture, "clean up").await;

        let history = fixture.sessions.history("chat:alice");
        let blocked = history
            .iter()
            .find(|m| m.role == Role::System)
            .expect("blocked outcome recorded");
        assert!(blocked.content.contains("blocked by safety policy"));
    }

    #[tokio::test]
    async fn approved_command_executes_and_records_output() {
        let policy = SafetyPolicy {
            policy: ApprovalPolicy::Auto,
            ..SafetyPolicy::default()
        };
        let fixture = fixture_with(
            &["<command>echo pipeline-works</command>"],
            MockBrowserDriver::new(),
            policy,
        );
        send_chat(&fixture, "run it").await;

        let history = fixture.sessions.history("chat:alice");
        let outcome = history
            .iter()
            .find(|m| m.role == Role::System)
            .expect("command outcome recorded");
        assert!(outcome.content.contains("pipeline-works"));
        assert!(outcome.content.contains("exited 0"));
    }

    // ── delegation ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn delegation_by_role_lands_in_peer_mailbox() {
        let fixture = fixture(&[
            r#"<delegate recipient="auditor">Run a security audit on the latest commit.</delegate>"#,
        ]);
        add_peer(&fixture, "remote-host", "SecurityPanda", Some("auditor")).await;

        send_chat(&fixture, "audit the code").await;

        let entries = mailbox_entries(&fixture, "SecurityPanda");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].to, "SecurityPanda");
        assert_eq!(entries[0].kind, "task");
        assert_eq!(
            entries[0].content["text"],
            "Run a security audit on the latest commit."
        );
    }

    #[tokio::test]
    async fn delegation_by_exact_identity() {
        let fixture =
            fixture(&[r#"<delegate recipient="SecurityPanda">scan the network</delegate>"#]);
        add_peer(&fixture, "remote-host", "SecurityPanda", None).await;

        send_chat(&fixture, "scan").await;
        assert_eq!(mailbox_entries(&fixture, "SecurityPanda").len(), 1);
    }

    #[tokio::test]
    async fn delegation_by_capability() {
        let fixture =
            fixture(&[r#"<delegate recipient="security_scan">deep scan</delegate>"#]);
        add_peer(&fixture, "remote-host", "VulnScanner", None).await;

        send_chat(&fixture, "scan").await;
        assert_eq!(mailbox_entries(&fixture, "VulnScanner").len(), 1);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_peer() {
        let fixture = fixture(&[r#"<delegate recipient="broadcast">sync up</delegate>"#]);
        add_peer(&fixture, "host-a", "PeerA", None).await;
        add_peer(&fixture, "host-b", "PeerB", None).await;

        send_chat(&fixture, "announce").await;
        assert_eq!(mailbox_entries(&fixture, "PeerA").len(), 1);
        assert_eq!(mailbox_entries(&fixture, "PeerB").len(), 1);
    }

    #[tokio::test]
    async fn unmatched_internal_role_runs_locally() {
        let fixture = fixture(&[
            r#"<delegate recipient="Test Engineer">write the tests</delegate>"#,
            "<thought>local run</thought>",
        ]);
        send_chat(&fixture, "get this tested").await;

        let local = fixture.sessions.history("local:Test Engineer");
        assert_eq!(local.len(), 2);
        assert_eq!(local[0].content, "write the tests");
    }

    #[tokio::test]
    async fn unknown_recipient_is_dropped() {
        let fixture = fixture(&[r#"<delegate recipient="Nobody">lost task</delegate>"#]);
        send_chat(&fixture, "delegate").await;
        // no local session, no mailbox entries, no crash
        assert!(fixture.sessions.history("local:Nobody").is_empty());
    }

    // ── plans ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn plan_steps_delegate_to_matching_peers() {
        let fixture = fixture(&[
            "<plan>\n- [ ] Write tests (auditor)\n- [ ] Review logs (auditor)\n</plan>",
        ]);
        add_peer(&fixture, "remote-host", "SecurityPanda", Some("auditor")).await;

        send_chat(&fixture, "plan the work").await;

        let entries = mailbox_entries(&fixture, "SecurityPanda");
        assert_eq!(entries.len(), 2);
        let texts: Vec<&str> = entries
            .iter()
            .map(|e| e.content["text"].as_str().unwrap())
            .collect();
        assert!(texts.contains(&"Write tests"));
        assert!(texts.contains(&"Review logs"));
    }

    // ── browser ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn browser_action_appends_result_and_reenters_once() {
        let mut browser = MockBrowserDriver::new();
        let _ = browser.expect_execute().times(1).returning(|action| {
            Ok(crate::collaborators::BrowserOutcome {
                content: format!("did {}", action.action),
                details: None,
            })
        });
        let fixture = fixture_with(
            &[
                r#"checking <browser action="navigate" url="https://example.com"/>"#,
                "<message>analyzed the page</message>",
            ],
            browser,
            SafetyPolicy::default(),
        );

        send_chat(&fixture, "look at example.com").await;

        let history = fixture.sessions.history("chat:alice");
        assert!(
            history
                .iter()
                .any(|m| m.role == Role::System && m.content.contains("did navigate"))
        );
        // the follow-up pass produced the final reply
        let replies = fixture.replies.lock();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].text, "analyzed the page");
    }

    #[tokio::test]
    async fn browser_failure_is_recorded_not_fatal() {
        let mut browser = MockBrowserDriver::new();
        let _ = browser.expect_execute().times(1).returning(|_| {
            Err(crate::errors::RuntimeError::Browser {
                message: "no session".into(),
            })
        });
        let fixture = fixture_with(
            &[r##"<browser action="click" selector="#go"/><message>tried</message>"##],
            browser,
            SafetyPolicy::default(),
        );

        send_chat(&fixture, "click it").await;

        let history = fixture.sessions.history("chat:alice");
        assert!(history.iter().any(|m| m.content.contains("failed")));
        assert_eq!(fixture.replies.lock().len(), 1);
    }

    // ── peer tasks / control ─────────────────────────────────────────────

    #[tokio::test]
    async fn peer_task_message_enters_the_pipeline() {
        let fixture = fixture(&["<message>on it</message>"]);
        fixture
            .fabric
            .publish(EmberEvent::PeerMessage(MailboxMessage {
                id: 1,
                from: "Remote".into(),
                to: "LocalNode".into(),
                kind: "task".into(),
                content: serde_json::json!({"text": "inspect the build"}),
                timestamp: chrono::Utc::now(),
            }))
            .await;

        let history = fixture.sessions.history("peer:Remote");
        assert_eq!(history[0].content, "inspect the build");
        // no channel context: the reply is log-only
        assert!(fixture.replies.lock().is_empty());
    }

    #[tokio::test]
    async fn control_intents_update_mode_and_role() {
        let fixture = fixture(&[]);
        assert_eq!(fixture.orchestrator.safety_mode(), ApprovalPolicy::Manual);

        fixture
            .fabric
            .publish(EmberEvent::Control(ControlIntent::SetPolicy {
                policy: ApprovalPolicy::Auto,
            }))
            .await;
        fixture
            .fabric
            .publish(EmberEvent::Control(ControlIntent::SetRole {
                role: "Documentarian".into(),
            }))
            .await;

        assert_eq!(fixture.orchestrator.safety_mode(), ApprovalPolicy::Auto);
        assert_eq!(fixture.orchestrator.active_role(), "Documentarian");
    }

    // ── conflict workflow ────────────────────────────────────────────────

    fn sh(dir: &Path, cmd: &str) {
        let status = std::process::Command::new("bash")
            .arg("-c")
            .arg(cmd)
            .current_dir(dir)
            .status()
            .unwrap();
        assert!(status.success(), "setup command failed: {cmd}");
    }

    fn make_conflicted_repo(dir: &Path) {
        sh(dir, "git init -q -b main");
        sh(dir, "git config user.email t@example.com && git config user.name T");
        sh(dir, "echo base > shared.txt && git add . && git commit -qm base");
        sh(dir, "git checkout -qb feature");
        sh(dir, "echo feature-change > shared.txt && git commit -qam feature");
        sh(dir, "git checkout -q main");
        sh(dir, "echo main-change > shared.txt && git commit -qam main");
        sh(dir, "git merge feature || true");
    }

    async fn conflict_fixture(replies: &[&str]) -> Fixture {
        let fixture = fixture(replies);
        make_conflicted_repo(fixture._workspace.path());
        fixture
            .fabric
            .publish(EmberEvent::GitState(GitStateChange {
                kind: GitChangeKind::MergeStateChange,
                branch: Some("main".into()),
                commit: None,
            }))
            .await;
        fixture
    }

    #[tokio::test]
    async fn conflict_is_resolved_and_committed_when_set_empties() {
        let fixture = conflict_fixture(&[
            "<git_resolve path=\"shared.txt\">merged-change</git_resolve>",
        ])
        .await;

        assert_eq!(fixture.orchestrator.merge_phase(), MergePhase::Resolved);
        let workspace = GitWorkspace::new(fixture._workspace.path());
        assert!(workspace.conflicted_paths().await.unwrap().is_empty());
        // session pinned to the conflict workflow saw the exchange
        assert!(!fixture.sessions.history(CONFLICT_SESSION).is_empty());
    }

    #[tokio::test]
    async fn resolution_with_markers_keeps_path_tracked() {
        let fixture = conflict_fixture(&[
            "<git_resolve path=\"shared.txt\"><<<<<<< HEAD\nstill broken\n=======\nnope\n>>>>>>> feature</git_resolve>",
        ])
        .await;

        assert_eq!(
            fixture.orchestrator.merge_phase(),
            MergePhase::ConflictDetected
        );
        let workspace = GitWorkspace::new(fixture._workspace.path());
        assert_eq!(
            workspace.conflicted_paths().await.unwrap(),
            ["shared.txt"]
        );
    }
}
