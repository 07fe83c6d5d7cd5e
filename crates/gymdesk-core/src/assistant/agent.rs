//! Member assistant using DSRs signatures and BAML parsing
//!
//! One `GymAssistant` per member session. Each request runs up to
//! `max_steps` predict/execute rounds; tool results from a round are fed
//! back as the next round's input.

use anyhow::Result;
use dspy_rs::{configure, BamlType, ChatAdapter, Predict, LM};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;

// baml_bridge is needed for the BamlType derive macro expansion
#[allow(unused_imports)]
use baml_bridge;

/// Turns kept in session memory (user and assistant messages)
pub const MAX_SESSION_TURNS: usize = 20;

pub const FALLBACK_REPLY: &str = "I apologize, but I wasn't able to generate a response.";

/// A tool call requested by the agent
#[derive(Clone, Debug, Default, BamlType)]
pub struct ToolCall {
    /// Name of the tool to call
    pub name: String,
    /// Arguments for the tool as key-value pairs
    pub args: HashMap<String, String>,
}

#[derive(dspy_rs::Signature, Clone, Debug)]
pub struct AgentResponse {
    #[input(desc = "The input to respond to - either a member message or tool execution results")]
    pub input: String,

    #[input(desc = "Who you are talking to")]
    pub member_context: String,

    #[input(desc = "Gym policies and information relevant to the member's message. Ignore if empty.")]
    pub knowledge_context: String,

    #[input(desc = "Recent conversation history including your messages and tool results")]
    pub conversation_context: String,

    #[input]
    pub available_tools: String,

    #[output(desc = "Your reasoning/thought process (think step by step)")]
    pub reasoning: String,

    #[output(desc = "Array of messages to send to the member (can be empty)")]
    pub messages: Vec<String>,

    #[output(desc = "Array of tool calls to execute (can be empty, or [{\"name\": \"done\", \"args\": {}}] if nothing to do)")]
    pub tool_calls: Vec<ToolCall>,
}

/// Reshapes a malformed agent response without adding content
#[derive(dspy_rs::Signature, Clone, Debug)]
pub struct CorrectionResponse {
    #[input(desc = "The original input that was given to the agent")]
    pub original_input: String,

    #[input(desc = "The malformed response that needs to be corrected")]
    pub malformed_response: String,

    #[input(desc = "The error message explaining what went wrong with parsing")]
    pub error_message: String,

    #[input(desc = "Available tools for reference")]
    pub available_tools: String,

    #[output(desc = "Your reasoning about how to fix the response")]
    pub reasoning: String,

    #[output(desc = "Array of messages extracted/fixed from the original response")]
    pub messages: Vec<String>,

    #[output(desc = "Array of tool calls extracted/fixed from the original response")]
    pub tool_calls: Vec<ToolCall>,
}

pub const CORRECTION_INSTRUCTION: &str = r#"You are a response correction agent. Your job is to fix malformed agent responses.

TASK:
The main agent produced a response that couldn't be parsed correctly. You must:
1. Extract the INTENDED content from the malformed response
2. Reshape it into the correct output format
3. Do NOT generate new content - only fix the format of what was already said

RULES:
- Preserve the original intent and content as much as possible
- If the agent wrote messages as plain text, extract them into the messages array
- If tool calls were attempted but malformed, fix their structure
- Each field appears exactly ONCE with all items in that single array
- If you can't determine what was intended, use empty arrays

OUTPUT FORMAT:
- reasoning: Explain what was wrong and how you fixed it
- messages: ALL extracted messages in ONE array
- tool_calls: ALL extracted tool calls in ONE array (or [] if none intended)"#;

pub const AGENT_INSTRUCTION: &str = r#"You are a helpful gym assistant that specializes in workout advice, injury prevention, and answering questions about the gym's services. Keep responses clear, friendly, and focused on fitness goals and safety. Address the member by their first name when appropriate.

TOOLS:
- knowledge_search: gym policies, hours, pricing, facilities. Prefer the provided knowledge_context when it already answers the question.
- class_booking: list upcoming classes, check availability, book a class. When the member names a class, pass class_name; never invent class ids.
- log_workout: when the member describes a workout they did, log it with the full description.
- workout_history: show past workouts, stats for one exercise, or a summary.
- muscle_balance: check training balance and neglected muscle groups; use it for injury-prevention questions.
- current_datetime: resolve "today", "tomorrow", day of week.

RESPONSE RULES:
1. Respond naturally and conversationally
2. Use tools when the member asks for something they can do
3. NEVER combine regular tools with "done" - they are mutually exclusive
4. Do not give medical diagnoses; suggest seeing a professional for pain or injury

TOOL CALL PATTERNS:
- To respond AND use tools: messages: ["msg1"], tool_calls: [your_tools]
- To respond with NO tools: messages: ["msg1", "msg2"], tool_calls: []
- After tool results with nothing to add: messages: [], tool_calls: [{"name": "done", "args": {}}]

AFTER TOOL RESULTS:
When you see "[Tool Result: X]", tell the member what happened in plain language (booked, logged, what the history shows). Do not repeat what you already said.

OUTPUT FORMAT:
Each field appears exactly ONCE. Put ALL content in that single field:
- reasoning: Your thought process (one block, can be multiple sentences)
- messages: ALL messages in ONE array
- tool_calls: ALL tool calls in ONE array"#;

const TOOL_RESULT_INSTRUCTIONS: &str = r#"

=== TOOL RESULT PROCESSING MODE ===
This is a CONTINUATION of your previous turn, NOT a new conversation.
Your previous messages are already visible to the member in conversation_context.

RULES:
1. Report the outcome of actions the member asked for (bookings, logged workouts, lookups)
2. DO NOT repeat or rephrase what you already said
3. If there is nothing new to tell the member, call 'done'"#;

/// Result of executing a tool
#[derive(Clone, Debug)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }
}

/// Trait for tools that can be executed by the agent
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn args_schema(&self) -> &str;
    async fn execute(&self, args: &HashMap<String, String>) -> Result<ToolResult>;
}

/// Registry of available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool descriptions for the prompt, sorted by name
    pub fn generate_description(&self) -> String {
        if self.tools.is_empty() {
            return "No tools available.".to_string();
        }

        let mut names: Vec<&String> = self.tools.keys().collect();
        names.sort();

        let mut desc = String::from("Available tools (add to tool_calls array to use):\n\n");
        for name in names {
            let tool = &self.tools[name];
            desc.push_str(&format!(
                "{}:\n  Description: {}\n  Args: {}\n\n",
                tool.name(),
                tool.description(),
                tool.args_schema()
            ));
        }
        desc
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    pub fn tool_result(content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: content.into(),
        }
    }
}

/// One visible phase of handling a request
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThinkingStep {
    /// `thinking`, `tool:<name>` or `responding`
    pub phase: String,
    pub detail: String,
}

impl ThinkingStep {
    fn new(phase: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            detail: detail.into(),
        }
    }
}

/// Progress pushed to a streaming caller while a request runs
#[derive(Clone, Debug, PartialEq)]
pub enum AssistantEvent {
    Step(ThinkingStep),
    Message(String),
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct AssistantReply {
    pub messages: Vec<String>,
    pub steps: Vec<ThinkingStep>,
}

/// A tool execution with its result
#[derive(Debug, Clone)]
pub struct ExecutedTool {
    pub tool_call: ToolCall,
    pub result: ToolResult,
}

/// Result of a single agent step
#[derive(Debug)]
pub struct StepResult {
    pub messages: Vec<String>,
    pub tool_calls: Vec<ToolCall>,
    pub executed_tools: Vec<ExecutedTool>,
    pub done: bool,
}

/// Configure the global LM settings for DSRs
pub async fn configure_lm(api_base: &str, api_key: &str, model: &str) -> Result<()> {
    let lm = LM::builder()
        .base_url(api_base.to_string())
        .api_key(api_key.to_string())
        .model(model.to_string())
        .temperature(0.7)
        .max_tokens(4096)
        .build()
        .await?;

    configure(lm, ChatAdapter);
    Ok(())
}

/// `[Tool Result: name]` block injected into the next step
pub fn format_tool_result(tool_call: &ToolCall, result: &ToolResult) -> String {
    let args_str = if tool_call.args.is_empty() {
        String::new()
    } else {
        let mut pairs: Vec<String> = tool_call
            .args
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        pairs.sort();
        format!("\nArgs: {}", pairs.join(", "))
    };

    format!(
        "[Tool Result: {}]{}\nStatus: {}\nOutput: {}",
        tool_call.name,
        args_str,
        if result.success { "OK" } else { "ERROR" },
        if result.success {
            &result.output
        } else {
            result.error.as_deref().unwrap_or("Unknown error")
        }
    )
}

/// Sometimes the LLM double-encodes: ["[\"msg1\", \"msg2\"]"] instead of ["msg1", "msg2"]
pub fn unwrap_nested_messages(messages: &[String]) -> Vec<String> {
    messages
        .iter()
        .flat_map(|m| {
            let trimmed = m.trim();
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                if let Ok(inner) = serde_json::from_str::<Vec<String>>(trimmed) {
                    tracing::debug!("Unwrapped nested JSON array with {} messages", inner.len());
                    return inner;
                }
            }
            vec![m.clone()]
        })
        .filter(|m| !m.trim().is_empty())
        .collect()
}

pub struct GymAssistant {
    tools: ToolRegistry,
    member_context: String,
    /// Recent user/assistant turns, oldest first
    history: VecDeque<Message>,
    /// Tool results from the current request only
    current_tool_results: Vec<Message>,
    max_steps: usize,
}

impl GymAssistant {
    pub fn new(tools: ToolRegistry, member_context: String) -> Self {
        Self {
            tools,
            member_context,
            history: VecDeque::new(),
            current_tool_results: Vec::new(),
            max_steps: 10,
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &Message> {
        self.history.iter()
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.current_tool_results.clear();
    }

    fn remember(&mut self, message: Message) {
        self.history.push_back(message);
        while self.history.len() > MAX_SESSION_TURNS {
            self.history.pop_front();
        }
    }

    fn build_context(&self) -> String {
        let mut context = String::new();
        if !self.history.is_empty() || !self.current_tool_results.is_empty() {
            context.push_str("Recent conversation:\n");
        }
        for msg in self.history.iter().chain(self.current_tool_results.iter()) {
            context.push_str(&format!("[{}]: {}\n", msg.role, msg.content));
        }
        if context.is_empty() {
            context.push_str("No previous conversation.");
        }
        context
    }

    /// Input for a continuation step: every tool result from the last round
    fn tool_results_input(&mut self, user_message: &str) -> String {
        let results: Vec<String> = self
            .current_tool_results
            .drain(..)
            .map(|m| m.content)
            .collect();

        match results.len() {
            0 => user_message.to_string(),
            1 => format!(
                "=== TOOL RESULT ===\n{}\n=== END TOOL RESULT ==={}",
                results[0], TOOL_RESULT_INSTRUCTIONS
            ),
            n => {
                let text = results
                    .iter()
                    .enumerate()
                    .map(|(i, r)| format!("--- Tool {} ---\n{}", i + 1, r))
                    .collect::<Vec<_>>()
                    .join("\n\n");
                format!(
                    "=== TOOL RESULTS ({} tools) ===\n{}\n=== END TOOL RESULTS ==={}",
                    n, text, TOOL_RESULT_INSTRUCTIONS
                )
            }
        }
    }

    async fn attempt_correction(
        &self,
        original_input: &str,
        available_tools: &str,
        raw_response: &str,
        error_message: &str,
    ) -> Result<AgentResponse> {
        if raw_response.is_empty() {
            return Err(anyhow::anyhow!("No raw response available for correction"));
        }

        tracing::info!("=== CORRECTION ATTEMPT ===");
        tracing::info!("Error: {}", error_message);
        tracing::debug!("Raw response:\n{}", raw_response);

        let correction_predictor = Predict::<CorrectionResponse>::builder()
            .instruction(CORRECTION_INSTRUCTION)
            .build();

        let corrected = correction_predictor
            .call(CorrectionResponseInput {
                original_input: original_input.to_string(),
                malformed_response: raw_response.to_string(),
                error_message: error_message.to_string(),
                available_tools: available_tools.to_string(),
            })
            .await?;

        tracing::info!("Corrected messages: {:?}", corrected.messages);
        tracing::info!("Corrected tool_calls: {:?}", corrected.tool_calls);

        Ok(AgentResponse {
            input: original_input.to_string(),
            member_context: String::new(),
            knowledge_context: String::new(),
            conversation_context: String::new(),
            available_tools: available_tools.to_string(),
            reasoning: corrected.reasoning,
            messages: corrected.messages,
            tool_calls: corrected.tool_calls,
        })
    }

    async fn step(
        &mut self,
        user_message: &str,
        knowledge_context: &str,
        is_first_step: bool,
        steps: &mut StepLog<'_>,
    ) -> Result<StepResult> {
        let input_content = if is_first_step {
            self.current_tool_results.clear();
            user_message.to_string()
        } else {
            self.tool_results_input(user_message)
        };

        let available_tools = self.tools.generate_description();
        let input = AgentResponseInput {
            input: input_content.clone(),
            member_context: self.member_context.clone(),
            knowledge_context: knowledge_context.to_string(),
            conversation_context: self.build_context(),
            available_tools: available_tools.clone(),
        };
        tracing::debug!("Assistant step (first={}) input: {}", is_first_step, input_content);

        let predictor = Predict::<AgentResponse>::builder()
            .instruction(AGENT_INSTRUCTION)
            .build();

        let response = match predictor.call(input).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("LLM call failed, attempting correction: {:?}", e);
                let (raw_response, error_message) = match &e {
                    dspy_rs::PredictError::Parse {
                        raw_response,
                        source,
                        ..
                    } => (raw_response.clone(), format!("Parse error: {}", source)),
                    other => {
                        tracing::error!("Non-parse error, cannot correct: {:?}", other);
                        return Err(anyhow::anyhow!("LLM error: {}", other));
                    }
                };

                match self
                    .attempt_correction(&input_content, &available_tools, &raw_response, &error_message)
                    .await
                {
                    Ok(corrected) => corrected,
                    Err(correction_err) => {
                        tracing::error!("Correction also failed: {:?}", correction_err);
                        return Err(anyhow::anyhow!("Parse error and correction failed: {}", e));
                    }
                }
            }
        };

        tracing::debug!(
            "Reasoning: {}",
            response.reasoning.chars().take(200).collect::<String>()
        );

        let messages = unwrap_nested_messages(&response.messages);
        if !messages.is_empty() {
            steps.record(ThinkingStep::new("responding", "Writing a reply"));
        }
        for message in &messages {
            steps.message(message);
        }

        let mut executed_tools = Vec::new();
        for tool_call in &response.tool_calls {
            if tool_call.name == "done" {
                continue;
            }
            steps.record(ThinkingStep::new(
                format!("tool:{}", tool_call.name),
                tool_step_detail(&tool_call.name),
            ));
            tracing::info!("Executing tool: {} with args: {:?}", tool_call.name, tool_call.args);

            let result = match self.tools.get(&tool_call.name) {
                Some(tool) => match tool.execute(&tool_call.args).await {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::error!("Tool {} error: {}", tool_call.name, e);
                        ToolResult::error(e.to_string())
                    }
                },
                None => {
                    tracing::warn!("Unknown tool: {}", tool_call.name);
                    ToolResult::error(format!("Unknown tool: {}", tool_call.name))
                }
            };

            self.current_tool_results
                .push(Message::tool_result(format_tool_result(tool_call, &result)));
            executed_tools.push(ExecutedTool {
                tool_call: tool_call.clone(),
                result,
            });
        }

        // Done if no tool calls, OR if the only tool call is "done"
        let done = response.tool_calls.is_empty()
            || (response.tool_calls.len() == 1 && response.tool_calls[0].name == "done");

        Ok(StepResult {
            messages,
            tool_calls: response.tool_calls,
            executed_tools,
            done,
        })
    }

    /// Handle one member message. Steps and messages are also pushed to
    /// `events` as they happen.
    pub async fn process_message(
        &mut self,
        user_message: &str,
        knowledge_context: &str,
        events: Option<mpsc::UnboundedSender<AssistantEvent>>,
    ) -> Result<AssistantReply> {
        let mut steps = StepLog::new(events.as_ref());
        steps.record(ThinkingStep::new("thinking", "Understanding your question"));

        let mut all_messages = Vec::new();
        for step_num in 0..self.max_steps {
            let result = self
                .step(user_message, knowledge_context, step_num == 0, &mut steps)
                .await?;
            all_messages.extend(result.messages);
            if result.done {
                break;
            }
        }

        if all_messages.is_empty() {
            tracing::warn!("Assistant produced no messages");
            all_messages.push(FALLBACK_REPLY.to_string());
            steps.message(FALLBACK_REPLY);
        }

        self.remember(Message::user(user_message));
        for message in &all_messages {
            self.remember(Message::assistant(message.clone()));
        }
        self.current_tool_results.clear();

        Ok(AssistantReply {
            messages: all_messages,
            steps: steps.into_steps(),
        })
    }
}

fn tool_step_detail(tool: &str) -> &'static str {
    match tool {
        "knowledge_search" => "Searching gym information",
        "class_booking" => "Checking the class schedule",
        "log_workout" => "Logging your workout",
        "workout_history" => "Looking through your workout history",
        "muscle_balance" => "Analyzing your muscle balance",
        "current_datetime" => "Checking the date and time",
        _ => "Using a tool",
    }
}

/// Collects steps and forwards them to a streaming listener, if any
struct StepLog<'a> {
    steps: Vec<ThinkingStep>,
    events: Option<&'a mpsc::UnboundedSender<AssistantEvent>>,
}

impl<'a> StepLog<'a> {
    fn new(events: Option<&'a mpsc::UnboundedSender<AssistantEvent>>) -> Self {
        Self {
            steps: Vec::new(),
            events,
        }
    }

    fn record(&mut self, step: ThinkingStep) {
        if let Some(tx) = self.events {
            // A closed receiver means the client went away; keep working
            let _ = tx.send(AssistantEvent::Step(step.clone()));
        }
        self.steps.push(step);
    }

    fn message(&mut self, text: &str) {
        if let Some(tx) = self.events {
            let _ = tx.send(AssistantEvent::Message(text.to_string()));
        }
    }

    fn into_steps(self) -> Vec<ThinkingStep> {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait::async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the text back"
        }

        fn args_schema(&self) -> &str {
            r#"{"text": "what to echo"}"#
        }

        async fn execute(&self, args: &HashMap<String, String>) -> Result<ToolResult> {
            Ok(ToolResult::success(args.get("text").cloned().unwrap_or_default()))
        }
    }

    #[test]
    fn test_empty_registry_description() {
        let registry = ToolRegistry::new();
        assert!(!registry.has("echo"));
        assert_eq!(registry.generate_description(), "No tools available.");
    }

    #[test]
    fn test_registry_description() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        assert!(registry.has("echo"));
        assert_eq!(
            registry.generate_description(),
            "Available tools (add to tool_calls array to use):\n\necho:\n  Description: Echo the text back\n  Args: {\"text\": \"what to echo\"}\n\n"
        );
    }

    #[tokio::test]
    async fn test_registered_tool_executes() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let args = HashMap::from([("text".to_string(), "hi".to_string())]);
        let result = registry.get("echo").unwrap().execute(&args).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "hi");
    }

    #[test]
    fn test_format_tool_result() {
        let call = ToolCall {
            name: "class_booking".into(),
            args: HashMap::from([
                ("action".to_string(), "book_class".to_string()),
                ("class_name".to_string(), "Yoga".to_string()),
            ]),
        };
        assert_eq!(
            format_tool_result(&call, &ToolResult::error("Class is fully booked")),
            "[Tool Result: class_booking]\nArgs: action=book_class, class_name=Yoga\nStatus: ERROR\nOutput: Class is fully booked"
        );

        let done = ToolCall {
            name: "current_datetime".into(),
            args: HashMap::new(),
        };
        assert_eq!(
            format_tool_result(&done, &ToolResult::success("Saturday")),
            "[Tool Result: current_datetime]\nStatus: OK\nOutput: Saturday"
        );
    }

    #[test]
    fn test_unwrap_nested_messages() {
        let raw = vec![
            r#"["Hi Sam!", "You're booked."]"#.to_string(),
            "  ".to_string(),
            "[not json".to_string(),
        ];
        assert_eq!(
            unwrap_nested_messages(&raw),
            vec!["Hi Sam!", "You're booked.", "[not json"]
        );
    }

    #[test]
    fn test_session_memory_is_capped() {
        let mut assistant = GymAssistant::new(ToolRegistry::new(), "Member".into());
        for i in 0..(MAX_SESSION_TURNS + 5) {
            assistant.remember(Message::user(format!("m{}", i)));
        }
        let kept: Vec<_> = assistant.history().collect();
        assert_eq!(kept.len(), MAX_SESSION_TURNS);
        assert_eq!(kept[0].content, "m5");

        assistant.clear();
        assert_eq!(assistant.history().count(), 0);
        assert_eq!(assistant.build_context(), "No previous conversation.");
    }

    #[test]
    fn test_tool_results_input() {
        let mut assistant = GymAssistant::new(ToolRegistry::new(), String::new());
        assert_eq!(assistant.tool_results_input("hello"), "hello");

        assistant
            .current_tool_results
            .push(Message::tool_result("[Tool Result: a]\nStatus: OK\nOutput: 1"));
        assistant
            .current_tool_results
            .push(Message::tool_result("[Tool Result: b]\nStatus: OK\nOutput: 2"));
        let input = assistant.tool_results_input("hello");
        assert!(input.starts_with("=== TOOL RESULTS (2 tools) ===\n--- Tool 1 ---"));
        assert!(assistant.current_tool_results.is_empty());
    }

    #[test]
    fn test_step_log_forwards_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut log = StepLog::new(Some(&tx));
        log.record(ThinkingStep::new("thinking", "x"));
        log.message("hello");
        assert_eq!(
            rx.try_recv().unwrap(),
            AssistantEvent::Step(ThinkingStep::new("thinking", "x"))
        );
        assert_eq!(rx.try_recv().unwrap(), AssistantEvent::Message("hello".into()));
        assert_eq!(log.into_steps().len(), 1);
    }
}
