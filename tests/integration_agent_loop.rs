//! Agent loop integration tests
//!
//! Runs the full loop (scripted model, real tools, temporary sandbox) and
//! checks turn accounting, history rollback, streaming and cancellation.

use std::fs;
use std::sync::Arc;

use agent_skills::agent::{AgentConfig, AgentLoop};
use agent_skills::llm::{
    CompletionResponse, LlmError, MockLlmClient, Role, StreamChunk, ToolCall, ToolContext, ToolRegistry,
    create_stream_channel,
};
use agent_skills::AgentError;
use serde_json::{Value, json};
use tempfile::TempDir;

const SYSTEM_PROMPT: &str = "You are a careful assistant.";

fn agent(llm: Arc<MockLlmClient>, root: &TempDir, max_turns: u32) -> AgentLoop<MockLlmClient> {
    let config = AgentConfig {
        max_turns,
        ..Default::default()
    };
    let tools = ToolRegistry::standard(ToolContext::sandboxed(root.path()));
    AgentLoop::new(llm, tools, SYSTEM_PROMPT, config)
}

fn tool_turn(calls: Vec<ToolCall>) -> CompletionResponse {
    CompletionResponse::with_tool_calls(calls)
}

fn call(id: &str, name: &str, args: Value) -> ToolCall {
    ToolCall::new(id, name, args.to_string())
}

#[tokio::test]
async fn test_write_read_then_answer() {
    let root = TempDir::new().unwrap();
    let llm = Arc::new(MockLlmClient::new(vec![
        tool_turn(vec![call(
            "call_1",
            "write_file",
            json!({ "path": "notes.txt", "content": "hi" }),
        )]),
        tool_turn(vec![call("call_2", "read_file", json!({ "path": "notes.txt" }))]),
        CompletionResponse::text("The file says hi."),
    ]));
    let mut agent = agent(llm.clone(), &root, 5);

    let answer = agent.run("Write hi to notes.txt and read it back").await.unwrap();

    assert_eq!(answer, "The file says hi.");
    assert_eq!(llm.call_count(), 3);
    assert_eq!(fs::read_to_string(root.path().join("notes.txt")).unwrap(), "hi");

    // system, user, (assistant + tool) x2, final assistant
    let messages = agent.history().messages();
    assert_eq!(messages.len(), 7);
    assert_eq!(messages[0].role, Role::System);
    assert_eq!(messages[1].role, Role::User);
    assert_eq!(messages[3].tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(messages[5].tool_call_id.as_deref(), Some("call_2"));

    let read: Value = serde_json::from_str(&messages[5].content).unwrap();
    assert_eq!(read["ok"], true);
    assert_eq!(read["data"]["content"], "hi");
    assert_eq!(messages[6].role, Role::Assistant);
}

#[tokio::test]
async fn test_rejected_tool_call_is_reported_to_model() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("keep.txt"), "keep").unwrap();
    let llm = Arc::new(MockLlmClient::new(vec![
        tool_turn(vec![call("call_1", "run_shell", json!({ "command": "rm -rf ." }))]),
        CompletionResponse::text("I am not allowed to delete files."),
    ]));
    let mut agent = agent(llm.clone(), &root, 5);

    agent.run("Delete everything").await.unwrap();

    let requests = llm.requests();
    let tool_message = requests[1].messages.last().unwrap();
    assert_eq!(tool_message.role, Role::Tool);
    let envelope: Value = serde_json::from_str(&tool_message.content).unwrap();
    assert_eq!(envelope["ok"], false);
    assert_eq!(envelope["error"], "dangerous command not allowed: rm");
    assert!(root.path().join("keep.txt").exists());
}

#[tokio::test]
async fn test_budget_exhausted_after_exactly_max_turns() {
    let root = TempDir::new().unwrap();
    let llm = Arc::new(MockLlmClient::repeating(tool_turn(vec![call(
        "call_loop",
        "run_shell",
        json!({ "command": "echo again" }),
    )])));
    let mut agent = agent(llm.clone(), &root, 4);

    let err = agent.run("Never stop").await.unwrap_err();

    assert!(matches!(err, AgentError::BudgetExhausted { max_turns: 4 }));
    assert_eq!(llm.call_count(), 4);
    assert_eq!(agent.history().len(), 1);
}

#[tokio::test]
async fn test_failed_run_rolls_back_and_retry_succeeds() {
    let root = TempDir::new().unwrap();
    let llm = Arc::new(MockLlmClient::with_results(vec![
        Ok(CompletionResponse::text("First answer")),
        Ok(tool_turn(vec![call(
            "call_1",
            "write_file",
            json!({ "path": "partial.txt", "content": "x" }),
        )])),
        Err(LlmError::ApiError {
            status: 503,
            message: "overloaded".to_string(),
        }),
        Ok(CompletionResponse::text("Second answer")),
    ]));
    let mut agent = agent(llm.clone(), &root, 5);

    assert_eq!(agent.run("first").await.unwrap(), "First answer");
    let before = agent.history().messages().to_vec();

    let err = agent.run("second").await.unwrap_err();
    assert!(matches!(err, AgentError::Llm(LlmError::ApiError { status: 503, .. })));
    assert_eq!(agent.history().messages(), before.as_slice());
    // Tool side effects are not undone
    assert!(root.path().join("partial.txt").exists());

    assert_eq!(agent.run("second").await.unwrap(), "Second answer");
    assert_eq!(agent.history().len(), before.len() + 2);
}

#[tokio::test]
async fn test_streaming_forwards_text_and_keeps_final_answer() {
    let root = TempDir::new().unwrap();
    let llm = Arc::new(MockLlmClient::new(vec![
        tool_turn(vec![call("call_1", "read_file", json!({ "path": "missing.txt" }))]),
        CompletionResponse::text("No such file here."),
    ]));
    let (tx, mut handle) = create_stream_channel(100);
    let mut agent = agent(llm, &root, 5).with_stream(tx);

    let answer = agent.run("Read missing.txt").await.unwrap();
    assert_eq!(answer, "No such file here.");

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    let mut done = 0;
    while let Ok(chunk) = handle.receiver.try_recv() {
        match chunk {
            StreamChunk::Text(t) => text.push_str(&t),
            StreamChunk::ToolCall { name, .. } => tool_calls.push(name),
            StreamChunk::Done => done += 1,
            StreamChunk::Error(e) => panic!("unexpected stream error: {}", e),
        }
    }
    assert_eq!(text, "No such file here.");
    assert_eq!(tool_calls, vec!["read_file".to_string()]);
    assert_eq!(done, 2);
}

#[tokio::test]
async fn test_cancelled_run_makes_no_model_calls() {
    let root = TempDir::new().unwrap();
    let llm = Arc::new(MockLlmClient::new(vec![CompletionResponse::text("unused")]));
    let mut agent = agent(llm.clone(), &root, 5);

    agent.cancellation_token().cancel();
    let err = agent.run("hello").await.unwrap_err();

    assert!(matches!(err, AgentError::Cancelled));
    assert_eq!(llm.call_count(), 0);
    assert_eq!(agent.history().len(), 1);

    agent.renew_cancellation();
    assert_eq!(agent.run("hello").await.unwrap(), "unused");
}

#[tokio::test]
async fn test_reset_keeps_only_system_prompt() {
    let root = TempDir::new().unwrap();
    let llm = Arc::new(MockLlmClient::repeating(CompletionResponse::text("ok")));
    let mut agent = agent(llm, &root, 2);

    agent.run("one").await.unwrap();
    agent.run("two").await.unwrap();
    assert_eq!(agent.history().len(), 5);

    agent.reset();
    assert_eq!(agent.history().len(), 1);
    assert_eq!(agent.history().messages()[0].content, SYSTEM_PROMPT);
}
