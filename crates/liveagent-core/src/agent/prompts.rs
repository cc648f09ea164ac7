//! Fixed prompt text for the two model calls.

use serde_json::Value;

/// System directive sent with both model calls.
pub const SYSTEM_PROMPT: &str = "You are an AI agent that MUST use live data for any questions about dynamic entities.

CRITICAL RULES:
1. NEVER answer questions about inventory, orders, users, or any dynamic data without calling a tool first
2. ALWAYS call the appropriate tool to get live data before answering
3. If a tool returns an error, report the error - do NOT make up data
4. Include the timestamp of the data in your response

Available tools will be provided. Use them for ANY question about dynamic/changing data.";

/// Second-call prompt carrying the live tool result.
///
/// `timestamp` falls back to "now" for display only.
pub fn follow_up_prompt(
    user_query: &str,
    tool_name: &str,
    timestamp: Option<&str>,
    data: &Value,
) -> String {
    let rendered = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
    format!(
        "Original question: {user_query}

Tool called: {tool_name}
Tool result (LIVE DATA as of {as_of}):
{rendered}

Based on this LIVE data, answer the user's question. Always mention that this is live/current data.",
        as_of = timestamp.unwrap_or("now"),
    )
}
