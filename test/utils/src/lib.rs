/// Builds one newline terminated chat record carrying an assistant delta.
pub fn chat_record(content: &str) -> String {
    let record = serde_json::json!({
        "model": "llama3.1",
        "message": {
            "role": "assistant",
            "content": content,
        },
        "done": false,
    });

    return record.to_string() + "\n";
}

pub fn chat_done_record() -> &'static str {
    return "{\"model\":\"llama3.1\",\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true,\"eval_count\":3}\n";
}

/// A full streamed response the way an Ollama server sends it, including a
/// blank keep-alive line and a line that is not JSON at all.
pub fn chat_stream_fixture() -> String {
    return [
        chat_record("Hello"),
        "\n".to_string(),
        chat_record(" wörld"),
        "not json\n".to_string(),
        chat_record("! 👋"),
        chat_done_record().to_string(),
    ]
    .join("");
}
