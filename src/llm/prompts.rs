//! Prompt text shared by every backend.

pub const REFACTOR_SYSTEM: &str = "You are an expert software engineer tasked with refactoring code files. \
Provide only the refactored code without explanations unless explicitly asked.";

pub const REVIEW_SYSTEM: &str = "You are a helpful code reviewer. \
Provide clear, concise, and constructive feedback on git diffs.";

pub fn refactor_prompt(instructions: &str, filename: &str, content: &str) -> String {
    format!(
        "Refactor the following file based on these instructions:

Instructions:
{}

Filename: {}

Content:
{}

Please provide the complete refactored file content, maintaining the original functionality unless the instructions
specifically require changes. Keep all imports and package declarations.",
        instructions, filename, content
    )
}

pub fn review_prompt(diff: &str) -> String {
    format!(
        "Review this git diff and provide actionable feedback:

{}

Please analyze:
1. Code quality issues
2. Potential bugs
3. Security concerns
4. Performance considerations
5. Suggested improvements
",
        diff
    )
}

/// Removes one Markdown code fence wrapping the whole response.
///
/// Text that is not fenced on both ends is returned unchanged. Unwrapped
/// text always ends with a newline.
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") || !trimmed.ends_with("```") || trimmed.len() < 6 {
        return text.to_string();
    }

    let mut lines: Vec<&str> = trimmed.lines().collect();
    if lines.len() < 2 || lines.last().map(|l| l.trim()) != Some("```") {
        return text.to_string();
    }
    lines.remove(0);
    lines.pop();

    // A fence in the middle means several blocks, not one wrapper.
    if lines.iter().any(|l| l.trim_start().starts_with("```")) {
        return text.to_string();
    }

    let mut body = lines.join("\n");
    body.push('\n');
    body
}
