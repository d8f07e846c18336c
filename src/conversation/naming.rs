pub const MAX_NAME_WORDS: usize = 4;
pub const MAX_NAME_CHARS: usize = 30;

const ELLIPSIS: char = '…';

/// Derive a chat title from the first message of a conversation.
///
/// Keeps the first four whitespace-separated words, marks truncation with an
/// ellipsis, capitalizes the first letter and caps the result at thirty
/// characters (twenty-seven plus an ellipsis when longer).
pub fn generate_chat_name(message: &str) -> String {
    let words: Vec<&str> = message.split_whitespace().collect();

    let mut name = words
        .iter()
        .take(MAX_NAME_WORDS)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");

    if words.len() > MAX_NAME_WORDS {
        name.push(ELLIPSIS);
    }

    let name = capitalize_first(&name);

    if name.chars().count() > MAX_NAME_CHARS {
        let mut cut: String = name.chars().take(MAX_NAME_CHARS - 3).collect();
        cut.push(ELLIPSIS);
        cut
    } else {
        name
    }
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
