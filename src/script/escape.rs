//! Turning model output into a Lua script.

/// Escape `text` for use inside a single-quoted Lua string literal.
///
/// ```
/// use desktop_pet::script::escape_lua_literal;
///
/// assert_eq!(escape_lua_literal("it's"), r"it\'s");
/// assert_eq!(escape_lua_literal("a\nb"), r"a\nb");
/// ```
pub fn escape_lua_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            // Three digits so a following digit is not read into the escape.
            '\0' => out.push_str("\\000"),
            c => out.push(c),
        }
    }
    out
}

/// The script that makes the pet say `text`.
pub fn speech_script(text: &str) -> String {
    format!("pet.say('{}')", escape_lua_literal(text))
}
