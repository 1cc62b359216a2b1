//! # 通知消息渲染

/// 转义 Telegram MarkdownV2 保留字符
#[must_use]
pub fn escape_markdown_v2(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '=' | '|'
            | '{' | '}' | '.' | '!' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// 渲染站点状态变化消息
#[must_use]
pub fn render_status_message(site_name: &str, is_up: bool) -> String {
    let name = escape_markdown_v2(site_name);
    if is_up {
        format!("*Site Status: Online*\n\nYour site *{name}* is now responding and back online\\.")
    } else {
        format!(
            "*Site Status: Offline*\n\nYour site *{name}* is currently not responding\\. Please check your server\\."
        )
    }
}
