//! Texts sent back to the chat.

use scraper::Html;
use teloxide::utils::html::escape;

use crate::parser::{self, GradeEntry, ParseError};

pub const GREETING: &str = "👋 Сәлем! / Привет!\n\n\
    Бұл бот Snation College сайтындағы журналдан бағаларды көрсетеді.\n\
    Чтобы начать, отправь свою <b>cookie</b> строку (например):\n\n\
    <code>laravel_session=...; XSRF-TOKEN=...</code>\n\n\
    Cookie можно скопировать из браузера, пока ты вошёл на сайт колледжа.\n\
    /refresh — обновить оценки с сохранённой cookie.";

pub const COOKIE_RECEIVED: &str = "🔐 Cookie получена, проверяю...";
pub const REFRESHING: &str = "♻️ Обновляю данные журнала...";
pub const COOKIE_REJECTED: &str = "❌ Cookie неверна или устарела.";
pub const COOKIE_EXPIRED: &str = "❌ Cookie устарела или недействительна. Отправь новую.";
pub const COOKIE_NOT_FOUND: &str = "⚠️ Cookie не найдена! Отправь её снова.";
pub const NOT_A_TEXT: &str = "✉️ Отправь cookie обычным текстовым сообщением.";

pub const TABLE_NOT_FOUND: &str = "⚠️ Не удалось найти таблицу с оценками.";
pub const NO_GRADES: &str = "⚠️ В таблице нет оценок.";

pub fn invalid_cookie(reason: impl std::fmt::Display) -> String {
    format!(
        "❌ Это не похоже на cookie: {}\nОтправь строку вида <code>laravel_session=...; XSRF-TOKEN=...</code>",
        escape(&reason.to_string())
    )
}

pub fn unexpected_error(error: &anyhow::Error) -> String {
    format!(
        "⚠️ Қате орын алды / Произошла ошибка: {}",
        escape(&format!("{error:#}"))
    )
}

pub fn describe_grades(entries: &[GradeEntry]) -> String {
    let mut message = "📘 <b>Твои оценки:</b>".to_owned();
    for entry in entries {
        message.push('\n');
        message.push_str(&escape(&entry.subject));
        message.push_str(" — ");
        message.push_str(&escape(&entry.value));
    }
    message
}

/// Scrapes a journal page and renders it, falling back to a placeholder
/// when the markup has nothing to show.
pub fn grades_reply(html: &str) -> String {
    match parser::parse(&Html::parse_document(html)) {
        Err(ParseError::TableNotFound) => TABLE_NOT_FOUND.to_owned(),
        Ok(entries) if entries.is_empty() => NO_GRADES.to_owned(),
        Ok(entries) => describe_grades(&entries),
    }
}

/// Telegram rejects longer messages. Counted in UTF-16 code units.
pub const MESSAGE_LIMIT: usize = 4096;

/// Cuts `text` at line breaks into messages of at most `limit` UTF-16 units.
/// Every line of a grade list carries its own tags, so chunks stay valid HTML.
/// A single overlong line is cut wherever it overflows.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = vec![];
    let mut current = String::new();
    let mut current_len = 0;
    for piece in text.split('\n').flat_map(|line| hard_wrap(line, limit)) {
        let len = utf16_len(piece);
        if !current.is_empty() && current_len + 1 + len > limit {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(piece);
        current_len += len;
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn hard_wrap(line: &str, limit: usize) -> Vec<&str> {
    let mut pieces = vec![];
    let (mut start, mut len) = (0, 0);
    for (i, c) in line.char_indices() {
        if len + c.len_utf16() > limit {
            pieces.push(&line[start..i]);
            start = i;
            len = 0;
        }
        len += c.len_utf16();
    }
    pieces.push(&line[start..]);
    pieces
}

fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

#[cfg(test)]
mod tests {
    use crate::parser::GradeEntry;

    use super::{
        describe_grades, grades_reply, split_message, unexpected_error, MESSAGE_LIMIT, NO_GRADES,
        TABLE_NOT_FOUND,
    };

    #[test]
    fn journal_fixture_reply() {
        assert_eq!(
            grades_reply(include_str!("../fixtures/journal.html")),
            "📘 <b>Твои оценки:</b>\n\
             Математика — 5\n\
             Қазақ тілі — 4+\n\
             Физика &amp; астрономия — 3"
        );
    }

    #[test]
    fn placeholder_without_table() {
        assert_eq!(
            grades_reply(include_str!("../fixtures/no_table.html")),
            TABLE_NOT_FOUND
        );
    }

    #[test]
    fn placeholder_without_rows() {
        assert_eq!(
            grades_reply(include_str!("../fixtures/empty_table.html")),
            NO_GRADES
        );
    }

    #[test]
    fn error_text_is_escaped() {
        let e = anyhow::anyhow!("bad <tag>");
        assert_eq!(
            unexpected_error(&e),
            "⚠️ Қате орын алды / Произошла ошибка: bad &lt;tag&gt;"
        );
    }

    #[test]
    fn short_reply_is_sent_as_is() {
        let reply = grades_reply(include_str!("../fixtures/journal.html"));
        assert_eq!(split_message(&reply, MESSAGE_LIMIT), vec![reply]);
    }

    #[test]
    fn long_grade_list_is_split_at_line_breaks() {
        let entries: Vec<_> = (0..500)
            .map(|i| GradeEntry {
                subject: format!("Пән №{i} 📐"),
                value: "5".to_owned(),
            })
            .collect();
        let reply = describe_grades(&entries);
        let chunks = split_message(&reply, MESSAGE_LIMIT);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.encode_utf16().count() <= MESSAGE_LIMIT);
            assert!(!chunk.starts_with('\n') && !chunk.ends_with('\n'));
        }
        assert!(chunks[0].starts_with("📘 <b>Твои оценки:</b>\n"));
        assert_eq!(chunks.join("\n"), reply);
    }

    #[test]
    fn overlong_line_is_cut() {
        let line = "ж".repeat(10);
        assert_eq!(
            split_message(&format!("{line}\nok"), 4),
            vec!["жжжж", "жжжж", "жж", "ok"]
        );
    }

    #[test]
    fn empty_text_is_one_empty_message() {
        assert_eq!(split_message("", 10), vec![""]);
    }
}
