//! Markdown to Slack mrkdwn rendering.
//!
//! Agent replies arrive as standard markdown; Slack renders its own mrkdwn
//! dialect. See https://api.slack.com/reference/surfaces/formatting#basics

use regex::Regex;

/// Converts markdown emphasis to mrkdwn. Code spans and fenced blocks pass
/// through untouched, as does Slack's own syntax (`<@USER>`, `<#CHANNEL>`).
pub struct MrkdwnRenderer {
    code_spans: Regex,
    bold_italic: Regex,
    italic: Regex,
    bold: Regex,
    bold_underscore: Regex,
    strike: Regex,
}

impl Default for MrkdwnRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MrkdwnRenderer {
    pub fn new() -> Self {
        Self {
            code_spans: Regex::new(r"(?s)```.+?```|`[^`\n]+?`").expect("valid regex"),
            bold_italic: Regex::new(r"\*\*\*([^\s*](?:[^*\n]*[^\s*])?)\*\*\*")
                .expect("valid regex"),
            // boundary groups keep this off `**bold**` pairs; no look-around
            italic: Regex::new(r"(^|[^*_])\*([^\s*](?:[^*\n]*[^\s*])?)\*($|[^*_])")
                .expect("valid regex"),
            bold: Regex::new(r"\*\*([^\s*](?:[^*\n]*[^\s*])?)\*\*").expect("valid regex"),
            bold_underscore: Regex::new(r"__([^\s_](?:[^_\n]*[^\s_])?)__").expect("valid regex"),
            strike: Regex::new(r"~~([^\s~](?:[^~\n]*[^\s~])?)~~").expect("valid regex"),
        }
    }

    pub fn render(&self, content: &str) -> String {
        let mut result = String::with_capacity(content.len());
        let mut cursor = 0;

        for span in self.code_spans.find_iter(content) {
            result.push_str(&self.convert_emphasis(&content[cursor..span.start()]));
            result.push_str(span.as_str());
            cursor = span.end();
        }
        result.push_str(&self.convert_emphasis(&content[cursor..]));

        result
    }

    fn convert_emphasis(&self, part: &str) -> String {
        let mut text = self.bold_italic.replace_all(part, "_*$1*_").into_owned();

        // non-overlapping replacement consumes the boundary character, so
        // adjacent `*a* *b*` needs another pass; bounded for safety
        for _ in 0..4 {
            let replaced = self.italic.replace_all(&text, "${1}_${2}_${3}").into_owned();
            if replaced == text {
                break;
            }
            text = replaced;
        }

        let text = self.bold.replace_all(&text, "*$1*");
        let text = self.bold_underscore.replace_all(&text, "*$1*");
        self.strike.replace_all(&text, "~$1~").into_owned()
    }
}
