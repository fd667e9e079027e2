/// Builds the article prompt sent to the generation backend.
pub fn build_prompt(title: &str, summary: &str, lang: &str, style: &str) -> String {
    format!(
        "Rewrite the following news item as an original blog article written in {lang}. \
If the source is in another language, translate it.\n\
Title: {title}\n\
Summary: {summary}\n\n\
Tone: {tone}\n\
Structure: an <h2> headline, three clearly separated paragraphs with <h3> subheadings, \
and a short <table> comparing the key options or facts mentioned.\n\
Reply with the article body as bare HTML only, without <html> or <body> tags.",
        tone = style_tone(style),
    )
}

fn style_tone(style: &str) -> &'static str {
    match style {
        "zh_style_1" | "food" => "an enthusiastic, friendly food blogger talking to regular readers",
        "tech" => "a clear, practical tech reviewer who highlights specs and trade-offs",
        "news" => "a neutral news writer; no hype, short sentences",
        _ => "an engaging blogger with a conversational voice",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_inputs_and_tone() {
        let prompt = build_prompt("Night market opens", "A new market downtown.", "zh-TW", "zh_style_1");
        assert!(prompt.contains("Title: Night market opens"));
        assert!(prompt.contains("Summary: A new market downtown."));
        assert!(prompt.contains("written in zh-TW"));
        assert!(prompt.contains("food blogger"));
        assert!(prompt.contains("<table>"));
    }

    #[test]
    fn unknown_style_uses_default_tone() {
        let prompt = build_prompt("t", "s", "en", "mystery");
        assert!(prompt.contains("conversational voice"));
    }
}
