use linkify::{LinkFinder, LinkKind};
use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, TextMergeStream, html};
use pulldown_cmark_escape::{escape_href, escape_html};
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

/// Derives the HTML view of a message from its raw text.
pub trait Render: Send + Sync {
    fn render(&self, markdown: &str) -> String;
}

/// CommonMark renderer with chat-friendly defaults: raw HTML passes through,
/// single newlines become `<br />`, quotes and dashes are typographic, bare
/// URLs become links, and fenced code blocks are highlighted with CSS classes.
pub struct MarkdownRenderer {
    syntax_set: SyntaxSet,
    options: Options,
    links: LinkFinder,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            options: Options::ENABLE_TABLES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS
                | Options::ENABLE_SMART_PUNCTUATION,
            links: url_finder(),
        }
    }

    fn highlight(&self, code: &str, lang: &str) -> String {
        let syntax = if lang.is_empty() {
            None
        } else {
            self.syntax_set.find_syntax_by_token(lang)
        };

        if let Some(syntax) = syntax {
            let mut generator = ClassedHTMLGenerator::new_with_class_style(
                syntax,
                &self.syntax_set,
                ClassStyle::Spaced,
            );
            let highlighted = LinesWithEndings::from(code)
                .try_for_each(|line| generator.parse_html_for_line_which_includes_newline(line));
            match highlighted {
                Ok(()) => {
                    return format!(
                        "<pre class=\"hljs\"><code class=\"language-{}\">{}</code></pre>\n",
                        escaped(lang),
                        generator.finalize()
                    );
                }
                Err(e) => log::debug!("Highlighting {lang} block failed: {e}"),
            }
        }

        format!("<pre class=\"hljs\"><code>{}</code></pre>\n", escaped(code))
    }

    /// Pushes `text`, with every bare URL in it turned into an anchor.
    fn push_linkified<'a>(&self, text: CowStr<'a>, events: &mut Vec<Event<'a>>) {
        if self.links.links(&text).next().is_none() {
            events.push(Event::Text(text));
            return;
        }

        for span in self.links.spans(&text) {
            let piece = span.as_str();
            match span.kind() {
                Some(LinkKind::Url) => events.push(Event::InlineHtml(anchor(piece).into())),
                _ => events.push(Event::Text(piece.to_string().into())),
            }
        }
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Render for MarkdownRenderer {
    fn render(&self, markdown: &str) -> String {
        let mut events = Vec::new();
        // (language, collected source) of the fenced block being read
        let mut fence: Option<(String, String)> = None;
        // open links, images and indented code blocks; no autolinking inside
        let mut verbatim = 0usize;

        for event in TextMergeStream::new(Parser::new_ext(markdown, self.options)) {
            if let Some((lang, source)) = fence.as_mut() {
                match event {
                    Event::Text(text) => source.push_str(&text),
                    Event::End(TagEnd::CodeBlock) => {
                        let block = self.highlight(source, lang);
                        events.push(Event::Html(block.into()));
                        fence = None;
                    }
                    _ => {}
                }
                continue;
            }

            match event {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                    let lang = info.split_whitespace().next().unwrap_or_default();
                    fence = Some((lang.to_string(), String::new()));
                }
                Event::Start(
                    tag @ (Tag::Link { .. } | Tag::Image { .. } | Tag::CodeBlock(_)),
                ) => {
                    verbatim += 1;
                    events.push(Event::Start(tag));
                }
                Event::End(tag @ (TagEnd::Link | TagEnd::Image | TagEnd::CodeBlock)) => {
                    verbatim = verbatim.saturating_sub(1);
                    events.push(Event::End(tag));
                }
                Event::Text(text) if verbatim == 0 => self.push_linkified(text, &mut events),
                Event::SoftBreak => events.push(Event::HardBreak),
                other => events.push(other),
            }
        }

        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());
        out
    }
}

fn url_finder() -> LinkFinder {
    let mut finder = LinkFinder::new();
    finder.kinds(&[LinkKind::Url]);
    finder
}

fn anchor(url: &str) -> String {
    let mut out = String::from("<a href=\"");
    // writes into a String cannot fail
    let _ = escape_href(&mut out, url);
    out.push_str("\">");
    let _ = escape_html(&mut out, url);
    out.push_str("</a>");
    out
}

fn escaped(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let _ = escape_html(&mut out, text);
    out
}
