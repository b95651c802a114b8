//! HTML to Markdown conversion
//!
//! Conversion runs in two passes. The content region is first written back
//! out as clean HTML:
//!
//! - chrome and excluded elements are dropped
//! - links and images are made absolute against the page base
//! - heading permalinks are removed
//! - code blocks become `<pre><code class="language-*">` with plain text
//!
//! `htmd` renders that HTML as CommonMark, and the result is canonicalized
//! (one blank line between blocks, no trailing whitespace) so converting the
//! rendering of the output again yields the same text.

use htmd::options::{
    BrStyle, BulletListMarker, CodeBlockFence, CodeBlockStyle, HeadingStyle, HrStyle, LinkStyle,
    Options,
};
use htmd::HtmlToMarkdown;
use scraper::node::Node;
use scraper::{ElementRef, Selector};
use url::Url;

/// Elements that never carry page content
const CHROME_TAGS: &[&str] = &[
    "aside", "button", "canvas", "footer", "form", "head", "iframe", "input", "link", "meta",
    "nav", "noscript", "object", "script", "select", "style", "svg", "template", "textarea",
    "title",
];

/// Elements written without a closing tag
const VOID_TAGS: &[&str] = &["br", "col", "hr", "wbr"];

/// Attributes that survive the clean-up pass
const KEPT_ATTRIBUTES: &[&str] = &["start", "colspan", "rowspan", "align"];

/// Renders the content region of a page as Markdown
pub struct MarkdownConverter<'a> {
    base_url: &'a Url,
    exclude: &'a [Selector],
}

impl<'a> MarkdownConverter<'a> {
    /// Creates a converter resolving links against `base_url` and dropping
    /// every element matched by `exclude`
    pub fn new(base_url: &'a Url, exclude: &'a [Selector]) -> Self {
        Self { base_url, exclude }
    }

    /// Converts the subtree rooted at `root`
    ///
    /// Returns an empty string when the subtree holds no content.
    pub fn convert(&self, root: ElementRef<'_>) -> Result<String, std::io::Error> {
        let html = self.clean_html(root);
        let markdown = markdown_engine().convert(&html)?;
        Ok(canonicalize(&markdown))
    }

    /// The region as HTML with chrome removed and URLs made absolute
    pub fn clean_html(&self, root: ElementRef<'_>) -> String {
        let mut out = String::new();
        if !self.is_skipped(root) {
            self.write_children(root, &mut out);
        }
        out
    }

    /// Returns true if the element (and its subtree) is chrome
    pub fn is_skipped(&self, element: ElementRef<'_>) -> bool {
        let value = element.value();
        let tag = value.name();

        if CHROME_TAGS.contains(&tag) || value.attr("hidden").is_some() {
            return true;
        }

        if tag == "header" && !has_section_heading(element) {
            return true;
        }

        self.exclude.iter().any(|selector| selector.matches(&element))
    }

    fn write_children(&self, element: ElementRef<'_>, out: &mut String) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => push_escaped_text(out, text),
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        self.write_element(child, out);
                    }
                }
                _ => {}
            }
        }
    }

    fn write_element(&self, element: ElementRef<'_>, out: &mut String) {
        if self.is_skipped(element) {
            return;
        }

        let value = element.value();
        let tag = value.name();
        match tag {
            "pre" => return self.write_code_block(element, out),
            "a" => return self.write_link(element, out),
            "img" => return self.write_image(element, out),
            // Wrappers of the region itself carry no structure of their own
            "html" | "body" => return self.write_children(element, out),
            _ => {}
        }

        out.push('<');
        out.push_str(tag);
        for name in KEPT_ATTRIBUTES {
            if let Some(attr) = value.attr(name) {
                push_attribute(out, name, attr);
            }
        }
        out.push('>');

        if VOID_TAGS.contains(&tag) {
            return;
        }

        self.write_children(element, out);
        out.push_str("</");
        out.push_str(tag);
        out.push('>');
    }

    fn write_link(&self, element: ElementRef<'_>, out: &mut String) {
        let href = element.value().attr("href").map(str::trim).unwrap_or("");

        // Heading permalinks ("#", "¶") carry no content
        if href.starts_with('#')
            && !element
                .text()
                .any(|text| text.chars().any(char::is_alphanumeric))
        {
            return;
        }

        match resolve_href(self.base_url, href) {
            Some(target) => {
                out.push_str("<a");
                push_attribute(out, "href", target.as_str());
                out.push('>');
                self.write_children(element, out);
                out.push_str("</a>");
            }
            None => self.write_children(element, out),
        }
    }

    fn write_image(&self, element: ElementRef<'_>, out: &mut String) {
        let Some(src) = element
            .value()
            .attr("src")
            .and_then(|src| resolve_href(self.base_url, src.trim()))
            .filter(|src| src.scheme() == "http" || src.scheme() == "https")
        else {
            return;
        };

        out.push_str("<img");
        push_attribute(out, "src", src.as_str());
        if let Some(alt) = element.value().attr("alt") {
            push_attribute(out, "alt", &collapse_whitespace(alt));
        }
        out.push('>');
    }

    fn write_code_block(&self, pre: ElementRef<'_>, out: &mut String) {
        let mut code = String::new();
        self.collect_code(pre, &mut code);
        let code = code.replace("\r\n", "\n");
        let code = code.trim_start_matches('\n').trim_end();

        out.push_str("<pre><code");
        if let Some(language) = code_language(pre) {
            push_attribute(out, "class", &format!("language-{}", language));
        }
        out.push('>');
        push_escaped_text(out, code);
        out.push_str("</code></pre>");
    }

    fn collect_code(&self, element: ElementRef<'_>, out: &mut String) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => out.push_str(text),
                Node::Element(value) => {
                    if value.name() == "br" {
                        out.push('\n');
                    } else if let Some(child) = ElementRef::wrap(child) {
                        if !self.is_skipped(child) {
                            self.collect_code(child, out);
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

fn markdown_engine() -> HtmlToMarkdown {
    HtmlToMarkdown::builder()
        .skip_tags(CHROME_TAGS.to_vec())
        .options(Options {
            heading_style: HeadingStyle::Atx,
            hr_style: HrStyle::Dashes,
            br_style: BrStyle::Backslash,
            link_style: LinkStyle::Inlined,
            code_block_style: CodeBlockStyle::Fenced,
            code_block_fence: CodeBlockFence::Backticks,
            bullet_list_marker: BulletListMarker::Dash,
            ..Options::default()
        })
        .build()
}

/// One blank line between blocks, no trailing whitespace outside code
fn canonicalize(markdown: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for line in markdown.lines() {
        let fence = line.trim_start().starts_with("```") || line.trim_start().starts_with("~~~");
        if in_fence && !fence {
            lines.push(line);
            continue;
        }
        if fence {
            in_fence = !in_fence;
        }

        let line = line.trim_end();
        if line.is_empty() && lines.last().map_or(true, |last| last.is_empty()) {
            continue;
        }
        lines.push(line);
    }

    while lines.last().map_or(false, |last| last.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Returns true if the subtree holds an `h1`-`h3`
fn has_section_heading(element: ElementRef<'_>) -> bool {
    element
        .descendants()
        .filter_map(ElementRef::wrap)
        .any(|e| matches!(e.value().name(), "h1" | "h2" | "h3"))
}

/// Language hint from `language-*` / `lang-*` classes on `pre` or its `code`
fn code_language(pre: ElementRef<'_>) -> Option<String> {
    language_class(&pre).or_else(|| {
        pre.descendants()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "code")
            .and_then(|code| language_class(&code))
    })
}

fn language_class(element: &ElementRef<'_>) -> Option<String> {
    element
        .value()
        .classes()
        .filter_map(|class| {
            class
                .strip_prefix("language-")
                .or_else(|| class.strip_prefix("lang-"))
        })
        .find(|lang| !lang.is_empty() && !lang.contains('`'))
        .map(str::to_string)
}

fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    if href.is_empty() || href.to_ascii_lowercase().starts_with("javascript:") {
        return None;
    }

    let target = base.join(href).ok()?;
    match target.scheme() {
        "http" | "https" | "mailto" => Some(target),
        _ => None,
    }
}

/// Zero-width characters some generators put in headings and links
fn is_invisible(ch: char) -> bool {
    matches!(ch, '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{2060}' | '\u{feff}')
}

fn push_escaped_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            ch if is_invisible(ch) => {}
            ch => out.push(ch),
        }
    }
}

fn push_attribute(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            ch => out.push(ch),
        }
    }
    out.push('"');
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace()
        .map(|word| word.chars().filter(|c| !is_invisible(*c)).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulldown_cmark::{html, Options as MdOptions, Parser};
    use scraper::Html;

    fn convert(body: &str) -> String {
        convert_with(body, &[])
    }

    fn convert_with(body: &str, exclude: &[&str]) -> String {
        let html = format!("<html><body>{}</body></html>", body);
        let document = Html::parse_document(&html);
        let base = Url::parse("https://example.com/docs/page").unwrap();
        let exclude: Vec<Selector> = exclude.iter().map(|s| Selector::parse(s).unwrap()).collect();
        let converter = MarkdownConverter::new(&base, &exclude);
        converter.convert(document.root_element()).unwrap()
    }

    /// Renders Markdown back to HTML to check structure independent of layout
    fn rendered(markdown: &str) -> String {
        let mut options = MdOptions::empty();
        options.insert(MdOptions::ENABLE_TABLES);
        options.insert(MdOptions::ENABLE_STRIKETHROUGH);
        let mut out = String::new();
        html::push_html(&mut out, Parser::new_ext(markdown, options));
        out
    }

    #[test]
    fn test_headings_and_paragraphs() {
        let md = convert("<h1>Title</h1><p>First   paragraph\n with text.</p><h3>Sub</h3>");
        assert_eq!(md, "# Title\n\nFirst paragraph with text.\n\n### Sub");
    }

    #[test]
    fn test_inline_formatting() {
        let md = convert("<p>Use <code>cargo build</code>, <strong>bold</strong> and <em>em</em>.</p>");
        let html = rendered(&md);
        assert!(html.contains("<code>cargo build</code>"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<em>em</em>"));
    }

    #[test]
    fn test_links_are_absolute() {
        let md = convert(r#"<p>See <a href="../guide/intro">the guide</a>.</p>"#);
        assert_eq!(md, "See [the guide](https://example.com/guide/intro).");
    }

    #[test]
    fn test_javascript_links_keep_only_text() {
        let md = convert(r#"<p><a href="javascript:void(0)">Toggle</a> theme</p>"#);
        assert_eq!(md, "Toggle theme");
    }

    #[test]
    fn test_heading_permalinks_dropped() {
        let md = convert("<h2 id=\"x\">Install<a class=\"hash-link\" href=\"#x\">\u{200b}</a></h2><h3>Use<a href=\"#y\">¶</a></h3>");
        assert_eq!(md, "## Install\n\n### Use");
    }

    #[test]
    fn test_images() {
        let md = convert(r#"<p><img src="/img/arch.png" alt="Architecture"></p>"#);
        assert_eq!(md, "![Architecture](https://example.com/img/arch.png)");
    }

    #[test]
    fn test_code_block_language_hint() {
        let md = convert(
            "<pre class=\"prism-code language-rust\"><code>fn main() {\n    println!(\"hi\");\n}\n</code></pre>",
        );
        assert_eq!(md, "```rust\nfn main() {\n    println!(\"hi\");\n}\n```");
    }

    #[test]
    fn test_code_block_lang_on_code_element() {
        let md = convert("<pre><code class=\"lang-python\">print(1)</code></pre>");
        assert_eq!(md, "```python\nprint(1)\n```");
    }

    #[test]
    fn test_code_block_line_breaks() {
        let md = convert("<pre><code><span>a</span><br><span>b &lt; c</span></code></pre>");
        assert!(rendered(&md).contains("<pre><code>a\nb &lt; c\n</code></pre>"));
    }

    #[test]
    fn test_nested_lists() {
        let md = convert("<ul><li>one<ul><li>nested</li></ul></li><li>two</li></ul>");
        let html = rendered(&md);
        assert_eq!(html.matches("<ul>").count(), 2);
        assert!(html.contains("nested</li>"));
        assert!(md.lines().any(|line| line.starts_with(' ') && line.contains("nested")));
    }

    #[test]
    fn test_ordered_list_start() {
        let md = convert("<ol start=\"3\"><li>c</li><li>d</li></ol>");
        assert!(rendered(&md).contains("<ol start=\"3\">"));
    }

    #[test]
    fn test_blockquote() {
        let md = convert("<blockquote><p>quoted</p><p>twice</p></blockquote>");
        let html = rendered(&md);
        assert!(html.contains("<blockquote>"));
        assert!(html.contains("<p>quoted</p>"));
        assert!(html.contains("<p>twice</p>"));
    }

    #[test]
    fn test_table_cells_kept() {
        let md = convert(
            "<table><thead><tr><th>Name</th><th>Type</th></tr></thead>\
             <tbody><tr><td>id</td><td><code>u64</code></td></tr></tbody></table>",
        );
        assert!(md.contains("Name"));
        assert!(md.contains("`u64`"));
    }

    #[test]
    fn test_chrome_removed() {
        let md = convert(
            "<nav>Menu</nav><header><div>Logo</div></header><p>Body</p>\
             <aside>Related</aside><footer>Copyright</footer><script>x()</script>",
        );
        assert_eq!(md, "Body");
    }

    #[test]
    fn test_header_with_heading_kept() {
        let md = convert("<header><h1>Page Title</h1></header><p>Body</p>");
        assert_eq!(md, "# Page Title\n\nBody");
    }

    #[test]
    fn test_exclude_selectors() {
        let md = convert_with(
            "<p>Keep</p><div class=\"edit-this-page\"><p>Edit</p></div>",
            &[".edit-this-page"],
        );
        assert_eq!(md, "Keep");
    }

    #[test]
    fn test_markdown_syntax_in_text_is_escaped() {
        let md = convert("<p>2 * 3 = [six]</p><p># not a heading</p>");
        let html = rendered(&md);
        assert!(html.contains("2 * 3 = [six]"));
        assert!(!html.contains("<h1>"));
    }

    #[test]
    fn test_hard_breaks() {
        let md = convert("<p>line one<br>line two</p>");
        assert!(rendered(&md).contains("line one<br />\nline two"));
    }

    #[test]
    fn test_rule() {
        let md = convert("<p>a</p><hr><p>b</p>");
        assert!(rendered(&md).contains("<hr />"));
    }

    #[test]
    fn test_empty_region() {
        assert_eq!(convert("<nav><a href=\"/\">Home</a></nav>"), "");
    }

    #[test]
    fn test_clean_html_drops_chrome_and_absolutizes() {
        let html = Html::parse_document(
            "<body><nav>x</nav><p class=\"lead\"><a href=\"intro\">Intro</a></p></body>",
        );
        let base = Url::parse("https://example.com/docs/").unwrap();
        let converter = MarkdownConverter::new(&base, &[]);
        assert_eq!(
            converter.clean_html(html.root_element()),
            "<p><a href=\"https://example.com/docs/intro\">Intro</a></p>"
        );
    }

    #[test]
    fn test_canonicalize_spacing() {
        assert_eq!(
            canonicalize("\n\n# A  \n\n\n\ntext\n```\nx  \n\n\n```\n\n"),
            "# A\n\ntext\n```\nx  \n\n\n```"
        );
    }
}
