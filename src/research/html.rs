//! Plain-text extraction from fetched profile pages.

use std::sync::LazyLock;

use regex::Regex;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern is valid")
}

// One pattern per element so an opening tag only ends at its own closing tag
static INVISIBLE_BLOCKS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    ["head", "script", "style", "noscript"]
        .map(|tag| compile(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")))
});
static COMMENTS: LazyLock<Regex> = LazyLock::new(|| compile(r"(?s)<!--.*?-->"));
static LINE_BREAKS: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)<br\s*/?>|</(p|div|li|tr|h[1-6]|section|article|td)>"));
static TAGS: LazyLock<Regex> = LazyLock::new(|| compile(r"<[^>]+>"));

static SCHOLAR_AFFILIATION: LazyLock<Regex> =
    LazyLock::new(|| compile(r#"(?is)<div[^>]*class="[^"]*\bgsc_prf_il\b[^"]*"[^>]*>(.*?)</div>"#));
static SCHOLAR_INTEREST: LazyLock<Regex> =
    LazyLock::new(|| compile(r#"(?is)<a[^>]*class="[^"]*\bgsc_prf_inta\b[^"]*"[^>]*>(.*?)</a>"#));
static SCHOLAR_ROW: LazyLock<Regex> =
    LazyLock::new(|| compile(r#"(?is)<tr[^>]*class="[^"]*\bgsc_a_tr\b[^"]*"[^>]*>(.*?)</tr>"#));
static SCHOLAR_TITLE: LazyLock<Regex> =
    LazyLock::new(|| compile(r#"(?is)<a[^>]*class="[^"]*\bgsc_a_at\b[^"]*"[^>]*>(.*?)</a>"#));
static SCHOLAR_CITES: LazyLock<Regex> =
    LazyLock::new(|| compile(r#"(?is)<a[^>]*class="[^"]*\bgsc_a_ac\b[^"]*"[^>]*>(.*?)</a>"#));

const SCHOLAR_LIMIT: usize = 5;

/// Visible text of a page, one non-empty line per block element.
pub fn page_text(html: &str) -> String {
    let mut cleaned = html.to_string();
    for block in INVISIBLE_BLOCKS.iter() {
        cleaned = block.replace_all(&cleaned, "").into_owned();
    }
    let cleaned = COMMENTS.replace_all(&cleaned, "");
    let cleaned = LINE_BREAKS.replace_all(&cleaned, "\n");
    let cleaned = TAGS.replace_all(&cleaned, " ");
    let text = decode_entities(&cleaned);

    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Summary of a Google Scholar profile page.
///
/// Returns an empty string when the page has neither interests nor
/// publications, which usually means Scholar served a captcha instead.
pub fn scholar_profile(html: &str) -> String {
    let affiliation = SCHOLAR_AFFILIATION
        .captures_iter(html)
        .map(|c| inner_text(&c[1]))
        .find(|t| !t.is_empty());

    let interests: Vec<String> = SCHOLAR_INTEREST
        .captures_iter(html)
        .map(|c| inner_text(&c[1]))
        .filter(|t| !t.is_empty())
        .take(SCHOLAR_LIMIT)
        .collect();

    let publications: Vec<String> = SCHOLAR_ROW
        .captures_iter(html)
        .filter_map(|row| {
            let row = &row[1];
            let title = SCHOLAR_TITLE.captures(row).map(|c| inner_text(&c[1]))?;
            let cites = SCHOLAR_CITES
                .captures(row)
                .map(|c| inner_text(&c[1]))
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "0".to_string());
            Some(format!("- {title} ({cites} citations)"))
        })
        .take(SCHOLAR_LIMIT)
        .collect();

    if interests.is_empty() && publications.is_empty() {
        return String::new();
    }

    let mut out = Vec::new();
    out.push(format!(
        "Affiliation: {}",
        affiliation.unwrap_or_else(|| "N/A".to_string())
    ));
    if !interests.is_empty() {
        out.push(format!("Research interests: {}", interests.join(", ")));
    }
    if !publications.is_empty() {
        out.push("Publications:".to_string());
        out.extend(publications);
    }
    out.join("\n")
}

fn inner_text(fragment: &str) -> String {
    let text = TAGS.replace_all(fragment, "");
    decode_entities(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_text_drops_scripts_and_tags() {
        let html = r#"<html><head><title>X</title></head><body>
            <script>var x = "<p>hidden</p>";</script>
            <h1>Dr. Jane Doe</h1>
            <p>Professor of <b>Operations Research</b> &amp; Analytics</p>
            <!-- nav --><style>.a{}</style>
            </body></html>"#;
        assert_eq!(
            page_text(html),
            "Dr. Jane Doe\nProfessor of Operations Research & Analytics"
        );
    }

    #[test]
    fn test_page_text_drops_whole_head_after_nested_style() {
        let html = "<html><head><style>.a{}</style><title>Faculty Directory</title></head>\
                    <body><p>Research on pricing</p></body></html>";
        assert_eq!(page_text(html), "Research on pricing");
    }

    #[test]
    fn test_page_text_keeps_header_element() {
        let html = "<header>Department of Engineering</header><p>Bio</p>";
        assert_eq!(page_text(html), "Department of Engineering Bio");
    }

    #[test]
    fn test_page_text_breaks_on_br() {
        assert_eq!(page_text("line one<br/>line&nbsp;two"), "line one\nline two");
    }

    #[test]
    fn test_page_text_of_empty_markup_is_empty() {
        assert_eq!(page_text("<div>  </div><script>x</script>"), "");
    }

    #[test]
    fn test_scholar_profile_extracts_fields() {
        let html = r##"
            <div class="gsc_prf_il">Saint Mary&#39;s University</div>
            <div class="gsc_prf_il" id="gsc_prf_int">
              <a class="gsc_prf_inta gs_ibl" href="#">Supply Chain</a>
              <a class="gsc_prf_inta gs_ibl" href="#">Pricing</a>
            </div>
            <table>
              <tr class="gsc_a_tr"><td><a class="gsc_a_at" href="#">Dual-channel competition</a></td>
                  <td><a class="gsc_a_ac gs_ibl">579</a></td></tr>
              <tr class="gsc_a_tr"><td><a class="gsc_a_at" href="#">Another paper</a></td>
                  <td><a class="gsc_a_ac gs_ibl"></a></td></tr>
            </table>"##;

        assert_eq!(
            scholar_profile(html),
            "Affiliation: Saint Mary's University\n\
             Research interests: Supply Chain, Pricing\n\
             Publications:\n\
             - Dual-channel competition (579 citations)\n\
             - Another paper (0 citations)"
        );
    }

    #[test]
    fn test_scholar_profile_of_captcha_page_is_empty() {
        let html = "<html><body><h1>Please show you're not a robot</h1></body></html>";
        assert_eq!(scholar_profile(html), "");
    }
}
