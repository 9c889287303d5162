//! Server-side HTML composition: layout, tables, metric tiles, bar charts,
//! and form controls. No client-side scripting; charts are CSS bars.

use crate::config::Config;

pub fn html_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Build a path with the configured reverse-proxy prefix.
pub fn href(config: &Config, path: &str) -> String {
    format!("{}{}", config.server.url_prefix, path)
}

/// Build a path plus encoded query pairs.
pub fn href_with_query(config: &Config, path: &str, pairs: &[(&str, String)]) -> String {
    let mut target = href(config, path);
    if !pairs.is_empty() {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in pairs {
            serializer.append_pair(key, value);
        }
        target.push('?');
        target.push_str(&serializer.finish());
    }
    target
}

const NAV_ITEMS: &[(&str, &str, &str)] = &[
    ("dashboard", "Overview", "/"),
    ("search", "Site Search", "/search"),
    ("explorer", "Sites Explorer", "/explorer"),
    ("narratives", "Narratives", "/narratives"),
    ("documents", "Documents", "/documents"),
    ("qualifications", "Qualifications", "/qualifications"),
    ("contaminants", "Contaminants", "/contaminants"),
    ("contacts", "Contacts", "/contacts"),
    ("customers", "Customer Sites", "/customers"),
    ("filtered-out", "Filtered Out", "/filtered-out"),
    ("feedback", "Feedback", "/feedback"),
    ("dictionary", "Data Dictionary", "/dictionary"),
];

/// Full HTML document with navigation. `active` selects the highlighted nav
/// entry; `flash` renders as a notice banner above the body.
pub fn page(
    config: &Config,
    title: &str,
    active: &str,
    flash: Option<&str>,
    body: &str,
) -> String {
    let mut nav = String::new();
    for (slug, label, path) in NAV_ITEMS {
        let class = if *slug == active { " class=\"active\"" } else { "" };
        nav.push_str(&format!(
            "<a{class} href=\"{}\">{}</a>",
            html_escape(&href(config, path)),
            html_escape(label)
        ));
    }
    let flash_html = flash
        .map(|msg| format!("<div class=\"notice\">{}</div>", html_escape(msg)))
        .unwrap_or_default();
    let logout = format!(
        "<form class=\"logout\" method=\"post\" action=\"{}\"><button type=\"submit\">Logout</button></form>",
        html_escape(&href(config, "/logout"))
    );
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title} — Eco Site Analytics</title>\n\
         <link rel=\"stylesheet\" href=\"{css}\">\n</head>\n<body>\n\
         <header><h1><a href=\"{home}\">Eco Site Analytics</a></h1>{logout}</header>\n\
         <nav>{nav}</nav>\n<main>{flash_html}{body}</main>\n\
         <footer>Database: <code>{db_path}</code></footer>\n</body>\n</html>\n",
        title = html_escape(title),
        css = html_escape(&href(config, "/assets/app.css")),
        home = html_escape(&href(config, "/")),
        db_path = html_escape(&config.database.path.display().to_string()),
    )
}

/// Bare document without navigation (login page, error pages before auth).
pub fn bare_page(config: &Config, title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title} — Eco Site Analytics</title>\n\
         <link rel=\"stylesheet\" href=\"{css}\">\n</head>\n\
         <body class=\"bare\">\n<main>{body}</main>\n</body>\n</html>\n",
        title = html_escape(title),
        css = html_escape(&href(config, "/assets/app.css")),
    )
}

pub fn info_box(message: &str) -> String {
    format!("<div class=\"info\">{}</div>", html_escape(message))
}

pub fn error_box(message: &str) -> String {
    format!("<div class=\"error\">{}</div>", html_escape(message))
}

pub fn metric(label: &str, value: &str) -> String {
    format!(
        "<div class=\"metric\"><span class=\"metric-value\">{}</span>\
         <span class=\"metric-label\">{}</span></div>",
        html_escape(value),
        html_escape(label)
    )
}

pub fn metrics_row(items: &[(&str, String)]) -> String {
    let tiles: String = items
        .iter()
        .map(|(label, value)| metric(label, value))
        .collect();
    format!("<div class=\"metrics\">{tiles}</div>")
}

pub fn group_count(value: i64) -> String {
    // thousands separator for metric tiles
    let raw = value.abs().to_string();
    let mut out = String::new();
    for (i, c) in raw.chars().enumerate() {
        if i > 0 && (raw.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if value < 0 {
        format!("-{out}")
    } else {
        out
    }
}

/// Horizontal CSS bar chart. Bar widths scale to the maximum count.
pub fn bar_chart(title: &str, rows: &[(String, i64)]) -> String {
    if rows.is_empty() {
        return info_box("No data to chart.");
    }
    let max = rows.iter().map(|(_, n)| *n).max().unwrap_or(1).max(1);
    let mut bars = String::new();
    for (label, count) in rows {
        let width = (*count as f64 / max as f64 * 100.0).max(1.0);
        bars.push_str(&format!(
            "<div class=\"bar-row\"><span class=\"bar-label\" title=\"{label}\">{label}</span>\
             <span class=\"bar-track\"><span class=\"bar\" style=\"width:{width:.1}%\"></span></span>\
             <span class=\"bar-count\">{count}</span></div>",
            label = html_escape(label),
            count = group_count(*count),
        ));
    }
    format!(
        "<section class=\"chart\"><h3>{}</h3>{bars}</section>",
        html_escape(title)
    )
}

/// One table cell: plain text (escaped here) or pre-rendered HTML.
#[derive(Debug, Clone)]
pub enum Cell {
    Text(String),
    Html(String),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn opt(value: Option<&str>) -> Self {
        Cell::Text(value.unwrap_or("").to_string())
    }

    pub fn num(value: i64) -> Self {
        Cell::Text(value.to_string())
    }

    pub fn opt_num(value: Option<i64>) -> Self {
        Cell::Text(value.map(|v| v.to_string()).unwrap_or_default())
    }

    pub fn flag(value: bool) -> Self {
        Cell::Text(if value { "1" } else { "0" }.to_string())
    }

    pub fn link(target: &str, label: &str) -> Self {
        Cell::Html(format!(
            "<a href=\"{}\">{}</a>",
            html_escape(target),
            html_escape(label)
        ))
    }

    pub fn external_link(target: &str, label: &str) -> Self {
        Cell::Html(format!(
            "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>",
            html_escape(target),
            html_escape(label)
        ))
    }

    fn render(&self) -> String {
        match self {
            Cell::Text(value) => html_escape(value),
            Cell::Html(raw) => raw.clone(),
        }
    }
}

pub fn table(headers: &[&str], rows: &[Vec<Cell>]) -> String {
    let head: String = headers
        .iter()
        .map(|h| format!("<th>{}</th>", html_escape(h)))
        .collect();
    let mut body = String::new();
    for row in rows {
        body.push_str("<tr>");
        for cell in row {
            body.push_str(&format!("<td>{}</td>", cell.render()));
        }
        body.push_str("</tr>");
    }
    format!(
        "<div class=\"table-wrap\"><table><thead><tr>{head}</tr></thead>\
         <tbody>{body}</tbody></table></div>"
    )
}

/// Previous/next controls plus a page indicator, preserving filter pairs.
pub fn pagination(
    config: &Config,
    path: &str,
    pairs: &[(&str, String)],
    page: i64,
    total_pages: i64,
    total_count: i64,
) -> String {
    if total_pages <= 1 {
        return format!(
            "<div class=\"pagination\"><span>Total: {}</span></div>",
            group_count(total_count)
        );
    }
    let link = |target_page: i64, label: &str| -> String {
        let mut with_page: Vec<(&str, String)> = pairs.to_vec();
        with_page.push(("page", target_page.to_string()));
        format!(
            "<a href=\"{}\">{}</a>",
            html_escape(&href_with_query(config, path, &with_page)),
            html_escape(label)
        )
    };
    let prev = if page > 1 {
        link(page - 1, "← Previous")
    } else {
        "<span class=\"disabled\">← Previous</span>".to_string()
    };
    let next = if page < total_pages {
        link(page + 1, "Next →")
    } else {
        "<span class=\"disabled\">Next →</span>".to_string()
    };
    format!(
        "<div class=\"pagination\">{prev}<span>Page {page} of {total_pages} \
         (Total: {total})</span>{next}</div>",
        total = group_count(total_count),
    )
}

pub fn text_input(name: &str, value: Option<&str>, placeholder: &str) -> String {
    format!(
        "<input type=\"text\" name=\"{}\" value=\"{}\" placeholder=\"{}\">",
        html_escape(name),
        html_escape(value.unwrap_or("")),
        html_escape(placeholder)
    )
}

pub fn number_input(name: &str, value: Option<i64>, placeholder: i64) -> String {
    format!(
        "<input type=\"number\" name=\"{}\" value=\"{}\" placeholder=\"{placeholder}\">",
        html_escape(name),
        value.map(|v| v.to_string()).unwrap_or_default(),
    )
}

pub fn select(name: &str, options: &[(&str, &str)], selected: &str) -> String {
    let mut rendered = String::new();
    for (value, label) in options {
        let marker = if *value == selected { " selected" } else { "" };
        rendered.push_str(&format!(
            "<option value=\"{}\"{marker}>{}</option>",
            html_escape(value),
            html_escape(label)
        ));
    }
    format!(
        "<select name=\"{}\">{rendered}</select>",
        html_escape(name)
    )
}

pub fn multi_select(name: &str, options: &[String], selected: &[String]) -> String {
    let mut rendered = String::new();
    for option in options {
        let marker = if selected.contains(option) { " selected" } else { "" };
        rendered.push_str(&format!(
            "<option value=\"{0}\"{marker}>{0}</option>",
            html_escape(option)
        ));
    }
    let size = options.len().clamp(2, 6);
    format!(
        "<select name=\"{}\" multiple size=\"{size}\">{rendered}</select>",
        html_escape(name)
    )
}

pub fn field(label: &str, control: &str) -> String {
    format!(
        "<label class=\"field\"><span>{}</span>{control}</label>",
        html_escape(label)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_config(prefix: &str) -> Config {
        let mut config: Config = serde_yaml::from_str("auth:\n  token: x\n").expect("config");
        config.server.url_prefix = prefix.to_string();
        config
    }

    #[test]
    fn escapes_html_metacharacters() {
        assert_eq!(
            html_escape("<a href=\"x\">&'</a>"),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn href_applies_prefix() {
        let config = test_config("/analytics");
        assert_eq!(href(&config, "/search"), "/analytics/search");
        assert_eq!(
            href_with_query(&config, "/search", &[("q", "dock st".to_string())]),
            "/analytics/search?q=dock+st"
        );
    }

    #[test]
    fn table_escapes_text_cells() {
        let html = table(&["Name"], &[vec![Cell::text("<b>bold</b>")]]);
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt;"));
        assert!(!html.contains("<b>bold</b>"));
    }

    #[test]
    fn link_cell_escapes_target_and_label() {
        let Cell::Html(html) = Cell::link("/x?a=\"b\"", "<label>") else {
            panic!("link must be html");
        };
        assert!(html.contains("&quot;b&quot;"));
        assert!(html.contains("&lt;label&gt;"));
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_count(0), "0");
        assert_eq!(group_count(999), "999");
        assert_eq!(group_count(1000), "1,000");
        assert_eq!(group_count(1234567), "1,234,567");
        assert_eq!(group_count(-4200), "-4,200");
    }

    #[test]
    fn pagination_preserves_filter_pairs() {
        let config = test_config("");
        let html = pagination(
            &config,
            "/search",
            &[("q", "mill".to_string())],
            2,
            4,
            1700,
        );
        assert!(html.contains("q=mill"));
        assert!(html.contains("page=1"));
        assert!(html.contains("page=3"));
        assert!(html.contains("Page 2 of 4"));
        assert!(html.contains("1,700"));
    }

    #[test]
    fn single_page_has_no_links() {
        let config = test_config("");
        let html = pagination(&config, "/search", &[], 1, 1, 42);
        assert!(!html.contains("<a "));
    }

    #[test]
    fn bar_chart_scales_to_max() {
        let html = bar_chart(
            "Tiers",
            &[("A".to_string(), 10), ("B".to_string(), 5)],
        );
        assert!(html.contains("width:100.0%"));
        assert!(html.contains("width:50.0%"));
    }

    #[test]
    fn page_marks_active_nav() {
        let config = test_config("");
        let html = page(&config, "Site Search", "search", Some("saved"), "<p>x</p>");
        assert!(html.contains("class=\"active\" href=\"/search\""));
        assert!(html.contains("<div class=\"notice\">saved</div>"));
    }
}
