use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use itertools::Itertools;
use log::{debug, info};
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    domain::flow::Flow,
    error::{Error, Result},
};

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

const HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{plotly}"></script>
</head>
<body>
<div id="sankey" style="width:100%;height:95vh;"></div>
<script>
const figure = {figure};
Plotly.newPlot("sankey", figure.data, figure.layout, {responsive: true});
</script>
</body>
</html>
"#;

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub title: String,
    pub dollar_labels: bool,
    /// Name shown next to the excluded total, e.g. `Debt`.
    pub excluded_label: String,
}

#[derive(Debug, Clone)]
pub struct ImageOptions {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Program invoked as `<renderer> graph <figure.json> ...`.
    pub renderer: String,
}

/// A plotly figure holding one Sankey trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    data: Vec<Value>,
    layout: Value,
}

impl Figure {
    pub fn from_flow(flow: &Flow, options: &RenderOptions) -> Self {
        let edges = flow.graph.edges();

        let sankey = json!({
            "type": "sankey",
            "node": {
                "pad": 15,
                "thickness": 20,
                "line": { "color": "black", "width": 0.5 },
                "label": node_labels(flow, options.dollar_labels),
            },
            "link": {
                "source": edges.iter().map(|e| e.source).collect_vec(),
                "target": edges.iter().map(|e| e.target).collect_vec(),
                "value": edges.iter().map(|e| to_plot(e.value)).collect_vec(),
            },
        });

        let mut title = options.title.clone();
        if !flow.summary.total_excluded.is_zero() {
            title.push_str(&format!(
                "<br><sub>{} total: {}</sub>",
                options.excluded_label,
                format_dollars(flow.summary.total_excluded)
            ));
        }

        Self {
            data: vec![sankey],
            layout: json!({
                "title": { "text": title },
                "font": { "size": 10 },
            }),
        }
    }

    pub fn title(&self) -> &str {
        self.layout["title"]["text"].as_str().unwrap_or_default()
    }
}

fn node_labels(flow: &Flow, dollar_labels: bool) -> Vec<String> {
    let hub = flow.graph.hub();

    flow.graph
        .nodes()
        .iter()
        .enumerate()
        .map(|(index, name)| {
            if !dollar_labels {
                return name.clone();
            }

            let amount = if index == hub {
                flow.summary
                    .grand_total
                    .unwrap_or(flow.summary.total_income)
            } else {
                flow.categories[index].total.abs()
            };

            format!("{name}: {}", format_dollars(amount))
        })
        .collect()
}

fn to_plot(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

/// Formats `amount` as `$1,234.56`, rounded half away from zero to cents.
pub fn format_dollars(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let digits = whole.chars().collect_vec();
    let grouped = digits
        .rchunks(3)
        .rev()
        .map(|chunk| chunk.iter().collect::<String>())
        .join(",");

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };

    format!("{sign}${grouped}.{cents}")
}

/// Writes a standalone page drawing `figure` with plotly.js.
pub fn write_html(figure: &Figure, path: &Path) -> Result<()> {
    let json = serde_json::to_string(figure).map_err(|err| render_error(path, err))?;
    let title = escape_html(&strip_markup(figure.title()));
    let script = json.replace("</", "<\\/");

    let page = fill_template(&[
        ("{title}", title.as_str()),
        ("{plotly}", PLOTLY_CDN),
        ("{figure}", script.as_str()),
    ]);

    fs::write(path, page).map_err(|err| render_error(path, err))?;
    info!("wrote diagram to {}", path.display());

    Ok(())
}

/// Renders `figure` to a raster image through an external orca compatible
/// program. The figure is handed over as a JSON file that is removed again
/// once the renderer exits.
pub fn export_image(figure: &Figure, options: &ImageOptions) -> Result<()> {
    let path = &options.path;
    let figure_path = path.with_extension("figure.json");
    let json = serde_json::to_vec(figure).map_err(|err| render_error(path, err))?;
    fs::write(&figure_path, json).map_err(|err| render_error(&figure_path, err))?;

    let file_name = path.file_name().unwrap_or_default();
    let output_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let format = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("png");

    debug!("running {} for {}", options.renderer, path.display());
    let output = Command::new(&options.renderer)
        .arg("graph")
        .arg(&figure_path)
        .arg("--output-dir")
        .arg(output_dir)
        .arg("--output")
        .arg(file_name)
        .args(["--format", format])
        .args(["--width", &options.width.to_string()])
        .args(["--height", &options.height.to_string()])
        .output();

    if let Err(err) = fs::remove_file(&figure_path) {
        debug!("could not remove {}: {err}", figure_path.display());
    }

    let output = output.map_err(|err| {
        render_error(path, format!("could not run {}: {err}", options.renderer))
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(render_error(
            path,
            format!("{} exited with {}: {}", options.renderer, output.status, stderr.trim()),
        ));
    }

    info!("wrote image to {}", path.display());
    Ok(())
}

pub fn open_in_browser(path: &Path) -> Result<()> {
    open::that(path).map_err(|err| render_error(path, err))
}

/// Substitutes the placeholders of [`HTML_TEMPLATE`] in the order given.
/// Inserted values are never scanned for further placeholders.
fn fill_template(values: &[(&str, &str)]) -> String {
    let mut page = String::with_capacity(HTML_TEMPLATE.len());
    let mut rest = HTML_TEMPLATE;

    for &(placeholder, value) in values {
        if let Some((before, after)) = rest.split_once(placeholder) {
            page.push_str(before);
            page.push_str(value);
            rest = after;
        }
    }

    page.push_str(rest);
    page
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn strip_markup(title: &str) -> String {
    title.split("<br>").next().unwrap_or(title).to_owned()
}

fn render_error(target: &Path, reason: impl ToString) -> Error {
    Error::Render {
        target: target.to_owned(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::NaiveDate;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::{
        flow::FlowOptions,
        transaction::Transaction,
    };

    fn flow(starting_balance: Option<Decimal>) -> Flow {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5);
        let txns = vec![
            Transaction::new(date, Some("Salary"), dec!(2000)),
            Transaction::new(date, Some("Food"), dec!(-300.5)),
            Transaction::new(date, Some("Debt/Loan"), dec!(-150)),
        ];
        let options = FlowOptions {
            excluded: HashSet::from(["Debt".to_owned()]),
            starting_balance,
            ..Default::default()
        };

        Flow::from_transactions(&txns, &options).unwrap()
    }

    fn options(dollar_labels: bool) -> RenderOptions {
        RenderOptions {
            title: "Cash Flow".to_owned(),
            dollar_labels,
            excluded_label: "Debt".to_owned(),
        }
    }

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("cashflow-sankey-{}-{name}", std::process::id()))
    }

    #[rstest]
    #[case(dec!(0), "$0.00")]
    #[case(dec!(7.5), "$7.50")]
    #[case(dec!(1234.567), "$1,234.57")]
    #[case(dec!(-1234567.1), "-$1,234,567.10")]
    #[case(dec!(999), "$999.00")]
    #[case(dec!(-0.001), "$0.00")]
    #[case(dec!(1.125), "$1.13")]
    #[case(dec!(-2.675), "-$2.68")]
    #[case(dec!(0.005), "$0.01")]
    fn dollars(#[case] amount: Decimal, #[case] expected: &str) {
        assert_eq!(format_dollars(amount), expected);
    }

    #[test]
    fn figure_links_follow_the_graph() {
        let figure = Figure::from_flow(&flow(None), &options(false));
        let sankey = &figure.data[0];

        assert_eq!(sankey["type"], "sankey");
        assert_eq!(sankey["node"]["label"], json!(["Salary", "Food", "Total Income"]));
        assert_eq!(sankey["link"]["source"], json!([0, 2]));
        assert_eq!(sankey["link"]["target"], json!([2, 1]));
        assert_eq!(sankey["link"]["value"], json!([2000.0, 300.5]));
    }

    #[test]
    fn dollar_labels_use_grand_total_for_hub() {
        let figure = Figure::from_flow(&flow(Some(dec!(500))), &options(true));

        assert_eq!(
            figure.data[0]["node"]["label"],
            json!(["Salary: $2,000.00", "Food: $300.50", "Total Income: $2,500.00"])
        );
    }

    #[test]
    fn title_reports_excluded_total() {
        let figure = Figure::from_flow(&flow(None), &options(false));

        assert_eq!(figure.title(), "Cash Flow<br><sub>Debt total: $150.00</sub>");
    }

    #[test]
    fn html_page_embeds_figure() {
        let path = scratch("page.html");
        let figure = Figure::from_flow(&flow(None), &options(true));

        write_html(&figure, &path).unwrap();
        let page = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert!(page.contains("<title>Cash Flow</title>"));
        assert!(page.contains(PLOTLY_CDN));
        assert!(page.contains("Salary: $2,000.00"));
        assert!(page.contains("<\\/sub>"));
    }

    #[test]
    fn html_title_is_escaped_and_not_expanded() {
        let path = scratch("escaped.html");
        let mut options = options(false);
        options.title = "Profit & Loss <2024> {figure} {plotly}".to_owned();
        let figure = Figure::from_flow(&flow(None), &options);

        write_html(&figure, &path).unwrap();
        let page = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert!(page.contains("<title>Profit &amp; Loss &lt;2024&gt; {figure} {plotly}</title>"));
        assert_eq!(page.matches(PLOTLY_CDN).count(), 1);
        assert_eq!(page.matches("const figure = {").count(), 1);
    }

    #[test]
    fn missing_renderer_is_a_render_error() {
        let path = scratch("diagram.png");
        let figure = Figure::from_flow(&flow(None), &options(false));
        let image = ImageOptions {
            path: path.clone(),
            width: 800,
            height: 600,
            renderer: "cashflow-sankey-no-such-renderer".to_owned(),
        };

        assert!(matches!(
            export_image(&figure, &image),
            Err(Error::Render { target, .. }) if target == path
        ));
        assert!(!path.with_extension("figure.json").exists());
    }
}
