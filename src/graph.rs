//! ### Graph
//! Renders monthly summaries from the `compute` module as SVG bar charts.

use anyhow::ensure;
use plotters::backend::SVGBackend;
use plotters::chart::ChartBuilder;
use plotters::chart::SeriesLabelPosition;
use plotters::drawing::IntoDrawingArea;
use plotters::prelude::IntoSegmentedCoord;
use plotters::prelude::Rectangle;
use plotters::prelude::SegmentValue;
use plotters::series::Histogram;
use plotters::style::full_palette::{BLUE_600, GREEN_600, ORANGE_600, RED_600};
use plotters::style::Color;
use plotters::style::RGBColor;
use plotters::style::BLACK;
use plotters::style::WHITE;
use std::path::Path;

use crate::compute::MonthlySummary;

struct BarSeries {
    label: &'static str,
    color: RGBColor,
    values: Vec<f64>,
}

pub struct Graphing<'a> {
    path: &'a Path,
}

impl<'a> Graphing<'a> {
    const CHART_COLOR: RGBColor = WHITE;
    const SIZE: (u32, u32) = (1080, 720);

    pub fn new(path: &'a Path) -> Self {
        Graphing { path }
    }

    /// Consumption, grid import and grid export per month.
    pub fn energy_flow(&self, summaries: &[MonthlySummary]) -> anyhow::Result<()> {
        self.monthly_bars(
            "Energy flow by month",
            "kWh",
            summaries,
            vec![
                BarSeries {
                    label: "Consumption",
                    color: BLUE_600,
                    values: summaries.iter().map(|s| s.consumption as f64).collect(),
                },
                BarSeries {
                    label: "From Grid",
                    color: ORANGE_600,
                    values: summaries.iter().map(|s| s.from_grid as f64).collect(),
                },
                BarSeries {
                    label: "To Grid",
                    color: GREEN_600,
                    values: summaries.iter().map(|s| s.to_grid as f64).collect(),
                },
            ],
        )
    }

    /// Feed-in revenue, grid cost and net benefit per month.
    pub fn revenue(&self, summaries: &[MonthlySummary]) -> anyhow::Result<()> {
        self.monthly_bars(
            "Revenue analysis by month",
            "€",
            summaries,
            vec![
                BarSeries {
                    label: "Revenue Grid",
                    color: GREEN_600,
                    values: summaries.iter().map(|s| s.revenue_grid).collect(),
                },
                BarSeries {
                    label: "Cost Grid",
                    color: RED_600,
                    values: summaries.iter().map(|s| s.cost_grid).collect(),
                },
                BarSeries {
                    label: "Net Benefit",
                    color: BLUE_600,
                    values: summaries.iter().map(|s| s.difference).collect(),
                },
            ],
        )
    }

    // Series are drawn as nested bars: each one narrower than the one before,
    // so all of them stay visible within a month's segment.
    fn monthly_bars(
        &self,
        caption: &str,
        y_desc: &str,
        summaries: &[MonthlySummary],
        series: Vec<BarSeries>,
    ) -> anyhow::Result<()> {
        ensure!(!summaries.is_empty(), "No monthly data to chart");

        let labels: Vec<String> = summaries
            .iter()
            .map(|s| s.month_key().map(|k| k.to_string()).unwrap_or_default())
            .collect();
        let (y_min, y_max) = series
            .iter()
            .flat_map(|s| s.values.iter().copied())
            .fold((0f64, 0f64), |(lo, hi), val| (lo.min(val), hi.max(val)));
        let pad = ((y_max - y_min) * 0.1).max(1.);
        let y_low = if y_min < 0. { y_min - pad } else { 0. };

        let root = SVGBackend::new(self.path, Self::SIZE).into_drawing_area();
        root.fill(&Self::CHART_COLOR)?;

        let mut chart = ChartBuilder::on(&root)
            .x_label_area_size(72)
            .y_label_area_size(84)
            .margin(20)
            .caption(caption, ("sans-serif", 40.))
            .build_cartesian_2d((0..labels.len()).into_segmented(), y_low..(y_max + pad))?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .y_desc(y_desc)
            .x_desc("Month")
            .axis_desc_style(("sans-serif", 30))
            .x_label_formatter(&|seg| match seg {
                SegmentValue::Last | SegmentValue::Exact(_) => "".to_string(),
                SegmentValue::CenterOf(idx) => labels.get(*idx).cloned().unwrap_or_default(),
            })
            .x_labels((labels.len() * 2).max(20))
            .y_labels(10)
            .x_label_style(("sans-serif", 16))
            .y_label_style(("sans-serif", 16))
            .draw()?;

        for (nesting, bars) in series.into_iter().enumerate() {
            let color = bars.color;
            chart
                .draw_series(
                    Histogram::vertical(&chart)
                        .style(color.filled())
                        .margin(8 + 14 * nesting as u32)
                        .data(bars.values.iter().enumerate().map(|(idx, &val)| (idx, val))),
                )?
                .label(bars.label)
                .legend(move |(x, y)| {
                    Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled())
                });
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .position(SeriesLabelPosition::UpperRight)
            .label_font(("sans-serif", 14))
            .draw()?;

        root.present()?;

        Ok(())
    }
}
