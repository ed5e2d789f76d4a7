use clap::Parser;
use solar_analysis::{
    compute::{self, MonthlySummary},
    config::AppConfig,
    convert,
    graph::Graphing,
    month::MonthKey,
    observability,
    overrides::{apply_override, parse_override_arg, CostOverrides},
    report,
};
use std::path::{Path, PathBuf};

#[derive(clap::Args, Debug)]
struct RateArgs {
    /// TOML settings holding the feed-in revenue and per-month grid costs.
    /// Defaults to ./solar-analysis.toml when that file exists.
    #[clap(long, env = "SOLAR_ANALYSIS_CONFIG")]
    config: Option<PathBuf>,

    /// Feed-in revenue per kWh. Takes precedence over the settings file.
    #[clap(long)]
    revenue: Option<f64>,

    /// Grid cost per kWh for one month, e.g. `--override 2024-Mar=0.30`.
    /// May be repeated; applied on top of the settings file.
    #[clap(long = "override", value_name = "MONTH=RATE", value_parser = parse_override_arg)]
    overrides: Vec<(MonthKey, f64)>,
}

impl RateArgs {
    fn resolve(&self) -> anyhow::Result<(f64, CostOverrides)> {
        let cfg = AppConfig::load(self.config.as_deref())?;
        let mut overrides = cfg.grid_cost_overrides;
        for &(month, rate) in &self.overrides {
            overrides = apply_override(&overrides, month, rate)?;
        }
        Ok((self.revenue.unwrap_or(cfg.grid_revenue_per_kwh), overrides))
    }
}

#[derive(clap::Parser, Debug)]
#[command(name = "solar-analysis", version, about)]
enum Args {
    /// Prints the monthly self-sufficiency and grid cost table for one or
    /// more SolarEdge energy exports, followed by the all-time totals.
    // cargo run -- report data/2024-01.csv data/2024-02.csv --override 2024-Feb=0.31
    Report {
        /// Energy export CSVs. Days present in several files count once;
        /// the earliest file listed wins.
        #[clap(required = true)]
        csv: Vec<PathBuf>,

        #[clap(flatten)]
        rates: RateArgs,
    },

    /// Shows daily autarky for one month as a calendar.
    // cargo run -- calendar data/2024-03.csv --month 2024-Mar
    Calendar {
        #[clap(required = true)]
        csv: Vec<PathBuf>,

        /// Month to show, e.g. 2024-Mar
        #[clap(short, long)]
        month: MonthKey,
    },

    /// Writes the monthly summaries and a Total row into a CSV.
    // cargo run -- write-summary data/*.csv --csv-out results/summary.csv
    WriteSummary {
        #[clap(required = true)]
        csv: Vec<PathBuf>,

        /// Where the output csv will be written
        #[clap(short = 'o', long)]
        csv_out: PathBuf,

        #[clap(flatten)]
        rates: RateArgs,
    },

    /// Charts consumption, grid import and grid export per month.
    // cargo run -- graph-energy-flow data/*.csv --output-svg results/flow.svg
    GraphEnergyFlow {
        #[clap(required = true)]
        csv: Vec<PathBuf>,

        /// Where the SVG chart will be written.
        #[clap(short = 'o', long)]
        output_svg: PathBuf,
    },

    /// Charts grid revenue, grid cost and net benefit per month.
    // cargo run -- graph-revenue data/*.csv --output-svg results/revenue.svg
    GraphRevenue {
        #[clap(required = true)]
        csv: Vec<PathBuf>,

        /// Where the SVG chart will be written.
        #[clap(short = 'o', long)]
        output_svg: PathBuf,

        #[clap(flatten)]
        rates: RateArgs,
    },

    /// Stores a grid cost override for one month in the settings file.
    // cargo run -- set-override --month 2024-Mar --rate 0.30
    SetOverride {
        #[clap(short, long)]
        month: MonthKey,

        /// Grid cost per kWh
        #[clap(short, long)]
        rate: f64,

        #[clap(long, env = "SOLAR_ANALYSIS_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn monthly(csv: &[PathBuf], rates: &RateArgs) -> anyhow::Result<Vec<MonthlySummary>> {
    let (revenue, overrides) = rates.resolve()?;
    let records = convert::load_energy_records(csv)?;
    let summaries = compute::aggregate_by_month(&records, revenue, &overrides);
    tracing::info!(
        readings = records.len(),
        months = summaries.len(),
        grid_revenue_per_kwh = revenue,
        overrides = overrides.len(),
        "summarized exports"
    );
    Ok(summaries)
}

fn set_override(config: Option<&Path>, month: MonthKey, rate: f64) -> anyhow::Result<()> {
    let path = AppConfig::path_or_default(config);
    let cfg = if path.exists() {
        AppConfig::from_path(&path)?
    } else {
        AppConfig::default()
    };
    cfg.with_override(month, rate)?.save(&path)?;
    tracing::info!(path = %path.display(), %month, rate, "stored grid cost override");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    observability::init_tracing();

    match Args::parse() {
        Args::Report { csv, rates } => {
            let summaries = monthly(&csv, &rates)?;
            let totals = compute::reduce_totals(&summaries);
            println!("{}", report::build_monthly_table(&summaries, &totals));
        }
        Args::Calendar { csv, month } => {
            let records = convert::load_energy_records(&csv)?;
            let days = compute::daily_autarky(&records, month)?;
            println!("Daily autarky - {month}");
            println!("{}", report::build_calendar_table(month, &days));
        }
        Args::WriteSummary {
            csv,
            csv_out,
            rates,
        } => {
            let summaries = monthly(&csv, &rates)?;
            let totals = compute::reduce_totals(&summaries);
            convert::write_summaries_csv(&csv_out, &summaries, &totals)?;
        }
        Args::GraphEnergyFlow { csv, output_svg } => {
            // Energy figures do not depend on any rate.
            let records = convert::load_energy_records(&csv)?;
            let summaries =
                compute::aggregate_by_month(&records, 0., &CostOverrides::new());
            Graphing::new(&output_svg).energy_flow(&summaries)?;
        }
        Args::GraphRevenue {
            csv,
            output_svg,
            rates,
        } => {
            let summaries = monthly(&csv, &rates)?;
            Graphing::new(&output_svg).revenue(&summaries)?;
        }
        Args::SetOverride {
            month,
            rate,
            config,
        } => {
            set_override(config.as_deref(), month, rate)?;
        }
    }
    Ok(())
}
