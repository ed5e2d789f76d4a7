//! ### Compute
//! Monthly aggregation of energy records produced by the `convert` module,
//! and the all-time totals derived from those months.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;

use crate::{
    convert::EnergyRecord, error::AnalysisError, month::MonthKey, overrides::CostOverrides,
};

/// Energy and money figures for one calendar month, or for all months when
/// produced by [`reduce_totals`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlySummary {
    /// Date of the earliest reading in the month. `None` on totals.
    pub period_start: Option<NaiveDate>,
    /// kWh
    pub consumption: i64,
    /// kWh
    pub from_grid: i64,
    /// kWh
    pub to_grid: i64,
    pub grid_cost_per_kwh: f64,
    pub cost_grid: f64,
    pub revenue_grid: f64,
    pub difference: f64,
    pub opportunity_cost: f64,
    pub average_autarky: f64,
    /// Number of readings folded in. Used as the weight when averaging autarky.
    pub total_days: usize,
}

impl MonthlySummary {
    pub fn month_key(&self) -> Option<MonthKey> {
        self.period_start.map(MonthKey::of)
    }
}

/// Autarky of a single day, as shown in the calendar view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyAutarky {
    pub date: NaiveDate,
    pub percent: i64,
}

/// Rounds to the nearest integer, halves toward positive infinity. Values
/// beyond the `i64` range saturate.
pub fn round_half_up(value: f64) -> i64 {
    let floor = value.floor();
    let rounded = if value - floor >= 0.5 { floor + 1. } else { floor };
    rounded as i64
}

/// Wh sum to whole kWh.
pub fn wh_to_kwh(watt_hours: f64) -> i64 {
    round_half_up(watt_hours / 1000.)
}

/// Drops undated readings, keeps the first reading seen for each date and
/// sorts the rest by date. Ties keep input order.
pub fn dedup_sorted(records: &[EnergyRecord]) -> Vec<&EnergyRecord> {
    let mut seen = HashSet::new();
    let mut unique: Vec<&EnergyRecord> = records
        .iter()
        .filter(|record| record.timestamp.is_some_and(|date| seen.insert(date)))
        .collect();
    unique.sort_by_key(|record| record.timestamp);
    unique
}

/// Buckets records by calendar month and summarizes each bucket, in
/// ascending month order.
pub fn aggregate_by_month(
    records: &[EnergyRecord],
    grid_revenue_per_kwh: f64,
    overrides: &CostOverrides,
) -> Vec<MonthlySummary> {
    let unique = dedup_sorted(records);

    let mut months: BTreeMap<MonthKey, Vec<&EnergyRecord>> = BTreeMap::new();
    for &record in &unique {
        if let Some(date) = record.timestamp {
            months.entry(MonthKey::of(date)).or_default().push(record);
        }
    }

    tracing::debug!(
        records = records.len(),
        unique = unique.len(),
        months = months.len(),
        "aggregated readings by month"
    );

    months
        .into_iter()
        .map(|(month, items)| {
            summarize_month(&items, overrides.rate_for(month), grid_revenue_per_kwh)
        })
        .collect()
}

fn summarize_month(
    items: &[&EnergyRecord],
    grid_cost_per_kwh: f64,
    grid_revenue_per_kwh: f64,
) -> MonthlySummary {
    let consumption = wh_to_kwh(items.iter().map(|item| item.consumption).sum());
    let from_grid = wh_to_kwh(items.iter().map(|item| item.grid_consumption).sum());
    let to_grid = wh_to_kwh(items.iter().map(|item| item.exported).sum());
    let average_autarky =
        items.iter().map(|item| item.autarky).sum::<f64>() / items.len() as f64;

    // Money is derived from the already rounded kWh figures.
    let cost_grid = from_grid as f64 * grid_cost_per_kwh;
    let revenue_grid = to_grid as f64 * grid_revenue_per_kwh;

    MonthlySummary {
        period_start: items.first().and_then(|item| item.timestamp),
        consumption,
        from_grid,
        to_grid,
        grid_cost_per_kwh,
        cost_grid,
        revenue_grid,
        difference: revenue_grid - cost_grid,
        opportunity_cost: consumption.saturating_sub(from_grid) as f64 * grid_cost_per_kwh,
        average_autarky,
        total_days: items.len(),
    }
}

/// Folds monthly summaries into one. Autarky is weighted by `total_days`,
/// while the cost rate is a plain mean over months. An empty input gives a
/// zeroed summary.
pub fn reduce_totals(summaries: &[MonthlySummary]) -> MonthlySummary {
    let mut totals = summaries
        .iter()
        .fold(MonthlySummary::default(), |acc, curr| MonthlySummary {
            period_start: None,
            consumption: acc.consumption.saturating_add(curr.consumption),
            from_grid: acc.from_grid.saturating_add(curr.from_grid),
            to_grid: acc.to_grid.saturating_add(curr.to_grid),
            grid_cost_per_kwh: acc.grid_cost_per_kwh + curr.grid_cost_per_kwh,
            cost_grid: acc.cost_grid + curr.cost_grid,
            revenue_grid: acc.revenue_grid + curr.revenue_grid,
            difference: acc.difference + curr.difference,
            opportunity_cost: acc.opportunity_cost + curr.opportunity_cost,
            // Weighted sum for now, divided below.
            average_autarky: acc.average_autarky + curr.average_autarky * curr.total_days as f64,
            total_days: acc.total_days + curr.total_days,
        });

    totals.average_autarky = if totals.total_days == 0 {
        0.
    } else {
        totals.average_autarky / totals.total_days as f64
    };
    totals.grid_cost_per_kwh = if summaries.is_empty() {
        0.
    } else {
        totals.grid_cost_per_kwh / summaries.len() as f64
    };
    totals
}

/// Like [`reduce_totals`] but refuses to total nothing.
pub fn try_reduce_totals(summaries: &[MonthlySummary]) -> Result<MonthlySummary, AnalysisError> {
    if summaries.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }
    Ok(reduce_totals(summaries))
}

/// Per-day autarky percentages for one month, in date order.
pub fn daily_autarky(
    records: &[EnergyRecord],
    month: MonthKey,
) -> Result<Vec<DailyAutarky>, AnalysisError> {
    let days: Vec<DailyAutarky> = dedup_sorted(records)
        .into_iter()
        .filter_map(|record| {
            let date = record.timestamp?;
            (MonthKey::of(date) == month).then(|| DailyAutarky {
                date,
                percent: round_half_up(record.autarky * 100.),
            })
        })
        .collect();
    if days.is_empty() {
        return Err(AnalysisError::UnknownMonth(month));
    }
    Ok(days)
}

#[cfg(test)]
mod tests {
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    use super::*;
    use crate::overrides::{apply_override, DEFAULT_GRID_COST_PER_KWH};

    fn day(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    fn january() -> Vec<EnergyRecord> {
        vec![
            EnergyRecord::new(day(2024, 1, 1), 1000., 0.),
            EnergyRecord::new(day(2024, 1, 2), 2000., 0.),
            EnergyRecord::new(day(2024, 1, 3), 3000., 0.),
        ]
    }

    #[test]
    fn rounds_half_up_after_summing() {
        assert_eq!(round_half_up(74.5), 75);
        assert_eq!(round_half_up(-0.5), 0);
        assert_eq!(wh_to_kwh(1499.), 1);
        assert_eq!(wh_to_kwh(1500.), 2);
        assert_eq!(wh_to_kwh(2500.), 3);
        assert_eq!(wh_to_kwh(0.), 0);
        assert_eq!(wh_to_kwh(-1500.), -1);

        // Three readings of 400 Wh: 1.2 kWh total, not 3 × round(0.4) = 0.
        let records: Vec<_> = (1..=3)
            .map(|d| EnergyRecord::new(day(2024, 5, d), 400., 0.))
            .collect();
        let months = aggregate_by_month(&records, 0.082, &CostOverrides::new());
        assert_eq!(months[0].consumption, 1);
    }

    #[test]
    fn january_with_default_rate() {
        let months = aggregate_by_month(&january(), 0.082, &CostOverrides::new());
        assert_eq!(months.len(), 1);
        let jan = &months[0];
        assert_eq!(jan.period_start, day(2024, 1, 1));
        assert_eq!(jan.consumption, 6);
        assert_eq!(jan.from_grid, 0);
        assert_eq!(jan.to_grid, 0);
        assert_eq!(jan.average_autarky, 1.);
        assert_eq!(jan.grid_cost_per_kwh, DEFAULT_GRID_COST_PER_KWH);
        assert_abs_diff_eq!(jan.cost_grid, 0.);
        assert_abs_diff_eq!(jan.opportunity_cost, 1.68, epsilon = 1e-9);
        assert_eq!(jan.total_days, 3);
    }

    #[test]
    fn january_override_changes_only_rate_and_cost() {
        let plain = aggregate_by_month(&january(), 0.082, &CostOverrides::new());
        let overrides =
            apply_override(&CostOverrides::new(), "2024-Jan".parse().unwrap(), 0.30).unwrap();
        let custom = aggregate_by_month(&january(), 0.082, &overrides);

        assert_eq!(custom[0].grid_cost_per_kwh, 0.30);
        assert_abs_diff_eq!(custom[0].opportunity_cost, 1.80, epsilon = 1e-9);
        assert_eq!(
            MonthlySummary {
                grid_cost_per_kwh: plain[0].grid_cost_per_kwh,
                opportunity_cost: plain[0].opportunity_cost,
                ..custom[0].clone()
            },
            plain[0]
        );
    }

    #[test]
    fn override_for_other_year_does_not_apply() {
        let overrides =
            apply_override(&CostOverrides::new(), "2023-Jan".parse().unwrap(), 0.50).unwrap();
        let months = aggregate_by_month(&january(), 0.082, &overrides);
        assert_eq!(months[0].grid_cost_per_kwh, DEFAULT_GRID_COST_PER_KWH);
    }

    #[test]
    fn derives_money_from_rounded_kwh() {
        let records = vec![
            EnergyRecord {
                exported: 10_400.,
                ..EnergyRecord::new(day(2024, 6, 1), 4_000., 1_600.)
            },
            EnergyRecord {
                exported: 9_900.,
                ..EnergyRecord::new(day(2024, 6, 2), 3_000., 1_000.)
            },
        ];
        let june = &aggregate_by_month(&records, 0.1, &CostOverrides::new())[0];
        assert_eq!(june.consumption, 7);
        assert_eq!(june.from_grid, 3);
        assert_eq!(june.to_grid, 20);
        assert_abs_diff_eq!(june.cost_grid, 0.84, epsilon = 1e-9);
        assert_abs_diff_eq!(june.revenue_grid, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(june.difference, 1.16, epsilon = 1e-9);
        assert_abs_diff_eq!(june.opportunity_cost, 1.12, epsilon = 1e-9);
        assert_relative_eq!(june.average_autarky, (0.6 + 2. / 3.) / 2.);
    }

    #[test]
    fn months_come_out_in_order_and_partition_input() {
        let records = vec![
            EnergyRecord::new(day(2024, 3, 15), 100., 0.),
            EnergyRecord::new(day(2023, 12, 31), 100., 0.),
            EnergyRecord::new(day(2024, 1, 2), 100., 0.),
            EnergyRecord::new(day(2024, 3, 1), 100., 0.),
            EnergyRecord::new(day(2024, 1, 20), 100., 0.),
        ];
        let months = aggregate_by_month(&records, 0.082, &CostOverrides::new());
        let keys: Vec<String> = months
            .iter()
            .map(|m| m.month_key().unwrap().to_string())
            .collect();
        assert_eq!(keys, ["2023-Dec", "2024-Jan", "2024-Mar"]);
        assert_eq!(months.iter().map(|m| m.total_days).sum::<usize>(), records.len());
        assert_eq!(months[2].period_start, day(2024, 3, 1));
    }

    #[test]
    fn duplicates_collapse_first_seen_wins() {
        let records = vec![
            EnergyRecord::new(day(2024, 2, 2), 5000., 5000.),
            EnergyRecord::new(day(2024, 2, 1), 1000., 0.),
            EnergyRecord::new(day(2024, 2, 2), 9000., 0.),
        ];
        let months = aggregate_by_month(&records, 0.082, &CostOverrides::new());
        assert_eq!(months[0].total_days, 2);
        assert_eq!(months[0].consumption, 6);
        assert_eq!(months[0].from_grid, 5);
    }

    #[test]
    fn aggregation_ignores_order_and_duplicates() {
        let mut shuffled = january();
        shuffled.reverse();
        shuffled.extend(january());
        assert_eq!(
            aggregate_by_month(&shuffled, 0.082, &CostOverrides::new()),
            aggregate_by_month(&january(), 0.082, &CostOverrides::new())
        );
    }

    #[test]
    fn undated_records_are_excluded() {
        let mut records = january();
        records.push(EnergyRecord::new(None, 7000., 7000.));
        records.push(EnergyRecord::new(None, 8000., 0.));
        let months = aggregate_by_month(&records, 0.082, &CostOverrides::new());
        assert_eq!(months.len(), 1);
        assert_eq!(months[0].total_days, 3);
        assert_eq!(months[0].consumption, 6);
    }

    #[test]
    fn empty_input_gives_no_months() {
        assert!(aggregate_by_month(&[], 0.082, &CostOverrides::new()).is_empty());
    }

    #[test]
    fn totals_weight_autarky_by_days() {
        let months = [
            MonthlySummary {
                average_autarky: 0.5,
                total_days: 10,
                grid_cost_per_kwh: 0.28,
                ..Default::default()
            },
            MonthlySummary {
                average_autarky: 0.9,
                total_days: 30,
                grid_cost_per_kwh: 0.30,
                ..Default::default()
            },
        ];
        let totals = reduce_totals(&months);
        assert_abs_diff_eq!(totals.average_autarky, 0.8, epsilon = 1e-12);
        // Plain mean, not weighted by days.
        assert_abs_diff_eq!(totals.grid_cost_per_kwh, 0.29, epsilon = 1e-12);
        assert_eq!(totals.total_days, 40);
        assert_eq!(totals.period_start, None);
    }

    #[test]
    fn totals_sum_energy_and_money() {
        let records = vec![
            EnergyRecord {
                exported: 4000.,
                ..EnergyRecord::new(day(2024, 1, 1), 10_000., 2_000.)
            },
            EnergyRecord {
                exported: 6000.,
                ..EnergyRecord::new(day(2024, 2, 1), 5_000., 1_000.)
            },
        ];
        let months = aggregate_by_month(&records, 0.082, &CostOverrides::new());
        let totals = reduce_totals(&months);
        assert_eq!(totals.consumption, 15);
        assert_eq!(totals.from_grid, 3);
        assert_eq!(totals.to_grid, 10);
        assert_relative_eq!(totals.cost_grid, months[0].cost_grid + months[1].cost_grid);
        assert_relative_eq!(totals.revenue_grid, months[0].revenue_grid + months[1].revenue_grid);
        assert_relative_eq!(totals.difference, months[0].difference + months[1].difference);
        assert_relative_eq!(
            totals.opportunity_cost,
            months[0].opportunity_cost + months[1].opportunity_cost
        );
        assert_abs_diff_eq!(totals.average_autarky, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn huge_readings_saturate_instead_of_overflowing() {
        let records = vec![
            EnergyRecord::new(day(2024, 1, 1), 1e25, 0.),
            EnergyRecord::new(day(2024, 2, 1), 1e25, -1e25),
        ];
        let months = aggregate_by_month(&records, 0.082, &CostOverrides::new());
        assert_eq!(months[0].consumption, i64::MAX);
        assert_eq!(months[1].from_grid, i64::MIN);
        assert!(months[1].opportunity_cost.is_finite());

        let totals = reduce_totals(&months);
        assert_eq!(totals.consumption, i64::MAX);
        assert_eq!(totals.from_grid, i64::MIN);
        assert_eq!(totals.total_days, 2);
    }

    #[test]
    fn empty_totals_are_zeroed() {
        let totals = reduce_totals(&[]);
        assert_eq!(totals, MonthlySummary::default());
        assert!(totals.grid_cost_per_kwh.is_finite());
        assert!(totals.average_autarky.is_finite());
    }

    #[test]
    fn strict_totals_reject_empty_input() {
        assert!(matches!(try_reduce_totals(&[]), Err(AnalysisError::EmptyInput)));
        let months = aggregate_by_month(&january(), 0.082, &CostOverrides::new());
        assert_eq!(try_reduce_totals(&months).unwrap(), reduce_totals(&months));
    }

    #[test]
    fn daily_autarky_for_one_month() {
        let mut records = january();
        records.push(EnergyRecord::new(day(2024, 1, 4), 1000., 250.));
        records.push(EnergyRecord::new(day(2024, 2, 1), 1000., 1000.));
        let days = daily_autarky(&records, "2024-Jan".parse().unwrap()).unwrap();
        assert_eq!(days.len(), 4);
        assert_eq!(days[0], DailyAutarky { date: day(2024, 1, 1).unwrap(), percent: 100 });
        assert_eq!(days[3].percent, 75);
        assert!(matches!(
            daily_autarky(&records, "2024-Mar".parse().unwrap()),
            Err(AnalysisError::UnknownMonth(_))
        ));
    }
}
