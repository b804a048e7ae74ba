use rust_decimal::{Decimal, RoundingStrategy};

/// Running consumption totals for the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageTotals {
    consumed_units: u64,
    derived_cost: Decimal,
}

impl UsageTotals {
    pub fn consumed_units(&self) -> u64 {
        self.consumed_units
    }

    pub fn derived_cost(&self) -> Decimal {
        self.derived_cost
    }

    /// Negative costs are ignored so neither total ever goes down.
    pub fn add(&mut self, units: u64, cost: Decimal) {
        self.consumed_units = self.consumed_units.saturating_add(units);
        if cost.is_sign_positive() {
            self.derived_cost += cost;
        }
    }

    pub fn units_label(&self) -> String {
        format_units(self.consumed_units)
    }

    pub fn cost_label(&self) -> String {
        format_cost(self.derived_cost)
    }
}

pub fn format_units(units: u64) -> String {
    if units > 1_000_000 {
        format!("{}M", rounded_ratio(units, 1_000_000))
    } else if units > 1_000 {
        format!("{}k", rounded_ratio(units, 1_000))
    } else {
        units.to_string()
    }
}

pub fn format_cost(cost: Decimal) -> String {
    let rounded = cost.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.4}")
}

// Half-up rounding without `units + divisor / 2`, which overflows near u64::MAX.
fn rounded_ratio(units: u64, divisor: u64) -> u64 {
    units / divisor + u64::from(units % divisor >= divisor - divisor / 2)
}

#[cfg(test)]
mod tests {
    use super::{format_cost, format_units, UsageTotals};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn units_switch_suffix_past_each_threshold() {
        assert_eq!(format_units(0), "0");
        assert_eq!(format_units(1_000), "1000");
        assert_eq!(format_units(1_001), "1k");
        assert_eq!(format_units(1_499), "1k");
        assert_eq!(format_units(1_500), "2k");
        assert_eq!(format_units(999_999), "1000k");
        assert_eq!(format_units(1_000_000), "1000k");
        assert_eq!(format_units(1_000_001), "1M");
        assert_eq!(format_units(2_600_000), "3M");
    }

    #[test]
    fn cost_is_shown_with_four_decimals() {
        assert_eq!(format_cost(Decimal::ZERO), "0.0000");
        assert_eq!(format_cost(Decimal::from_str("0.00125").expect("decimal")), "0.0013");
        assert_eq!(format_cost(Decimal::from_str("1.5").expect("decimal")), "1.5000");
    }

    #[test]
    fn totals_never_decrease() {
        let mut usage = UsageTotals::default();
        let mut last = usage.clone();
        for (units, cost) in [(120, "0.0002"), (0, "0"), (4_000, "0.008"), (10, "-1")] {
            usage.add(units, Decimal::from_str(cost).expect("decimal"));
            assert!(usage.consumed_units() >= last.consumed_units());
            assert!(usage.derived_cost() >= last.derived_cost());
            last = usage.clone();
        }
        assert_eq!(usage.consumed_units(), 4_130);
        assert_eq!(usage.units_label(), "4k");
        assert_eq!(usage.cost_label(), "0.0082");
    }

    #[test]
    fn saturated_units_still_format() {
        let mut usage = UsageTotals::default();
        usage.add(u64::MAX - 10, Decimal::ZERO);
        usage.add(100, Decimal::ZERO);

        assert_eq!(usage.consumed_units(), u64::MAX);
        assert_eq!(usage.units_label(), "18446744073710M");
        assert_eq!(format_units(u64::MAX - 600_000), "18446744073709M");
    }
}
