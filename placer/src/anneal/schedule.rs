//! Temperature, range-limit and exit rules of the annealing schedule.

use fabric_common::util::config::{PlacementConfig, ScheduleKind};

/// Sample standard deviation from a count, sum of squares and mean.
pub fn std_dev(n: usize, sum_sq: f64, av: f64) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let var = (sum_sq - n as f64 * av * av) / (n - 1) as f64;
    if var > 0.0 { var.sqrt() } else { 0.0 }
}

/// Moves per temperature: `inner_num * blocks^(4/3)` rounded to nearest,
/// at least one.
pub fn move_limit(inner_num: f64, num_blocks: usize) -> usize {
    ((inner_num * (num_blocks as f64).powf(4.0 / 3.0)).round() as usize).max(1)
}

#[derive(Clone, Copy, Debug)]
pub struct Schedule {
    pub kind: ScheduleKind,
    pub init_t: f64,
    pub alpha_t: f64,
    pub exit_t: f64,
}

impl Schedule {
    pub fn from_config(config: &PlacementConfig) -> Self {
        Self {
            kind: config.schedule,
            init_t: config.init_t,
            alpha_t: config.alpha_t,
            exit_t: config.exit_t,
        }
    }

    pub fn next_temperature(&self, t: f64, rlim: f64, success_ratio: f64) -> f64 {
        if self.kind == ScheduleKind::User {
            return t * self.alpha_t;
        }
        if success_ratio > 0.96 {
            t * 0.5
        } else if success_ratio > 0.8 {
            t * 0.9
        } else if success_ratio > 0.15 || rlim > 1.0 {
            t * 0.95
        } else {
            t * 0.8
        }
    }

    /// True once annealing should stop and freeze.
    pub fn should_exit(&self, t: f64, cost: f64, num_nets: usize) -> bool {
        match self.kind {
            ScheduleKind::User => t < self.exit_t,
            ScheduleKind::Auto => t < 0.005 * cost / num_nets.max(1) as f64,
        }
    }
}

/// Shrinks or grows the range limiter toward a 44% acceptance rate.
pub fn update_rlim(rlim: f64, success_ratio: f64, upper: f64) -> f64 {
    (rlim * (1.0 - 0.44 + success_ratio)).clamp(1.0, upper)
}

/// Criticality exponent interpolated between `first` and `last` as the range
/// limiter shrinks from `first_rlim` to `final_rlim`.
pub fn crit_exponent(rlim: f64, first_rlim: f64, final_rlim: f64, first: f64, last: f64) -> f64 {
    if first_rlim <= final_rlim {
        return last;
    }
    (1.0 - (rlim - final_rlim) / (first_rlim - final_rlim)) * (last - first) + first
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auto() -> Schedule {
        Schedule {
            kind: ScheduleKind::Auto,
            init_t: 100.0,
            alpha_t: 0.8,
            exit_t: 0.01,
        }
    }

    #[test]
    fn auto_schedule_cools_by_success_ratio() {
        let s = auto();
        assert_eq!(s.next_temperature(10.0, 1.0, 0.97), 5.0);
        assert_eq!(s.next_temperature(10.0, 1.0, 0.85), 9.0);
        assert_eq!(s.next_temperature(10.0, 1.0, 0.5), 9.5);
        assert_eq!(s.next_temperature(10.0, 3.0, 0.05), 9.5);
        assert_eq!(s.next_temperature(10.0, 1.0, 0.05), 8.0);
    }

    #[test]
    fn user_schedule_uses_alpha_and_exit_t() {
        let s = Schedule {
            kind: ScheduleKind::User,
            ..auto()
        };
        assert_eq!(s.next_temperature(10.0, 5.0, 0.99), 8.0);
        assert!(s.should_exit(0.009, 1e9, 1));
        assert!(!s.should_exit(0.02, 0.0, 1));
    }

    #[test]
    fn auto_exit_scales_with_cost_per_net() {
        let s = auto();
        assert!(s.should_exit(0.02, 100.0, 20));
        assert!(!s.should_exit(0.03, 100.0, 20));
        assert!(!s.should_exit(0.02, 100.0, 5));
    }

    #[test]
    fn rlim_is_clamped() {
        assert_eq!(update_rlim(10.0, 0.44, 20.0), 10.0);
        assert_eq!(update_rlim(1.0, 0.0, 20.0), 1.0);
        assert_eq!(update_rlim(19.0, 1.0, 20.0), 20.0);
    }

    #[test]
    fn std_dev_edge_cases() {
        assert_eq!(std_dev(1, 4.0, 2.0), 0.0);
        assert_eq!(std_dev(2, 2.0, 1.0), 0.0);
        // samples 1 and 3
        assert!((std_dev(2, 10.0, 2.0) - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn exponent_moves_from_first_to_last() {
        assert_eq!(crit_exponent(12.0, 12.0, 1.0, 1.0, 8.0), 1.0);
        assert_eq!(crit_exponent(1.0, 12.0, 1.0, 1.0, 8.0), 8.0);
    }

    #[test]
    fn move_limit_rounds_to_nearest() {
        // 8^(4/3) evaluates just below 16.
        assert_eq!(move_limit(10.0, 8), 160);
        assert_eq!(move_limit(1.0, 27), 81);
        assert_eq!(move_limit(0.0001, 2), 1);
    }
}
