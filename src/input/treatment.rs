use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::domain::WorkerId;

/// Rewrites absence-heavy full weeks so each ends in the fixed weekend
/// pattern `L` on Saturday, `LQ` on Sunday, with at most two off days.
///
/// Applies to weeks with a full 7-day span where at most two days survive
/// the worker's absences:
///
/// * no day survives: Saturday and Sunday leave the absence set and become
///   the fixed weekend;
/// * one day survives: whichever of Saturday/Sunday it is not leaves the
///   absence set, and the fixed weekend is pinned;
/// * two days survive: Saturday and Sunday each leave the absence set when
///   neither surviving day is them, and the fixed weekend is pinned.
///
/// Returns the Sundays promoted to fixed `LQ`.
pub fn migrate_weekend_absences(
    worker: WorkerId,
    absences: &mut BTreeSet<u32>,
    fixed_days_off: &mut BTreeSet<u32>,
    weeks: &BTreeMap<u32, Vec<u32>>,
) -> BTreeSet<u32> {
    let mut fixed_lqs = BTreeSet::new();
    for (week, days) in weeks {
        if days.len() <= 6 {
            continue;
        }
        let remaining: Vec<u32> = days
            .iter()
            .filter(|d| !absences.contains(d))
            .copied()
            .collect();
        let saturday = days[5];
        let sunday = days[6];

        match remaining.len() {
            0 => {
                absences.remove(&saturday);
                absences.remove(&sunday);
            }
            1 => {
                if remaining[0] != saturday {
                    absences.remove(&saturday);
                } else if remaining[0] != sunday {
                    absences.remove(&sunday);
                }
            }
            2 => {
                if remaining[0] != saturday && remaining[1] != saturday {
                    absences.remove(&saturday);
                }
                if remaining[0] != sunday && remaining[1] != sunday {
                    absences.remove(&sunday);
                }
            }
            _ => continue,
        }
        fixed_days_off.insert(saturday);
        fixed_lqs.insert(sunday);
        debug!(
            %worker,
            week,
            saturday,
            sunday,
            surviving = remaining.len(),
            "migrated absence-heavy week to the fixed weekend pattern"
        );
    }
    fixed_lqs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_week(start: u32) -> BTreeMap<u32, Vec<u32>> {
        BTreeMap::from([(1, (start..start + 7).collect())])
    }

    #[test]
    fn fully_absent_week_gains_the_weekend_pattern() {
        let weeks = full_week(1);
        let mut absences: BTreeSet<u32> = (1..=7).collect();
        let mut fixed_off = BTreeSet::new();
        let lqs = migrate_weekend_absences(WorkerId(1), &mut absences, &mut fixed_off, &weeks);
        assert!(!absences.contains(&6));
        assert!(!absences.contains(&7));
        assert_eq!(fixed_off, BTreeSet::from([6]));
        assert_eq!(lqs, BTreeSet::from([7]));
    }

    #[test]
    fn one_surviving_weekday_releases_the_saturday() {
        let weeks = full_week(1);
        // Only Wednesday survives.
        let mut absences: BTreeSet<u32> = BTreeSet::from([1, 2, 4, 5, 6, 7]);
        let mut fixed_off = BTreeSet::new();
        let lqs = migrate_weekend_absences(WorkerId(1), &mut absences, &mut fixed_off, &weeks);
        assert!(!absences.contains(&6));
        assert!(absences.contains(&7));
        assert_eq!(fixed_off, BTreeSet::from([6]));
        assert_eq!(lqs, BTreeSet::from([7]));
    }

    #[test]
    fn two_surviving_days_keep_their_absences_elsewhere() {
        let weeks = full_week(1);
        // Monday and Saturday survive.
        let mut absences: BTreeSet<u32> = BTreeSet::from([2, 3, 4, 5, 7]);
        let mut fixed_off = BTreeSet::new();
        let lqs = migrate_weekend_absences(WorkerId(1), &mut absences, &mut fixed_off, &weeks);
        // Saturday survived, so it stays out of the absence edits; Sunday is released.
        assert!(!absences.contains(&7));
        assert_eq!(fixed_off, BTreeSet::from([6]));
        assert_eq!(lqs, BTreeSet::from([7]));
    }

    #[test]
    fn healthy_weeks_are_untouched() {
        let weeks = full_week(1);
        let mut absences = BTreeSet::from([3]);
        let mut fixed_off = BTreeSet::new();
        let lqs = migrate_weekend_absences(WorkerId(1), &mut absences, &mut fixed_off, &weeks);
        assert_eq!(absences, BTreeSet::from([3]));
        assert!(fixed_off.is_empty());
        assert!(lqs.is_empty());
    }

    #[test]
    fn short_weeks_are_skipped() {
        let weeks = BTreeMap::from([(1, (1..=5).collect::<Vec<u32>>())]);
        let mut absences: BTreeSet<u32> = (1..=5).collect();
        let mut fixed_off = BTreeSet::new();
        let lqs = migrate_weekend_absences(WorkerId(1), &mut absences, &mut fixed_off, &weeks);
        assert_eq!(absences.len(), 5);
        assert!(fixed_off.is_empty());
        assert!(lqs.is_empty());
    }
}
