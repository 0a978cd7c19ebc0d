//! Turns a set of known fine/coarse pair dates and requested prediction
//! dates into an ordered, incremental load/predict/evict plan.

use std::collections::BTreeSet;

use inf::{Error, Result};

/// Which pair(s) a single prediction job draws on.
#[derive(Debug, Clone, PartialEq)]
pub enum JobKind {
    SinglePair { pair_date: i64 },
    DoublePair { pair_date_1: i64, pair_date_3: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub prediction_date: i64,
    pub kind: JobKind,
}

/// One step of the incremental plan. `ImageStore` insert/remove calls follow
/// these directly; the planner itself never touches the store.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    LoadPair { tag: String, date: i64 },
    EvictPair { tag: String, date: i64 },
    LoadCoarseAtPrediction { tag: String, date: i64 },
    Predict(Job),
    EvictCoarseAtPrediction { tag: String, date: i64 },
}

/// Plans loading, prediction and eviction order for a run over the `high`/
/// `low` resolution tags.
pub struct JobPlanner {
    high_tag: String,
    low_tag: String,
    double_pair_mode: bool,
}

impl JobPlanner {
    pub fn new(high_tag: impl Into<String>, low_tag: impl Into<String>, double_pair_mode: bool) -> Self {
        JobPlanner { high_tag: high_tag.into(), low_tag: low_tag.into(), double_pair_mode }
    }

    /// `pair_dates` are dates at which both `high_tag` and `low_tag` rasters
    /// exist. `prediction_dates` are dates at which only `low_tag` exists and
    /// a `high_tag` prediction is wanted.
    pub fn plan(&self, pair_dates: &[i64], prediction_dates: &[i64]) -> Result<Vec<PlanStep>> {
        if pair_dates.is_empty() {
            return Err(Error::invalid_argument("JobPlanner requires at least one pair date"));
        }

        let sorted_pairs: BTreeSet<i64> = pair_dates.iter().copied().collect();
        let sorted_pairs: Vec<i64> = sorted_pairs.into_iter().collect();

        let mut sorted_predictions: Vec<i64> = prediction_dates.to_vec();
        sorted_predictions.sort_unstable();
        sorted_predictions.dedup();

        let jobs: Vec<Job> = sorted_predictions.iter().map(|&d| self.job_for(&sorted_pairs, d)).collect::<Result<_>>()?;

        Ok(self.emit_plan(&jobs))
    }

    fn job_for(&self, sorted_pairs: &[i64], date: i64) -> Result<Job> {
        let lower = sorted_pairs.iter().rev().find(|&&p| p <= date).copied();
        let upper = sorted_pairs.iter().find(|&&p| p >= date).copied();

        let kind = match (lower, upper) {
            (Some(l), Some(u)) if l == u => JobKind::SinglePair { pair_date: l },
            (Some(l), Some(u)) if self.double_pair_mode => JobKind::DoublePair { pair_date_1: l, pair_date_3: u },
            (Some(l), Some(u)) => {
                let nearer = if (date - l).abs() <= (u - date).abs() { l } else { u };
                JobKind::SinglePair { pair_date: nearer }
            }
            (Some(l), None) => JobKind::SinglePair { pair_date: l },
            (None, Some(u)) => JobKind::SinglePair { pair_date: u },
            (None, None) => return Err(Error::internal_logic("no bracketing pair found for prediction date")),
        };

        Ok(Job { prediction_date: date, kind })
    }

    fn needed_pairs(kind: &JobKind) -> Vec<i64> {
        match kind {
            JobKind::SinglePair { pair_date } => vec![*pair_date],
            JobKind::DoublePair { pair_date_1, pair_date_3 } => vec![*pair_date_1, *pair_date_3],
        }
    }

    /// Groups consecutive jobs that need the identical pair set into
    /// segments, then walks segments in order, loading newly-needed pairs
    /// and evicting pairs the next segment no longer needs at each boundary.
    fn emit_plan(&self, jobs: &[Job]) -> Vec<PlanStep> {
        let mut steps = Vec::new();
        let mut loaded: BTreeSet<i64> = BTreeSet::new();

        let mut index = 0;
        while index < jobs.len() {
            let needed: BTreeSet<i64> = Self::needed_pairs(&jobs[index].kind).into_iter().collect();
            let mut end = index + 1;
            while end < jobs.len() {
                let next_needed: BTreeSet<i64> = Self::needed_pairs(&jobs[end].kind).into_iter().collect();
                if next_needed != needed {
                    break;
                }
                end += 1;
            }

            for &date in needed.difference(&loaded) {
                log::debug!("job planner: loading pair at {date}");
                steps.push(PlanStep::LoadPair { tag: self.high_tag.clone(), date });
                steps.push(PlanStep::LoadPair { tag: self.low_tag.clone(), date });
            }
            for &date in loaded.difference(&needed).copied().collect::<Vec<_>>().iter() {
                log::debug!("job planner: evicting pair at {date}");
                steps.push(PlanStep::EvictPair { tag: self.high_tag.clone(), date: *date });
                steps.push(PlanStep::EvictPair { tag: self.low_tag.clone(), date: *date });
            }
            loaded = needed;

            for job in &jobs[index..end] {
                log::debug!("job planner: loading coarse raster at {}", job.prediction_date);
                steps.push(PlanStep::LoadCoarseAtPrediction { tag: self.low_tag.clone(), date: job.prediction_date });
                steps.push(PlanStep::Predict(job.clone()));
                log::debug!("job planner: evicting coarse raster at {}", job.prediction_date);
                steps.push(PlanStep::EvictCoarseAtPrediction { tag: self.low_tag.clone(), date: job.prediction_date });
            }

            log::info!("job planner: completed segment of {} job(s), {} pair(s) loaded", end - index, loaded.len());
            index = end;
        }

        for date in loaded {
            log::debug!("job planner: evicting pair at {date}");
            steps.push(PlanStep::EvictPair { tag: self.high_tag.clone(), date });
            steps.push(PlanStep::EvictPair { tag: self.low_tag.clone(), date });
        }

        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_count(steps: &[PlanStep], tag: &str, date: i64) -> usize {
        steps
            .iter()
            .filter(|s| matches!(s, PlanStep::LoadPair { tag: t, date: d } if t == tag && *d == date))
            .count()
    }

    fn coarse_load_count(steps: &[PlanStep], date: i64) -> usize {
        steps.iter().filter(|s| matches!(s, PlanStep::LoadCoarseAtPrediction { date: d, .. } if *d == date)).count()
    }

    #[test]
    fn eviction_bound_matches_scenario() {
        let planner = JobPlanner::new("high", "low", false);
        let steps = planner.plan(&[1, 7, 14], &[3, 4, 10, 12, 13]).unwrap();

        for &pair_date in &[1, 7, 14] {
            assert!(load_count(&steps, "high", pair_date) <= 2);
            assert!(load_count(&steps, "low", pair_date) <= 2);
        }
        for &pred_date in &[3, 4, 10, 12, 13] {
            assert_eq!(coarse_load_count(&steps, pred_date), 1);
        }

        let predict_count = steps.iter().filter(|s| matches!(s, PlanStep::Predict(_))).count();
        assert_eq!(predict_count, 5);
    }

    #[test]
    fn prediction_before_first_pair_uses_that_pair() {
        let planner = JobPlanner::new("high", "low", false);
        let steps = planner.plan(&[10], &[2]).unwrap();
        assert!(steps.contains(&PlanStep::Predict(Job { prediction_date: 2, kind: JobKind::SinglePair { pair_date: 10 } })));
    }

    #[test]
    fn double_pair_mode_emits_double_pair_job_between_two_pairs() {
        let planner = JobPlanner::new("high", "low", true);
        let steps = planner.plan(&[1, 14], &[7]).unwrap();
        assert!(steps.contains(&PlanStep::Predict(Job {
            prediction_date: 7,
            kind: JobKind::DoublePair { pair_date_1: 1, pair_date_3: 14 }
        })));
    }

    #[test]
    fn empty_pair_dates_is_invalid_argument() {
        let planner = JobPlanner::new("high", "low", false);
        let err = planner.plan(&[], &[1]).unwrap_err();
        assert!(matches!(err.kind, inf::ErrorKind::InvalidArgument(_)));
    }
}
