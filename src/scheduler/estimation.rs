//! Finish-time projection and the normalized scoring shared by the policies.

use crate::cluster::{Task, Vm};

/// Projected finish time of every VM if `task` were queued on it now.
///
/// `(vm_loads[i] + task.length) / vms[i].mips`, assuming no further arrivals.
pub fn expected_finish_times(vms: &[Vm], vm_loads: &[f64], task: &Task) -> Vec<f64> {
    vms.iter()
        .zip(vm_loads)
        .map(|(vm, &load)| vm.busy_time(load + task.length))
        .collect()
}

/// Min-max normalization into `[0, 1]`.
///
/// A sequence whose values are all equal maps to all zeros.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    let range = max - min;
    if !(range > 0.0) || !range.is_finite() {
        return vec![0.0; values.len()];
    }

    values.iter().map(|v| (v - min) / range).collect()
}

/// Weighted fitness of every VM for `task`; lower is better.
///
/// `score_i = w1 * norm(eft)_i + w2 * norm(p_max)_i`. The weight pair is used
/// as given.
pub fn fitness_scores(vms: &[Vm], vm_loads: &[f64], task: &Task, weights: (f64, f64)) -> Vec<f64> {
    let (w1, w2) = weights;

    let norm_time = normalize(&expected_finish_times(vms, vm_loads, task));
    let peak_power: Vec<f64> = vms.iter().map(|vm| vm.p_max).collect();
    let norm_energy = normalize(&peak_power);

    norm_time
        .iter()
        .zip(&norm_energy)
        .map(|(t, e)| w1 * t + w2 * e)
        .collect()
}

/// Index of the smallest value, first occurrence on ties.
pub fn argmin(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, current)) if v >= current => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vms(mips: &[f64]) -> Vec<Vm> {
        Vm::fleet(mips).unwrap()
    }

    #[test]
    fn test_expected_finish_times() {
        let vms = vms(&[100.0, 200.0]);
        let task = Task::new(0, 1000.0).unwrap();

        let efts = expected_finish_times(&vms, &[0.0, 0.0], &task);
        assert_eq!(efts, vec![10.0, 5.0]);

        let efts = expected_finish_times(&vms, &[1000.0, 0.0], &task);
        assert_eq!(efts, vec![20.0, 5.0]);
    }

    #[test]
    fn test_normalize_range() {
        let norm = normalize(&[2.0, 4.0, 6.0]);
        assert_eq!(norm, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_normalize_constant_is_zero() {
        let norm = normalize(&[3.5, 3.5, 3.5]);
        assert_eq!(norm, vec![0.0, 0.0, 0.0]);
        assert!(norm.iter().all(|v| !v.is_nan()));

        assert!(normalize(&[]).is_empty());
        assert_eq!(normalize(&[7.0]), vec![0.0]);
    }

    #[test]
    fn test_fitness_pure_time() {
        let vms = vms(&[100.0, 200.0]);
        let task = Task::new(0, 1000.0).unwrap();

        let scores = fitness_scores(&vms, &[0.0, 0.0], &task, (1.0, 0.0));
        assert_eq!(scores, vec![1.0, 0.0]);
        assert_eq!(argmin(&scores), Some(1));
    }

    #[test]
    fn test_fitness_pure_energy_prefers_low_peak_power() {
        let vms = vms(&[100.0, 200.0]);
        let task = Task::new(0, 1000.0).unwrap();

        // The faster VM has the higher peak draw.
        let scores = fitness_scores(&vms, &[0.0, 0.0], &task, (0.0, 1.0));
        assert_eq!(scores, vec![0.0, 1.0]);
    }

    #[test]
    fn test_fitness_uniform_fleet_scores_zero() {
        let vms = vms(&[300.0, 300.0, 300.0]);
        let task = Task::new(0, 900.0).unwrap();

        let scores = fitness_scores(&vms, &[0.0, 0.0, 0.0], &task, (0.7, 0.3));
        assert_eq!(scores, vec![0.0, 0.0, 0.0]);
        assert_eq!(argmin(&scores), Some(0));
    }

    #[test]
    fn test_argmin_ties_pick_first() {
        assert_eq!(argmin(&[0.4, 0.1, 0.1, 0.9]), Some(1));
        assert_eq!(argmin(&[]), None);
    }
}
