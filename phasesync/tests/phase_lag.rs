use approx::assert_abs_diff_eq;
use core::f64::consts::PI;
use ndarray::Array2;
use phasesync::kernel::{ExecInvariantViolation, KernelLifecycle};
use phasesync::signal::spectral::CsdKernel;
use phasesync::{compute, dpli, pli, wpli, Error, Measure, PhaseLagOptions};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("phasesync=trace")
        .try_init();
}

fn noise(rng: &mut StdRng, len: usize, amplitude: f64) -> Vec<f64> {
    (0..len)
        .map(|_| amplitude * rng.random_range(-1.0..1.0))
        .collect()
}

fn noise_epochs(seed: u64, epochs: usize, len: usize) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..epochs).map(|_| noise(&mut rng, len, 1.0)).collect()
}

/// 10 Hz sine at 2 kHz; the second signal trails by a quarter period.
fn delayed_sines(epochs: usize) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let fs = 2000.0;
    let delay = 0.025;
    let mut rng = StdRng::seed_from_u64(42);
    let mut lead = Vec::with_capacity(epochs);
    let mut lag = Vec::with_capacity(epochs);
    for _ in 0..epochs {
        let n1 = noise(&mut rng, 2000, 0.1);
        let n2 = noise(&mut rng, 2000, 0.1);
        lead.push(
            (0..2000)
                .map(|i| (2.0 * PI * 10.0 * i as f64 / fs).sin() + n1[i])
                .collect(),
        );
        lag.push(
            (0..2000)
                .map(|i| (2.0 * PI * 10.0 * (i as f64 / fs - delay)).sin() + n2[i])
                .collect(),
        );
    }
    (lead, lag)
}

fn flat(rows: &[Vec<f64>]) -> Array2<f64> {
    let width = rows.first().map_or(0, Vec::len);
    Array2::from_shape_vec((rows.len(), width), rows.concat()).expect("rectangular epochs")
}

fn interior_mean(values: &[f64], skip: &[usize]) -> f64 {
    let last = values.len() - 1;
    let kept: Vec<f64> = values
        .iter()
        .enumerate()
        .filter(|(k, _)| *k != 0 && *k != last && !skip.contains(k))
        .map(|(_, v)| *v)
        .collect();
    kept.iter().sum::<f64>() / kept.len() as f64
}

#[test]
fn quarter_period_delay_is_detected_at_the_sine_frequency() {
    init_tracing();
    let (lead, lag) = delayed_sines(10);
    let options = PhaseLagOptions::default();

    let pli = pli(&lead, &lag, 10, &options).expect("pli");
    let dpli_forward = dpli(&lead, &lag, 10, &options).expect("dpli");
    let wpli = wpli(&lead, &lag, 10, &options).expect("wpli");

    assert_eq!(pli.len(), 1001);
    let k = pli.nearest_bin(10.0).expect("10 Hz bin");
    assert_eq!(k, 10);
    assert_abs_diff_eq!(pli.frequencies[k], 10.0, epsilon = 1e-12);
    assert_abs_diff_eq!(pli.scores[k], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(wpli.scores[k], 1.0, epsilon = 1e-12);
    assert_eq!(dpli_forward.scores[k], 1.0);

    let dpli_reverse = dpli(&lag, &lead, 10, &options).expect("dpli");
    assert_eq!(dpli_reverse.scores[k], 0.0);

    assert!(interior_mean(&pli.scores, &[k]) < 0.5);
}

#[test]
fn independent_noise_trends_towards_no_coupling() {
    let options = PhaseLagOptions::default().with_fs(256.0).with_nperseg(256);
    let x = noise_epochs(1, 200, 256);
    let y = noise_epochs(2, 200, 256);

    let pli_many = pli(&x, &y, 200, &options).expect("pli");
    let dpli_many = dpli(&x, &y, 200, &options).expect("dpli");
    let wpli_many = wpli(&x, &y, 200, &options).expect("wpli");

    assert!(interior_mean(&pli_many.scores, &[]) < 0.15);
    assert_abs_diff_eq!(interior_mean(&dpli_many.scores, &[]), 0.5, epsilon = 0.05);
    assert!(interior_mean(&wpli_many.scores, &[]) < 0.2);

    let pli_few = pli(&x, &y, 10, &options).expect("pli");
    assert!(interior_mean(&pli_few.scores, &[]) > interior_mean(&pli_many.scores, &[]));
}

#[test]
fn identical_inputs_have_no_phase_lag() {
    let x = noise_epochs(3, 5, 128);
    let options = PhaseLagOptions::default().with_fs(128.0).with_nperseg(64).with_noverlap(32);

    let pli = pli(&x, &x, 5, &options).expect("pli");
    let dpli = dpli(&x, &x, 5, &options).expect("dpli");
    let wpli = wpli(&x, &x, 5, &options).expect("wpli");

    assert!(pli.scores.iter().all(|v| *v == 0.0));
    assert!(wpli.scores.iter().all(|v| *v == 0.0));
    assert!(dpli.scores.iter().all(|v| *v == 1.0));
    let denominator = wpli.denominator.expect("wpli keeps its denominator");
    assert!(denominator.iter().all(|v| *v == 1.0));
}

#[test]
fn wpli_score_is_numerator_over_denominator() {
    let x = noise_epochs(4, 12, 200);
    let y = noise_epochs(5, 12, 200);
    let options = PhaseLagOptions::default().with_fs(100.0).with_nperseg(100).with_noverlap(50);
    let result = wpli(&x, &y, 12, &options).expect("wpli");
    let denominator = result.denominator.as_ref().expect("denominator");
    for k in 0..result.len() {
        assert_eq!(result.scores[k], result.numerator[k].abs() / denominator[k]);
        assert!((0.0..=1.0).contains(&result.scores[k]));
    }
}

#[test]
fn swapping_inputs_mirrors_the_direction() {
    let x = noise_epochs(6, 8, 128);
    let y = noise_epochs(7, 8, 128);
    let options = PhaseLagOptions::default().with_fs(128.0).with_nperseg(128);

    for measure in [Measure::Pli, Measure::Wpli] {
        let forward = compute(measure, &x, &y, 8, &options).expect("forward");
        let backward = compute(measure, &y, &x, 8, &options).expect("backward");
        assert_eq!(forward.scores, backward.scores, "{measure} should be symmetric");
    }

    let forward = dpli(&x, &y, 8, &options).expect("forward");
    let backward = dpli(&y, &x, 8, &options).expect("backward");
    let last = forward.len() - 1;
    for k in 1..last {
        assert_abs_diff_eq!(forward.scores[k], 1.0 - backward.scores[k], epsilon = 1e-12);
    }
}

#[test]
fn single_epoch_scores_are_degenerate() {
    let x = noise_epochs(8, 1, 64);
    let y = noise_epochs(9, 1, 64);
    let options = PhaseLagOptions::default().with_fs(64.0).with_nperseg(32).with_noverlap(16);
    let kernel = CsdKernel::try_new(options.spectral_config()).expect("valid config");
    let pxy = kernel.cross_spectrum(&x[0], &y[0]).expect("cross spectrum");

    let pli = pli(&x, &y, 1, &options).expect("pli");
    let dpli = dpli(&x, &y, 1, &options).expect("dpli");
    let wpli = wpli(&x, &y, 1, &options).expect("wpli");
    assert_eq!(pxy.len(), pli.len());

    let mut leading = 0;
    for (k, p) in pxy.iter().enumerate() {
        let (abs_sign, step, weighted) = if p.im > 0.0 {
            leading += 1;
            (1.0, 1.0, 1.0)
        } else if p.im < 0.0 {
            (1.0, 0.0, 1.0)
        } else {
            (0.0, 1.0, 0.0)
        };
        assert_eq!(pli.scores[k], abs_sign, "pli bin {k}");
        assert_eq!(dpli.scores[k], step, "dpli bin {k}");
        assert_eq!(wpli.scores[k], weighted, "wpli bin {k}");
    }
    assert!(leading > 0 && leading < pxy.len());
}

#[test]
fn repeated_calls_are_bit_identical() {
    let x = noise_epochs(10, 6, 300);
    let y = noise_epochs(11, 6, 300);
    let options = PhaseLagOptions::default().with_fs(100.0).with_nperseg(100).with_noverlap(25);
    let first = wpli(&x, &y, 6, &options).expect("first");
    let second = wpli(&x, &y, 6, &options).expect("second");
    assert_eq!(first, second);
}

#[test]
fn ndarray_epochs_match_nested_vectors() {
    let x = noise_epochs(12, 4, 64);
    let y = noise_epochs(13, 4, 64);
    let options = PhaseLagOptions::default().with_fs(64.0).with_nperseg(32);

    let from_vecs = pli(&x, &y, 4, &options).expect("vec epochs");
    let from_arrays = pli(&flat(&x), &flat(&y), 4, &options).expect("ndarray epochs");
    assert_eq!(from_vecs, from_arrays);

    let view = flat(&y);
    let from_views = pli(&flat(&x).view(), &view.view(), 4, &options).expect("views");
    assert_eq!(from_vecs, from_views);
}

#[test]
fn only_the_requested_epochs_are_used() {
    let x = noise_epochs(14, 6, 64);
    let y = noise_epochs(15, 6, 64);
    let options = PhaseLagOptions::default().with_fs(64.0).with_nperseg(64);
    let head = pli(&x, &y, 3, &options).expect("first three");
    let truncated = pli(&x[..3], &y[..3], 3, &options).expect("truncated input");
    assert_eq!(head, truncated);
}

#[test]
fn invalid_inputs_are_rejected_before_estimation() {
    let mut x = noise_epochs(16, 3, 64);
    let y = noise_epochs(17, 3, 64);
    x[0][0] = f64::NAN;
    let options = PhaseLagOptions::default().with_fs(64.0).with_nperseg(64);

    let err = pli(&x, &y, 3, &options.with_noverlap(64)).expect_err("noverlap >= nperseg");
    assert!(matches!(err, Error::InvalidInput { arg: "noverlap", .. }));

    let err = pli(&x, &y, 3, &options.with_fs(0.0)).expect_err("fs = 0");
    assert!(matches!(err, Error::InvalidInput { arg: "fs", .. }));

    let err = pli(&x, &y, 3, &options.with_nperseg(0)).expect_err("nperseg = 0");
    assert!(matches!(err, Error::InvalidInput { arg: "nperseg", .. }));

    let err = pli(&x, &y, 0, &options).expect_err("no epochs");
    assert!(matches!(err, Error::InvalidInput { arg: "num_epochs", .. }));

    let err = pli(&x, &y, 4, &options).expect_err("too few epochs");
    assert!(matches!(err, Error::InvalidInput { arg: "data1", .. }));

    let short: Vec<Vec<f64>> = y.iter().map(|e| e[..60].to_vec()).collect();
    let err = pli(&x, &short, 3, &options).expect_err("unequal lengths");
    assert!(matches!(err, Error::InvalidInput { arg: "data2", .. }));

    let err = pli(&x, &y, 3, &options.with_nperseg(65)).expect_err("nperseg > epoch length");
    assert!(matches!(err, Error::InvalidInput { arg: "nperseg", .. }));
}

#[test]
fn estimator_failures_name_the_epoch() {
    let x = noise_epochs(18, 4, 64);
    let mut y = noise_epochs(19, 4, 64);
    y[2][10] = f64::NAN;
    let options = PhaseLagOptions::default().with_fs(64.0).with_nperseg(32);

    let err = wpli(&x, &y, 4, &options).expect_err("nan in epoch 2");
    assert_eq!(
        err,
        Error::SpectralEstimation {
            epoch: Some(2),
            source: ExecInvariantViolation::InvalidState {
                reason: "non-finite sample in spectral input",
            },
        }
    );

    assert!(wpli(&x, &y, 2, &options).is_ok());
}
