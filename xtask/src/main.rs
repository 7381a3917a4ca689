use anyhow::{anyhow, bail, Context, Result};
use ndarray::Array2;
use phasesync::connectivity::{PhaseLagConfig, PhaseLagKernel};
use phasesync::kernel::KernelLifecycle;
use phasesync::signal::spectral::{
    csd as csd_baseline, welch as welch_baseline, CoherenceConfig, CoherenceKernel, CsdKernel,
    SpectralConfig, WelchKernel,
};
use phasesync::signal::traits::{Coherence1D, Csd1D, WelchPsd1D};
use phasesync::{
    coherence, coherence_epochs, compute, CoherenceOptions, CoherenceResult, Detrend, Measure,
    PhaseLagOptions, Scaling, Window,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

const DEFAULT_PYTHON_BIN: &str = "python";

const PY_SIGNAL_SCRIPT: &str = r#"
import json
import sys
import time
import numpy as np
import scipy.signal

env = json.loads(sys.stdin.read())
op = env["op"]
iters = int(env["iters"])
p = env["payload"]

def _as_array(key):
    return np.asarray(p[key], dtype=float)

def _detrend(name):
    return False if name == "none" else name

def _csd(x, y, o):
    _, pxy = scipy.signal.csd(
        x,
        y,
        fs=float(o["fs"]),
        window=o["window"],
        nperseg=int(o["nperseg"]),
        noverlap=int(o["noverlap"]),
        detrend=_detrend(o["detrend"]),
        scaling=o["scaling"],
    )
    # scipy returns conj(X) * Y
    return np.conj(pxy)

def _coherence(pxy, pxx, pyy):
    power = np.abs(pxy) ** 2
    den = pxx * pyy
    den = np.where((power == 0) | (den == 0), 1.0, den)
    coh = np.clip(power / den, 0.0, 1.0)
    phase = np.angle(pxy)
    phase = np.where(phase <= -np.pi, np.pi, phase)
    return np.concatenate([coh, phase])

def _welch_geometry(fs):
    nperseg = int(np.floor(fs * float(p["segment_length_seconds"])))
    noverlap = int(np.floor(float(p["segment_overlap_fraction"]) * nperseg))
    return {
        "fs": fs,
        "window": "hann",
        "nperseg": nperseg,
        "noverlap": noverlap,
        "detrend": "constant",
        "scaling": "density",
    }

def _phase_lag(measure):
    o = p["options"]
    d1 = _as_array("data1")
    d2 = _as_array("data2")
    n = int(p["num_epochs"])
    num = 0.0
    den = 0.0
    for e in range(n):
        im = _csd(d1[e], d2[e], o).imag
        if measure == "pli":
            num = num + np.sign(im)
        elif measure == "dpli":
            num = num + np.heaviside(im, 1.0)
        else:
            num = num + im
            den = den + np.abs(im)
    num = num / n
    if measure == "pli":
        return np.abs(num)
    if measure == "dpli":
        return num
    den = den / n
    den = np.where((num == 0) | (den == 0), 1.0, den)
    return np.abs(num) / den

def _compute():
    if op == "csd":
        pxy = _csd(_as_array("x"), _as_array("y"), p["options"])
        return np.concatenate([pxy.real, pxy.imag])
    if op == "welch":
        pxx = _csd(_as_array("x"), _as_array("x"), p["options"])
        return pxx.real
    if op in ("pli", "dpli", "wpli"):
        return _phase_lag(op)
    if op == "coherence":
        o = _welch_geometry(float(p["fs"]))
        x = _as_array("x")
        y = _as_array("y")
        return _coherence(_csd(x, y, o), _csd(x, x, o).real, _csd(y, y, o).real)
    if op == "coherence_epochs":
        o = _welch_geometry(float(p["fs"]))
        d1 = _as_array("data1")
        d2 = _as_array("data2")
        n = int(p["num_epochs"])
        pxy = sum(_csd(d1[e], d2[e], o) for e in range(n)) / n
        pxx = sum(_csd(d1[e], d1[e], o).real for e in range(n)) / n
        pyy = sum(_csd(d2[e], d2[e], o).real for e in range(n)) / n
        return _coherence(pxy, pxx, pyy)

    raise RuntimeError(f"unsupported op: {op}")

y = np.asarray(_compute(), dtype=float).reshape(-1)

t0 = time.perf_counter_ns()
for _ in range(iters):
    _compute()
t1 = time.perf_counter_ns()

print(json.dumps({
    "output": y.tolist(),
    "avg_ns": (t1 - t0) / max(iters, 1),
    "python_version": sys.version.split()[0],
    "numpy_version": np.__version__,
    "scipy_version": scipy.__version__
}))
"#;

#[derive(Debug, Serialize, Deserialize, Clone)]
struct PythonEval {
    output: Vec<f64>,
    avg_ns: f64,
    python_version: String,
    numpy_version: String,
    scipy_version: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct ContractRow {
    case_id: String,
    pearson_r: f64,
    mae: f64,
    rmse: f64,
    max_abs: f64,
    rust_candidate_ns: f64,
    rust_baseline_ns: f64,
    python_ns: f64,
    speedup_vs_baseline: f64,
    speedup_vs_python: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContractBundle {
    generated_epoch_seconds: u64,
    python_executable: String,
    python_version: String,
    numpy_version: String,
    scipy_version: String,
    rows: Vec<ContractRow>,
}

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("contracts") => run_contracts(),
        _ => {
            eprintln!("Usage:");
            eprintln!("  cargo run -p xtask -- contracts");
            Ok(())
        }
    }
}

/// Epochs of a 12 Hz drive with deterministic broadband jitter; the second
/// signal trails the first by `lag` radians.
fn epoched_pair(epochs: usize, samples: usize, fs: f64, lag: f64) -> (Array2<f64>, Array2<f64>) {
    let wave = |e: usize, i: usize, phase: f64, seed: f64| {
        let t = i as f64 / fs;
        let jitter = (seed * (i + 31 * e) as f64).sin() * (0.37 * (i * (e + 2)) as f64).cos();
        (2.0 * std::f64::consts::PI * 12.0 * t + phase + 0.4 * e as f64).sin() + 0.6 * jitter
    };
    let data1 = Array2::from_shape_fn((epochs, samples), |(e, i)| wave(e, i, 0.0, 1.731));
    let data2 = Array2::from_shape_fn((epochs, samples), |(e, i)| wave(e, i, -lag, 2.417));
    (data1, data2)
}

fn rows_as_json(data: &Array2<f64>) -> serde_json::Value {
    json!(data.outer_iter().map(|row| row.to_vec()).collect::<Vec<_>>())
}

fn flatten_complex(pxy: &[phasesync::Complex<f64>]) -> Vec<f64> {
    pxy.iter().map(|c| c.re).chain(pxy.iter().map(|c| c.im)).collect()
}

fn flatten_coherence(result: CoherenceResult) -> Vec<f64> {
    let mut out = result.coherence;
    out.extend(result.phase_lags);
    out
}

fn run_contracts() -> Result<()> {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let out_dir = PathBuf::from(format!("target/contracts/{ts}"));
    fs::create_dir_all(&out_dir).context("creating contract output directory")?;

    let python = Python {
        bin: detect_python_bin(),
    };
    let mut rows = Vec::new();

    let fs_hz = 500.0;
    let (data1, data2) = epoched_pair(8, 500, fs_hz, 0.9);
    let x = data1.row(0).to_vec();
    let y = data2.row(0).to_vec();

    // Cross-spectral density
    {
        let case_id = "csd_hann_density_f64";
        let config = SpectralConfig {
            fs: fs_hz,
            nperseg: 128,
            noverlap: 64,
            window: Window::Hann,
            detrend: Detrend::Constant,
            scaling: Scaling::Density,
        };
        let kernel = CsdKernel::try_new(config)?;
        let (_, pxy) = kernel
            .run_alloc(&x, &y)
            .map_err(|e| anyhow!("csd candidate execution failed: {e}"))?;
        let candidate = flatten_complex(&pxy);
        let (_, baseline) = csd_baseline(&x, &y, config)?;
        let baseline = flatten_complex(&baseline);
        let py = python.signal(
            "csd",
            json!({ "x": x, "y": y, "options": config }),
            100,
        )?;

        let candidate_ns = time_per_call(200, || {
            kernel
                .run_alloc(&x, &y)
                .map(|_| ())
                .map_err(|e| anyhow!("csd candidate benchmark failed: {e}"))
        })?;
        let baseline_ns = time_per_call(200, || {
            csd_baseline(&x, &y, config)?;
            Ok(())
        })?;

        record_case(&mut rows, case_id, candidate, baseline, py, candidate_ns, baseline_ns)?;
    }

    // Welch PSD
    {
        let case_id = "welch_hamming_spectrum_linear_f64";
        let config = SpectralConfig {
            fs: fs_hz,
            nperseg: 100,
            noverlap: 30,
            window: Window::Hamming,
            detrend: Detrend::Linear,
            scaling: Scaling::Spectrum,
        };
        let kernel = WelchKernel::try_new(config)?;
        let (_, candidate) = kernel
            .run_alloc(&x)
            .map_err(|e| anyhow!("welch candidate execution failed: {e}"))?;
        let (_, baseline) = welch_baseline(&x, config)?;
        let py = python.signal("welch", json!({ "x": x, "options": config }), 100)?;

        let candidate_ns = time_per_call(200, || {
            kernel
                .run_alloc(&x)
                .map(|_| ())
                .map_err(|e| anyhow!("welch candidate benchmark failed: {e}"))
        })?;
        let baseline_ns = time_per_call(200, || {
            welch_baseline(&x, config)?;
            Ok(())
        })?;

        record_case(&mut rows, case_id, candidate, baseline, py, candidate_ns, baseline_ns)?;
    }

    // Phase-lag measures
    let options = PhaseLagOptions::default()
        .with_fs(fs_hz)
        .with_nperseg(250)
        .with_noverlap(125)
        .with_window(Window::Triang);
    for measure in Measure::ALL {
        let case_id = format!("{measure}_triang_spectrum_linear_f64");
        let kernel = PhaseLagKernel::try_new(PhaseLagConfig { measure, options })?;
        let candidate = kernel.run(&data1, &data2, 8)?.scores;
        let baseline = compute(measure, &data1, &data2, 8, &options)?.scores;
        let py = python.signal(
            measure.name(),
            json!({
                "data1": rows_as_json(&data1),
                "data2": rows_as_json(&data2),
                "num_epochs": 8,
                "options": options
            }),
            20,
        )?;

        let candidate_ns = time_per_call(40, || {
            kernel.run(&data1, &data2, 8)?;
            Ok(())
        })?;
        let baseline_ns = time_per_call(40, || {
            compute(measure, &data1, &data2, 8, &options)?;
            Ok(())
        })?;

        record_case(&mut rows, &case_id, candidate, baseline, py, candidate_ns, baseline_ns)?;
    }

    // Coherence over the concatenated epochs
    {
        let case_id = "coherence_quarter_second_f64";
        let coh_options = CoherenceOptions::default()
            .with_fs(fs_hz)
            .with_segment_length_seconds(0.25)
            .with_segment_overlap_fraction(0.5);
        let (nperseg, noverlap) = coh_options.segment_geometry()?;
        let long_x: Vec<f64> = data1.iter().copied().collect();
        let long_y: Vec<f64> = data2.iter().copied().collect();

        let kernel = CoherenceKernel::try_new(CoherenceConfig {
            fs: fs_hz,
            nperseg,
            noverlap,
        })?;
        let candidate = flatten_coherence(
            kernel
                .run_alloc(&long_x, &long_y)
                .map_err(|e| anyhow!("coherence candidate execution failed: {e}"))?,
        );
        let baseline = flatten_coherence(coherence(&long_x, &long_y, &coh_options)?);
        let py = python.signal(
            "coherence",
            json!({
                "x": long_x,
                "y": long_y,
                "fs": fs_hz,
                "segment_length_seconds": coh_options.segment_length_seconds,
                "segment_overlap_fraction": coh_options.segment_overlap_fraction
            }),
            40,
        )?;

        let candidate_ns = time_per_call(80, || {
            kernel
                .run_alloc(&long_x, &long_y)
                .map(|_| ())
                .map_err(|e| anyhow!("coherence candidate benchmark failed: {e}"))
        })?;
        let baseline_ns = time_per_call(80, || {
            coherence(&long_x, &long_y, &coh_options)?;
            Ok(())
        })?;

        record_case(&mut rows, case_id, candidate, baseline, py, candidate_ns, baseline_ns)?;
    }

    // Epoch-averaged coherence
    {
        let case_id = "coherence_epochs_half_second_f64";
        let coh_options = CoherenceOptions::default()
            .with_fs(fs_hz)
            .with_segment_length_seconds(0.5)
            .with_segment_overlap_fraction(0.25);
        let candidate = flatten_coherence(coherence_epochs(&data1, &data2, 8, &coh_options)?);
        let baseline = flatten_coherence(coherence_epochs(
            &data1.view(),
            &data2.view(),
            8,
            &coh_options,
        )?);
        let py = python.signal(
            "coherence_epochs",
            json!({
                "data1": rows_as_json(&data1),
                "data2": rows_as_json(&data2),
                "num_epochs": 8,
                "fs": fs_hz,
                "segment_length_seconds": coh_options.segment_length_seconds,
                "segment_overlap_fraction": coh_options.segment_overlap_fraction
            }),
            20,
        )?;

        let candidate_ns = time_per_call(40, || {
            coherence_epochs(&data1, &data2, 8, &coh_options)?;
            Ok(())
        })?;
        let baseline_ns = time_per_call(40, || {
            coherence_epochs(&data1.view(), &data2.view(), 8, &coh_options)?;
            Ok(())
        })?;

        record_case(&mut rows, case_id, candidate, baseline, py, candidate_ns, baseline_ns)?;
    }

    let versions = python.versions()?;
    let bundle = ContractBundle {
        generated_epoch_seconds: ts,
        python_executable: python.bin.to_string_lossy().into_owned(),
        python_version: versions.python_version,
        numpy_version: versions.numpy_version,
        scipy_version: versions
            .scipy_version
            .unwrap_or_else(|| "unknown".to_string()),
        rows,
    };

    write_summary_csv(&out_dir.join("summary.csv"), &bundle.rows)?;
    fs::write(
        out_dir.join("summary.json"),
        serde_json::to_vec_pretty(&bundle).context("serializing summary bundle")?,
    )
    .context("writing summary.json")?;

    println!("Contract artifacts generated in: {}", out_dir.display());
    println!("  - {}", out_dir.join("summary.csv").display());
    println!("  - {}", out_dir.join("summary.json").display());
    println!("  - cases: {}", bundle.rows.len());

    Ok(())
}

fn detect_python_bin() -> PathBuf {
    std::env::var_os("PYTHON")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PYTHON_BIN))
}

/// NumPy/SciPy reference interpreter driven over a JSON stdin/stdout pipe.
struct Python {
    bin: PathBuf,
}

impl Python {
    fn eval(&self, script: &str, payload: &serde_json::Value) -> Result<PythonEval> {
        let mut child = Command::new(&self.bin)
            .args(["-c", script])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning {}", self.bin.display()))?;

        let stdin = child.stdin.take().context("python stdin unavailable")?;
        serde_json::to_writer(stdin, payload).context("streaming payload to python")?;

        let output = child.wait_with_output().context("waiting for python")?;
        if !output.status.success() {
            bail!(
                "python exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
        }
        serde_json::from_slice(&output.stdout).context("decoding python reply")
    }

    fn signal(&self, op: &str, payload: serde_json::Value, iters: usize) -> Result<PythonEval> {
        self.eval(
            PY_SIGNAL_SCRIPT,
            &json!({ "op": op, "iters": iters, "payload": payload }),
        )
    }

    fn versions(&self) -> Result<PythonEval> {
        self.eval(PY_VERSION_SCRIPT, &json!({}))
    }
}

const PY_VERSION_SCRIPT: &str = r#"
import json, sys
import numpy
import scipy
print(json.dumps({
    "output": [],
    "avg_ns": 0.0,
    "python_version": sys.version.split()[0],
    "numpy_version": numpy.__version__,
    "scipy_version": scipy.__version__
}))
"#;

/// Mean wall time of one call to `f`, in nanoseconds.
fn time_per_call<F>(iters: usize, mut f: F) -> Result<f64>
where
    F: FnMut() -> Result<()>,
{
    let start = Instant::now();
    (0..iters).try_for_each(|_| f())?;
    Ok(start.elapsed().as_nanos() as f64 / iters.max(1) as f64)
}

#[derive(Debug, Clone, Copy)]
struct Timings {
    candidate_ns: f64,
    baseline_ns: f64,
    python_ns: f64,
}

/// Agreement between a Rust output and its reference.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Agreement {
    pearson_r: f64,
    mae: f64,
    rmse: f64,
    max_abs: f64,
}

impl Agreement {
    fn measure(actual: &[f64], reference: &[f64]) -> Self {
        let n = actual.len().max(1) as f64;
        let mean_a = actual.iter().sum::<f64>() / n;
        let mean_r = reference.iter().sum::<f64>() / n;

        let (mut abs_sum, mut sq_sum, mut max_abs) = (0.0, 0.0, 0.0f64);
        let (mut cov, mut var_a, mut var_r) = (0.0, 0.0, 0.0);
        for (a, r) in actual.iter().zip(reference) {
            let err = (a - r).abs();
            abs_sum += err;
            sq_sum += err * err;
            max_abs = max_abs.max(err);

            let (da, dr) = (a - mean_a, r - mean_r);
            cov += da * dr;
            var_a += da * da;
            var_r += dr * dr;
        }

        // Flat outputs carry no correlation; count them as matching only when equal.
        let pearson_r = if var_a == 0.0 || var_r == 0.0 {
            if actual == reference { 1.0 } else { 0.0 }
        } else {
            cov / (var_a * var_r).sqrt()
        };
        Self {
            pearson_r,
            mae: abs_sum / n,
            rmse: (sq_sum / n).sqrt(),
            max_abs,
        }
    }
}

impl ContractRow {
    const CSV_HEADER: &'static str = "case_id,pearson_r,mae,rmse,max_abs,rust_candidate_ns,rust_baseline_ns,python_ns,speedup_vs_baseline,speedup_vs_python";

    fn new(case_id: &str, agreement: Agreement, timings: Timings) -> Self {
        Self {
            case_id: case_id.to_string(),
            pearson_r: agreement.pearson_r,
            mae: agreement.mae,
            rmse: agreement.rmse,
            max_abs: agreement.max_abs,
            rust_candidate_ns: timings.candidate_ns,
            rust_baseline_ns: timings.baseline_ns,
            python_ns: timings.python_ns,
            speedup_vs_baseline: timings.baseline_ns / timings.candidate_ns,
            speedup_vs_python: timings.python_ns / timings.candidate_ns,
        }
    }

    fn csv_line(&self) -> String {
        format!(
            "{},{:.12},{:.12},{:.12},{:.12},{:.3},{:.3},{:.3},{:.6},{:.6}",
            self.case_id,
            self.pearson_r,
            self.mae,
            self.rmse,
            self.max_abs,
            self.rust_candidate_ns,
            self.rust_baseline_ns,
            self.python_ns,
            self.speedup_vs_baseline,
            self.speedup_vs_python,
        )
    }
}

/// Check one case's three outputs against each other and append its row.
fn record_case(
    rows: &mut Vec<ContractRow>,
    case_id: &str,
    candidate: Vec<f64>,
    baseline: Vec<f64>,
    py: PythonEval,
    candidate_ns: f64,
    baseline_ns: f64,
) -> Result<()> {
    for (name, other) in [("free-function", &baseline), ("python", &py.output)] {
        if other.len() != candidate.len() {
            bail!(
                "case {case_id}: kernel output has {} values, {name} output has {}",
                candidate.len(),
                other.len()
            );
        }
    }
    if candidate != baseline {
        bail!("case {case_id}: kernel and free-function paths disagree");
    }

    let timings = Timings {
        candidate_ns,
        baseline_ns,
        python_ns: py.avg_ns,
    };
    rows.push(ContractRow::new(
        case_id,
        Agreement::measure(&candidate, &py.output),
        timings,
    ));
    Ok(())
}

fn write_summary_csv(path: &Path, rows: &[ContractRow]) -> Result<()> {
    let lines: Vec<String> = std::iter::once(ContractRow::CSV_HEADER.to_string())
        .chain(rows.iter().map(ContractRow::csv_line))
        .collect();
    fs::write(path, lines.join("\n") + "\n").with_context(|| format!("writing {}", path.display()))
}
